use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use crate::models::ErrorResponse;

/// Failure taxonomy shared by every stage of the ingest pipeline.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    ClientInput(String),

    #[error("Upload too large. Maximum size is {}MB", .limit / 1024 / 1024)]
    PayloadTooLarge { limit: u64 },

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{context}: {source:#}")]
    Dependency {
        context: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    pub fn dependency(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        AppError::Dependency {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ClientInput(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Dependency { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Wraps any failure of an external collaborator into `AppError::Dependency`.
pub trait DependencyContext<T> {
    fn dependency(self, context: &str) -> Result<T, AppError>;
}

impl<T, E> DependencyContext<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn dependency(self, context: &str) -> Result<T, AppError> {
        self.map_err(|e| AppError::dependency(context, e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!("[error] ❌ {}", self);
        } else {
            warn!("[error] {} - {}", status, self);
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
