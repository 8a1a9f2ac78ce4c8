use axum::{body::Body, extract::Request, http::header::CONTENT_TYPE};
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use multer::{Constraints, Field, Multipart, SizeLimit};
use tracing::{debug, warn};

use crate::error::AppError;

/// Thumbnail content types and the extension each is stored under.
pub const THUMBNAIL_TYPES: &[(&str, &str)] = &[("image/jpeg", ".jpg"), ("image/png", ".png")];

pub const VIDEO_TYPE: &str = "video/mp4";

/// The media field of an upload, validated but not yet read.
pub struct MediaUpload {
    pub content_type: String,
    field: Field<'static>,
    limit: u64,
}

impl MediaUpload {
    /// The field body. Oversized or malformed bodies surface as client errors.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, AppError>> {
        let limit = self.limit;
        self.field.map_err(move |e| multipart_error(e, limit))
    }
}

/// Extension for an accepted thumbnail type. Parameters such as `charset`
/// are ignored.
pub fn thumbnail_extension(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    THUMBNAIL_TYPES
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
}

pub fn is_video_type(content_type: &str) -> bool {
    content_type == VIDEO_TYPE
}

/// Parses a multipart request up to `limit` bytes and returns the field
/// named `field_name` once its declared content type passes `accept`.
pub async fn receive_media(
    request: Request<Body>,
    field_name: &str,
    limit: u64,
    accept: fn(&str) -> bool,
) -> Result<MediaUpload, AppError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::ClientInput("Missing Content-Type header".to_string()))?;

    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| AppError::ClientInput(format!("Couldn't parse multipart form: {}", e)))?;

    let mut multipart = Multipart::with_constraints(
        request.into_body().into_data_stream(),
        boundary,
        Constraints::new().size_limit(SizeLimit::new().whole_stream(limit).per_field(limit)),
    );

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(field_name) {
            // Drain the field
            while field
                .chunk()
                .await
                .map_err(|e| multipart_error(e, limit))?
                .is_some()
            {}
            continue;
        }

        let declared = field
            .content_type()
            .map(|mime| mime.to_string())
            .unwrap_or_default();

        if !accept(&declared) {
            warn!(field = field_name, content_type = %declared, "[upload] rejected media type");
            return Err(AppError::ClientInput("Unsupported media type".to_string()));
        }

        debug!(field = field_name, content_type = %declared, "[upload] receiving media");

        return Ok(MediaUpload {
            content_type: declared,
            field,
            limit,
        });
    }

    Err(AppError::ClientInput(format!(
        "Couldn't get {} file",
        field_name
    )))
}

fn multipart_error(e: multer::Error, limit: u64) -> AppError {
    match e {
        multer::Error::StreamSizeExceeded { .. } | multer::Error::FieldSizeExceeded { .. } => {
            AppError::PayloadTooLarge { limit }
        }
        other => AppError::ClientInput(format!("Couldn't parse multipart form: {}", other)),
    }
}
