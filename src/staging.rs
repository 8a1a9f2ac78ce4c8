use bytes::Bytes;
use futures::{pin_mut, Stream, StreamExt};
use std::{
    ops::Deref,
    path::{Path, PathBuf},
};
use tokio::io::{AsyncSeekExt, AsyncWriteExt, SeekFrom};
use uuid::Uuid;

use crate::error::{AppError, DependencyContext};

/// A request-local file under the staging directory. The file is removed
/// when the guard is dropped, whichever way the request ends.
#[must_use]
#[derive(Debug)]
pub struct StagingFile(Option<PathBuf>);

impl StagingFile {
    /// Reserves a unique path in `dir`. Nothing is written yet.
    pub fn new(dir: &Path, ext: &str) -> Self {
        StagingFile(Some(dir.join(format!("staging-{}{}", Uuid::new_v4(), ext))))
    }

    /// A guard for `<this path><suffix>`, used for tool output.
    pub fn sibling(&self, suffix: &str) -> Self {
        let mut name = self.path().as_os_str().to_os_string();
        name.push(suffix);
        StagingFile(Some(PathBuf::from(name)))
    }

    pub fn path(&self) -> &Path {
        self.0.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Copies `stream` into the file and returns the number of bytes written.
    ///
    /// Errors yielded by the stream are passed through untouched; only
    /// filesystem failures become dependency errors.
    pub async fn write_from_stream<S>(&self, stream: S) -> Result<u64, AppError>
    where
        S: Stream<Item = Result<Bytes, AppError>>,
    {
        pin_mut!(stream);

        let mut file = tokio::fs::File::create(self.path())
            .await
            .dependency("Couldn't create temp file")?;

        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .dependency("Couldn't copy video file")?;
            written += chunk.len() as u64;
        }

        file.flush().await.dependency("Couldn't copy video file")?;

        Ok(written)
    }

    /// Opens the staged file positioned at offset zero.
    pub async fn open(&self) -> Result<tokio::fs::File, AppError> {
        let mut file = tokio::fs::File::open(self.path())
            .await
            .dependency("Couldn't open temp file")?;
        file.seek(SeekFrom::Start(0))
            .await
            .dependency("Couldn't seek to start of temp file")?;
        Ok(file)
    }

    pub async fn cleanup(mut self) -> std::io::Result<()> {
        if let Some(path) = self.0.take() {
            match tokio::fs::remove_file(&path).await {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
                _ => {}
            }
        }
        Ok(())
    }
}

impl AsRef<Path> for StagingFile {
    fn as_ref(&self) -> &Path {
        self.path()
    }
}

impl Deref for StagingFile {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        self.path()
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tokio::io::AsyncReadExt;

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = Result<Bytes, AppError>> {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn writes_stream_and_reopens_at_start() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagingFile::new(dir.path(), ".mp4");

        let written = staged
            .write_from_stream(chunks(&["ftyp", "moov", "mdat"]))
            .await
            .unwrap();
        assert_eq!(written, 12);

        let mut contents = String::new();
        staged
            .open()
            .await
            .unwrap()
            .read_to_string(&mut contents)
            .await
            .unwrap();
        assert_eq!(contents, "ftypmoovmdat");
    }

    #[tokio::test]
    async fn removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let staged = StagingFile::new(dir.path(), ".mp4");
            staged.write_from_stream(chunks(&["data"])).await.unwrap();
            assert!(staged.path().exists());
            staged.path().to_path_buf()
        };

        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn removed_when_stream_fails() {
        let dir = tempfile::tempdir().unwrap();
        {
            let staged = StagingFile::new(dir.path(), ".mp4");
            let failing = stream::iter(vec![
                Ok(Bytes::from_static(b"partial")),
                Err(AppError::ClientInput("truncated body".into())),
            ]);

            let err = staged.write_from_stream(failing).await.unwrap_err();
            assert!(matches!(err, AppError::ClientInput(_)));
        }

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn cleanup_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagingFile::new(dir.path(), ".mp4");
        staged.cleanup().await.unwrap();
    }

    #[test]
    fn sibling_extends_the_name() {
        let staged = StagingFile::new(Path::new("/tmp/staging"), ".mp4");
        let processed = staged.sibling(".processing");

        let expected = format!("{}.processing", staged.path().display());
        assert_eq!(processed.path().to_string_lossy(), expected);
    }

    #[tokio::test]
    async fn write_failure_is_a_dependency_error() {
        let staged = StagingFile::new(Path::new("/nonexistent/staging/dir"), ".mp4");
        let err = staged
            .write_from_stream(chunks(&["data"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Dependency { .. }));
    }
}
