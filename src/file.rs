use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project::pin_project;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt, ReadBuf};
use tracing::debug;

use crate::error::{MediaError, Result};
use crate::{AsyncSeekStart, RangeBody};

/// Implements [`RangeBody`] for any [`AsyncRead`] and [`AsyncSeekStart`] whose
/// byte size has been snapshotted up front.
#[pin_project]
pub struct KnownSize<B: AsyncRead + AsyncSeekStart> {
    byte_size: u64,
    content_type: Option<String>,
    #[pin]
    body: B,
}

impl<B: AsyncRead + AsyncSeekStart> std::fmt::Debug for KnownSize<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnownSize")
            .field("byte_size", &self.byte_size)
            .field("content_type", &self.content_type)
            .finish()
    }
}

impl KnownSize<File> {
    /// Opens the regular file at `path`, reads its size once and guesses its
    /// content type from the extension.
    ///
    /// Fails with [`MediaError::NotFound`] when nothing exists at `path` or
    /// it is not a regular file.
    pub async fn open(path: impl AsRef<Path>) -> Result<KnownSize<File>> {
        let path = path.as_ref();
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(MediaError::NotFound(path.to_path_buf())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(MediaError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let file = File::open(path).await?;
        let byte_size = metadata.len();
        let content_type = guess_content_type(path);
        debug!(path = %path.display(), byte_size, ?content_type, "opened media file");

        Ok(KnownSize { byte_size, content_type, body: file })
    }

    /// Calls [`tokio::fs::File::metadata`] to determine file size.
    pub async fn file(file: File) -> io::Result<KnownSize<File>> {
        let byte_size = file.metadata().await?.len();
        Ok(KnownSize { byte_size, content_type: None, body: file })
    }
}

impl<B: AsyncRead + AsyncSeekStart> KnownSize<B> {
    /// Construct a [`KnownSize`] instance with a byte size supplied manually.
    pub fn sized(body: B, byte_size: u64) -> Self {
        KnownSize { byte_size, content_type: None, body }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn into_inner(self) -> B {
        self.body
    }
}

impl<B: AsyncRead + AsyncSeek + Unpin> KnownSize<B> {
    /// Determines size by seeking to the end and reading the stream position.
    pub async fn seek(mut body: B) -> io::Result<KnownSize<B>> {
        let byte_size = body.seek(io::SeekFrom::End(0)).await?;
        Ok(KnownSize { byte_size, content_type: None, body })
    }
}

/// Best-effort MIME type for `path`, judged by its extension.
pub fn guess_content_type(path: &Path) -> Option<String> {
    mime_guess::from_path(path).first_raw().map(str::to_string)
}

impl<B: AsyncRead + AsyncSeekStart> AsyncRead for KnownSize<B> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.project().body.poll_read(cx, buf)
    }
}

impl<B: AsyncRead + AsyncSeekStart> AsyncSeekStart for KnownSize<B> {
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()> {
        self.project().body.start_seek(position)
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().body.poll_complete(cx)
    }
}

impl<B: AsyncRead + AsyncSeekStart> RangeBody for KnownSize<B> {
    fn byte_size(&self) -> u64 {
        self.byte_size
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::Path;

    use assert_matches::assert_matches;
    use tokio::fs::File;

    use super::{guess_content_type, KnownSize};
    use crate::error::MediaError;
    use crate::RangeBody;

    #[tokio::test]
    async fn test_open_file() {
        let known_size = KnownSize::open("test/fixture.txt").await.unwrap();
        assert_eq!(54, known_size.byte_size());
        assert_eq!(Some("text/plain"), known_size.content_type());
    }

    #[tokio::test]
    async fn test_open_empty_file() {
        let known_size = KnownSize::open("test/empty").await.unwrap();
        assert_eq!(0, known_size.byte_size());
        assert_eq!(None, known_size.content_type());
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let err = KnownSize::open("test/does-not-exist.mp4").await.unwrap_err();
        assert_matches!(err, MediaError::NotFound(path) if path == Path::new("test/does-not-exist.mp4"));
    }

    #[tokio::test]
    async fn test_open_directory() {
        let err = KnownSize::open("test").await.unwrap_err();
        assert_matches!(err, MediaError::NotFound(_));
    }

    #[tokio::test]
    async fn test_file_size() {
        let file = File::open("test/fixture.txt").await.unwrap();
        let known_size = KnownSize::file(file).await.unwrap();
        assert_eq!(54, known_size.byte_size());
    }

    #[tokio::test]
    async fn test_seek_size() {
        let known_size = KnownSize::seek(Cursor::new(vec![0u8; 321])).await.unwrap();
        assert_eq!(321, known_size.byte_size());
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(Some("video/mp4".to_string()), guess_content_type(Path::new("movie.mp4")));
        assert_eq!(Some("audio/mpeg".to_string()), guess_content_type(Path::new("song.mp3")));
        assert_eq!(None, guess_content_type(Path::new("no_extension")));
    }
}
