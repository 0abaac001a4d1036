//! # media-range
//!
//! Byte-range HTTP responses for large media files on [`axum`][1].
//!
//! A request's `Range` header is resolved into one contiguous, clamped byte
//! interval (see [`resolve`]) and that interval is streamed from the file in
//! fixed-size chunks (see [`RangedStream`]), so players can seek and
//! downloads can resume without the server ever buffering a whole file.
//!
//! Range parsing is deliberately permissive. Text that cannot be understood
//! falls back to default bounds and out-of-bounds positions are clamped, so
//! a request is never refused because of its `Range` header.
//!
//! ```no_run
//! use axum::Router;
//! use axum::http::HeaderMap;
//! use axum::response::IntoResponse;
//! use axum::routing::get;
//!
//! use media_range::{serve_file, ServeConfig};
//!
//! async fn movie(headers: HeaderMap) -> impl IntoResponse {
//!     serve_file("media/movie.mp4", &headers, &ServeConfig::default()).await
//! }
//!
//! let _app = Router::<()>::new().route("/movie", get(movie));
//! ```
//!
//! [1]: https://docs.rs/axum

mod config;
mod error;
mod file;
mod range;
mod stream;

use std::borrow::Cow;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::{CONTENT_RANGE, CONTENT_TYPE, RANGE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::headers::{AcceptRanges, ContentLength};
use axum_extra::TypedHeader;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncSeek};
use tracing::debug;

pub use config::{ServeConfig, DEFAULT_BUFFER_SIZE, OCTET_STREAM};
pub use error::{MediaError, Result};
pub use file::{guess_content_type, KnownSize};
pub use range::{resolve, ByteInterval, ResolvedRange, TransferStatus};
pub use stream::{transfer, transfer_file, RangedStream};

/// [`AsyncSeek`] narrowed to only allow seeking from start.
pub trait AsyncSeekStart {
    /// Same semantics as [`AsyncSeek::start_seek`], always passing position as the `SeekFrom::Start` variant.
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()>;

    /// Same semantics as [`AsyncSeek::poll_complete`], returning `()` instead of the new stream position.
    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>>;
}

impl<T: AsyncSeek> AsyncSeekStart for T {
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()> {
        AsyncSeek::start_seek(self, io::SeekFrom::Start(position))
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        AsyncSeek::poll_complete(self, cx).map_ok(|_| ())
    }
}

/// An [`AsyncRead`] and [`AsyncSeekStart`] with a fixed known byte size.
pub trait RangeBody: AsyncRead + AsyncSeekStart {
    /// The total size of the underlying file.
    ///
    /// Read once per request and trusted from then on. If the file shrinks
    /// while it is streamed the stream fails rather than ending short.
    fn byte_size(&self) -> u64;

    /// Best-effort MIME type of the body, if one is known.
    fn content_type(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Request {
    Header(Option<String>),
    Positions { start: u64, end: u64 },
}

/// The main responder type. Implements [`IntoResponse`].
#[derive(Debug)]
pub struct Ranged<B: RangeBody + Send + 'static> {
    request: Request,
    body: B,
    buffer_size: usize,
    default_content_type: Cow<'static, str>,
}

impl<B: RangeBody + Send + 'static> Ranged<B> {
    /// Construct a ranged response over any type implementing [`RangeBody`]
    /// and the raw text of an optional `Range` header. `None` serves the
    /// entire body.
    pub fn new(range: Option<String>, body: B) -> Self {
        Self::with_request(Request::Header(range), body)
    }

    /// Takes the `Range` header out of `headers`. Bytes that are not valid
    /// UTF-8 are replaced rather than rejected.
    pub fn from_headers(headers: &HeaderMap, body: B) -> Self {
        let range = headers
            .get(RANGE)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());
        Self::new(range, body)
    }

    /// Serves the inclusive span `start..=end`, clamped to the body's size.
    pub fn positions(body: B, start: u64, end: u64) -> Self {
        Self::with_request(Request::Positions { start, end }, body)
    }

    fn with_request(request: Request, body: B) -> Self {
        Ranged {
            request,
            body,
            buffer_size: DEFAULT_BUFFER_SIZE,
            default_content_type: Cow::Borrowed(OCTET_STREAM),
        }
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Content type used when the body does not know its own.
    pub fn with_default_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.default_content_type = Cow::Owned(content_type.into());
        self
    }

    pub fn with_config(self, config: &ServeConfig) -> Self {
        self.with_buffer_size(config.buffer_size)
            .with_default_content_type(config.default_content_type.clone())
    }

    /// Resolves the request against the body's size without consuming it.
    pub fn resolve(&self) -> ResolvedRange {
        let byte_size = self.body.byte_size();
        match &self.request {
            Request::Header(range) => resolve(range.as_deref(), byte_size),
            Request::Positions { start, end } => ResolvedRange::positions(*start, *end, byte_size),
        }
    }

    /// Resolves the range and pairs it with a stream over exactly those
    /// bytes. Never fails: unusable range text falls back to the whole body.
    pub fn respond(self) -> RangedResponse<B> {
        let resolved = self.resolve();
        let content_type = self
            .body
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| self.default_content_type.into_owned());

        debug!(
            start = resolved.interval.start,
            end = resolved.interval.end,
            byte_size = resolved.file_size,
            status = ?resolved.status,
            "resolved ranged response"
        );

        let stream = RangedStream::for_range(self.body, &resolved, self.buffer_size);
        RangedResponse { resolved, content_type, stream }
    }
}

impl<B: RangeBody + Send + 'static> IntoResponse for Ranged<B> {
    fn into_response(self) -> Response {
        self.respond().into_response()
    }
}

/// Data type containing computed headers and body for a range response. Implements [`IntoResponse`].
#[derive(Debug)]
pub struct RangedResponse<B> {
    pub resolved: ResolvedRange,
    pub content_type: String,
    pub stream: RangedStream<B>,
}

impl<B> RangedResponse<B> {
    pub fn status_code(&self) -> StatusCode {
        self.resolved.status_code()
    }

    pub fn content_length(&self) -> ContentLength {
        ContentLength(self.resolved.content_length())
    }
}

impl<B: RangeBody + Send + 'static> IntoResponse for RangedResponse<B> {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let content_length = self.content_length();

        let content_type = HeaderValue::from_str(&self.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(OCTET_STREAM));
        let content_range = HeaderValue::from_str(&self.resolved.content_range())
            .expect("content range is formatted from integers");

        let headers = [
            (CONTENT_TYPE, content_type),
            (CONTENT_RANGE, content_range),
        ];

        (
            status,
            TypedHeader(AcceptRanges::bytes()),
            TypedHeader(content_length),
            headers,
            Body::new(self.stream),
        ).into_response()
    }
}

/// Opens `path` and answers the `Range` header in `headers` from it.
///
/// Fails with [`MediaError::NotFound`] before anything is streamed if `path`
/// is not an existing regular file.
pub async fn serve_file(
    path: impl AsRef<Path>,
    headers: &HeaderMap,
    config: &ServeConfig,
) -> Result<RangedResponse<KnownSize<File>>> {
    let body = KnownSize::open(path).await?;
    Ok(Ranged::from_headers(headers, body).with_config(config).respond())
}
