use std::io;
use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failure while serving a media file.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The path does not name an existing regular file. Detected before any
    /// header is produced.
    #[error("media file does not exist: {}", .0.display())]
    NotFound(PathBuf),

    /// Reading the source or writing the sink failed.
    #[error("i/o failure while streaming media: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T, E = MediaError> = std::result::Result<T, E>;

impl IntoResponse for MediaError {
    fn into_response(self) -> Response {
        let status = match self {
            MediaError::NotFound(_) => StatusCode::NOT_FOUND,
            MediaError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
