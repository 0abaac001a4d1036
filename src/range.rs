//! Resolution of `Range` header text into a single clamped byte interval.
//!
//! Resolution is permissive: text that cannot be understood falls back to the
//! default bounds instead of being rejected, so a request always resolves to
//! something servable.

use axum::http::StatusCode;
use tracing::{debug, warn};

/// An inclusive `[start, end]` span of a file's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteInterval {
    pub start: u64,
    pub end: u64,
}

impl ByteInterval {
    /// The interval covering every byte of a file of `file_size` bytes.
    ///
    /// An empty file yields `{0, 0}`.
    pub fn whole(file_size: u64) -> Self {
        ByteInterval { start: 0, end: last_byte(file_size) }
    }

    /// Clamps caller supplied positions against `file_size`.
    ///
    /// Positions past the end of the file collapse onto the last byte, and a
    /// start beyond the end is pulled back to the end.
    pub fn clamped(start: u64, end: u64, file_size: u64) -> Self {
        if file_size == 0 {
            return ByteInterval { start: 0, end: 0 };
        }
        let end = end.min(file_size - 1);
        let start = start.min(end);
        ByteInterval { start, end }
    }

    /// Number of bytes covered by the interval, `end - start + 1`.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Whether a resolved interval covers the whole file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferStatus {
    Full,
    Partial,
}

impl TransferStatus {
    fn classify(interval: ByteInterval, file_size: u64) -> Self {
        if interval == ByteInterval::whole(file_size) {
            TransferStatus::Full
        } else {
            TransferStatus::Partial
        }
    }

    /// `200 OK` for [`TransferStatus::Full`], `206 Partial Content` otherwise.
    pub fn status_code(self) -> StatusCode {
        match self {
            TransferStatus::Full => StatusCode::OK,
            TransferStatus::Partial => StatusCode::PARTIAL_CONTENT,
        }
    }
}

/// Outcome of resolving a request against a file size snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedRange {
    pub interval: ByteInterval,
    pub status: TransferStatus,
    pub file_size: u64,
}

impl ResolvedRange {
    /// Resolves explicit positions, see [`ByteInterval::clamped`].
    pub fn positions(start: u64, end: u64, file_size: u64) -> Self {
        Self::from_interval(ByteInterval::clamped(start, end, file_size), file_size)
    }

    fn from_interval(interval: ByteInterval, file_size: u64) -> Self {
        let status = TransferStatus::classify(interval, file_size);
        ResolvedRange { interval, status, file_size }
    }

    /// Number of body bytes to send.
    ///
    /// An empty file still resolves to the `{0, 0}` interval, but no byte of
    /// it exists, so nothing is sent.
    pub fn content_length(&self) -> u64 {
        if self.file_size == 0 {
            0
        } else {
            self.interval.len()
        }
    }

    /// Value for the `Content-Range` header.
    pub fn content_range(&self) -> String {
        if self.file_size == 0 {
            return String::from("bytes */0");
        }
        format!("bytes {}-{}/{}", self.interval.start, self.interval.end, self.file_size)
    }

    pub fn status_code(&self) -> StatusCode {
        self.status.status_code()
    }
}

/// Resolves optional `Range` header text against a file of `file_size` bytes.
///
/// Only the first two `-` separated tokens after an optional `bytes=` prefix
/// are looked at. Every non-digit character is dropped from a token before it
/// is parsed, and a token that is empty or does not fit a `u64` counts as not
/// provided.
///
/// `bytes=-N` is not a suffix request here: the missing start defaults to `0`
/// and `N` is taken as the end position.
pub fn resolve(range: Option<&str>, file_size: u64) -> ResolvedRange {
    let text = match range.map(str::trim) {
        Some(text) if !text.is_empty() => text,
        _ => return ResolvedRange::from_interval(ByteInterval::whole(file_size), file_size),
    };

    debug!(range = text, file_size, "parsing range header");

    let positions = text.strip_prefix("bytes=").unwrap_or(text);
    let mut tokens = positions.split('-');
    let start_token = tokens.next().and_then(position);
    let end_token = tokens.next().and_then(position);

    let mut start = start_token.unwrap_or(0);
    let mut end = end_token.unwrap_or_else(|| last_byte(file_size));

    if end == 0 && file_size > 0 {
        end = file_size - 1;
    }
    if file_size > 0 && end >= file_size {
        end = file_size - 1;
    }
    if start > end {
        start = end;
    }
    if file_size == 0 {
        start = 0;
        end = 0;
    }

    let interval = ByteInterval { start, end };
    debug!(start, end, "parsed range");
    ResolvedRange::from_interval(interval, file_size)
}

fn position(token: &str) -> Option<u64> {
    let digits: String = token.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    match digits.parse::<u64>() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(token, error = %e, "ignoring unparseable range position");
            None
        }
    }
}

fn last_byte(file_size: u64) -> u64 {
    file_size.saturating_sub(1)
}
