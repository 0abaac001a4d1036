use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::{pin_mut, Stream, StreamExt};
use http_body::{Body, Frame, SizeHint};
use pin_project::pin_project;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tracing::{debug, error};

use crate::config::DEFAULT_BUFFER_SIZE;
use crate::error::{MediaError, Result};
use crate::range::ResolvedRange;
use crate::AsyncSeekStart;

/// Lazily reads one byte span of a body as a sequence of chunks.
///
/// Each chunk holds at most `buffer_size` bytes and the stream ends once the
/// whole span has been produced. If the body runs dry first the stream yields
/// an [`io::ErrorKind::UnexpectedEof`] error. After ending or failing the
/// stream only yields `None`.
///
/// The body is owned by the stream and dropped with it, so a file handle is
/// closed however the response ends.
#[pin_project]
pub struct RangedStream<B> {
    state: StreamState,
    remaining: u64,
    buffer_size: usize,
    buffer: BytesMut,
    #[pin]
    body: B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Seek { start: u64 },
    Seeking,
    Reading,
    Done,
}

impl<B: AsyncRead + AsyncSeekStart> RangedStream<B> {
    /// Streams `length` bytes of `body` starting at `start`.
    pub fn new(body: B, start: u64, length: u64) -> Self {
        Self::with_buffer_size(body, start, length, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(body: B, start: u64, length: u64, buffer_size: usize) -> Self {
        let state = if length == 0 {
            StreamState::Done
        } else {
            StreamState::Seek { start }
        };
        RangedStream {
            state,
            remaining: length,
            buffer_size: buffer_size.max(1),
            buffer: BytesMut::new(),
            body,
        }
    }

    /// Streams exactly the bytes a resolved range promises in its
    /// `Content-Length`.
    pub fn for_range(body: B, range: &ResolvedRange, buffer_size: usize) -> Self {
        Self::with_buffer_size(body, range.interval.start, range.content_length(), buffer_size)
    }
}

impl<B> RangedStream<B> {
    /// Bytes of the span not yet produced.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<B> std::fmt::Debug for RangedStream<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangedStream")
            .field("state", &self.state)
            .field("remaining", &self.remaining)
            .field("buffer_size", &self.buffer_size)
            .finish()
    }
}

impl<B: AsyncRead + AsyncSeekStart> Body for RangedStream<B> {
    type Data = Bytes;
    type Error = io::Error;

    fn is_end_stream(&self) -> bool {
        self.state == StreamState::Done
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.remaining)
    }

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>)
        -> Poll<Option<io::Result<Frame<Bytes>>>>
    {
        self.poll_next(cx).map(|item| item.map(|result| result.map(Frame::data)))
    }
}

impl<B: AsyncRead + AsyncSeekStart> Stream for RangedStream<B> {
    type Item = io::Result<Bytes>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>
    ) -> Poll<Option<io::Result<Bytes>>> {
        let mut this = self.project();

        loop {
            match *this.state {
                StreamState::Seek { start } => {
                    if let Err(e) = this.body.as_mut().start_seek(start) {
                        return abort(this.state, *this.remaining, e);
                    }
                    *this.state = StreamState::Seeking;
                }

                StreamState::Seeking => match this.body.as_mut().poll_complete(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Err(e)) => return abort(this.state, *this.remaining, e),
                    Poll::Ready(Ok(())) => *this.state = StreamState::Reading,
                },

                StreamState::Reading => {
                    if *this.remaining == 0 {
                        *this.state = StreamState::Done;
                        return Poll::Ready(None);
                    }

                    // the smaller of the buffer size and the bytes left in the span
                    let nbytes = usize::try_from(*this.remaining)
                        .map_or(*this.buffer_size, |remaining| remaining.min(*this.buffer_size));
                    this.buffer.reserve(nbytes);

                    let mut read_buf = ReadBuf::uninit(&mut this.buffer.spare_capacity_mut()[..nbytes]);

                    match this.body.as_mut().poll_read(cx, &mut read_buf) {
                        Poll::Pending => return Poll::Pending,
                        Poll::Ready(Err(e)) => return abort(this.state, *this.remaining, e),
                        Poll::Ready(Ok(())) => {
                            let n = read_buf.filled().len();
                            if n == 0 {
                                let e = io::Error::new(
                                    io::ErrorKind::UnexpectedEof,
                                    format!("source ended with {} bytes of the range unread", this.remaining),
                                );
                                return abort(this.state, *this.remaining, e);
                            }

                            // SAFETY: poll_read initialised the first `n` bytes
                            // of the spare capacity and the buffer is empty
                            // after every split below
                            unsafe { this.buffer.set_len(n); }

                            // n <= nbytes <= remaining
                            *this.remaining -= n as u64;

                            return Poll::Ready(Some(Ok(this.buffer.split().freeze())));
                        }
                    }
                }

                StreamState::Done => return Poll::Ready(None),
            }
        }
    }
}

fn abort(state: &mut StreamState, remaining: u64, e: io::Error) -> Poll<Option<io::Result<Bytes>>> {
    error!(error = %e, remaining, "aborting range stream");
    *state = StreamState::Done;
    Poll::Ready(Some(Err(e)))
}

/// Copies the bytes of `range` from `source` into `sink`, one buffer at a
/// time, then flushes the sink.
///
/// Returns the number of bytes written, which always equals
/// [`ResolvedRange::content_length`] on success. Any read or write error
/// aborts the copy; nothing is retried.
pub async fn transfer<B, W>(source: B, range: &ResolvedRange, sink: &mut W, buffer_size: usize) -> Result<u64>
where
    B: AsyncRead + AsyncSeekStart,
    W: AsyncWrite + Unpin + ?Sized,
{
    let stream = RangedStream::for_range(source, range, buffer_size);
    pin_mut!(stream);

    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if let Err(e) = sink.write_all(&chunk).await {
            error!(error = %e, written, "sink rejected range chunk");
            return Err(MediaError::Io(e));
        }
        written += chunk.len() as u64;
    }
    sink.flush().await?;

    debug!(written, start = range.interval.start, "range transfer complete");
    Ok(written)
}

/// Opens the file at `path` and [`transfer`]s `range` out of it.
///
/// The file is closed when this returns, on success or failure.
pub async fn transfer_file<W>(path: impl AsRef<Path>, range: &ResolvedRange, sink: &mut W, buffer_size: usize) -> Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let path = path.as_ref();
    let file = File::open(path).await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => MediaError::NotFound(path.to_path_buf()),
        _ => MediaError::Io(e),
    })?;
    transfer(file, range, sink, buffer_size).await
}
