//! Push-to-pull byte stream.
//!
//! A transport pushes chunks from whatever thread its callbacks run on; the
//! response body pulls them asynchronously. The data lives behind its own
//! mutex, and a separate single-slot wake gate ([`AtomicWaker`]) parks the
//! reader. Producers always update the data first and open the gate after
//! releasing the lock; the reader registers with the gate and then checks the
//! data again before parking, so an event that lands between "nothing to read"
//! and "park" is never lost.
//!
//! ```rust
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use integrations_native_http::stream;
//!
//! let (writer, mut reader) = stream::channel();
//! writer.push("ab").unwrap();
//! writer.push("cd").unwrap();
//! writer.complete();
//!
//! assert_eq!(reader.read(10).await.unwrap().as_deref(), Some(&b"abcd"[..]));
//! assert_eq!(reader.read(10).await.unwrap(), None);
//! # }
//! ```

use std::collections::VecDeque;
use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::stream::Stream;
use futures::task::AtomicWaker;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, ReadBuf};

use crate::errors::{ErrorKind, NativeHttpError, NativeHttpResult, PushError};

/// Read size used by the [`Stream`] implementation.
pub const DEFAULT_READ_SIZE: usize = 16 * 1024;

/// Creates a connected writer/reader pair over an empty, open buffer.
pub fn channel() -> (StreamWriter, StreamReader) {
    let shared = Arc::new(Shared {
        state: Mutex::new(BufferState::default()),
        gate: AtomicWaker::new(),
    });

    let writer = StreamWriter {
        shared: shared.clone(),
    };
    let reader = StreamReader {
        shared,
        expected_len: None,
        last_progress: ReadProgress::default(),
        stream_done: false,
    };
    (writer, reader)
}

/// Terminal state of a buffer.
#[derive(Debug, Clone, Default)]
enum Status {
    #[default]
    Open,
    Completed,
    Failed(NativeHttpError),
}

#[derive(Debug, Default)]
struct BufferState {
    chunks: VecDeque<Bytes>,
    total: u64,
    consumed: u64,
    status: Status,
}

impl BufferState {
    /// Removes up to `max_len` bytes from the front of the queue.
    fn take(&mut self, max_len: usize) -> Bytes {
        let front_len = self.chunks.front().map_or(0, Bytes::len);
        let out = if front_len > max_len {
            self.chunks
                .front_mut()
                .map(|front| front.split_to(max_len))
                .unwrap_or_default()
        } else if front_len == max_len || self.chunks.len() == 1 {
            self.chunks.pop_front().unwrap_or_default()
        } else {
            let mut out = BytesMut::with_capacity(max_len);
            while out.len() < max_len {
                let Some(front) = self.chunks.front_mut() else {
                    break;
                };
                let want = max_len - out.len();
                if front.len() <= want {
                    out.extend_from_slice(front);
                    self.chunks.pop_front();
                } else {
                    out.extend_from_slice(&front.split_to(want));
                }
            }
            out.freeze()
        };
        self.consumed += out.len() as u64;
        out
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<BufferState>,
    gate: AtomicWaker,
}

impl Shared {
    /// Applies a terminal transition. Returns false if already terminal.
    fn finish(&self, status: Status) -> bool {
        {
            let mut state = self.state.lock();
            if !matches!(state.status, Status::Open) {
                return false;
            }
            state.status = status;
        }
        self.gate.wake();
        true
    }
}

/// Producer half of a stream buffer.
///
/// Dropping an open writer fails the stream with `ConnectionClosed`, so a
/// reader can never be left parked by a producer that went away.
#[derive(Debug)]
pub struct StreamWriter {
    shared: Arc<Shared>,
}

impl StreamWriter {
    /// Appends a chunk. Rejected once the stream is completed or failed.
    pub fn push(&self, chunk: impl Into<Bytes>) -> Result<(), PushError> {
        let chunk = chunk.into();
        {
            let mut state = self.shared.state.lock();
            match state.status {
                Status::Open => {}
                Status::Completed => return Err(PushError::Completed),
                Status::Failed(_) => return Err(PushError::Failed),
            }
            if chunk.is_empty() {
                return Ok(());
            }
            state.total += chunk.len() as u64;
            state.chunks.push_back(chunk);
        }
        self.shared.gate.wake();
        Ok(())
    }

    /// Marks the stream completed. Returns false if it was already terminal.
    pub fn complete(&self) -> bool {
        self.shared.finish(Status::Completed)
    }

    /// Fails the stream. Returns false if it was already terminal.
    pub fn fail(&self, error: NativeHttpError) -> bool {
        self.shared.finish(Status::Failed(error))
    }

    /// Returns true once the stream is completed or failed.
    pub fn is_terminated(&self) -> bool {
        !matches!(self.shared.state.lock().status, Status::Open)
    }

    /// Total bytes ever pushed.
    pub fn total_len(&self) -> u64 {
        self.shared.state.lock().total
    }
}

impl Drop for StreamWriter {
    fn drop(&mut self) {
        self.shared.finish(Status::Failed(NativeHttpError::new(
            ErrorKind::ConnectionClosed,
            "The producer went away before the stream completed",
        )));
    }
}

/// Progress of the reader after its most recent read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadProgress {
    /// Bytes returned by the most recent read.
    pub bytes_read: usize,
    /// Bytes returned by all reads so far.
    pub total_read: u64,
    /// Expected body length, if the transport reported one.
    pub total_expected: Option<u64>,
}

/// Consumer half of a stream buffer.
///
/// Reads take `&mut self`, so there is at most one active reader.
#[derive(Debug)]
pub struct StreamReader {
    shared: Arc<Shared>,
    expected_len: Option<u64>,
    last_progress: ReadProgress,
    stream_done: bool,
}

impl StreamReader {
    /// Reads up to `max_len` bytes.
    ///
    /// Returns `Ok(None)` at end of stream (repeatable), or the stored error
    /// once the buffer has failed and every unread byte was consumed (sticky).
    /// Suspends while the buffer is open and empty.
    pub async fn read(&mut self, max_len: usize) -> NativeHttpResult<Option<Bytes>> {
        poll_fn(|cx| self.poll_read_chunk(cx, max_len)).await
    }

    /// Reads the remaining bytes until end of stream.
    pub async fn read_to_end(&mut self) -> NativeHttpResult<Bytes> {
        let mut body = BytesMut::new();
        while let Some(chunk) = self.read(DEFAULT_READ_SIZE).await? {
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }

    /// Polls for the next chunk of at most `max_len` bytes.
    pub fn poll_read_chunk(
        &mut self,
        cx: &mut Context<'_>,
        max_len: usize,
    ) -> Poll<NativeHttpResult<Option<Bytes>>> {
        if let Some(outcome) = self.try_read(max_len) {
            return Poll::Ready(outcome);
        }

        self.shared.gate.register(cx.waker());

        // An event may have landed after the first check but before the
        // registration above; look again before parking.
        match self.try_read(max_len) {
            Some(outcome) => Poll::Ready(outcome),
            None => Poll::Pending,
        }
    }

    fn try_read(&mut self, max_len: usize) -> Option<NativeHttpResult<Option<Bytes>>> {
        if max_len == 0 {
            return Some(Ok(Some(Bytes::new())));
        }

        let mut state = self.shared.state.lock();
        if !state.chunks.is_empty() {
            let chunk = state.take(max_len);
            self.last_progress = ReadProgress {
                bytes_read: chunk.len(),
                total_read: state.consumed,
                total_expected: self.expected_len,
            };
            return Some(Ok(Some(chunk)));
        }

        match &state.status {
            Status::Open => None,
            Status::Completed => Some(Ok(None)),
            Status::Failed(error) => Some(Err(error.clone())),
        }
    }

    /// Sets the expected body length reported by the transport.
    pub fn set_expected_len(&mut self, expected: Option<u64>) {
        self.expected_len = expected;
        self.last_progress.total_expected = expected;
    }

    /// Expected body length, if known.
    pub fn expected_len(&self) -> Option<u64> {
        self.expected_len
    }

    /// Total bytes ever pushed by the producer.
    pub fn total_len(&self) -> u64 {
        self.shared.state.lock().total
    }

    /// Total bytes consumed by reads.
    pub fn consumed(&self) -> u64 {
        self.shared.state.lock().consumed
    }

    /// Progress after the most recent read.
    pub fn progress(&self) -> ReadProgress {
        self.last_progress
    }

    /// Returns true if the producer completed or failed the stream.
    pub fn is_terminated(&self) -> bool {
        !matches!(self.shared.state.lock().status, Status::Open)
    }
}

/// Yields chunks until end of stream. A failure is yielded once, then the
/// stream ends.
impl Stream for StreamReader {
    type Item = NativeHttpResult<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.stream_done {
            return Poll::Ready(None);
        }
        match this.poll_read_chunk(cx, DEFAULT_READ_SIZE) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(Some(chunk))) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(Ok(None)) => {
                this.stream_done = true;
                Poll::Ready(None)
            }
            Poll::Ready(Err(error)) => {
                this.stream_done = true;
                Poll::Ready(Some(Err(error)))
            }
        }
    }
}

impl AsyncRead for StreamReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }
        match this.poll_read_chunk(cx, buf.remaining()) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(Some(chunk))) => {
                buf.put_slice(&chunk);
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Ok(None)) => Poll::Ready(Ok(())),
            Poll::Ready(Err(error)) => Poll::Ready(Err(error.into())),
        }
    }
}
