//! Progress reader (component F): wraps a byte stream, counts bytes
//! atomically, and invokes a throttled callback. Grounded on the
//! teacher's streaming `get_object` path in `storage/filesystem.rs`,
//! which already reads a body through a fixed-size buffer loop — this
//! generalizes that loop into a reusable `AsyncRead` adapter.

use crate::error::{Error, Result};
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

const THROTTLE: Duration = Duration::from_millis(100);

pub type ProgressCallback = Arc<dyn Fn(i64) + Send + Sync>;

pub struct ProgressReader<R> {
    inner: R,
    processed: Arc<AtomicI64>,
    last_emit: Mutex<Instant>,
    callback: ProgressCallback,
    finished: bool,
}

impl<R> ProgressReader<R> {
    pub fn new(inner: R, callback: ProgressCallback) -> Result<Self> {
        Ok(Self {
            inner,
            processed: Arc::new(AtomicI64::new(0)),
            last_emit: Mutex::new(Instant::now() - THROTTLE),
            callback,
            finished: false,
        })
    }

    pub fn processed(&self) -> i64 {
        self.processed.load(Ordering::SeqCst)
    }

    fn maybe_emit(&self, force: bool) {
        let mut last = self.last_emit.lock().unwrap();
        if force || last.elapsed() >= THROTTLE {
            *last = Instant::now();
            (self.callback)(self.processed.load(Ordering::SeqCst));
        }
    }
}

/// Constructs a reader whose callback errors out at construction when
/// `callback` would be null — here represented by requiring an
/// already-valid `ProgressCallback`, so the `InvalidArgument` case is
/// enforced by callers that build the callback from an `Option`.
pub fn wrap<R>(inner: R, callback: Option<ProgressCallback>) -> Result<ProgressReader<R>> {
    let callback = callback.ok_or_else(|| Error::InvalidArgument("progress callback is required".into()))?;
    ProgressReader::new(inner, callback)
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);

        if let Poll::Ready(Ok(())) = &poll {
            let n = buf.filled().len() - before;
            if n > 0 {
                self.processed.fetch_add(n as i64, Ordering::SeqCst);
                self.maybe_emit(false);
            } else if !self.finished {
                self.finished = true;
                self.maybe_emit(true);
            }
        }

        poll
    }
}

impl<R: AsyncSeek + Unpin> AsyncSeek for ProgressReader<R> {
    fn start_seek(mut self: Pin<&mut Self>, position: io::SeekFrom) -> io::Result<()> {
        if matches!(position, io::SeekFrom::Start(0)) {
            self.processed.store(0, Ordering::SeqCst);
        }
        Pin::new(&mut self.inner).start_seek(position)
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner).poll_complete(cx)
    }
}
