//! Framed pass-through pipe.
//!
//! Chunks handed to [`PassThroughPipe::write`] are whole frames. They are
//! queued until the queued byte count reaches the flush threshold, then
//! forwarded to the sink as a single write, so frames are never split and
//! memory per stream stays around one threshold's worth. The sink header
//! is declared exactly once, on the first flush or at `end()`.

use crate::error::{StreamError, StreamResult};
use crate::sink::{ResponseHeader, ResponseSink};
use bytes::{Bytes, BytesMut};

/// Default queued byte count that triggers a sink write.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 65_536;

/// Buffers framed chunks and forwards them to a [`ResponseSink`].
pub struct PassThroughPipe<S> {
    sink: S,
    header: ResponseHeader,
    header_declared: bool,
    flush_threshold: usize,
    leading_frame: Option<Bytes>,
    started: bool,
    ended: bool,
    pending: Vec<Bytes>,
    pending_bytes: usize,
    flushes: usize,
}

impl<S: ResponseSink> PassThroughPipe<S> {
    /// Pipe declaring `header` on `sink`, with the default threshold.
    pub fn new(sink: S, header: ResponseHeader) -> Self {
        Self {
            sink,
            header,
            header_declared: false,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            leading_frame: None,
            started: false,
            ended: false,
            pending: Vec::new(),
            pending_bytes: 0,
            flushes: 0,
        }
    }

    /// Flush once at least `threshold` bytes are queued (minimum 1).
    pub fn with_flush_threshold(mut self, threshold: usize) -> Self {
        self.flush_threshold = threshold.max(1);
        self
    }

    /// Frame emitted ahead of the first chunk.
    pub fn with_leading_frame(mut self, frame: Bytes) -> Self {
        self.leading_frame = Some(frame);
        self
    }

    /// Set the leading frame on a pipe that has not been written to yet.
    pub fn set_leading_frame(&mut self, frame: Bytes) -> StreamResult<()> {
        if self.started || self.ended {
            return Err(StreamError::PipeStarted);
        }
        self.leading_frame = Some(frame);
        Ok(())
    }

    /// Queue one frame, flushing to the sink if the threshold is reached.
    pub async fn write(&mut self, chunk: Bytes) -> StreamResult<()> {
        if self.ended {
            return Err(StreamError::PipeEnded);
        }
        self.start();
        self.enqueue(chunk);
        if self.pending_bytes >= self.flush_threshold {
            self.flush().await?;
        }
        Ok(())
    }

    /// Declare the header if still pending, flush what is queued, and end
    /// the sink.
    ///
    /// A pipe that was never written to still emits its leading frame, so an
    /// empty result reaches the sink as a well-formed stream.
    pub async fn end(&mut self) -> StreamResult<()> {
        if self.ended {
            return Err(StreamError::PipeEnded);
        }
        self.start();
        self.declare_header_once().await?;
        self.flush().await?;
        self.ended = true;
        self.sink.end().await
    }

    /// Abort the sink so the partial output is not taken as complete.
    pub async fn abort(&mut self, reason: &str) {
        self.ended = true;
        self.pending.clear();
        self.pending_bytes = 0;
        self.sink.abort(reason).await;
    }

    /// Bytes queued but not yet written.
    pub fn pending_bytes(&self) -> usize {
        self.pending_bytes
    }

    /// Sink writes performed so far.
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        if let Some(frame) = self.leading_frame.take() {
            self.enqueue(frame);
        }
    }

    fn enqueue(&mut self, chunk: Bytes) {
        self.pending_bytes += chunk.len();
        self.pending.push(chunk);
    }

    async fn declare_header_once(&mut self) -> StreamResult<()> {
        if !self.header_declared {
            self.sink.declare_header(&self.header).await?;
            self.header_declared = true;
        }
        Ok(())
    }

    async fn flush(&mut self) -> StreamResult<()> {
        self.declare_header_once().await?;
        if self.pending_bytes == 0 {
            self.pending.clear();
            return Ok(());
        }

        let out = if self.pending.len() == 1 {
            self.pending.pop().unwrap_or_default()
        } else {
            let mut buf = BytesMut::with_capacity(self.pending_bytes);
            for chunk in self.pending.drain(..) {
                buf.extend_from_slice(&chunk);
            }
            buf.freeze()
        };
        self.pending.clear();
        let len = out.len();
        self.pending_bytes = 0;

        log::trace!("Pipe flushing {len} bytes");
        self.sink.write(out).await?;
        self.flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
#[path = "pipe_test.rs"]
mod tests;
