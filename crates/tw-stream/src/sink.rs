//! Response sinks fed by the pass-through pipe.

use crate::error::{StreamError, StreamResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};

/// Status and content type declared before the first body byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHeader {
    pub status: u16,
    pub content_type: String,
}

impl ResponseHeader {
    /// `200` with the given content type.
    pub fn ok(content_type: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: content_type.into(),
        }
    }
}

/// A byte destination with deferred header declaration.
///
/// The header is declared once, followed by any number of writes and a
/// final `end`. Zero-byte bodies are legal.
#[async_trait]
pub trait ResponseSink: Send {
    /// Declare status and content type
    async fn declare_header(&mut self, header: &ResponseHeader) -> StreamResult<()>;

    /// Write one body chunk
    async fn write(&mut self, chunk: Bytes) -> StreamResult<()>;

    /// Signal that the body is complete
    async fn end(&mut self) -> StreamResult<()>;

    /// Tear down an in-flight response so it cannot be mistaken for a
    /// complete one. Best effort.
    async fn abort(&mut self, reason: &str) {
        log::debug!("Aborting response: {reason}");
    }
}

/// Receiving half of a [`ChannelSink`], consumed by the HTTP layer.
pub struct ChannelResponse {
    /// Resolves once the header is declared; errors if the sink is dropped
    /// or aborted first
    pub header: oneshot::Receiver<ResponseHeader>,
    /// Body chunks; an `Err` item means the response was aborted
    pub body: mpsc::Receiver<Result<Bytes, io::Error>>,
}

/// Sink that hands its header and body to another task over channels.
///
/// Body writes wait for channel capacity, so a slow receiver applies
/// backpressure to the pipe.
pub struct ChannelSink {
    header: Option<oneshot::Sender<ResponseHeader>>,
    body: Option<mpsc::Sender<Result<Bytes, io::Error>>>,
}

impl ChannelSink {
    /// Create a sink buffering at most `capacity` body chunks.
    pub fn new(capacity: usize) -> (Self, ChannelResponse) {
        let (header_tx, header_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                header: Some(header_tx),
                body: Some(body_tx),
            },
            ChannelResponse {
                header: header_rx,
                body: body_rx,
            },
        )
    }
}

#[async_trait]
impl ResponseSink for ChannelSink {
    async fn declare_header(&mut self, header: &ResponseHeader) -> StreamResult<()> {
        let tx = self.header.take().ok_or(StreamError::HeaderAlreadyDeclared)?;
        tx.send(header.clone()).map_err(|_| StreamError::SinkClosed)
    }

    async fn write(&mut self, chunk: Bytes) -> StreamResult<()> {
        let tx = self.body.as_ref().ok_or(StreamError::SinkClosed)?;
        tx.send(Ok(chunk)).await.map_err(|_| StreamError::SinkClosed)
    }

    async fn end(&mut self) -> StreamResult<()> {
        // Dropping the sender completes the body stream.
        match self.body.take() {
            Some(_) => Ok(()),
            None => Err(StreamError::SinkClosed),
        }
    }

    async fn abort(&mut self, reason: &str) {
        self.header = None;
        if let Some(tx) = self.body.take() {
            let _ = tx.send(Err(io::Error::other(reason.to_string()))).await;
        }
    }
}

/// Sink writing the body to any async writer, e.g. stdout.
pub struct WriterSink<W> {
    writer: W,
    header: Option<ResponseHeader>,
}

impl<W: AsyncWrite + Unpin + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            header: None,
        }
    }

    /// Header declared so far, if any.
    pub fn header(&self) -> Option<&ResponseHeader> {
        self.header.as_ref()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ResponseSink for WriterSink<W> {
    async fn declare_header(&mut self, header: &ResponseHeader) -> StreamResult<()> {
        if self.header.is_some() {
            return Err(StreamError::HeaderAlreadyDeclared);
        }
        log::debug!("Response {} ({})", header.status, header.content_type);
        self.header = Some(header.clone());
        Ok(())
    }

    async fn write(&mut self, chunk: Bytes) -> StreamResult<()> {
        self.writer
            .write_all(&chunk)
            .await
            .map_err(StreamError::SinkWrite)
    }

    async fn end(&mut self) -> StreamResult<()> {
        self.writer.flush().await.map_err(StreamError::SinkWrite)
    }
}
