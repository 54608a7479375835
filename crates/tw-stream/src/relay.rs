//! Relay a streamed query result into a response sink.
//!
//! The query runs on a blocking worker and hands frames over a bounded
//! channel, so a slow sink holds back the database cursor instead of
//! buffering the result in memory.

use crate::error::{StreamError, StreamResult};
use crate::pipe::{PassThroughPipe, DEFAULT_FLUSH_THRESHOLD};
use crate::sink::{ResponseHeader, ResponseSink};
use std::sync::Arc;
use tokio::sync::mpsc;
use tw_core::{Frame, FrameFormat, FrameKind, StreamConfig};
use tw_db::{Database, DbError};

/// How a query result is framed and piped.
#[derive(Debug, Clone)]
pub struct RelayOptions {
    pub format: FrameFormat,
    pub flush_threshold: usize,
    /// Emit the result's leading frame ahead of the rows; when unset the
    /// leading frame is dropped and only rows reach the sink
    pub repeat_leading_frame: bool,
    /// Frames buffered between producer and pipe
    pub channel_capacity: usize,
}

impl RelayOptions {
    pub fn from_config(config: &StreamConfig, format: FrameFormat) -> Self {
        Self {
            format,
            flush_threshold: config.flush_threshold,
            repeat_leading_frame: config.repeat_leading_frame,
            channel_capacity: config.channel_capacity,
        }
    }
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            format: FrameFormat::default(),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            repeat_leading_frame: true,
            channel_capacity: 16,
        }
    }
}

/// Counters for a completed relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySummary {
    pub rows: usize,
    pub flushes: usize,
}

/// Stream the result of `sql` into `sink`.
///
/// On success the sink has been ended. On any failure the sink is aborted,
/// the producer is stopped, and the first error is returned.
pub async fn relay_query<S>(
    db: Arc<dyn Database>,
    sql: String,
    options: RelayOptions,
    sink: S,
) -> StreamResult<RelaySummary>
where
    S: ResponseSink,
{
    let format = options.format;
    let (tx, mut rx) = mpsc::channel::<Frame>(options.channel_capacity.max(1));

    log::debug!("Relaying query on {} as {format}", db.db_type());
    let producer = tokio::task::spawn_blocking(move || {
        let mut frames = 0usize;
        db.stream_query(&sql, format, &mut |frame| {
            tx.blocking_send(frame)
                .map_err(|_| DbError::StreamClosed { frames })?;
            frames += 1;
            Ok(())
        })
    });

    let mut pipe = PassThroughPipe::new(sink, ResponseHeader::ok(format.content_type()))
        .with_flush_threshold(options.flush_threshold);

    let rows = match drain(&mut pipe, &mut rx, options.repeat_leading_frame).await {
        Ok(rows) => rows,
        Err(err) => {
            // Closing the receiver makes the producer's next send fail.
            drop(rx);
            pipe.abort(&err.to_string()).await;
            if let Ok(Err(producer_err)) = producer.await {
                log::debug!("Producer stopped: {producer_err}");
            }
            return Err(err);
        }
    };

    let produced = match producer.await {
        Ok(result) => result.map_err(StreamError::from),
        Err(join_err) => Err(StreamError::Task(join_err.to_string())),
    };
    if let Err(err) = produced {
        log::warn!("Query stream failed after {rows} rows: {err}");
        pipe.abort(&err.to_string()).await;
        return Err(err);
    }

    pipe.end().await?;
    let summary = RelaySummary {
        rows,
        flushes: pipe.flushes(),
    };
    log::debug!(
        "Relayed {} rows in {} writes",
        summary.rows,
        summary.flushes
    );
    Ok(summary)
}

async fn drain<S: ResponseSink>(
    pipe: &mut PassThroughPipe<S>,
    rx: &mut mpsc::Receiver<Frame>,
    repeat_leading_frame: bool,
) -> StreamResult<usize> {
    let mut rows = 0;
    while let Some(frame) = rx.recv().await {
        match frame.kind {
            FrameKind::Leading if repeat_leading_frame => pipe.set_leading_frame(frame.bytes)?,
            FrameKind::Leading => {
                log::debug!("Dropping leading frame ({} bytes)", frame.bytes.len());
            }
            FrameKind::Row => {
                rows += 1;
                pipe.write(frame.bytes).await?;
            }
        }
    }
    Ok(rows)
}
