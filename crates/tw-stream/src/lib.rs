//! Streaming data pipe for Tidewater.
//!
//! Inbound request bodies are collected by [`ByteAccumulator`] (usually via
//! [`read_body`]), which grows its buffer geometrically and enforces a hard
//! size limit. Outbound query results travel through [`PassThroughPipe`],
//! which batches framed chunks into threshold-sized writes on a
//! [`ResponseSink`] and declares the sink's header exactly once.
//! [`relay_query`] connects a [`tw_db::Database`] result stream to a pipe.

pub mod accumulator;
pub mod body;
pub mod error;
pub mod pipe;
pub mod relay;
pub mod sink;

pub use accumulator::{ByteAccumulator, DEFAULT_INITIAL_CAPACITY};
pub use body::read_body;
pub use error::{StreamError, StreamResult};
pub use pipe::{PassThroughPipe, DEFAULT_FLUSH_THRESHOLD};
pub use relay::{relay_query, RelayOptions, RelaySummary};
pub use sink::{ChannelResponse, ChannelSink, ResponseHeader, ResponseSink, WriterSink};
