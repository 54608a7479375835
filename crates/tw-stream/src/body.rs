//! Inbound request body reader.

use crate::accumulator::ByteAccumulator;
use crate::error::{StreamError, StreamResult};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::fmt::Display;

/// Drain `body` into one buffer of at most `max_size` bytes.
///
/// `declared_len` (usually the `Content-Length` header) lets oversized
/// bodies be rejected before any chunk is read. On error nothing is
/// returned and the caller is expected to abort the transport.
pub async fn read_body<S, E>(body: S, max_size: usize, declared_len: Option<u64>) -> StreamResult<Bytes>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let mut acc = ByteAccumulator::new(max_size);
    if let Some(declared) = declared_len {
        acc.check_declared_length(declared)?;
    }

    futures::pin_mut!(body);
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| StreamError::Source(e.to_string()))?;
        acc.append(&chunk)?;
    }
    acc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::io;

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = Result<Bytes, io::Error>> {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(*p)))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_reads_all_chunks_in_order() {
        let body = read_body(chunks(&[b"SELECT ", b"1", b" AS one"]), 1024, None)
            .await
            .unwrap();
        assert_eq!(&body[..], b"SELECT 1 AS one");
    }

    #[tokio::test]
    async fn test_rejects_declared_oversize_without_reading() {
        let err = read_body(chunks(&[b"tiny"]), 10, Some(11)).await.unwrap_err();
        assert!(matches!(err, StreamError::Oversize { limit: 10, .. }));
    }

    #[tokio::test]
    async fn test_rejects_streamed_oversize() {
        let err = read_body(chunks(&[b"123456", b"789012"]), 10, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::Oversize { .. }));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer")),
        ]);
        let err = read_body(body, 1024, None).await.unwrap_err();
        match err {
            StreamError::Source(msg) => assert!(msg.contains("reset by peer")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_body() {
        let body = read_body(chunks(&[]), 10, Some(0)).await.unwrap();
        assert!(body.is_empty());
    }
}
