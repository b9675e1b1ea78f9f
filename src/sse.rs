//! Server-Sent Events (SSE) stream decoding.
//!
//! SSE format:
//! ```text
//! data: {"key": "value"}
//!
//! : keep-alive comment
//! data: {"another": "event"}
//!
//! data: [DONE]
//! ```
//!
//! Only `data:` lines carry payloads; every other line is ignored. Bytes are
//! buffered until a full line is available, so multi-byte characters split
//! across network chunks decode correctly.

use futures::stream::{self, Stream, StreamExt};
use serde::de::DeserializeOwned;
use std::pin::Pin;
use tracing::warn;

use crate::error::{ClientError, DecodeError, TransportError};

/// Lazy, forward-only sequence of decoded stream items.
///
/// Dropping the stream releases the underlying connection.
pub type EventStream<T> = Pin<Box<dyn Stream<Item = Result<T, ClientError>> + Send>>;

struct LineReader<S> {
    inner: Pin<Box<S>>,
    buffer: Vec<u8>,
    eof: bool,
}

impl<S> LineReader<S> {
    fn next_line(&mut self) -> Option<String> {
        if let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            return Some(String::from_utf8_lossy(&line).into_owned());
        }
        if self.eof && !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            return Some(String::from_utf8_lossy(&line).into_owned());
        }
        None
    }
}

/// Extract the raw `data:` payloads of an SSE byte stream.
///
/// The sequence ends at `[DONE]` or when the byte stream ends. A transport
/// error is yielded once and ends the sequence.
pub fn data_lines<S, B, E>(byte_stream: S) -> impl Stream<Item = Result<String, ClientError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<TransportError> + Send + 'static,
{
    let reader = LineReader {
        inner: Box::pin(byte_stream),
        buffer: Vec::new(),
        eof: false,
    };

    stream::unfold(Some(reader), |reader| async move {
        let mut reader = reader?;
        loop {
            if let Some(line) = reader.next_line() {
                match parse_sse_line(&line) {
                    Some(data) if is_done_marker(data) => return None,
                    Some(data) => {
                        let data = data.to_string();
                        return Some((Ok(data), Some(reader)));
                    }
                    None => continue,
                }
            }

            if reader.eof {
                return None;
            }

            match reader.inner.next().await {
                Some(Ok(chunk)) => reader.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    return Some((Err(ClientError::Transport(e.into())), None));
                }
                None => reader.eof = true,
            }
        }
    })
}

/// Decode an SSE byte stream into typed events.
///
/// A payload that fails to decode is yielded as [`ClientError::Decode`] in
/// its position, and decoding continues with the next event.
pub fn decode_events<T, S, B, E>(byte_stream: S) -> EventStream<T>
where
    T: DeserializeOwned + Send + 'static,
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<TransportError> + Send + 'static,
{
    Box::pin(
        data_lines(byte_stream)
            .map(|item| item.and_then(decode_payload))
            .fuse(),
    )
}

fn decode_payload<T: DeserializeOwned>(payload: String) -> Result<T, ClientError> {
    serde_json::from_str(&payload).map_err(|source| {
        warn!(error = %source, "undecodable stream event");
        ClientError::Decode(DecodeError { payload, source })
    })
}

/// Parse an SSE line to extract the data portion.
///
/// # Example
/// ```
/// use zai::sse::parse_sse_line;
///
/// let line = "data: {\"key\": \"value\"}";
/// assert_eq!(parse_sse_line(line), Some("{\"key\": \"value\"}"));
///
/// let line = "event: message";
/// assert_eq!(parse_sse_line(line), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.trim_start().strip_prefix("data:").map(|s| s.trim())
}

/// Check if an SSE data line indicates the stream is done.
///
/// # Example
/// ```
/// use zai::sse::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(!is_done_marker(""));
/// ```
pub fn is_done_marker(data: &str) -> bool {
    data == "[DONE]"
}
