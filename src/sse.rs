//! Server-Sent Events (SSE) decoding for streaming responses.
//!
//! The agent endpoint answers with `text/event-stream` lines of the form
//! `data: <payload>`, terminated by `data: [DONE]` or by connection close.
//! Transport chunk boundaries never line up with event boundaries, so bytes
//! are buffered until a full line is available; a trailing partial line is
//! never emitted.

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use tokio_util::codec::Decoder;

use crate::error::{Error, Result};
use crate::observability::{STREAM_BYTES, STREAM_ERRORS};

/// Prefix marking a payload line.
pub const DATA_PREFIX: &str = "data: ";

/// Payload that ends the stream regardless of transport state.
pub const DONE_SENTINEL: &str = "[DONE]";

/// A decoded line of interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// The text after `data: `, verbatim.
    Data(String),
    /// The `[DONE]` sentinel.
    Done,
}

/// Line-oriented SSE decoder.
///
/// Splits on `\n` (dropping a preceding `\r`), decodes each complete line as
/// UTF-8 with replacement characters, and yields only `data: ` lines. Blank
/// lines and other fields (`event:`, `id:`, comments) are skipped.
#[derive(Debug, Default)]
pub struct EventStreamCodec {
    // Bytes of the buffer already scanned for a newline.
    scanned: usize,
}

impl EventStreamCodec {
    /// Creates a new codec.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for EventStreamCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>> {
        loop {
            self.scanned = self.scanned.min(buf.len());
            let Some(offset) = buf[self.scanned..].iter().position(|b| *b == b'\n') else {
                self.scanned = buf.len();
                return Ok(None);
            };
            let newline = self.scanned + offset;
            self.scanned = 0;

            let raw = buf.split_to(newline + 1);
            let mut bytes = &raw[..newline];
            if let Some(stripped) = bytes.strip_suffix(b"\r") {
                bytes = stripped;
            }
            let line = String::from_utf8_lossy(bytes);

            let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
                continue;
            };
            if payload == DONE_SENTINEL {
                return Ok(Some(Frame::Done));
            }
            return Ok(Some(Frame::Data(payload.to_string())));
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                // An unterminated last line is discarded, not emitted.
                buf.clear();
                self.scanned = 0;
                Ok(None)
            }
        }
    }
}

/// Decode a byte stream into a stream of event payloads.
///
/// The returned stream yields `Ok(payload)` for every `data: ` line in order
/// and ends when `[DONE]` is seen or the transport closes. A transport error
/// is yielded once as `Err` and ends the stream; buffered partial content is
/// dropped with it.
pub fn decode_event_stream<S, E>(byte_stream: S) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    let state = Some((byte_stream, BytesMut::new(), EventStreamCodec::new()));

    stream::unfold(state, |state| async move {
        let (mut byte_stream, mut buffer, mut codec) = state?;
        loop {
            // Drain complete lines before reading more.
            match codec.decode(&mut buffer) {
                Ok(Some(Frame::Data(payload))) => {
                    return Some((Ok(payload), Some((byte_stream, buffer, codec))));
                }
                Ok(Some(Frame::Done)) => return None,
                Ok(None) => {}
                Err(err) => return Some((Err(err), None)),
            }

            match byte_stream.next().await {
                Some(Ok(bytes)) => {
                    STREAM_BYTES.count(bytes.len() as u64);
                    buffer.extend_from_slice(&bytes);
                }
                Some(Err(err)) => {
                    STREAM_ERRORS.click();
                    let err = Error::streaming(
                        format!("Error in HTTP stream: {err}"),
                        Some(Box::new(err)),
                    );
                    return Some((Err(err), None));
                }
                None => return None,
            }
        }
    })
}
