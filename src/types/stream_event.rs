use crate::Error;

/// One item of an agent response stream.
///
/// A stream yields any number of `Chunk`s followed by exactly one of
/// `Complete` or `Error`, unless it is cancelled, in which case it simply ends.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A decoded payload, in the order the server produced it.
    Chunk(String),
    /// The server signalled the end of the response.
    Complete,
    /// The request or the stream failed.
    Error(Error),
}

impl StreamEvent {
    /// Returns true for `Complete` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete | StreamEvent::Error(_))
    }
}
