//! Terminal output for conversation updates.

use std::io::{self, Stdout, Write};

use crate::types::{Message, MessageStatus, Sender};

/// ANSI escape code for dim text (used for info lines).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for speaker labels).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Receives transcript changes as they happen.
///
/// Every method has an empty default so a renderer only implements what it
/// displays.
pub trait Renderer: Send {
    /// A message was appended to the transcript.
    fn message_added(&mut self, message: &Message) {
        _ = message;
    }

    /// Text was appended to a streaming message. `delta` is the new text.
    fn message_updated(&mut self, message: &Message, delta: &str) {
        _ = message;
        _ = delta;
    }

    /// A message reached `Sent` or `Error`.
    fn message_finished(&mut self, message: &Message) {
        _ = message;
    }

    /// Print an error message.
    fn print_error(&mut self, error: &str) {
        _ = error;
    }

    /// Print an informational message.
    fn print_info(&mut self, info: &str) {
        _ = info;
    }
}

impl Renderer for () {}

/// Plain text renderer with optional ANSI styling.
///
/// Assistant text is written as it streams; user messages are not echoed
/// because the line editor already shows them.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
        }
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn message_added(&mut self, message: &Message) {
        if message.sender == Sender::Assistant {
            print!("{} ", self.styled(ANSI_CYAN, "Assistant:"));
            print!("{}", message.content);
            self.flush();
        }
    }

    fn message_updated(&mut self, message: &Message, delta: &str) {
        if message.sender == Sender::Assistant {
            print!("{delta}");
            self.flush();
        }
    }

    fn message_finished(&mut self, message: &Message) {
        if message.sender != Sender::Assistant {
            return;
        }
        if message.status == MessageStatus::Error {
            // The partial text is already on screen; only the placeholder is new.
            if message.content == crate::conversation::FAILED_RESPONSE_PLACEHOLDER {
                print!("{}", self.styled(ANSI_DIM, &message.content));
            }
            println!();
            if let Some(error) = message.error.as_deref() {
                self.print_error(error);
            }
        } else {
            println!();
        }
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        eprintln!("{}", self.styled(ANSI_RED, &format!("Error: {error}")));
    }

    fn print_info(&mut self, info: &str) {
        println!("{}", self.styled(ANSI_DIM, info));
    }
}
