//! Streaming requests to the agent endpoint.
//!
//! Streaming requests do not go through the refresh-and-retry logic of
//! [`ApiClient::request`]. A rejected token surfaces as an error.

use std::pin::Pin;
use std::time::Instant;

use futures::{Stream, StreamExt, stream};
use reqwest::header::{self, HeaderValue};
use tokio_util::sync::CancellationToken;

use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::observability::{STREAM_CANCELLED, STREAM_CHUNKS, STREAM_DURATION, STREAM_ERRORS};
use crate::sse::decode_event_stream;
use crate::types::{AgentStreamRequest, StreamEvent};

/// Endpoint answering with a `text/event-stream` body.
pub const RUN_STREAM_ENDPOINT: &str = "/agents/run-stream";

type PayloadStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Receives the events of one streamed response.
///
/// After cancellation is observed no method is called again.
pub trait StreamCallbacks: Send {
    /// A payload arrived; called in server order.
    fn on_chunk(&mut self, chunk: &str);

    /// The server ended the response.
    fn on_complete(&mut self);

    /// The request or the stream failed. Never called for cancellation.
    fn on_error(&mut self, error: Error);
}

/// Issues streaming chat requests.
#[derive(Debug, Clone)]
pub struct AgentGateway {
    client: ApiClient,
}

impl AgentGateway {
    /// Creates a gateway that shares `client`'s connection pool and credentials.
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// The client this gateway sends through.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Start a streaming request and return its events.
    ///
    /// Fails without touching the network when no access token is stored.
    /// Returns `Error::Abort` if `cancel` fires before response headers arrive.
    pub async fn open_stream(&self, message: &str, cancel: CancellationToken) -> Result<EventStream> {
        let token = self
            .client
            .store()
            .access_token()
            .ok_or_else(|| Error::authentication("Not authenticated. Please login first."))?;
        if cancel.is_cancelled() {
            return Err(Error::abort("stream request cancelled"));
        }

        let url = self.client.endpoint_url(RUN_STREAM_ENDPOINT)?;
        let request = self
            .client
            .http()
            .post(url)
            .bearer_auth(token)
            .header(header::ACCEPT, HeaderValue::from_static("text/event-stream"))
            .json(&AgentStreamRequest::new(message))
            .send();

        let started = Instant::now();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::abort("stream request cancelled")),
            response = request => response.map_err(|e| Error::from_transport(e, None))?,
        };

        if !response.status().is_success() {
            let err = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::abort("stream request cancelled")),
                err = ApiClient::process_error_response(response) => err,
            };
            STREAM_ERRORS.click();
            return Err(err);
        }

        let payloads: PayloadStream = Box::pin(decode_event_stream(Box::pin(response.bytes_stream())));
        Ok(EventStream {
            payloads: Some(payloads),
            cancel,
            started,
        })
    }

    /// Stream a response into `callbacks`.
    ///
    /// Exactly one of `on_complete`/`on_error` fires unless `cancel` is
    /// triggered first, in which case the call returns silently.
    pub async fn send_stream(
        &self,
        message: &str,
        callbacks: &mut dyn StreamCallbacks,
        cancel: &CancellationToken,
    ) {
        let mut events = match self.open_stream(message, cancel.clone()).await {
            Ok(events) => events,
            Err(err) if err.is_abort() || cancel.is_cancelled() => {
                STREAM_CANCELLED.click();
                tracing::debug!("stream request aborted");
                return;
            }
            Err(err) => {
                callbacks.on_error(err);
                return;
            }
        };

        while let Some(event) = events.next().await {
            match event {
                StreamEvent::Chunk(chunk) => callbacks.on_chunk(&chunk),
                StreamEvent::Complete => callbacks.on_complete(),
                StreamEvent::Error(_) if cancel.is_cancelled() => {
                    tracing::debug!("dropping stream error raised after cancellation");
                }
                StreamEvent::Error(err) => callbacks.on_error(err),
            }
        }
    }
}

/// The events of one in-flight streaming response.
///
/// Yields chunks followed by one terminal event, or ends silently once its
/// cancellation token fires. Dropping it aborts the transfer.
pub struct EventStream {
    payloads: Option<PayloadStream>,
    cancel: CancellationToken,
    started: Instant,
}

impl EventStream {
    /// Wait for the next event.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        let payloads = self.payloads.as_mut()?;
        if self.cancel.is_cancelled() {
            self.finish_cancelled();
            return None;
        }

        let item = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            item = payloads.next() => Some(item),
        };

        match item {
            None => {
                self.finish_cancelled();
                None
            }
            Some(Some(Ok(chunk))) => {
                STREAM_CHUNKS.click();
                Some(StreamEvent::Chunk(chunk))
            }
            Some(Some(Err(err))) => {
                self.finish();
                tracing::warn!(error = %err, "agent stream failed");
                Some(StreamEvent::Error(err))
            }
            Some(None) => {
                self.finish();
                Some(StreamEvent::Complete)
            }
        }
    }

    /// Adapt into a `futures::Stream`.
    pub fn into_stream(self) -> impl Stream<Item = StreamEvent> + Send {
        stream::unfold(self, |mut events| async move {
            let event = events.next().await?;
            Some((event, events))
        })
    }

    /// True once a terminal event was produced or cancellation was observed.
    pub fn is_finished(&self) -> bool {
        self.payloads.is_none()
    }

    fn finish(&mut self) {
        self.payloads = None;
        STREAM_DURATION.add(self.started.elapsed().as_secs_f64());
    }

    fn finish_cancelled(&mut self) {
        STREAM_CANCELLED.click();
        tracing::debug!("stream aborted by caller");
        self.finish();
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("finished", &self.is_finished())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
