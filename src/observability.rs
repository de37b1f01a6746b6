use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("chat_bubble.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter =
    Counter::new("chat_bubble.client.request_errors");
pub(crate) static CLIENT_REQUEST_RETRIES: Counter = Counter::new("chat_bubble.client.retries");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("chat_bubble.client.request_duration_seconds");

pub(crate) static REFRESH_EXCHANGES: Counter = Counter::new("chat_bubble.refresh.exchanges");
pub(crate) static REFRESH_FAILURES: Counter = Counter::new("chat_bubble.refresh.failures");
pub(crate) static REFRESH_WAITERS: Counter = Counter::new("chat_bubble.refresh.waiters");

pub(crate) static STREAM_CHUNKS: Counter = Counter::new("chat_bubble.stream.chunks");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("chat_bubble.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("chat_bubble.stream.bytes");
pub(crate) static STREAM_CANCELLED: Counter = Counter::new("chat_bubble.stream.cancelled");
pub(crate) static STREAM_DURATION: Moments =
    Moments::new("chat_bubble.stream.duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_counter(&CLIENT_REQUEST_RETRIES);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&REFRESH_EXCHANGES);
    collector.register_counter(&REFRESH_FAILURES);
    collector.register_counter(&REFRESH_WAITERS);

    collector.register_counter(&STREAM_CHUNKS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_CANCELLED);
    collector.register_moments(&STREAM_DURATION);
}
