//! Live update channel over server-sent events

mod backoff;
mod channel;
mod sse;

pub use backoff::ReconnectPolicy;
pub use channel::{CancelToken, ChannelEvent, EventStream, Subscription, subscribe};
pub use sse::{SseEvent, SseParser, decode_batch};
