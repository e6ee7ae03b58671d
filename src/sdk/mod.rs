//! High-level SDK facade over signaling and the media transport.
//!
//! [`RealtimeClient`] hides session setup, retries and teardown behind a handful of
//! async calls, while the wire vocabulary stays accessible through `crate::protocol`
//! when you need full control.

mod builder;
mod client;
pub mod events;
pub mod retry;
mod session;
mod transport;

pub use builder::{ClientConfig, DEFAULT_CONNECT_TIMEOUT, Realtime, RealtimeBuilder, RealtimeConnectOptions};
pub use client::RealtimeClient;
pub use events::{DEFAULT_EVENT_BUFFER, EventFeed, EventStream, MIN_EVENT_BUFFER, SdkEvent};
pub use retry::{ErrorClass, RetryPolicy};
pub use session::Session;
pub use transport::{BoxFuture, SignalingConnector, SignalingLink, WsConnector};
