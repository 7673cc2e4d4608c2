//! Finnhub WebSocket Streaming Adapter
//!
//! Implements the live price stream against Finnhub's trade WebSocket:
//!
//! - `messages`: wire frame types (inbound trades/status, outbound control)
//! - `codec`: JSON frame decoding
//! - `heartbeat`: keep-alive monitoring
//! - `backoff`: reconnect delay policy
//! - `connection`: the connection actor and its command handle

pub mod backoff;
pub mod codec;
pub mod connection;
pub mod heartbeat;
pub mod messages;

pub use backoff::{BackoffConfig, BackoffPolicy};
pub use codec::{CodecError, FeedMessage, JsonCodec};
pub use connection::{FeedConnection, FeedConnectionConfig, FeedHandle};
pub use heartbeat::{HeartbeatConfig, HeartbeatEvent, HeartbeatMonitor, HeartbeatState};
pub use messages::{ControlFrame, RejectedSubscription, SubscribeStatusMessage, TradeTick};

// The port-level event type is the adapter's output vocabulary; re-export it
// next to the connection for adapter-local imports.
pub use crate::application::ports::FeedEvent;
