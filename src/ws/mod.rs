//! Realtime messaging subsystem.
//!
//! This module provides:
//! - One managed WebSocket connection per [`WsManager`], scoped to a facility
//! - Auto-reconnect with linear backoff (5 attempts, 1s base delay)
//! - Typed fan-out of messages and lifecycle events to view subscribers
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  WsManager                   │
//! │  (one transport, connect/disconnect/retry)   │
//! └──────────────────────────────────────────────┘
//!                       │ parsed Message / lifecycle
//!                       ▼
//!            ┌─────────────────────┐
//!            │   EventBroadcaster  │
//!            │  (typed pub/sub)    │
//!            └─────────────────────┘
//!                       │ fan-out
//!         ┌─────────────┼─────────────┐
//!         ▼             ▼             ▼
//!   ┌──────────┐  ┌──────────┐  ┌──────────┐
//!   │ChatBinding│ │ChatBinding│ │  status  │
//!   │ (view A) │  │ (view B) │  │indicator │
//!   └──────────┘  └──────────┘  └──────────┘
//! ```
//!
//! The manager and broadcaster form one logical component with a single
//! instance owned by the application's composition root; there is no global
//! state, and tests construct isolated instances against a mock transport.
//!
//! Outbound chat messages do not travel over this channel: views create them
//! through the REST API, and the backend broadcasts the created message back
//! to every subscriber, the sender included.

mod broadcaster;
mod connection;
mod manager;

#[cfg(test)]
pub(crate) mod testing;

pub use broadcaster::{EventBroadcaster, Subscription};
pub use connection::{
    realtime_url, ConnectionState, Connector, ReconnectConfig, TransportError, TransportSink,
    TransportStream, WsConnector,
};
pub use manager::{SendError, WsManager};
