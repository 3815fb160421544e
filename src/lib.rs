//! AmbuConnect client subsystem.
//!
//! Client-side library for the AmbuConnect patient transport coordination
//! backend: a REST API client for facilities, users, transport requests and
//! chat messages, plus a realtime WebSocket subsystem that pushes new
//! messages to subscribed views.
//!
//! The embedding application constructs one [`WsManager`] and one
//! [`ApiClient`] at its composition root and hands them to views; each chat
//! view creates a [`ChatBinding`] for its facility.

pub mod api;
pub mod chat;
pub mod error;
pub mod models;
pub mod ws;

pub use api::ApiClient;
pub use chat::ChatBinding;
pub use error::ApiError;
pub use ws::{
    ConnectionState, EventBroadcaster, ReconnectConfig, SendError, Subscription, WsManager,
};
