//! Per-view chat binding.
//!
//! A `ChatBinding` is the bridge between the realtime subsystem and a chat
//! view: it subscribes to the broadcaster, accumulates messages in arrival
//! order, tracks the connection flag, and sends new messages through the
//! REST path (the backend echoes them back over the realtime channel).
//!
//! The binding owns its subscriptions and releases them on drop; it does not
//! own the connection itself, which belongs to the application root.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::api::ApiClient;
use crate::error::ApiError;
use crate::models::{CreateMessage, Message, MessageType};
use crate::ws::{Subscription, WsManager};

#[derive(Default)]
struct FeedState {
    messages: Vec<Message>,
    connected: bool,
}

impl FeedState {
    /// Append in arrival order, deduplicating by server-assigned id. A sent
    /// message arrives twice (REST response plus realtime echo); the second
    /// copy is ignored.
    fn push(&mut self, message: Message) -> bool {
        if self.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        self.messages.push(message);
        true
    }
}

/// View adapter for one facility's chat, optionally scoped to a transport
/// request (demande).
pub struct ChatBinding {
    etablissement_id: String,
    demande_id: Option<String>,
    api: ApiClient,
    state: Arc<Mutex<FeedState>>,
    _subscriptions: Vec<Subscription>,
}

impl ChatBinding {
    /// Subscribe to the realtime channel and open it for the facility.
    pub fn bind(
        manager: &WsManager,
        api: ApiClient,
        etablissement_id: impl Into<String>,
        demande_id: Option<String>,
    ) -> Self {
        let etablissement_id = etablissement_id.into();
        let state = Arc::new(Mutex::new(FeedState {
            messages: Vec::new(),
            connected: manager.is_connected(),
        }));

        let on_message = {
            let state = state.clone();
            manager.subscribe_message(move |message: &Message| {
                lock(&state).push(message.clone());
            })
        };
        let on_connect = {
            let state = state.clone();
            manager.subscribe_connect(move || lock(&state).connected = true)
        };
        let on_disconnect = {
            let state = state.clone();
            manager.subscribe_disconnect(move || lock(&state).connected = false)
        };

        manager.connect(&etablissement_id);

        Self {
            etablissement_id,
            demande_id,
            api,
            state,
            _subscriptions: vec![on_message, on_connect, on_disconnect],
        }
    }

    pub fn etablissement_id(&self) -> &str {
        &self.etablissement_id
    }

    pub fn demande_id(&self) -> Option<&str> {
        self.demande_id.as_deref()
    }

    /// Snapshot of the feed, in arrival order.
    pub fn messages(&self) -> Vec<Message> {
        lock(&self.state).messages.clone()
    }

    /// Whether the realtime channel is currently connected. Views should
    /// disable their send affordance while this is false.
    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    /// Create a message via the REST path. The persisted message is added
    /// to the local feed immediately; the realtime echo deduplicates.
    pub async fn send(
        &self,
        r#type: MessageType,
        contenu: impl Into<String>,
    ) -> Result<Message, ApiError> {
        let response = self
            .api
            .create_message(
                &self.etablissement_id,
                &CreateMessage {
                    demande_id: self.demande_id.clone(),
                    r#type,
                    contenu: contenu.into(),
                },
            )
            .await?;

        let message = response.data;
        lock(&self.state).push(message.clone());
        Ok(message)
    }
}

fn lock(state: &Arc<Mutex<FeedState>>) -> MutexGuard<'_, FeedState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
