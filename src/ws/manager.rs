//! Realtime connection manager.
//!
//! Owns at most one WebSocket transport per instance, scoped to one facility
//! (établissement). Construct a single `WsManager` at the application's
//! composition root and share it; tests build isolated instances with a mock
//! connector.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures_channel::mpsc;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::watch;

use super::broadcaster::{EventBroadcaster, Subscription};
use super::connection::{
    realtime_url, ConnectionState, Connector, ReconnectConfig, TransportSink, TransportStream,
    WsConnector,
};
use crate::models::Message;

/// Error returned by [`WsManager::send_message`].
///
/// The realtime channel is push-oriented; callers needing guaranteed
/// delivery should use the REST path instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// No open transport to send on
    NotConnected,
    /// The payload could not be serialized to JSON
    Serialize(String),
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::NotConnected => write!(f, "realtime channel is not connected"),
            SendError::Serialize(msg) => write!(f, "failed to serialize payload: {}", msg),
        }
    }
}

impl std::error::Error for SendError {}

/// State shared between the manager and its session tasks. The generation
/// counter fences a replaced session's late state writes: only the task
/// holding the current generation may publish state.
struct Shared {
    state_tx: watch::Sender<ConnectionState>,
    generation: AtomicU64,
}

impl Shared {
    fn set_state(&self, generation: u64, state: ConnectionState) {
        if self.generation.load(Ordering::SeqCst) == generation {
            self.state_tx.send_replace(state);
        }
    }
}

/// One logical realtime session (a connect call and its reconnect attempts).
struct Session {
    etablissement_id: String,
    shutdown: watch::Sender<bool>,
    outbound: mpsc::UnboundedSender<String>,
    task: tokio::task::JoinHandle<()>,
}

/// Connection manager for the realtime channel.
pub struct WsManager {
    base_url: String,
    connector: Arc<dyn Connector>,
    reconnect: ReconnectConfig,
    broadcaster: EventBroadcaster,
    shared: Arc<Shared>,
    session: Mutex<Option<Session>>,
}

impl WsManager {
    /// Create a manager targeting the given backend base URL, using the
    /// production tokio-tungstenite transport.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_connector(base_url, Arc::new(WsConnector))
    }

    /// Create a manager with a custom transport implementation.
    pub fn with_connector(base_url: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            base_url: base_url.into(),
            connector,
            reconnect: ReconnectConfig::default(),
            broadcaster: EventBroadcaster::new(),
            shared: Arc::new(Shared {
                state_tx,
                generation: AtomicU64::new(0),
            }),
            session: Mutex::new(None),
        }
    }

    /// Override the reconnect policy.
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state_tx.borrow().clone()
    }

    /// Watch connection state transitions (for status indicators).
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Facility the current session targets, if any.
    pub fn etablissement_id(&self) -> Option<String> {
        self.lock_session()
            .as_ref()
            .map(|s| s.etablissement_id.clone())
    }

    pub fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    pub fn subscribe_message(
        &self,
        callback: impl Fn(&Message) + Send + Sync + 'static,
    ) -> Subscription {
        self.broadcaster.subscribe_message(callback)
    }

    pub fn subscribe_connect(&self, callback: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.broadcaster.subscribe_connect(callback)
    }

    pub fn subscribe_disconnect(
        &self,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        self.broadcaster.subscribe_disconnect(callback)
    }

    /// Open the realtime channel for a facility.
    ///
    /// No-op if a live session already targets the same facility. A session
    /// for a different facility is shut down first; the new session starts
    /// with a fresh reconnect budget. Must be called from within a tokio
    /// runtime.
    pub fn connect(&self, etablissement_id: &str) {
        let mut session = self.lock_session();

        if let Some(current) = session.as_ref() {
            if current.etablissement_id == etablissement_id && !current.task.is_finished() {
                tracing::debug!(
                    "realtime channel for etablissement {etablissement_id} already open, ignoring"
                );
                return;
            }
        }

        let url = match realtime_url(&self.base_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!("cannot open realtime channel: {e}");
                return;
            }
        };

        if let Some(old) = session.take() {
            tracing::info!(
                "replacing realtime session for etablissement {}",
                old.etablissement_id
            );
            let _ = old.shutdown.send(true);
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.set_state(generation, ConnectionState::Connecting);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (outbound_tx, outbound_rx) = mpsc::unbounded();

        let task = tokio::spawn(run_session(SessionArgs {
            url,
            etablissement_id: etablissement_id.to_string(),
            connector: self.connector.clone(),
            reconnect: self.reconnect.clone(),
            broadcaster: self.broadcaster.clone(),
            shared: self.shared.clone(),
            generation,
            shutdown: shutdown_rx,
            outbound: outbound_rx,
        }));

        *session = Some(Session {
            etablissement_id: etablissement_id.to_string(),
            shutdown: shutdown_tx,
            outbound: outbound_tx,
            task,
        });
    }

    /// Close the realtime channel and clear the target facility.
    ///
    /// Cancels any pending reconnect timer; no reconnection happens until
    /// [`WsManager::connect`] is called again. Idempotent.
    pub fn disconnect(&self) {
        let mut session = self.lock_session();
        let Some(old) = session.take() else {
            tracing::debug!("disconnect with no active realtime session");
            return;
        };

        // Invalidate the old session's state writes before it winds down
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        let _ = old.shutdown.send(true);
        self.shared
            .state_tx
            .send_replace(ConnectionState::Disconnected);
        tracing::info!(
            "realtime channel for etablissement {} shut down",
            old.etablissement_id
        );
    }

    /// Send a JSON payload over the open transport.
    pub fn send_message<T: Serialize>(&self, payload: &T) -> Result<(), SendError> {
        let text =
            serde_json::to_string(payload).map_err(|e| SendError::Serialize(e.to_string()))?;

        let session = self.lock_session();
        let Some(session) = session.as_ref() else {
            return Err(SendError::NotConnected);
        };
        if !self.state().is_connected() {
            return Err(SendError::NotConnected);
        }
        session
            .outbound
            .unbounded_send(text)
            .map_err(|_| SendError::NotConnected)
    }
}

struct SessionArgs {
    url: String,
    etablissement_id: String,
    connector: Arc<dyn Connector>,
    reconnect: ReconnectConfig,
    broadcaster: EventBroadcaster,
    shared: Arc<Shared>,
    generation: u64,
    shutdown: watch::Receiver<bool>,
    outbound: mpsc::UnboundedReceiver<String>,
}

async fn run_session(args: SessionArgs) {
    let SessionArgs {
        url,
        etablissement_id,
        connector,
        reconnect,
        broadcaster,
        shared,
        generation,
        mut shutdown,
        mut outbound,
    } = args;

    let mut attempt: u32 = 0;

    loop {
        if attempt == 0 {
            shared.set_state(generation, ConnectionState::Connecting);
        } else {
            shared.set_state(generation, ConnectionState::Reconnecting { attempt });
        }
        tracing::debug!("connecting realtime channel to {url} for etablissement {etablissement_id}");

        let connected = tokio::select! {
            result = connector.connect(&url) => result,
            _ = wait_shutdown(&mut shutdown) => {
                shared.set_state(generation, ConnectionState::Disconnected);
                return;
            }
        };

        match connected {
            Ok((mut sink, mut stream)) => {
                attempt = 0;
                shared.set_state(generation, ConnectionState::Connected);
                tracing::info!("realtime channel connected for etablissement {etablissement_id}");
                broadcaster.emit_connect();

                let explicit =
                    pump(&mut sink, &mut stream, &mut outbound, &mut shutdown, &broadcaster).await;

                shared.set_state(generation, ConnectionState::Disconnected);
                broadcaster.emit_disconnect();

                if explicit {
                    let _ = sink.close().await;
                    return;
                }
                tracing::info!("realtime channel closed for etablissement {etablissement_id}");
            }
            Err(e) => {
                tracing::error!("realtime connect failed for etablissement {etablissement_id}: {e}");
            }
        }

        if attempt >= reconnect.max_attempts {
            tracing::warn!(
                "giving up on etablissement {etablissement_id} after {} reconnect attempts",
                reconnect.max_attempts
            );
            shared.set_state(generation, ConnectionState::Disconnected);
            return;
        }

        attempt += 1;
        let delay = reconnect.delay_for_attempt(attempt);
        tracing::info!(
            "reconnecting to etablissement {etablissement_id} in {delay:?} (attempt {attempt}/{})",
            reconnect.max_attempts
        );
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = wait_shutdown(&mut shutdown) => {
                shared.set_state(generation, ConnectionState::Disconnected);
                return;
            }
        }
    }
}

/// Drive an established transport until it closes.
///
/// Returns `true` when the session was shut down explicitly (disconnect or
/// replacement), `false` when the peer closed and reconnection should run.
async fn pump(
    sink: &mut TransportSink,
    stream: &mut TransportStream,
    outbound: &mut mpsc::UnboundedReceiver<String>,
    shutdown: &mut watch::Receiver<bool>,
    broadcaster: &EventBroadcaster,
) -> bool {
    loop {
        tokio::select! {
            _ = wait_shutdown(shutdown) => return true,
            out = outbound.next() => match out {
                Some(text) => {
                    if let Err(e) = sink.send(text).await {
                        tracing::error!("realtime send failed: {e}");
                        return false;
                    }
                }
                // Manager dropped the session; treated like a shutdown
                None => return true,
            },
            frame = stream.next() => match frame {
                Some(Ok(text)) => handle_frame(&text, broadcaster),
                // Errors are logged only; the close that follows drives the
                // state transition
                Some(Err(e)) => tracing::error!("realtime transport error: {e}"),
                None => return false,
            },
        }
    }
}

fn handle_frame(text: &str, broadcaster: &EventBroadcaster) {
    match serde_json::from_str::<Message>(text) {
        Ok(message) => broadcaster.emit_message(&message),
        Err(e) => tracing::error!("dropping malformed realtime frame: {e}"),
    }
}

async fn wait_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        // A dropped sender means the session was discarded
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
