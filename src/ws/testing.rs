//! Scripted in-memory transport for exercising the connection manager
//! without a network.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_channel::mpsc;
use futures_util::SinkExt;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::connection::{Connector, TransportError, TransportSink, TransportStream};

/// Install a subscriber so `RUST_LOG=debug cargo test` shows traces.
pub(crate) fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Outcome of the next scripted connect attempt. Attempts beyond the script
/// are accepted.
pub(crate) enum Script {
    Accept,
    Refuse,
    Hang,
}

struct TestConn {
    frames: Option<mpsc::UnboundedSender<Result<String, TransportError>>>,
    outbound: Option<mpsc::UnboundedReceiver<String>>,
}

#[derive(Default)]
struct MockState {
    script: Mutex<VecDeque<Script>>,
    conns: Mutex<Vec<TestConn>>,
    attempts: Mutex<Vec<Instant>>,
    notify: Notify,
}

#[derive(Clone)]
pub(crate) struct MockConnector {
    state: Arc<MockState>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(MockState::default()),
        }
    }

    pub(crate) fn script(&self, steps: impl IntoIterator<Item = Script>) {
        self.state.script.lock().unwrap().extend(steps);
    }

    /// Virtual-clock timestamps of every connect attempt, in order.
    pub(crate) fn attempts(&self) -> Vec<Instant> {
        self.state.attempts.lock().unwrap().clone()
    }

    pub(crate) fn attempt_count(&self) -> usize {
        self.state.attempts.lock().unwrap().len()
    }

    pub(crate) fn conn_count(&self) -> usize {
        self.state.conns.lock().unwrap().len()
    }

    /// Deliver a text frame on an accepted connection.
    pub(crate) fn send_frame(&self, conn: usize, text: &str) {
        let conns = self.state.conns.lock().unwrap();
        conns[conn]
            .frames
            .as_ref()
            .expect("connection already closed")
            .unbounded_send(Ok(text.to_string()))
            .expect("client dropped the stream");
    }

    /// Close an accepted connection from the server side.
    pub(crate) fn close(&self, conn: usize) {
        self.state.conns.lock().unwrap()[conn].frames = None;
    }

    /// Take the receiver observing what the client sends on a connection.
    pub(crate) fn take_outbound(&self, conn: usize) -> mpsc::UnboundedReceiver<String> {
        self.state.conns.lock().unwrap()[conn]
            .outbound
            .take()
            .expect("outbound already taken")
    }

    pub(crate) async fn wait_for_attempts(&self, n: usize) {
        loop {
            let notified = self.state.notify.notified();
            if self.attempt_count() >= n {
                return;
            }
            notified.await;
        }
    }

    pub(crate) async fn wait_for_conns(&self, n: usize) {
        loop {
            let notified = self.state.notify.notified();
            if self.conn_count() >= n {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        _url: &str,
    ) -> Result<(TransportSink, TransportStream), TransportError> {
        self.state.attempts.lock().unwrap().push(Instant::now());
        let step = self
            .state
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Accept);
        self.state.notify.notify_waiters();

        match step {
            Script::Refuse => Err(TransportError::new("connection refused")),
            Script::Hang => std::future::pending().await,
            Script::Accept => {
                let (frame_tx, frame_rx) = mpsc::unbounded::<Result<String, TransportError>>();
                let (out_tx, out_rx) = mpsc::unbounded::<String>();
                self.state.conns.lock().unwrap().push(TestConn {
                    frames: Some(frame_tx),
                    outbound: Some(out_rx),
                });
                self.state.notify.notify_waiters();

                let sink: TransportSink =
                    Box::pin(out_tx.sink_map_err(|e| TransportError::new(e.to_string())));
                let stream: TransportStream = Box::pin(frame_rx);
                Ok((sink, stream))
            }
        }
    }
}
