//! Typed fan-out of realtime events to any number of subscribers.
//!
//! Decouples the connection manager from the views: the manager pushes
//! parsed messages and lifecycle transitions in here, and views register
//! callbacks without the manager knowing about them.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::models::Message;

type MessageCallback = Arc<dyn Fn(&Message) + Send + Sync>;
type LifecycleCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    Message,
    Connect,
    Disconnect,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    message: HashMap<u64, MessageCallback>,
    connect: HashMap<u64, LifecycleCallback>,
    disconnect: HashMap<u64, LifecycleCallback>,
}

impl Registry {
    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Event fan-out registry. Cloning shares the same subscriber set; the
/// manager and its views hold clones of one instance owned by the
/// application's composition root.
#[derive(Clone, Default)]
pub struct EventBroadcaster {
    registry: Arc<Mutex<Registry>>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        // A panicking subscriber is already isolated at dispatch; a poisoned
        // registry still holds consistent data.
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a callback for incoming messages. Delivery stops when the
    /// returned [`Subscription`] is dropped.
    pub fn subscribe_message(
        &self,
        callback: impl Fn(&Message) + Send + Sync + 'static,
    ) -> Subscription {
        let mut registry = self.lock();
        let id = registry.alloc_id();
        registry.message.insert(id, Arc::new(callback));
        self.subscription(EventKind::Message, id)
    }

    /// Register a callback invoked whenever the transport reaches Connected.
    pub fn subscribe_connect(&self, callback: impl Fn() + Send + Sync + 'static) -> Subscription {
        let mut registry = self.lock();
        let id = registry.alloc_id();
        registry.connect.insert(id, Arc::new(callback));
        self.subscription(EventKind::Connect, id)
    }

    /// Register a callback invoked whenever an established transport closes.
    pub fn subscribe_disconnect(
        &self,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        let mut registry = self.lock();
        let id = registry.alloc_id();
        registry.disconnect.insert(id, Arc::new(callback));
        self.subscription(EventKind::Disconnect, id)
    }

    fn subscription(&self, kind: EventKind, id: u64) -> Subscription {
        Subscription {
            registry: Arc::downgrade(&self.registry),
            kind,
            id,
        }
    }

    pub(crate) fn emit_message(&self, message: &Message) {
        // Snapshot before invoking: callbacks may subscribe or unsubscribe
        // while the dispatch is in flight.
        let callbacks: Vec<MessageCallback> = self.lock().message.values().cloned().collect();
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(message))).is_err() {
                tracing::error!("message subscriber panicked, continuing dispatch");
            }
        }
    }

    pub(crate) fn emit_connect(&self) {
        self.emit_lifecycle(EventKind::Connect);
    }

    pub(crate) fn emit_disconnect(&self) {
        self.emit_lifecycle(EventKind::Disconnect);
    }

    fn emit_lifecycle(&self, kind: EventKind) {
        let callbacks: Vec<LifecycleCallback> = {
            let registry = self.lock();
            let map = match kind {
                EventKind::Connect => &registry.connect,
                EventKind::Disconnect => &registry.disconnect,
                EventKind::Message => unreachable!("message events carry a payload"),
            };
            map.values().cloned().collect()
        };
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                tracing::error!("lifecycle subscriber panicked, continuing dispatch");
            }
        }
    }
}

/// Registration of interest in one event category. Unsubscribes on drop, so
/// a view that owns its subscriptions releases them on every exit path.
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    kind: EventKind,
    id: u64,
}

impl Subscription {
    /// Explicitly release the registration (equivalent to dropping).
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut registry = registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match self.kind {
            EventKind::Message => {
                registry.message.remove(&self.id);
            }
            EventKind::Connect => {
                registry.connect.remove(&self.id);
            }
            EventKind::Disconnect => {
                registry.disconnect.remove(&self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_message(id: &str) -> Message {
        Message {
            id: id.to_string(),
            etablissement_id: "fac-1".to_string(),
            demande_id: None,
            expediteur_id: "u1".to_string(),
            expediteur_nom: "Alice".to_string(),
            expediteur_role: "OPERATEUR".to_string(),
            r#type: crate::models::MessageType::Discussion,
            contenu: "hi".to_string(),
            lu: false,
            date_creation: Utc::now(),
            date_modification: None,
        }
    }

    #[test]
    fn fans_out_to_all_message_subscribers() {
        let broadcaster = EventBroadcaster::new();
        let seen_a = Arc::new(Mutex::new(Vec::new()));
        let seen_b = Arc::new(Mutex::new(Vec::new()));

        let a = seen_a.clone();
        let _sub_a = broadcaster.subscribe_message(move |m| a.lock().unwrap().push(m.id.clone()));
        let b = seen_b.clone();
        let _sub_b = broadcaster.subscribe_message(move |m| b.lock().unwrap().push(m.id.clone()));

        broadcaster.emit_message(&sample_message("m1"));

        assert_eq!(*seen_a.lock().unwrap(), vec!["m1"]);
        assert_eq!(*seen_b.lock().unwrap(), vec!["m1"]);
    }

    #[test]
    fn dropped_subscription_stops_delivery() {
        let broadcaster = EventBroadcaster::new();
        let seen_a = Arc::new(Mutex::new(0u32));
        let seen_b = Arc::new(Mutex::new(0u32));

        let a = seen_a.clone();
        let sub_a = broadcaster.subscribe_message(move |_| *a.lock().unwrap() += 1);
        let b = seen_b.clone();
        let _sub_b = broadcaster.subscribe_message(move |_| *b.lock().unwrap() += 1);

        broadcaster.emit_message(&sample_message("m1"));
        sub_a.unsubscribe();
        broadcaster.emit_message(&sample_message("m2"));

        assert_eq!(*seen_a.lock().unwrap(), 1);
        assert_eq!(*seen_b.lock().unwrap(), 2);
    }

    #[test]
    fn panicking_subscriber_does_not_block_others() {
        let broadcaster = EventBroadcaster::new();
        let _panicky = broadcaster.subscribe_message(|_| panic!("boom"));
        let seen = Arc::new(Mutex::new(0u32));
        let s = seen.clone();
        let _sub = broadcaster.subscribe_message(move |_| *s.lock().unwrap() += 1);

        broadcaster.emit_message(&sample_message("m1"));

        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn subscriber_may_unsubscribe_during_dispatch() {
        let broadcaster = EventBroadcaster::new();
        let held: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let seen = Arc::new(Mutex::new(0u32));
        let s = seen.clone();
        let victim = broadcaster.subscribe_message(move |_| *s.lock().unwrap() += 1);
        *held.lock().unwrap() = Some(victim);

        let h = held.clone();
        let _killer = broadcaster.subscribe_connect(move || {
            h.lock().unwrap().take();
        });

        // Dispatch must survive a callback mutating the registry
        broadcaster.emit_connect();
        broadcaster.emit_message(&sample_message("m1"));

        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[test]
    fn lifecycle_categories_are_independent() {
        let broadcaster = EventBroadcaster::new();
        let connects = Arc::new(Mutex::new(0u32));
        let disconnects = Arc::new(Mutex::new(0u32));

        let c = connects.clone();
        let _on_connect = broadcaster.subscribe_connect(move || *c.lock().unwrap() += 1);
        let d = disconnects.clone();
        let _on_disconnect = broadcaster.subscribe_disconnect(move || *d.lock().unwrap() += 1);

        broadcaster.emit_connect();
        broadcaster.emit_connect();
        broadcaster.emit_disconnect();

        assert_eq!(*connects.lock().unwrap(), 2);
        assert_eq!(*disconnects.lock().unwrap(), 1);
    }
}
