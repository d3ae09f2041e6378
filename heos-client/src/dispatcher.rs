//! Fan-out of change events to registered listeners.

use heos_protocol::{EventKind, HeosEvent, Message};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Default capacity of the typed event broadcast channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// A listener receives the positional arguments of one event.
pub type Listener = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Wraps a closure as a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&[Value]) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Routes events to the listeners registered for their type.
///
/// Listeners for one type form an ordered set: registering the same `Arc`
/// twice has no effect, and invocation follows registration order.
pub struct EventDispatcher {
    listeners: RwLock<HashMap<EventKind, Vec<Listener>>>,
    events: broadcast::Sender<HeosEvent>,
}

impl EventDispatcher {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            listeners: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Registers `listener` for `kind`. Returns false if it was already registered.
    pub fn subscribe(&self, kind: EventKind, listener: Listener) -> bool {
        let mut listeners = self.listeners.write();
        let set = listeners.entry(kind).or_default();
        if set.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return false;
        }
        set.push(listener);
        true
    }

    /// Removes `listener` from `kind`. Returns false if it was not registered.
    pub fn unsubscribe(&self, kind: EventKind, listener: &Listener) -> bool {
        let mut listeners = self.listeners.write();
        let Some(set) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = set.len();
        set.retain(|l| !Arc::ptr_eq(l, listener));
        let removed = set.len() != before;
        if set.is_empty() {
            listeners.remove(&kind);
        }
        removed
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.read().get(&kind).map_or(0, Vec::len)
    }

    /// Returns a receiver of typed events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<HeosEvent> {
        self.events.subscribe()
    }

    /// Delivers one event. Returns the number of listeners invoked.
    pub fn dispatch(&self, kind: EventKind, message: &Message) -> usize {
        match HeosEvent::decode(kind, message.body()) {
            // No receivers is fine.
            Ok(event) => {
                let _ = self.events.send(event);
            }
            Err(e) => tracing::debug!("Event {} not published as typed event: {}", kind, e),
        }

        // Cloned so listeners may subscribe or unsubscribe re-entrantly.
        let listeners = match self.listeners.read().get(&kind) {
            Some(set) if !set.is_empty() => set.clone(),
            _ => return 0,
        };

        let args = kind.arguments(message.body());
        tracing::debug!("Dispatching {} to {} listener(s)", kind, listeners.len());
        for listener in &listeners {
            listener(&args);
        }
        listeners.len()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}
