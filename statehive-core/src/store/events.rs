//! Store event hook
//!
//! Broadcasts store lifecycle events to debugging tools. A tool counts as
//! attached while it holds a receiver; only then are action errors forwarded.

use super::subscribers::MutationRecord;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

/// Events emitted by the store
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StoreEvent {
    Init { state: Value },
    Mutation { mutation: MutationRecord, state: Value },
    ActionError { action_type: String, message: String },
    ModuleRegistered { path: String },
    ModuleUnregistered { path: String },
    HotUpdated,
    StateReplaced,
}

impl StoreEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StoreEvent::Init { .. } => "init",
            StoreEvent::Mutation { .. } => "mutation",
            StoreEvent::ActionError { .. } => "action_error",
            StoreEvent::ModuleRegistered { .. } => "module_registered",
            StoreEvent::ModuleUnregistered { .. } => "module_unregistered",
            StoreEvent::HotUpdated => "hot_updated",
            StoreEvent::StateReplaced => "state_replaced",
        }
    }
}

/// Event broadcaster for store events
///
/// Uses a tokio broadcast channel, so any number of tools can listen.
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<StoreEvent>,
}

impl EventBroadcaster {
    /// Create a broadcaster buffering up to `capacity` events per receiver
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Emit an event, returning how many receivers got it
    pub fn emit(&self, event: StoreEvent) -> usize {
        // no active receivers is not an error
        self.tx.send(event).unwrap_or(0)
    }

    /// Emit an event built lazily, only if someone is listening
    pub fn emit_with(&self, event: impl FnOnce() -> StoreEvent) -> usize {
        if self.is_attached() {
            self.emit(event())
        } else {
            0
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Whether a tool is listening
    pub fn is_attached(&self) -> bool {
        self.subscriber_count() > 0
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_no_subscribers() {
        let events = EventBroadcaster::new(10);
        assert!(!events.is_attached());
        assert_eq!(events.emit(StoreEvent::HotUpdated), 0);
    }

    #[tokio::test]
    async fn test_subscribe_and_receive() {
        let events = EventBroadcaster::new(10);
        let mut rx = events.subscribe();
        assert!(events.is_attached());

        events.emit(StoreEvent::ModuleRegistered { path: "cart".to_string() });
        let received = rx.recv().await.unwrap();
        assert_eq!(received.name(), "module_registered");
    }

    #[tokio::test]
    async fn test_emit_with_skips_builder_without_receivers() {
        let events = EventBroadcaster::new(10);
        let mut built = false;
        events.emit_with(|| {
            built = true;
            StoreEvent::StateReplaced
        });
        assert!(!built);
    }

    #[tokio::test]
    async fn test_dropped_subscriber_detaches() {
        let events = EventBroadcaster::new(10);
        {
            let _rx = events.subscribe();
            assert!(events.is_attached());
        }
        assert!(!events.is_attached());
    }

    #[test]
    fn test_event_serialization() {
        let event = StoreEvent::ActionError {
            action_type: "load".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "action_error", "action_type": "load", "message": "boom"})
        );
    }
}
