//! Mutation and action observers

use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// What a mutation subscriber sees for each commit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MutationRecord {
    #[serde(rename = "type")]
    pub mutation_type: String,
    pub payload: Value,
}

/// What an action subscriber sees for each dispatch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRecord {
    #[serde(rename = "type")]
    pub action_type: String,
    pub payload: Value,
}

/// Observer called with the record and a snapshot of the root state
pub type Subscriber<R> = Arc<dyn Fn(&R, &Value) + Send + Sync>;

pub type MutationSubscriber = Subscriber<MutationRecord>;
pub type ActionSubscriber = Subscriber<ActionRecord>;

/// Ordered observer list, deduplicated by identity
pub(crate) struct SubscriberList<R> {
    subscribers: Arc<Mutex<Vec<Subscriber<R>>>>,
}

impl<R: 'static> SubscriberList<R> {
    pub(crate) fn new() -> Self {
        Self { subscribers: Arc::new(Mutex::new(Vec::new())) }
    }

    pub(crate) fn subscribe(&self, subscriber: Subscriber<R>) -> Subscription {
        {
            let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
            if !subscribers.iter().any(|existing| Arc::ptr_eq(existing, &subscriber)) {
                subscribers.push(subscriber.clone());
            }
        }

        let list: Weak<Mutex<Vec<Subscriber<R>>>> = Arc::downgrade(&self.subscribers);
        Subscription {
            remove: Box::new(move || {
                if let Some(list) = list.upgrade() {
                    list.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .retain(|existing| !Arc::ptr_eq(existing, &subscriber));
                }
            }),
        }
    }

    /// Call every subscriber in subscription order
    pub(crate) fn notify(&self, record: &R, state: &Value) {
        // subscribers may unsubscribe while being notified
        let subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner).clone();
        for subscriber in subscribers {
            subscriber(record, state);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Handle returned by `subscribe`; dropping it keeps the subscription
pub struct Subscription {
    remove: Box<dyn FnOnce() + Send + Sync>,
}

impl Subscription {
    /// Remove the subscriber
    pub fn unsubscribe(self) {
        (self.remove)()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Subscription")
    }
}
