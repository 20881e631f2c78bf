//! Subscription tracking.
//!
//! Maps broker subscription ids to their destination and message handler so
//! that inbound `MESSAGE` frames can be routed.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::listeners::Listener;

/// One active subscription.
#[derive(Clone)]
pub struct Subscription {
    pub id: String,
    pub destination: String,
    pub handler: Arc<dyn Listener<Value>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct SubscriptionTracker {
    subscriptions: HashMap<String, Subscription>,
}

impl SubscriptionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_subscribed(&mut self, id: String, destination: String, handler: Arc<dyn Listener<Value>>) {
        debug!(id = %id, destination = %destination, "Tracking subscription");
        self.subscriptions.insert(
            id.clone(),
            Subscription {
                id,
                destination,
                handler,
            },
        );
    }

    pub fn get(&self, id: &str) -> Option<&Subscription> {
        self.subscriptions.get(id)
    }

    pub fn count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}
