//! Topic-scoped services on top of the shared transport.
//!
//! Each service owns one ordered handler set and fans every decoded payload
//! of its topic out to it.

pub mod activity;
pub mod channel;
pub mod mention;

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use homehelper_net::{Listener, ListenerSet, TransportManager};
use homehelper_shared::error::TransportError;

pub use activity::ActivityService;
pub use channel::ChannelService;
pub use mention::MentionService;

#[derive(Clone)]
pub(crate) struct TopicFeed {
    transport: TransportManager,
    handlers: Arc<ListenerSet<Value>>,
}

impl TopicFeed {
    pub(crate) fn new(transport: TransportManager, name: &'static str) -> Self {
        Self {
            transport,
            handlers: Arc::new(ListenerSet::new(name)),
        }
    }

    pub(crate) fn transport(&self) -> &TransportManager {
        &self.transport
    }

    pub(crate) fn register<L>(&self, handler: L)
    where
        L: Listener<Value> + 'static,
    {
        self.handlers.register(handler);
    }

    /// Subscribe `destination` and route its payloads to every handler.
    pub(crate) fn subscribe<S>(&self, destination: &str, on_subscribed: S) -> Result<String, TransportError>
    where
        S: FnOnce(&str),
    {
        let handlers = self.handlers.clone();
        let topic = destination.to_string();
        self.transport.subscribe(
            destination,
            on_subscribed,
            move |payload: &Value| -> anyhow::Result<()> {
                let delivered = handlers.dispatch(payload);
                debug!(topic = %topic, delivered, "Payload fanned out");
                Ok(())
            },
        )
    }
}
