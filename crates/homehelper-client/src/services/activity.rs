use serde_json::Value;
use tracing::info;

use homehelper_net::{Listener, TransportManager};
use homehelper_shared::error::TransportError;
use homehelper_shared::types::UserId;

use super::TopicFeed;

/// Live activity of every renovation the user belongs to.
#[derive(Clone)]
pub struct ActivityService {
    feed: TopicFeed,
    user_id: UserId,
}

impl ActivityService {
    pub fn new(transport: TransportManager, user_id: UserId) -> Self {
        Self {
            feed: TopicFeed::new(transport, "activity_feed"),
            user_id,
        }
    }

    pub fn on_activity<L>(&self, handler: L)
    where
        L: Listener<Value> + 'static,
    {
        self.feed.register(handler);
    }

    pub fn subscribe(&self) -> Result<String, TransportError> {
        let topic = self.user_id.feed_topic();
        self.feed.subscribe(&topic, |id| {
            info!(subscription = %id, topic = %topic, "Subscribed to activity feed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homehelper_net::ConnectionConfig;

    #[test]
    fn test_subscribe_requires_connection() {
        let transport = TransportManager::new(ConnectionConfig::new("ws://127.0.0.1:9/ws"));
        let service = ActivityService::new(transport, UserId(1));
        service.on_activity(|_: &Value| -> anyhow::Result<()> { Ok(()) });
        assert_eq!(service.subscribe(), Err(TransportError::NotConnected));
    }
}
