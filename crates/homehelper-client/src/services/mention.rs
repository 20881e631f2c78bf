use serde_json::Value;
use tracing::info;

use homehelper_net::{Listener, TransportManager};
use homehelper_shared::error::TransportError;
use homehelper_shared::types::UserId;

use super::TopicFeed;

/// Mention notifications addressed to one user. Independent of any chat
/// subscription.
#[derive(Clone)]
pub struct MentionService {
    feed: TopicFeed,
    user_id: UserId,
}

impl MentionService {
    pub fn new(transport: TransportManager, user_id: UserId) -> Self {
        Self {
            feed: TopicFeed::new(transport, "mention_notifications"),
            user_id,
        }
    }

    pub fn on_mention<L>(&self, handler: L)
    where
        L: Listener<Value> + 'static,
    {
        self.feed.register(handler);
    }

    pub fn subscribe(&self) -> Result<String, TransportError> {
        let topic = self.user_id.mention_topic();
        self.feed.subscribe(&topic, |id| {
            info!(subscription = %id, topic = %topic, "Subscribed to mentions");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use homehelper_net::testing::LoopbackBroker;
    use homehelper_net::{Command, ConnectionConfig};

    #[tokio::test]
    async fn test_mentions_reach_every_handler() {
        let mut broker = LoopbackBroker::start().await.unwrap();
        let transport = TransportManager::new(ConnectionConfig::new(broker.url.clone()));
        let service = MentionService::new(transport.clone(), UserId(12));
        let hits = Arc::new(Mutex::new(Vec::new()));
        for tag in [1, 2] {
            let hits = hits.clone();
            service.on_mention(move |payload: &Value| -> anyhow::Result<()> {
                hits.lock().unwrap().push((tag, payload["channelId"].clone()));
                Ok(())
            });
        }

        {
            let service = service.clone();
            transport.on_connect(move |_: &()| -> anyhow::Result<()> {
                service.subscribe()?;
                Ok(())
            });
        }
        transport.connect();
        let subscribe = broker.expect(Command::Subscribe).await;
        assert_eq!(subscribe.get("destination"), Some("/topic/mention/12"));

        broker.publish("/topic/mention/12", r#"{"channelId":4}"#);
        for _ in 0..500 {
            if hits.lock().unwrap().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            *hits.lock().unwrap(),
            vec![(1, serde_json::json!(4)), (2, serde_json::json!(4))]
        );
    }
}
