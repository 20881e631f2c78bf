//! Wires the transport, the topic services and the controllers together.
//!
//! Transport listeners run synchronously on the connection task, so chat
//! traffic is forwarded into the controller's event queue with `try_send`
//! and every network call is left to the controller's own tasks.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};

use homehelper_net::{ConnectionConfig, TransportManager};
use homehelper_shared::protocol::ActivityItem;

use crate::activity::ActivityFeed;
use crate::api::ChatApi;
use crate::chat::{ChatController, ChatSettings, ChatView};
use crate::config::ClientConfig;
use crate::events::ChatEvent;
use crate::mentions::MentionController;
use crate::services::{ActivityService, ChannelService, MentionService};
use crate::state::SessionContext;

/// Capacity of the chat event queue.
pub const CHAT_EVENT_BUFFER: usize = 256;

/// Everything a front end needs after startup.
pub struct ClientHandles<V, A> {
    pub transport: TransportManager,
    pub session: SessionContext,
    pub channel: ChannelService,
    pub mentions: MentionController<A>,
    pub activity: Arc<Mutex<ActivityFeed>>,
    /// Present when a chat channel is open.
    pub chat: Option<ChatController<V, A>>,
    pub chat_events: Option<mpsc::Sender<ChatEvent>>,
}

fn forward(events: &mpsc::Sender<ChatEvent>, event: ChatEvent) -> anyhow::Result<()> {
    events
        .try_send(event)
        .map_err(|e| anyhow::anyhow!("chat event queue rejected event: {e}"))
}

/// Build every service and controller, register their transport hooks and
/// open the broker connection.
///
/// Must be called from within a tokio runtime.
pub fn start_client<V, A>(config: &ClientConfig, api: A, view: V) -> ClientHandles<V, A>
where
    V: ChatView,
    A: ChatApi + Clone,
{
    let session = SessionContext::from_config(config);
    let transport = TransportManager::new(ConnectionConfig::new(config.broker_url.clone()));

    let channel = ChannelService::new(transport.clone(), session.renovation_id);
    let mention_service = MentionService::new(transport.clone(), session.user_id);
    let activity_service = ActivityService::new(transport.clone(), session.user_id);

    let (chat, chat_events) = match ChatSettings::from_config(config) {
        Some(settings) => {
            let channel_id = settings.channel_id;
            let controller = ChatController::new(settings, api.clone(), view);
            controller.attach_composer(channel.clone(), session.roster.clone());

            let (tx, rx) = mpsc::channel(CHAT_EVENT_BUFFER);
            tokio::spawn(controller.clone().run(rx));

            {
                let tx = tx.clone();
                channel.on_message(move |payload: &Value| -> anyhow::Result<()> {
                    forward(&tx, ChatEvent::Incoming(payload.clone()))
                });
            }
            {
                let tx = tx.clone();
                channel.on_subscribed(move |_: &()| -> anyhow::Result<()> {
                    forward(&tx, ChatEvent::Subscribed)
                });
            }
            {
                let channel = channel.clone();
                transport.on_connect(move |_: &()| -> anyhow::Result<()> {
                    channel.subscribe_to_channel(channel_id)?;
                    Ok(())
                });
            }

            (Some(controller), Some(tx))
        }
        None => {
            info!("No chat channel open, running mention and activity feeds only");
            (None, None)
        }
    };

    let mentions = MentionController::new(api, session.clone(), config.unseen_mentions.clone());
    {
        let mentions = mentions.clone();
        mention_service.on_mention(move |payload: &Value| -> anyhow::Result<()> {
            mentions.on_mention(payload.clone());
            Ok(())
        });
    }
    transport.on_connect(move |_: &()| -> anyhow::Result<()> {
        mention_service.subscribe()?;
        Ok(())
    });

    let activity = Arc::new(Mutex::new(ActivityFeed::new(config.activity_items.clone())));
    {
        let activity = activity.clone();
        activity_service.on_activity(move |payload: &Value| -> anyhow::Result<()> {
            let item: ActivityItem = serde_json::from_value(payload.clone())?;
            match activity.lock() {
                Ok(mut feed) => feed.push_live(item),
                Err(poisoned) => poisoned.into_inner().push_live(item),
            }
            Ok(())
        });
    }
    transport.on_connect(move |_: &()| -> anyhow::Result<()> {
        activity_service.subscribe()?;
        Ok(())
    });

    if session.channel_id.is_some() {
        let mentions = mentions.clone();
        tokio::spawn(async move { mentions.on_page_open().await });
    }

    transport.connect();
    info!(
        user = %session.user_id,
        renovation = %session.renovation_id,
        channel = ?session.channel_id,
        "Client started"
    );

    ClientHandles {
        transport,
        session,
        channel,
        mentions,
        activity,
        chat,
        chat_events,
    }
}

impl<V, A> ClientHandles<V, A> {
    /// Stop the chat controller and close the broker connection.
    pub async fn shutdown(&self) {
        if let Some(events) = &self.chat_events {
            if events.send(ChatEvent::Shutdown).await.is_err() {
                warn!("Chat controller already stopped");
            }
        }
        self.transport.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    use mockito::Server;

    use homehelper_net::testing::LoopbackBroker;
    use homehelper_net::Command;
    use homehelper_shared::types::{ChannelId, RenovationId, UserId};

    use crate::api::HttpChatApi;
    use crate::chat::TranscriptView;

    async fn wait_for(mut cond: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_end_to_end_wiring() {
        let mut http = Server::new_async().await;
        let history = http
            .mock("GET", "/chat/8/history")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!([{
                    "id": 1,
                    "date": "2025-01-01T10:00:00Z",
                    "user": {"id": 2, "firstName": "Grace", "lastName": "Hopper", "image": ""},
                    "fragments": [{"type": "TEXT", "text": "morning"}],
                    "ai": false
                }])
                .to_string(),
            )
            .create_async()
            .await;
        let seen = http
            .mock("POST", "/mark-seen/8")
            .with_status(200)
            .create_async()
            .await;

        let mut broker = LoopbackBroker::start().await.unwrap();
        let config = ClientConfig {
            base_url: http.url(),
            broker_url: broker.url.clone(),
            user_id: UserId(1),
            renovation_id: RenovationId(3),
            channel_id: Some(ChannelId(8)),
            activity_items: vec![serde_json::from_value(serde_json::json!({
                "renovationId": 3,
                "renovationName": "Kitchen",
                "activityType": "TASK_ADDED",
                "timestamp": "2025-01-01T09:00:00Z",
                "taskId": 5,
                "taskName": "Tiling"
            }))
            .unwrap()],
            ..ClientConfig::default()
        };

        let handles = start_client(&config, HttpChatApi::from_config(&config), TranscriptView::new(300.0));
        let chat = handles.chat.clone().unwrap();

        let mut destinations = HashSet::new();
        while destinations.len() < 3 {
            let frame = broker.expect(Command::Subscribe).await;
            destinations.insert(frame.get("destination").unwrap_or_default().to_string());
        }
        assert!(destinations.contains("/topic/renovation/3/channel/8"));
        assert!(destinations.contains("/topic/mention/1"));
        assert!(destinations.contains("/topic/feed/1"));

        let watched = chat.clone();
        wait_for(move || watched.with_view(|v| v.message_ids() == vec![1])).await;
        history.assert_async().await;
        seen.assert_async().await;

        broker.publish(
            "/topic/renovation/3/channel/8",
            r#"{"id":2,"date":"2025-01-01T10:05:00Z","user":{"id":2,"firstName":"Grace"}}"#,
        );
        let watched = chat.clone();
        wait_for(move || watched.with_view(|v| v.message_ids() == vec![1, 2])).await;

        broker.publish(
            "/topic/mention/1",
            &serde_json::json!({
                "renovationDetails": {"id": 3, "name": "Kitchen"},
                "channelId": 9,
                "channelName": "plumbing",
                "sender": {"id": 2, "firstName": "Grace"},
                "messageContent": "@Ada look",
                "timestamp": "2025-01-01T10:06:00Z"
            })
            .to_string(),
        );
        let mentions = handles.mentions.clone();
        wait_for(move || mentions.snapshot().len() == 1).await;
        assert!(handles.mentions.snapshot().has_unread());

        broker.publish(
            "/topic/feed/1",
            r#"{"renovationId":3,"renovationName":"Kitchen","activityType":"BUDGET_EDITED","timestamp":"2025-01-01T10:07:00Z"}"#,
        );
        assert_eq!(handles.activity.lock().unwrap().len(), 1);
        let activity = handles.activity.clone();
        wait_for(move || activity.lock().unwrap().len() == 2).await;
        {
            let feed = handles.activity.lock().unwrap();
            let kinds: Vec<_> = feed.items().map(|i| i.activity_type.as_str()).collect();
            assert_eq!(kinds, vec!["BUDGET_EDITED", "TASK_ADDED"]);
        }

        handles
            .chat_events
            .as_ref()
            .unwrap()
            .send(ChatEvent::Send("  hello  ".into()))
            .await
            .unwrap();
        let send = broker.expect(Command::Send).await;
        let body: Value = serde_json::from_str(&send.body).unwrap();
        assert_eq!(body["content"], "hello");
        assert_eq!(body["channelId"], 8);

        handles.shutdown().await;
        broker.expect(Command::Disconnect).await;
    }
}
