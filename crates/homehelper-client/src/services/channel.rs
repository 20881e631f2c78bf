use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use homehelper_net::{Listener, ListenerSet, TransportManager};
use homehelper_shared::constants::OUTGOING_CHAT_DESTINATION;
use homehelper_shared::error::{TransportError, ValidationError};
use homehelper_shared::mentions::MemberRoster;
use homehelper_shared::protocol::OutgoingChatMessage;
use homehelper_shared::types::{ChannelId, RenovationId};
use homehelper_shared::validation::validate_chat_message;

use super::TopicFeed;

/// Chat traffic of one renovation's channels.
#[derive(Clone)]
pub struct ChannelService {
    feed: TopicFeed,
    subscribed: Arc<ListenerSet<()>>,
    renovation_id: RenovationId,
}

impl ChannelService {
    pub fn new(transport: TransportManager, renovation_id: RenovationId) -> Self {
        Self {
            feed: TopicFeed::new(transport, "channel_messages"),
            subscribed: Arc::new(ListenerSet::new("channel_subscribed")),
            renovation_id,
        }
    }

    /// Register a handler for every raw chat payload.
    pub fn on_message<L>(&self, handler: L)
    where
        L: Listener<Value> + 'static,
    {
        self.feed.register(handler);
    }

    /// Register a handler run once the channel subscription is in place.
    pub fn on_subscribed<L>(&self, handler: L)
    where
        L: Listener<()> + 'static,
    {
        self.subscribed.register(handler);
    }

    pub fn subscribe_to_channel(&self, channel_id: ChannelId) -> Result<String, TransportError> {
        let topic = channel_id.to_topic(self.renovation_id);
        let subscribed = self.subscribed.clone();
        self.feed.subscribe(&topic, |id| {
            info!(subscription = %id, topic = %topic, "Subscribed to channel");
            subscribed.dispatch(&());
        })
    }

    /// Publish `message`. Failures are logged, never returned.
    pub fn send_message(&self, message: &OutgoingChatMessage) {
        let transport = self.feed.transport();
        if !transport.is_connected() {
            warn!(
                channel = %message.channel_id,
                error = %TransportError::NotConnected,
                "Dropping outgoing message"
            );
            return;
        }

        match transport.publish(OUTGOING_CHAT_DESTINATION, message) {
            Ok(()) => debug!(
                channel = %message.channel_id,
                mentions = message.mentions.len(),
                "Message published"
            ),
            Err(e) => warn!(channel = %message.channel_id, error = %e, "Failed to publish message"),
        }
    }

    /// Validate composer input, resolve its mentions against `roster` and send it.
    pub fn send_text(
        &self,
        channel_id: ChannelId,
        text: &str,
        roster: &MemberRoster,
    ) -> Result<(), ValidationError> {
        let content = validate_chat_message(text)?;
        let message = OutgoingChatMessage {
            content: content.to_string(),
            channel_id,
            renovation_id: self.renovation_id,
            mentions: roster.mentions_in(content),
        };
        self.send_message(&message);
        Ok(())
    }
}
