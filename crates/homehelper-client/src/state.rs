//! Session context shared by the services and controllers.
//!
//! Everything the chat page used to read from page globals travels here and
//! is handed to constructors explicitly.

use chrono::{DateTime, FixedOffset, Utc};

use homehelper_shared::mentions::MemberRoster;
use homehelper_shared::types::{ChannelId, RenovationId, UserId};

use crate::config::ClientConfig;

#[derive(Debug, Clone)]
pub struct SessionContext {
    /// The authenticated user. Their own messages always scroll into view.
    pub user_id: UserId,

    pub renovation_id: RenovationId,

    /// The open chat channel, `None` outside a chat page.
    pub channel_id: Option<ChannelId>,

    /// Members of the open channel in mention precedence order.
    pub roster: MemberRoster,

    /// Jump target for the first load of the open channel.
    pub mention_time: Option<DateTime<Utc>>,

    /// Offset used for date separators and labels.
    pub utc_offset: FixedOffset,
}

impl SessionContext {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            user_id: config.user_id,
            renovation_id: config.renovation_id,
            channel_id: config.channel_id,
            roster: MemberRoster::new(config.members.clone()),
            mention_time: config.mention_time,
            utc_offset: config.utc_offset,
        }
    }

    /// Whether `channel_id` is the chat currently open on screen.
    pub fn is_viewing(&self, channel_id: ChannelId) -> bool {
        self.channel_id == Some(channel_id)
    }
}
