use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ChannelId, MessageId, RenovationId, UserId};

/// A chat message as delivered by the broker and by the history endpoints.
/// Immutable once received.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub date: DateTime<Utc>,
    pub user: ChatUser,
    #[serde(default)]
    pub fragments: Vec<Fragment>,
    #[serde(default)]
    pub ai: bool,
}

impl ChatMessage {
    /// Decode a message from an already-parsed JSON payload.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Concatenated display text of all fragments.
    pub fn plain_text(&self) -> String {
        self.fragments.iter().map(Fragment::text).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatUser {
    pub id: UserId,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub image: String,
}

impl ChatUser {
    pub fn full_name(&self) -> String {
        if self.last_name.is_empty() {
            self.first_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }
}

/// A typed span of a message body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Fragment {
    Text {
        text: String,
    },
    Mention {
        text: String,
        #[serde(rename = "mentionedUserId", default)]
        mentioned_user_id: Option<UserId>,
        #[serde(rename = "mentionedUserName", default)]
        mentioned_user_name: Option<String>,
    },
    Link {
        text: String,
        link: String,
    },
}

impl Fragment {
    pub fn text(&self) -> &str {
        match self {
            Fragment::Text { text } | Fragment::Mention { text, .. } | Fragment::Link { text, .. } => {
                text.as_str()
            }
        }
    }
}

/// Reference to a member mentioned in the raw text of an outgoing message.
///
/// Positions are character indices into the text they were computed from;
/// `start_position` is the index of the `@`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Mention {
    pub user_id: UserId,
    pub start_position: usize,
    pub end_position: usize,
}

/// Body published to the outgoing chat destination.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingChatMessage {
    pub content: String,
    pub channel_id: ChannelId,
    pub renovation_id: RenovationId,
    pub mentions: Vec<Mention>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenovationDetails {
    pub id: RenovationId,
    pub name: String,
}

/// Notification that the current user was mentioned somewhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MentionNotification {
    pub renovation_details: RenovationDetails,
    pub channel_id: ChannelId,
    pub channel_name: String,
    pub sender: ChatUser,
    pub message_content: String,
    pub timestamp: DateTime<Utc>,
}

/// One entry of the live activity feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    pub renovation_id: RenovationId,
    pub renovation_name: String,
    pub activity_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub task_id: Option<i64>,
    #[serde(default)]
    pub task_name: Option<String>,
    #[serde(default)]
    pub expense_id: Option<i64>,
    #[serde(default)]
    pub expense_name: Option<String>,
    #[serde(default)]
    pub expense_amount: Option<f64>,
    #[serde(default)]
    pub old_state: Option<String>,
    #[serde(default)]
    pub new_state: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_message_with_fragments() {
        let raw = serde_json::json!({
            "id": 11,
            "date": "2025-01-02T09:00:00Z",
            "user": {"id": 4, "firstName": "Ada", "lastName": "Lovelace", "image": "img/ada.png"},
            "fragments": [
                {"type": "TEXT", "text": "hey "},
                {"type": "MENTION", "text": "@Bob Smith", "mentionedUserId": 5, "mentionedUserName": "Bob Smith"},
                {"type": "LINK", "text": "docs", "link": "https://example.org"}
            ],
            "ai": false
        });

        let msg = ChatMessage::from_value(raw).unwrap();
        assert_eq!(msg.id, MessageId(11));
        assert_eq!(msg.user.full_name(), "Ada Lovelace");
        assert_eq!(msg.plain_text(), "hey @Bob Smithdocs");
        assert!(matches!(
            &msg.fragments[1],
            Fragment::Mention { mentioned_user_id: Some(UserId(5)), .. }
        ));
    }

    #[test]
    fn test_decode_rejects_missing_date() {
        let raw = serde_json::json!({"id": 1, "user": {"id": 1, "firstName": "A"}});
        assert!(ChatMessage::from_value(raw).is_err());
    }

    #[test]
    fn test_outgoing_message_shape() {
        let out = OutgoingChatMessage {
            content: "@Bob hi".into(),
            channel_id: ChannelId(2),
            renovation_id: RenovationId(1),
            mentions: vec![Mention {
                user_id: UserId(5),
                start_position: 0,
                end_position: 3,
            }],
        };

        let value = serde_json::to_value(&out).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "content": "@Bob hi",
                "channelId": 2,
                "renovationId": 1,
                "mentions": [{"userId": 5, "startPosition": 0, "endPosition": 3}]
            })
        );
    }

    #[test]
    fn test_decode_mention_notification() {
        let raw = serde_json::json!({
            "renovationDetails": {"id": 3, "name": "Kitchen"},
            "channelId": 8,
            "channelName": "general",
            "sender": {"id": 2, "firstName": "Bob", "lastName": "Smith", "email": "b@x.nz", "image": "b.png"},
            "messageContent": "@Ada look",
            "timestamp": "2025-03-01T10:00:00.123Z"
        });

        let n: MentionNotification = serde_json::from_value(raw).unwrap();
        assert_eq!(n.channel_id, ChannelId(8));
        assert_eq!(n.renovation_details.name, "Kitchen");
        assert_eq!(n.sender.full_name(), "Bob Smith");
    }
}
