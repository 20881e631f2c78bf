use serde::{Deserialize, Serialize};

use crate::constants::{FEED_TOPIC_PREFIX, MENTION_TOPIC_PREFIX, RENOVATION_TOPIC_PREFIX};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    /// Topic carrying mention notifications addressed to this user.
    pub fn mention_topic(&self) -> String {
        format!("{MENTION_TOPIC_PREFIX}/{}", self.0)
    }

    /// Topic carrying live activity for renovations this user belongs to.
    pub fn feed_topic(&self) -> String {
        format!("{FEED_TOPIC_PREFIX}/{}", self.0)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct RenovationId(pub i64);

impl std::fmt::Display for RenovationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ChannelId(pub i64);

impl ChannelId {
    pub fn to_topic(&self, renovation_id: RenovationId) -> String {
        format!("{RENOVATION_TOPIC_PREFIX}/{renovation_id}/channel/{}", self.0)
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pagination direction relative to the rendered window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Older messages, above the top cursor.
    Previous,
    /// Newer messages, below the bottom cursor.
    Next,
}

impl Direction {
    pub fn as_path(&self) -> &'static str {
        match self {
            Direction::Previous => "previous",
            Direction::Next => "next",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topics() {
        assert_eq!(
            ChannelId(7).to_topic(RenovationId(3)),
            "/topic/renovation/3/channel/7"
        );
        assert_eq!(UserId(12).mention_topic(), "/topic/mention/12");
        assert_eq!(UserId(12).feed_topic(), "/topic/feed/12");
    }

    #[test]
    fn test_ids_are_transparent_on_the_wire() {
        let json = serde_json::to_string(&ChannelId(42)).unwrap();
        assert_eq!(json, "42");
        let id: UserId = serde_json::from_str("9").unwrap();
        assert_eq!(id, UserId(9));
    }
}
