/// STOMP protocol version negotiated with the broker
pub const STOMP_VERSION: &str = "1.2";

/// Destination every outgoing chat message is published to
pub const OUTGOING_CHAT_DESTINATION: &str = "/app/chat";

/// Topic prefixes
pub const RENOVATION_TOPIC_PREFIX: &str = "/topic/renovation";
pub const MENTION_TOPIC_PREFIX: &str = "/topic/mention";
pub const FEED_TOPIC_PREFIX: &str = "/topic/feed";

/// Maximum chat message length, counted in characters
pub const MAX_MESSAGE_LENGTH: usize = 2048;

/// Distance in pixels from either scroll edge that triggers a lazy load
pub const LAZY_LOAD_THRESHOLD_PX: f64 = 700.0;

/// Slack in pixels when deciding whether the viewport sits at the bottom
pub const AT_BOTTOM_EPSILON_PX: f64 = 2.0;

/// Number of entries kept in the live activity feed
pub const ACTIVITY_FEED_LIMIT: usize = 10;

/// First name of the assistant member, always listed first in a roster
pub const ASSISTANT_FIRST_NAME: &str = "BrickAI";

/// Characters that may terminate an @mention besides whitespace
pub const MENTION_TERMINATORS: &[char] = &[
    '.', ',', ';', ':', '!', '?', '(', ')', '[', ']', '{', '}', '<', '>', '@',
];
