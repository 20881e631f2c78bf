use chrono::{DateTime, Utc};
use serde_json::Value;

use homehelper_shared::types::Direction;

use crate::chat::Viewport;

/// Inbound events of one open chat, processed in order by `ChatController::run`.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// Raw payload pushed on the channel topic.
    Incoming(Value),
    /// The channel subscription is in place; time for the first load.
    Subscribed,
    Scrolled(Viewport),
    LoadMore(Direction),
    JumpTo(DateTime<Utc>),
    /// Composer input.
    Send(String),
    Shutdown,
}
