// Wire types, topic naming and pure helpers shared by the HomeHelper chat crates.

pub mod constants;
pub mod dates;
pub mod error;
pub mod mentions;
pub mod protocol;
pub mod types;
pub mod validation;

pub use error::{FetchError, HomeHelperError, TransportError, ValidationError};
pub use mentions::{Member, MemberRoster};
pub use protocol::{
    ActivityItem, ChatMessage, ChatUser, Fragment, Mention, MentionNotification,
    OutgoingChatMessage, RenovationDetails,
};
pub use types::{ChannelId, Direction, MessageId, RenovationId, UserId};
pub use validation::validate_chat_message;
