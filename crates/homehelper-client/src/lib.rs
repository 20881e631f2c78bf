// Real-time chat client: live delivery, bidirectional pagination, mentions
// and the activity feed of a renovation workspace.

pub mod activity;
pub mod api;
pub mod bridge;
pub mod chat;
pub mod config;
pub mod events;
pub mod mentions;
pub mod services;
pub mod state;

use tracing_subscriber::{fmt, EnvFilter};

pub use activity::{ActivityFeed, ActivityItemExt, ActivityKind};
pub use api::{ChatApi, Cursor, HttpChatApi};
pub use bridge::{start_client, ClientHandles};
pub use chat::{ChatController, ChatSettings, ChatView, TranscriptView};
pub use config::ClientConfig;
pub use events::ChatEvent;
pub use mentions::{MentionController, MentionInbox};
pub use state::SessionContext;

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("homehelper_client=debug,homehelper_net=debug,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
