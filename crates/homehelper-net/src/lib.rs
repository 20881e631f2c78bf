// Publish-subscribe transport: STOMP 1.2 over a WebSocket, driven by a tokio task.

pub mod connection;
pub mod listeners;
pub mod messages;
pub mod stomp;
pub mod subscriptions;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use connection::{spawn_connection, ConnectionCommand, ConnectionConfig, ConnectionNotification};
pub use listeners::{Listener, ListenerSet};
pub use messages::{decode_payload, dispatch_message, encode_payload};
pub use stomp::{Command, Frame};
pub use subscriptions::{Subscription, SubscriptionTracker};
pub use transport::TransportManager;
