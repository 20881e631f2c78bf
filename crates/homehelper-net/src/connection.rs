//! Broker connection task with the command/notification pattern.
//!
//! The STOMP session runs in a dedicated tokio task. The transport manager
//! talks to it through a command channel and learns about connection state
//! changes through a notification channel. Inbound `MESSAGE` frames are routed
//! to their subscription handler inside the task.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use homehelper_shared::error::TransportError;

use crate::listeners::Listener;
use crate::messages::dispatch_message;
use crate::stomp::{Command, Frame};
use crate::subscriptions::SubscriptionTracker;

/// Commands sent *into* the connection task.
pub enum ConnectionCommand {
    /// Open a subscription on the broker and route its messages to `handler`.
    Subscribe {
        id: String,
        destination: String,
        handler: Arc<dyn Listener<Value>>,
    },
    /// Send a JSON body to a destination.
    Publish { destination: String, body: String },
    /// Send DISCONNECT and close the socket.
    Shutdown,
}

impl std::fmt::Debug for ConnectionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionCommand::Subscribe { id, destination, .. } => f
                .debug_struct("Subscribe")
                .field("id", id)
                .field("destination", destination)
                .finish_non_exhaustive(),
            ConnectionCommand::Publish { destination, body } => f
                .debug_struct("Publish")
                .field("destination", destination)
                .field("len", &body.len())
                .finish(),
            ConnectionCommand::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Notifications sent *from* the connection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionNotification {
    /// The broker accepted the STOMP session.
    Connected { server: Option<String> },
    /// The session ended. `error` is `None` after a requested shutdown. No
    /// reconnect is attempted.
    Disconnected { error: Option<TransportError> },
}

/// Configuration for spawning a broker connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL of the STOMP endpoint, e.g. `ws://localhost:8080/ws`.
    pub broker_url: String,
    /// Value of the STOMP `host` header.
    pub host: String,
}

impl ConnectionConfig {
    pub fn new(broker_url: impl Into<String>) -> Self {
        let broker_url = broker_url.into();
        let host = host_of(&broker_url);
        Self { broker_url, host }
    }
}

/// Spawn the broker session in a background tokio task.
///
/// Returns `(command_tx, notification_rx)`. Commands sent before the broker
/// answers `CONNECTED` are queued behind the `CONNECT` frame.
pub fn spawn_connection(
    config: ConnectionConfig,
) -> (
    mpsc::UnboundedSender<ConnectionCommand>,
    mpsc::Receiver<ConnectionNotification>,
) {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<ConnectionCommand>();
    let (notif_tx, notif_rx) = mpsc::channel::<ConnectionNotification>(16);

    tokio::spawn(async move {
        let ws = match connect_async(config.broker_url.as_str()).await {
            Ok((ws, _resp)) => ws,
            Err(e) => {
                error!(url = %config.broker_url, error = %e, "WebSocket connect failed");
                let _ = notif_tx
                    .send(ConnectionNotification::Disconnected {
                        error: Some(TransportError::Handshake(e.to_string())),
                    })
                    .await;
                return;
            }
        };
        debug!(url = %config.broker_url, "WebSocket open, sending CONNECT");

        let (mut sink, mut stream) = ws.split();
        if let Err(e) = sink
            .send(Message::Text(Frame::connect(&config.host).encode()))
            .await
        {
            error!(error = %e, "Failed to send CONNECT frame");
            let _ = notif_tx
                .send(ConnectionNotification::Disconnected {
                    error: Some(TransportError::Handshake(e.to_string())),
                })
                .await;
            return;
        }

        let mut subscriptions = SubscriptionTracker::new();
        let outcome: Option<TransportError>;

        loop {
            tokio::select! {
                // --- Outgoing commands ---
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(ConnectionCommand::Subscribe { id, destination, handler }) => {
                            let frame = Frame::subscribe(&id, &destination);
                            subscriptions.on_subscribed(id.clone(), destination.clone(), handler);
                            if let Err(e) = sink.send(Message::Text(frame.encode())).await {
                                error!(id = %id, destination = %destination, error = %e, "Subscribe failed");
                            }
                        }
                        Some(ConnectionCommand::Publish { destination, body }) => {
                            let len = body.len();
                            let frame = Frame::send_json(&destination, body);
                            if let Err(e) = sink.send(Message::Text(frame.encode())).await {
                                error!(destination = %destination, error = %e, "Publish failed");
                            } else {
                                debug!(destination = %destination, len, "Published");
                            }
                        }
                        Some(ConnectionCommand::Shutdown) => {
                            info!("Broker shutdown requested");
                            let _ = sink.send(Message::Text(Frame::disconnect().encode())).await;
                            let _ = sink.close().await;
                            outcome = None;
                            break;
                        }
                        None => {
                            info!("Command channel closed, closing broker session");
                            let _ = sink.close().await;
                            outcome = None;
                            break;
                        }
                    }
                }

                // --- Inbound WebSocket traffic ---
                msg = stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let frames = match Frame::decode_all(&text) {
                                Ok(frames) => frames,
                                Err(e) => {
                                    warn!(error = %e, "Dropping undecodable frame");
                                    continue;
                                }
                            };
                            let mut fatal = None;
                            for frame in frames {
                                match frame.command {
                                    Command::Connected => {
                                        let server = frame.get("server").map(str::to_string);
                                        info!(server = ?server, version = ?frame.get("version"), "Broker session established");
                                        let _ = notif_tx
                                            .send(ConnectionNotification::Connected { server })
                                            .await;
                                    }
                                    Command::Message => dispatch_message(&subscriptions, &frame),
                                    Command::Error => {
                                        let message = frame.get("message").unwrap_or("unknown").to_string();
                                        error!(message = %message, body = %frame.body, "Broker sent ERROR");
                                        fatal = Some(message);
                                    }
                                    Command::Receipt => {
                                        debug!(receipt = ?frame.get("receipt-id"), "Receipt");
                                    }
                                    other => {
                                        debug!(command = other.as_str(), "Ignoring unexpected frame");
                                    }
                                }
                            }
                            if let Some(message) = fatal {
                                outcome = Some(TransportError::Broker(message));
                                break;
                            }
                        }
                        Some(Ok(Message::Close(close))) => {
                            info!(frame = ?close, "Broker closed the socket");
                            outcome = Some(TransportError::Closed);
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(error = %e, "WebSocket error");
                            outcome = Some(TransportError::Closed);
                            break;
                        }
                        None => {
                            outcome = Some(TransportError::Closed);
                            break;
                        }
                    }
                }
            }
        }

        debug!(count = subscriptions.count(), "Dropping subscriptions");
        subscriptions.clear();
        let _ = notif_tx
            .send(ConnectionNotification::Disconnected { error: outcome })
            .await;
        info!("Broker session terminated");
    });

    (cmd_tx, notif_rx)
}

/// Host part of a ws/wss URL, with port when present.
fn host_of(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split(&['/', '?'][..]).next().unwrap_or(rest).to_string()
}
