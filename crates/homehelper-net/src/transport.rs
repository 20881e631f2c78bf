//! The transport manager: one broker connection shared by every service.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use homehelper_shared::error::{HomeHelperError, TransportError};

use crate::connection::{
    spawn_connection, ConnectionCommand, ConnectionConfig, ConnectionNotification,
};
use crate::listeners::{Listener, ListenerSet};
use crate::messages::encode_payload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Connecting,
    Connected,
}

struct Link {
    phase: Phase,
    cmd_tx: Option<mpsc::UnboundedSender<ConnectionCommand>>,
}

struct Inner {
    config: ConnectionConfig,
    link: Mutex<Link>,
    connected: AtomicBool,
    on_connect: ListenerSet<()>,
    next_subscription: AtomicU64,
}

impl Inner {
    fn link(&self) -> MutexGuard<'_, Link> {
        match self.link.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Owns the single publish-subscribe connection.
///
/// Cheap to clone; all clones share the same connection. Reconnection is not
/// attempted: after a disconnect `is_connected()` stays false until `connect`
/// is called again.
#[derive(Clone)]
pub struct TransportManager {
    inner: Arc<Inner>,
}

impl TransportManager {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                link: Mutex::new(Link {
                    phase: Phase::Idle,
                    cmd_tx: None,
                }),
                connected: AtomicBool::new(false),
                on_connect: ListenerSet::new("on_connect"),
                next_subscription: AtomicU64::new(0),
            }),
        }
    }

    /// Open the broker connection. No-op while connecting or connected.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) {
        let mut link = self.inner.link();
        if link.phase != Phase::Idle {
            debug!(phase = ?link.phase, "connect() ignored, connection already active");
            return;
        }

        info!(url = %self.inner.config.broker_url, "Connecting to broker");
        let (cmd_tx, notif_rx) = spawn_connection(self.inner.config.clone());
        link.phase = Phase::Connecting;
        link.cmd_tx = Some(cmd_tx);
        drop(link);

        tokio::spawn(notification_loop(self.inner.clone(), notif_rx));
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Register a handler run once per successful connection, after every
    /// previously registered handler.
    pub fn on_connect<L>(&self, handler: L)
    where
        L: Listener<()> + 'static,
    {
        self.inner.on_connect.register(handler);
    }

    /// Subscribe to `destination`.
    ///
    /// `on_message` receives every inbound payload already decoded from JSON;
    /// undecodable frames are logged and skipped. `on_subscribed` runs once
    /// with the subscription id after the request has been queued.
    pub fn subscribe<S, L>(
        &self,
        destination: &str,
        on_subscribed: S,
        on_message: L,
    ) -> Result<String, TransportError>
    where
        S: FnOnce(&str),
        L: Listener<Value> + 'static,
    {
        let cmd_tx = self.ready_sender()?;
        let id = format!(
            "sub-{}",
            self.inner.next_subscription.fetch_add(1, Ordering::SeqCst)
        );

        cmd_tx
            .send(ConnectionCommand::Subscribe {
                id: id.clone(),
                destination: destination.to_string(),
                handler: Arc::new(on_message),
            })
            .map_err(|_| TransportError::Closed)?;

        debug!(id = %id, destination = %destination, "Subscription requested");
        on_subscribed(&id);
        Ok(id)
    }

    /// Serialize `payload` to JSON and send it to `destination`.
    pub fn publish<T>(&self, destination: &str, payload: &T) -> Result<(), HomeHelperError>
    where
        T: Serialize + ?Sized,
    {
        let cmd_tx = self.ready_sender()?;
        let body = encode_payload(payload)?;
        cmd_tx
            .send(ConnectionCommand::Publish {
                destination: destination.to_string(),
                body,
            })
            .map_err(|_| TransportError::Closed)?;
        Ok(())
    }

    /// Send DISCONNECT and close the socket.
    pub fn disconnect(&self) {
        let link = self.inner.link();
        if let Some(cmd_tx) = &link.cmd_tx {
            let _ = cmd_tx.send(ConnectionCommand::Shutdown);
        }
    }

    fn ready_sender(&self) -> Result<mpsc::UnboundedSender<ConnectionCommand>, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let link = self.inner.link();
        match (&link.phase, &link.cmd_tx) {
            (Phase::Connected, Some(tx)) => Ok(tx.clone()),
            _ => Err(TransportError::NotConnected),
        }
    }
}

async fn notification_loop(inner: Arc<Inner>, mut notif_rx: mpsc::Receiver<ConnectionNotification>) {
    while let Some(notification) = notif_rx.recv().await {
        match notification {
            ConnectionNotification::Connected { server } => {
                inner.link().phase = Phase::Connected;
                inner.connected.store(true, Ordering::SeqCst);
                info!(server = ?server, "Socket connected");

                let handlers = inner.on_connect.len();
                let ok = inner.on_connect.dispatch(&());
                debug!(handlers, ok, "Connect handlers invoked");
            }
            ConnectionNotification::Disconnected { error } => {
                inner.connected.store(false, Ordering::SeqCst);
                let mut link = inner.link();
                link.phase = Phase::Idle;
                link.cmd_tx = None;
                match error {
                    Some(e) => warn!(error = %e, "Socket closed"),
                    None => info!("Socket closed"),
                }
            }
        }
    }
}
