//! Identity-keyed table of live push channels.
//!
//! The registry maps each connected client to the sending half of its
//! outbound queue. It never owns a socket: dropping an entry only drops a
//! handle, and the session task that owns the socket notices and closes it.
//! Each queued text carries a reply slot, so a push resolves only once the
//! socket write has succeeded or failed.

use std::{
    collections::HashMap,
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
};

use thiserror::Error;
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, info, warn};

pub type Identity = String;
pub type ConnectionId = u64;

/// One text waiting to be written, plus where to report the write result.
#[derive(Debug)]
pub struct Outbound {
    pub text: String,
    pub written: oneshot::Sender<Result<(), ChannelClosed>>,
}

/// Queue feeding a WebSocket session's writer task.
#[derive(Debug, Clone)]
pub struct OutboundSender(mpsc::UnboundedSender<Outbound>);

pub type OutboundReceiver = mpsc::UnboundedReceiver<Outbound>;

pub fn outbound_channel() -> (OutboundSender, OutboundReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (OutboundSender(tx), rx)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    NoSuchRecipient,
    DeliveryFailed,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("push channel closed")]
pub struct ChannelClosed;

/// A handle that can push text to one live connection.
///
/// Implementations must be cheap to clone: the registry clones the handle out
/// of its table so that the push itself runs without the lock held.
pub trait Channel: Clone + Send + Sync + 'static {
    fn push(&self, body: String) -> impl Future<Output = Result<(), ChannelClosed>> + Send;
}

impl Channel for OutboundSender {
    async fn push(&self, body: String) -> Result<(), ChannelClosed> {
        let (written, result) = oneshot::channel();
        self.0
            .send(Outbound { text: body, written })
            .map_err(|_| ChannelClosed)?;
        // A writer that exits without answering never wrote the text.
        result.await.unwrap_or(Err(ChannelClosed))
    }
}

impl Channel for mpsc::UnboundedSender<String> {
    async fn push(&self, body: String) -> Result<(), ChannelClosed> {
        self.send(body).map_err(|_| ChannelClosed)
    }
}

impl Channel for mpsc::Sender<String> {
    async fn push(&self, body: String) -> Result<(), ChannelClosed> {
        self.send(body).await.map_err(|_| ChannelClosed)
    }
}

struct Connection<C> {
    id: ConnectionId,
    channel: C,
}

pub struct ConnectionRegistry<C = OutboundSender> {
    connections: Mutex<HashMap<Identity, Connection<C>>>,
    next_id: AtomicU64,
}

impl<C: Channel> Default for ConnectionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Channel> ConnectionRegistry<C> {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> ConnectionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Binds `identity` to `channel`, replacing any earlier connection.
    ///
    /// The replaced channel is only dropped, not closed. Its session sees the
    /// queue lose its last producer and shuts the socket down itself.
    pub async fn connect(&self, identity: Identity, channel: C) -> ConnectionId {
        let id = self.next_id();
        let mut connections = self.connections.lock().await;
        let replaced = connections
            .insert(identity.clone(), Connection { id, channel })
            .is_some();
        let connected = connections.len();
        drop(connections);

        info!(%identity, connection_id = id, replaced, connected, "client connected");
        id
    }

    /// Removes whatever connection is bound to `identity`.
    ///
    /// Safe to call for unknown identities and safe to repeat. Returns whether
    /// an entry was actually removed.
    pub async fn disconnect(&self, identity: &str) -> bool {
        let removed = self.connections.lock().await.remove(identity);
        match removed {
            Some(Connection { id, .. }) => {
                info!(identity, connection_id = id, "client disconnected");
                true
            }
            None => false,
        }
    }

    /// Removes the entry for `identity` only if it still belongs to `id`.
    ///
    /// A connection that was superseded by a reconnect must not evict its
    /// replacement when it finally closes or fails.
    pub async fn release(&self, identity: &str, id: ConnectionId) -> bool {
        let mut connections = self.connections.lock().await;
        if connections.get(identity).is_none_or(|current| current.id != id) {
            return false;
        }
        connections.remove(identity);
        drop(connections);

        info!(identity, connection_id = id, "client disconnected");
        true
    }

    /// Pushes `body` verbatim to the connection bound to `receiver`.
    ///
    /// Attempts delivery exactly once. A failed push removes the dead entry
    /// before returning [`DeliveryOutcome::DeliveryFailed`].
    pub async fn send(&self, receiver: &str, body: String) -> DeliveryOutcome {
        let target = self
            .connections
            .lock()
            .await
            .get(receiver)
            .map(|connection| (connection.id, connection.channel.clone()));

        let Some((id, channel)) = target else {
            warn!(receiver, "recipient is not connected; message dropped");
            return DeliveryOutcome::NoSuchRecipient;
        };

        match channel.push(body).await {
            Ok(()) => {
                debug!(receiver, connection_id = id, "message delivered");
                DeliveryOutcome::Delivered
            }
            Err(error) => {
                warn!(receiver, connection_id = id, %error, "push failed; dropping connection");
                self.release(receiver, id).await;
                DeliveryOutcome::DeliveryFailed
            }
        }
    }

    pub async fn contains(&self, identity: &str) -> bool {
        self.connections.lock().await.contains_key(identity)
    }

    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.lock().await.is_empty()
    }

    /// Sorted snapshot of the connected identities.
    pub async fn identities(&self) -> Vec<Identity> {
        let mut identities: Vec<_> = self.connections.lock().await.keys().cloned().collect();
        identities.sort();
        identities
    }

    /// Drops every registered channel and returns how many were removed.
    pub async fn close_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.connections.lock().await);
        let count = drained.len();
        if count > 0 {
            info!(count, "closing all connections");
        }
        count
    }
}
