//! Request dispatcher over a bridge channel
//!
//! Every request gets a fresh id and its own entry in the pending table.
//! A single reader task drains the channel, drops messages whose origin is
//! not the bridge's, and completes the pending entry the reply belongs to.
//! Replies that carry an id are matched by id; replies without one go to the
//! oldest pending request for the same action. A request that sees no reply
//! within the timeout is removed from the table and fails with
//! [`Error::Timeout`]. Dropping a request future also removes its entry.

use crate::channel::{BridgeChannel, DeviceTransport};
use crate::message::{bridge_origin, reply_action, BridgeReply, BridgeRequest, InboundMessage};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

struct Pending {
    reply_action: String,
    reply: oneshot::Sender<BridgeReply>,
}

type PendingTable = Arc<Mutex<BTreeMap<u64, Pending>>>;

/// Removes its request from the pending table when the caller stops waiting
struct PendingGuard {
    pending: PendingTable,
    id: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

/// Dispatcher that turns a bridge channel into a [`DeviceTransport`]
pub struct BridgeClient {
    channel: Arc<dyn BridgeChannel>,
    origin: String,
    timeout: Duration,
    next_id: AtomicU64,
    pending: PendingTable,
    reader: JoinHandle<()>,
}

impl BridgeClient {
    /// Start a dispatcher for the bridge served at `bridge_url`.
    ///
    /// Must be called inside a tokio runtime; the reader task is aborted
    /// when the client is dropped.
    pub fn new(channel: Arc<dyn BridgeChannel>, bridge_url: &str, timeout: Duration) -> Result<Self> {
        let inbound = channel
            .take_inbound()
            .ok_or_else(|| Error::Channel("Inbound stream already taken".to_string()))?;
        let origin = bridge_origin(bridge_url);
        let pending: PendingTable = Arc::new(Mutex::new(BTreeMap::new()));
        let reader = tokio::spawn(read_replies(inbound, origin.clone(), pending.clone()));

        debug!("Bridge client started for origin '{}'", origin);
        Ok(Self {
            channel,
            origin,
            timeout,
            next_id: AtomicU64::new(1),
            pending,
            reader,
        })
    }

    /// Origin replies must come from
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Number of requests awaiting a reply
    pub fn pending_requests(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_replies(
    mut inbound: mpsc::UnboundedReceiver<InboundMessage>,
    origin: String,
    pending: PendingTable,
) {
    while let Some(message) = inbound.recv().await {
        if message.origin != origin {
            trace!("Ignoring message from foreign origin '{}'", message.origin);
            continue;
        }

        let reply: BridgeReply = match serde_json::from_value(message.data) {
            Ok(reply) => reply,
            Err(e) => {
                trace!("Ignoring unrecognized bridge message: {}", e);
                continue;
            }
        };

        let mut table = pending.lock();
        let id = match reply.id {
            Some(id) => table
                .get(&id)
                .filter(|entry| entry.reply_action == reply.action)
                .map(|_| id),
            None => table
                .iter()
                .find(|(_, entry)| entry.reply_action == reply.action)
                .map(|(id, _)| *id),
        };

        match id.and_then(|id| table.remove(&id)) {
            Some(entry) => {
                // Receiver may already have timed out
                let _ = entry.reply.send(reply);
            }
            None => trace!("No pending request for '{}'", reply.action),
        }
    }
    debug!("Bridge channel closed");
}

#[async_trait]
impl DeviceTransport for BridgeClient {
    async fn request(&self, action: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(
            id,
            Pending {
                reply_action: reply_action(action),
                reply: tx,
            },
        );
        let _guard = PendingGuard {
            pending: self.pending.clone(),
            id,
        };

        let request = BridgeRequest::new(id, action, params);
        self.channel.post(&request).await?;
        debug!("Sent '{}' (id {})", action, id);

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(reply)) if reply.success => Ok(reply.payload),
            Ok(Ok(reply)) => Err(Error::Device(reply.error_text())),
            Ok(Err(_)) => Err(Error::Channel("Bridge reader stopped".to_string())),
            Err(_) => {
                warn!("No reply to '{}' (id {}) within {:?}", action, id, self.timeout);
                Err(Error::Timeout(format!(
                    "No reply to {action} within {}s",
                    self.timeout.as_secs()
                )))
            }
        }
    }
}
