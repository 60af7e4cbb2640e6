// Fire-and-forget gossip. A single background thread drains a bounded queue
// of outbound messages; a message that finds the queue full is dropped and
// logged, the same as a failed delivery.

use crate::error::Result;
use crate::network::transport::{PeerMessage, PeerTransport};
use log::{debug, warn};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;

/// Messages that may wait for the gossip thread at once
pub const GOSSIP_QUEUE_LEN: usize = 64;

struct Outbound {
    peers: Vec<String>,
    message: PeerMessage,
}

/// Handle to the gossip thread. The thread exits once the handle is dropped
/// and the queue has drained.
pub struct GossipQueue {
    queue: SyncSender<Outbound>,
}

impl GossipQueue {
    pub fn start(transport: Arc<dyn PeerTransport>) -> Result<GossipQueue> {
        let (queue, outbound) = mpsc::sync_channel::<Outbound>(GOSSIP_QUEUE_LEN);
        thread::Builder::new()
            .name("gossip".to_string())
            .spawn(move || {
                for Outbound { peers, message } in outbound {
                    broadcast(transport.as_ref(), &peers, &message);
                }
                debug!("Gossip thread stopped");
            })?;
        Ok(GossipQueue { queue })
    }

    /// Queues `message` for every peer in `peers`. Returns false when the
    /// message was dropped instead.
    pub fn enqueue(&self, peers: Vec<String>, message: PeerMessage) -> bool {
        match self.queue.try_send(Outbound { peers, message }) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                warn!("Gossip queue full, dropping {}", dropped.message.kind());
                false
            }
            Err(TrySendError::Disconnected(dropped)) => {
                warn!("Gossip thread gone, dropping {}", dropped.message.kind());
                false
            }
        }
    }
}

/// Sends `message` to each peer in turn, once, dropping failures.
pub fn broadcast(transport: &dyn PeerTransport, peers: &[String], message: &PeerMessage) {
    for peer in peers {
        if let Err(e) = transport.deliver(peer, message) {
            warn!("Failed to deliver {} to {peer}: {e}", message.kind());
        }
    }
}
