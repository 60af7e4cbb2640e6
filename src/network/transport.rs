// Outbound calls from one ledger node to another. The ledger only sees the
// `PeerTransport` trait; the HTTP implementation below speaks the same routes
// the facade in `server.rs` serves.

use crate::core::{Block, ChainSnapshot, TransactionRequest};
use crate::error::{BlockchainError, Result};
use crate::network::server::{AmountResponse, ErrorResponse};
use log::debug;
use reqwest::blocking::{Client, Response};
use std::time::Duration;

/// Default bound on a single peer call
pub const PEER_TIMEOUT: Duration = Duration::from_millis(3000);

/// One-way notifications a node sends to its neighbors.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerMessage {
    /// A block was mined; drop your pending pool
    ClearPool,
    /// A block was mined; go check for a longer chain
    TriggerConsensus,
    /// Admit this signed request locally
    RelayTransaction(TransactionRequest),
}

impl PeerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            PeerMessage::ClearPool => "clear-pool",
            PeerMessage::TriggerConsensus => "trigger-consensus",
            PeerMessage::RelayTransaction(_) => "relay-transaction",
        }
    }
}

/// How a ledger reaches its neighbors. Every call is a single attempt.
pub trait PeerTransport: Send + Sync {
    /// Fetches the peer's full committed chain.
    fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>>;

    /// Delivers one notification and waits for the peer to accept it.
    fn deliver(&self, peer: &str, message: &PeerMessage) -> Result<()>;
}

/// `PeerTransport` over the nodes' HTTP facade using a blocking client.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<HttpTransport> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(HttpTransport { client })
    }

    fn url(peer: &str, path: &str) -> String {
        format!("http://{peer}{path}")
    }

    /// Submits a request to a node the way a wallet does, triggering relay.
    pub fn post_transaction(&self, node: &str, request: &TransactionRequest) -> Result<()> {
        let response = self
            .client
            .post(Self::url(node, "/transactions"))
            .json(request)
            .send()
            .map_err(|e| unreachable(node, e))?;
        check_status(node, response).map(|_| ())
    }

    /// Asks a node for the committed balance of `address`.
    pub fn fetch_balance(&self, node: &str, address: &str) -> Result<f32> {
        let response = self
            .client
            .get(Self::url(node, "/amount"))
            .query(&[("blockchain_address", address)])
            .send()
            .map_err(|e| unreachable(node, e))?;
        let amount: AmountResponse = check_status(node, response)?
            .json()
            .map_err(|e| unreachable(node, e))?;
        Ok(amount.amount)
    }

    /// Fetches the node's whole chain view, pool and mining address included.
    pub fn fetch_snapshot(&self, peer: &str) -> Result<ChainSnapshot> {
        let response = self
            .client
            .get(Self::url(peer, "/chain"))
            .send()
            .map_err(|e| unreachable(peer, e))?;
        check_status(peer, response)?
            .json()
            .map_err(|e| unreachable(peer, e))
    }
}

impl PeerTransport for HttpTransport {
    fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>> {
        Ok(self.fetch_snapshot(peer)?.chain)
    }

    fn deliver(&self, peer: &str, message: &PeerMessage) -> Result<()> {
        let builder = match message {
            PeerMessage::ClearPool => self.client.delete(Self::url(peer, "/transactions")),
            PeerMessage::TriggerConsensus => self.client.put(Self::url(peer, "/consensus")),
            PeerMessage::RelayTransaction(request) => self
                .client
                .put(Self::url(peer, "/transactions"))
                .json(request),
        };
        let response = builder.send().map_err(|e| unreachable(peer, e))?;
        check_status(peer, response)?;
        debug!("Delivered {} to {peer}", message.kind());
        Ok(())
    }
}

fn unreachable(peer: &str, e: reqwest::Error) -> BlockchainError {
    BlockchainError::PeerUnreachable {
        peer: peer.to_string(),
        reason: e.to_string(),
    }
}

// Non-2xx answers carry `{"error": ...}`; surface that message when present.
fn check_status(peer: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let reason = match response.json::<ErrorResponse>() {
        Ok(body) => format!("{status}: {}", body.error),
        Err(_) => status.to_string(),
    };
    Err(BlockchainError::Network(format!("{peer} answered {reason}")))
}
