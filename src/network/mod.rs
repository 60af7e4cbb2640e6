//! Peer-to-peer networking
//!
//! This module handles everything between ledger nodes: the neighbor set,
//! local-network discovery, a bounded best-effort gossip queue, the HTTP facade
//! each node serves, and the background loops of a running node.

pub mod discovery;
pub mod gossip;
pub mod neighbors;
pub mod node;
pub mod server;
pub mod transport;

pub use discovery::{is_reachable, NeighborScanner};
pub use gossip::{broadcast, GossipQueue, GOSSIP_QUEUE_LEN};
pub use neighbors::Neighbors;
pub use node::{build_blockchain, build_scanner, resolve_miner, Node};
pub use server::{
    route, AmountResponse, ApiResponse, ApiServer, ErrorResponse, ServerHandle, DEFAULT_WORKERS,
};
pub use transport::{HttpTransport, PeerMessage, PeerTransport, PEER_TIMEOUT};
