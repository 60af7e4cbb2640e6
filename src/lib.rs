//! # Fidelity Ledger - A Small Proof-of-Work Ledger
//!
//! A loyalty ledger where purchases paid in outside currencies mint native
//! `FC` coins, and every node mines, gossips and converges on the longest
//! valid chain among its neighbors.
//!
//! ## What It Does
//! - **Ledger**: an in-memory chain plus a pool of pending transactions
//! - **Admission Control**: signatures over `{product, currency, value}`,
//!   one pending transaction per sender, balance checks in `FC`
//! - **Proof of Work**: leading-zero hex digits on a canonical JSON block hash
//! - **Consensus**: adopt the longest valid chain any neighbor serves
//! - **Gossip**: best-effort HTTP notifications after mining and relaying
//! - **Wallets**: ECDSA P-256 key pairs with Bitcoin-style base58 addresses
//!
//! ## How The Code Is Organized
//! - `core/`: transactions, blocks, proof of work, consensus, ledger state
//! - `wallet/`: key pairs, signing, address derivation
//! - `network/`: neighbors, discovery, gossip queue, peer transport, HTTP facade, node loops
//! - `config/`: node settings from TOML, environment and flags
//! - `utils/`: hashing, base58, ECDSA helpers, canonical JSON formatter
//! - `cli/`: command-line interface
//!
//! ## Where To Start
//! 1. `main.rs` for the CLI commands
//! 2. `core/blockchain.rs` for admission, mining and conflict resolution
//! 3. `core/block.rs` for the exact bytes a block hash covers
//! 4. `network/server.rs` for the routes nodes expose to each other

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::LedgerConfig;
pub use core::{
    is_valid_chain, valid_proof, Block, Blockchain, ChainSnapshot, ProofOfWork, PublicKey,
    Signature, Transaction, TransactionPayload, TransactionRequest, MINING_DIFFICULTY,
    MINING_REWARD, MINING_SENDER, NATIVE_CURRENCY, SYSTEM_ADDRESS,
};
pub use error::{AdmissionError, BlockchainError, Result};
pub use network::{
    build_blockchain, resolve_miner, ApiServer, GossipQueue, HttpTransport, NeighborScanner,
    Neighbors, Node, PeerMessage, PeerTransport, ServerHandle, DEFAULT_WORKERS, PEER_TIMEOUT,
};
pub use utils::{
    base58_decode, base58_encode, current_timestamp, ecdsa_p256_sha256_sign,
    ecdsa_p256_sha256_sign_verify, new_key_pair, ripemd160_digest, sha256_digest,
};
pub use wallet::{
    address_from_public_key, convert_address, hash_pub_key, validate_address, Wallet,
    ADDRESS_CHECK_SUM_LEN,
};
