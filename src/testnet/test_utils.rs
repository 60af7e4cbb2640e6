//! Test utilities for ledger testing

use crate::core::{
    Block, Blockchain, ProofOfWork, Transaction, TransactionPayload, TransactionRequest,
};
use crate::error::{BlockchainError, Result};
use crate::network::{PeerMessage, PeerTransport};
use crate::wallet::Wallet;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// In-memory `PeerTransport`: serves canned chains and records deliveries.
#[derive(Default)]
pub struct MockTransport {
    chains: Mutex<HashMap<String, Vec<Block>>>,
    unreachable: Mutex<HashSet<String>>,
    delivered: Mutex<Vec<(String, PeerMessage)>>,
    fetches: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve_chain(&self, peer: &str, chain: Vec<Block>) {
        self.chains.lock().unwrap().insert(peer.to_string(), chain);
    }

    pub fn set_unreachable(&self, peer: &str) {
        self.unreachable.lock().unwrap().insert(peer.to_string());
    }

    pub fn delivered(&self) -> Vec<(String, PeerMessage)> {
        self.delivered.lock().unwrap().clone()
    }

    /// How many chain fetches have been made so far.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn check_reachable(&self, peer: &str) -> Result<()> {
        if self.unreachable.lock().unwrap().contains(peer) {
            return Err(BlockchainError::PeerUnreachable {
                peer: peer.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

impl PeerTransport for MockTransport {
    fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_reachable(peer)?;
        Ok(self
            .chains
            .lock()
            .unwrap()
            .get(peer)
            .cloned()
            .unwrap_or_default())
    }

    fn deliver(&self, peer: &str, message: &PeerMessage) -> Result<()> {
        self.check_reachable(peer)?;
        self.delivered
            .lock()
            .unwrap()
            .push((peer.to_string(), message.clone()));
        Ok(())
    }
}

/// P-256 key pair whose X coordinate starts with two zero bytes.
pub const LEADING_ZERO_PRIVATE: &str =
    "f611beab46437c769c2c4a665d0ab8fbe29827c1ec42cb173838b66863e07787";
pub const LEADING_ZERO_PUBLIC: &str =
    "0003135d88a08fb1a5f76ff56b21bb6baf5e101f7e9cba343d2c6c0568d3e051\
     638c0dd5bcf80a0d3dfba43d9e0317b5c8c33f0cadf22f99bebef40490bac54f";
/// Address of that key with each coordinate hashed as its minimal bytes
pub const LEADING_ZERO_ADDRESS: &str = "16wCAZUByH5PRousCzY5khBP6Sq6unToxF";

pub fn leading_zero_wallet() -> Wallet {
    Wallet::from_hex(LEADING_ZERO_PRIVATE, LEADING_ZERO_PUBLIC).unwrap()
}

/// Polls `condition` for up to five seconds.
pub fn wait_for(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(10));
    }
}

/// A ledger with no neighbors and an easy difficulty.
pub fn test_ledger(blockchain_address: &str, difficulty: usize) -> Blockchain {
    Blockchain::new(blockchain_address, Arc::new(MockTransport::new()))
        .unwrap()
        .with_difficulty(difficulty)
}

/// A valid chain of `length` blocks (genesis included), each mined block
/// paying a reward to a fixed test miner.
pub fn build_chain(length: usize, difficulty: usize) -> Vec<Block> {
    let pow = ProofOfWork::new(difficulty);
    let mut chain = vec![Block::generate_genesis_block().unwrap()];
    while chain.len() < length {
        let previous_hash = chain.last().unwrap().hash();
        let transactions = vec![Transaction::mining_reward("test-miner", 1.0)];
        let nonce = pow.run(&previous_hash, &transactions).unwrap();
        chain.push(Block::new(nonce, previous_hash, transactions).unwrap());
    }
    chain
}

/// A request signed by `wallet` over exactly the given fields.
pub fn signed_request(
    wallet: &Wallet,
    product: &str,
    currency: &str,
    value: f32,
) -> TransactionRequest {
    let signature = wallet
        .sign(&TransactionPayload::new(product, currency, value))
        .unwrap();
    TransactionRequest {
        sender_blockchain_address: wallet.address(),
        sender_public_key: wallet.public_key_hex(),
        signature: signature.to_hex(),
        product: product.to_string(),
        currency: currency.to_string(),
        value,
    }
}
