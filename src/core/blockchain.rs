// This is the ledger itself: the committed chain plus the pool of pending
// transactions, guarded together by one lock so nobody ever sees a chain
// that doesn't match its pool.
// Mining holds that lock for the whole cycle, so two cycles never overlap,
// and gossip always happens after it is released.

use crate::core::block::{null_as_empty, Hash};
use crate::core::consensus::{select_longest_chain, CandidateChain};
use crate::core::monetary::{is_native, is_privileged_sender, to_signed_value, MINING_REWARD};
use crate::core::proof_of_work::{ProofOfWork, MINING_DIFFICULTY};
use crate::core::signature::{PublicKey, Signature, TransactionPayload};
use crate::core::{Block, Transaction, TransactionRequest};
use crate::error::{AdmissionError, Result};
use crate::network::{broadcast, GossipQueue, Neighbors, PeerMessage, PeerTransport};
use crate::wallet::address_from_public_key;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

/// What `GET /chain` returns: the committed chain, the pending pool, and the
/// address this node mines to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    #[serde(rename = "transactionPool", deserialize_with = "null_as_empty", default)]
    pub transaction_pool: Vec<Transaction>,
    #[serde(deserialize_with = "null_as_empty", default)]
    pub chain: Vec<Block>,
    #[serde(rename = "blockChainAddress", default)]
    pub blockchain_address: String,
}

/// A signature, the key that made it, and the payload it has to cover.
struct Authorization<'a> {
    payload: TransactionPayload,
    public_key: &'a PublicKey,
    signature: &'a Signature,
}

// Background consensus: at most one round runs, and requests that arrive
// meanwhile fold into a single follow-up round.
#[derive(Default)]
struct ConsensusRound {
    running: bool,
    requested: bool,
}

// Chain and pool always change together
struct LedgerState {
    chain: Vec<Block>,
    transaction_pool: Vec<Transaction>,
}

impl LedgerState {
    fn last_block_hash(&self) -> Hash {
        // The chain is never empty: it starts at genesis and is only ever
        // replaced by a validated, longer chain.
        self.chain
            .last()
            .map(Block::hash)
            .unwrap_or_else(|| *crate::core::block::EMPTY_BLOCK_HASH)
    }

    fn has_pending_transaction(&self, address: &str) -> bool {
        self.transaction_pool
            .iter()
            .any(|tx| tx.get_sender() == address)
    }

    // I check everything before touching the pool, so a rejection leaves it as it was
    fn admit(
        &mut self,
        transaction: Transaction,
        authorization: Option<Authorization<'_>>,
    ) -> std::result::Result<(), AdmissionError> {
        if transaction.is_mining_reward() {
            self.transaction_pool.push(transaction);
            return Ok(());
        }

        let sender = transaction.get_sender();
        if !is_privileged_sender(sender) && self.has_pending_transaction(sender) {
            return Err(AdmissionError::PendingTransactionExists {
                sender: sender.to_string(),
            });
        }

        let verified = authorization.map_or(false, |authorization| {
            authorization
                .payload
                .verify(authorization.public_key, authorization.signature)
        });
        if !verified {
            return Err(AdmissionError::InvalidSignature);
        }

        if is_native(transaction.get_currency()) {
            let available = calculate_total_amount(&self.chain, sender);
            if available < transaction.get_value() {
                return Err(AdmissionError::InsufficientFunds {
                    sender: sender.to_string(),
                    required: transaction.get_value(),
                    available,
                });
            }
        }

        self.transaction_pool.push(transaction);
        Ok(())
    }
}

/// Net native value `address` holds across `chain`: credits minus debits,
/// block by block. The pool never counts.
pub fn calculate_total_amount(chain: &[Block], address: &str) -> f32 {
    let mut total_amount = 0.0f32;
    for block in chain {
        for tx in block.get_transactions() {
            if tx.get_recipient() == address {
                total_amount += tx.get_value();
            }
            if tx.get_sender() == address {
                total_amount -= tx.get_value();
            }
        }
    }
    total_amount
}

pub struct Blockchain {
    state: Mutex<LedgerState>,
    consensus_round: Mutex<ConsensusRound>,
    neighbors: Arc<Neighbors>,
    transport: Arc<dyn PeerTransport>,
    gossip: GossipQueue,
    blockchain_address: String,
    proof_of_work: ProofOfWork,
    mining_reward: f32,
}

impl Blockchain {
    /// Starts a ledger at a fresh genesis block, mining to `blockchain_address`.
    pub fn new(
        blockchain_address: impl Into<String>,
        transport: Arc<dyn PeerTransport>,
    ) -> Result<Blockchain> {
        let genesis = Block::generate_genesis_block()?;
        let gossip = GossipQueue::start(Arc::clone(&transport))?;
        Ok(Blockchain {
            state: Mutex::new(LedgerState {
                chain: vec![genesis],
                transaction_pool: Vec::new(),
            }),
            consensus_round: Mutex::new(ConsensusRound::default()),
            neighbors: Arc::new(Neighbors::new()),
            transport,
            gossip,
            blockchain_address: blockchain_address.into(),
            proof_of_work: ProofOfWork::new(MINING_DIFFICULTY),
            mining_reward: MINING_REWARD,
        })
    }

    pub fn with_difficulty(mut self, difficulty: usize) -> Blockchain {
        self.proof_of_work = ProofOfWork::new(difficulty);
        self
    }

    pub fn with_mining_reward(mut self, mining_reward: f32) -> Blockchain {
        self.mining_reward = mining_reward;
        self
    }

    /// Replaces the starting chain, e.g. to resume from a known chain.
    /// An empty chain is ignored.
    pub fn with_chain(mut self, chain: Vec<Block>) -> Blockchain {
        if !chain.is_empty() {
            self.state
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner)
                .chain = chain;
        }
        self
    }

    fn lock_state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_consensus_round(&self) -> MutexGuard<'_, ConsensusRound> {
        self.consensus_round
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_blockchain_address(&self) -> &str {
        self.blockchain_address.as_str()
    }

    pub fn get_difficulty(&self) -> usize {
        self.proof_of_work.get_difficulty()
    }

    pub fn get_mining_reward(&self) -> f32 {
        self.mining_reward
    }

    pub fn get_neighbors(&self) -> &Arc<Neighbors> {
        &self.neighbors
    }

    pub fn get_chain(&self) -> Vec<Block> {
        self.lock_state().chain.clone()
    }

    pub fn get_transaction_pool(&self) -> Vec<Transaction> {
        self.lock_state().transaction_pool.clone()
    }

    pub fn get_best_height(&self) -> usize {
        self.lock_state().chain.len()
    }

    pub fn last_block_hash(&self) -> Hash {
        self.lock_state().last_block_hash()
    }

    /// Chain and pool read under one lock acquisition.
    pub fn snapshot(&self) -> ChainSnapshot {
        let state = self.lock_state();
        ChainSnapshot {
            transaction_pool: state.transaction_pool.clone(),
            chain: state.chain.clone(),
            blockchain_address: self.blockchain_address.clone(),
        }
    }

    pub fn get_balance(&self, address: &str) -> f32 {
        calculate_total_amount(&self.lock_state().chain, address)
    }

    pub fn has_pending_transaction(&self, address: &str) -> bool {
        self.lock_state().has_pending_transaction(address)
    }

    /// Admission control for one transaction, already in ledger form.
    ///
    /// The mining reward goes straight in. Anything else must come from a
    /// sender with nothing pending (the system address is exempt), carry a
    /// signature over `{product, currency, value}` with any currency
    /// conversion undone, and, in the native currency, be covered by the
    /// sender's committed balance.
    pub fn add_transaction(
        &self,
        transaction: Transaction,
        sender_public_key: Option<&PublicKey>,
        signature: Option<&Signature>,
    ) -> std::result::Result<(), AdmissionError> {
        let authorization = match (sender_public_key, signature) {
            (Some(public_key), Some(signature)) => Some(Authorization {
                // A converted transaction carries a tenth of what was signed
                payload: transaction.payload_with_value(to_signed_value(
                    transaction.get_currency(),
                    transaction.get_value(),
                )),
                public_key,
                signature,
            }),
            _ => None,
        };
        self.lock_state().admit(transaction, authorization)
    }

    /// Admits a signed submission locally.
    ///
    /// The request's key must own the claimed sender address, and the
    /// signature is checked against the request exactly as submitted. A
    /// foreign currency request is converted before admission.
    pub fn submit_transaction(
        &self,
        request: &TransactionRequest,
    ) -> std::result::Result<(), AdmissionError> {
        let (public_key, signature) = match (
            PublicKey::from_hex(&request.sender_public_key),
            Signature::from_hex(&request.signature),
        ) {
            (Ok(public_key), Ok(signature)) => (public_key, signature),
            _ => return Err(AdmissionError::InvalidSignature),
        };
        if address_from_public_key(&public_key) != request.sender_blockchain_address {
            return Err(AdmissionError::InvalidSignature);
        }

        let authorization = Authorization {
            payload: request.payload(),
            public_key: &public_key,
            signature: &signature,
        };
        let transaction = Transaction::from_request(request).into_ledger_form();
        self.lock_state().admit(transaction, Some(authorization))
    }

    /// Admits a submission locally and then queues the original request for
    /// every neighbor. Forwarding failures are dropped.
    pub fn relay_transaction(
        &self,
        request: &TransactionRequest,
    ) -> std::result::Result<(), AdmissionError> {
        self.submit_transaction(request)?;

        let peers = self.neighbors.get_addrs();
        if peers.is_empty() {
            return Ok(());
        }
        self.gossip
            .enqueue(peers, PeerMessage::RelayTransaction(request.clone()));
        Ok(())
    }

    pub fn clear_pool(&self) {
        self.lock_state().transaction_pool.clear();
    }

    /// Runs one mining cycle and returns the committed block.
    ///
    /// The reward transaction joins the pool, the pool is proven and
    /// committed as one block, and the pool is emptied. Neighbors are then
    /// told to clear their pools and to run consensus.
    pub fn mine(&self) -> Result<Block> {
        let block = {
            let mut state = self.lock_state();
            let reward = Transaction::mining_reward(&self.blockchain_address, self.mining_reward);
            state.admit(reward, None)?;

            let transactions = state.transaction_pool.clone();
            let previous_hash = state.last_block_hash();
            let block = match self
                .proof_of_work
                .run(&previous_hash, &transactions)
                .and_then(|nonce| Block::new(nonce, previous_hash, transactions))
            {
                Ok(block) => block,
                Err(e) => {
                    // take the reward back out so a retry doesn't pay twice
                    state.transaction_pool.pop();
                    return Err(e);
                }
            };
            state.chain.push(block.clone());
            state.transaction_pool.clear();
            info!(
                "Mined block {} at height {} with {} transactions",
                block.hash_hex(),
                state.chain.len() - 1,
                block.get_transactions().len()
            );
            block
        };

        let peers = self.neighbors.get_addrs();
        broadcast(self.transport.as_ref(), &peers, &PeerMessage::ClearPool);
        broadcast(self.transport.as_ref(), &peers, &PeerMessage::TriggerConsensus);
        Ok(block)
    }

    /// Adopts the longest valid neighbor chain that beats the local one.
    ///
    /// Chains are fetched and validated without holding the ledger lock; the
    /// lock is taken once to compare lengths and swap. The pool is left alone.
    pub fn resolve_conflicts(&self) -> bool {
        let difficulty = self.get_difficulty();
        let candidates: Vec<CandidateChain> = self
            .neighbors
            .get_addrs()
            .into_iter()
            .filter_map(|peer| match self.transport.fetch_chain(&peer) {
                Ok(blocks) => Some(CandidateChain::evaluate(peer, blocks, difficulty)),
                Err(e) => {
                    warn!("Skipping {peer} during consensus: {e}");
                    None
                }
            })
            .collect();

        let mut state = self.lock_state();
        match select_longest_chain(state.chain.len(), candidates) {
            Some(longest) => {
                info!(
                    "Replaced local chain of {} blocks with {} blocks from {}",
                    state.chain.len(),
                    longest.len(),
                    longest.peer
                );
                state.chain = longest.blocks;
                true
            }
            None => {
                debug!("Local chain of {} blocks kept", state.chain.len());
                false
            }
        }
    }

    /// Boundary entry point for a consensus round.
    pub fn trigger_consensus(&self) -> bool {
        self.resolve_conflicts()
    }

    /// Runs a consensus round on a background thread and returns at once.
    ///
    /// Only one round runs at a time. Requests made while it runs are folded
    /// into one more round after it.
    pub fn request_consensus(self: &Arc<Self>) {
        {
            let mut round = self.lock_consensus_round();
            if round.running {
                round.requested = true;
                return;
            }
            round.running = true;
        }

        let blockchain = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("consensus".to_string())
            .spawn(move || loop {
                blockchain.trigger_consensus();
                let mut round = blockchain.lock_consensus_round();
                if round.requested {
                    round.requested = false;
                } else {
                    round.running = false;
                    break;
                }
            });
        if let Err(e) = spawned {
            warn!("Failed to start a consensus round: {e}");
            self.lock_consensus_round().running = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::monetary::{MINING_SENDER, NATIVE_CURRENCY, SYSTEM_ADDRESS};
    use crate::testnet::{
        build_chain, leading_zero_wallet, signed_request, test_ledger, wait_for, MockTransport,
        LEADING_ZERO_ADDRESS,
    };
    use crate::wallet::Wallet;
    use std::time::{Duration, Instant};

    const DIFFICULTY: usize = 1;

    fn funded_ledger(wallet: &Wallet, amount: f32) -> Blockchain {
        // A foreign-currency submission mints a tenth of its value to the sender
        let ledger = test_ledger("miner", DIFFICULTY);
        let request = signed_request(wallet, "voucher", "EUR", amount * 10.0);
        ledger.submit_transaction(&request).unwrap();
        ledger.mine().unwrap();
        ledger
    }

    #[test]
    fn test_new_ledger_has_genesis_only() {
        let ledger = test_ledger("miner", DIFFICULTY);
        let chain = ledger.get_chain();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].get_nonce(), 0);
        assert!(ledger.get_transaction_pool().is_empty());
    }

    #[test]
    fn test_mine_empty_pool_pays_reward() {
        let ledger = test_ledger("miner", DIFFICULTY);
        let block = ledger.mine().unwrap();

        let chain = ledger.get_chain();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1], block);
        assert_eq!(block.get_transactions().len(), 1);
        assert!(block.get_transactions()[0].is_mining_reward());
        assert_eq!(block.get_previous_hash(), &chain[0].hash());
        assert_eq!(ledger.get_balance("miner"), MINING_REWARD);
        assert!(ledger.get_transaction_pool().is_empty());
    }

    #[test]
    fn test_mined_chain_is_valid() {
        let ledger = test_ledger("miner", DIFFICULTY);
        for _ in 0..3 {
            ledger.mine().unwrap();
        }
        assert!(crate::core::is_valid_chain(&ledger.get_chain(), DIFFICULTY));
        assert_eq!(ledger.get_balance("miner"), 3.0 * MINING_REWARD);
    }

    #[test]
    fn test_native_transaction_spends_balance() {
        let wallet = Wallet::generate().unwrap();
        let ledger = funded_ledger(&wallet, 10.0);
        assert_eq!(ledger.get_balance(&wallet.address()), 10.0);

        let request = signed_request(&wallet, "coffee", NATIVE_CURRENCY, 5.0);
        ledger.submit_transaction(&request).unwrap();
        assert_eq!(ledger.get_transaction_pool().len(), 1);
        // the pool never moves balances
        assert_eq!(ledger.get_balance(&wallet.address()), 10.0);

        ledger.mine().unwrap();
        assert_eq!(ledger.get_balance(&wallet.address()), 5.0);
        assert_eq!(ledger.get_balance(SYSTEM_ADDRESS), -10.0 + 5.0);
    }

    #[test]
    fn test_native_transaction_over_balance_is_rejected() {
        let wallet = Wallet::generate().unwrap();
        let ledger = funded_ledger(&wallet, 10.0);

        let request = signed_request(&wallet, "car", NATIVE_CURRENCY, 10.5);
        match ledger.submit_transaction(&request) {
            Err(AdmissionError::InsufficientFunds {
                required,
                available,
                ..
            }) => {
                assert_eq!(required, 10.5);
                assert_eq!(available, 10.0);
            }
            other => panic!("expected insufficient funds, got {other:?}"),
        }
        assert!(ledger.get_transaction_pool().is_empty());

        // spending exactly the balance is fine
        let request = signed_request(&wallet, "car", NATIVE_CURRENCY, 10.0);
        assert!(ledger.submit_transaction(&request).is_ok());
    }

    #[test]
    fn test_foreign_currency_is_converted_and_minted() {
        let wallet = Wallet::generate().unwrap();
        let ledger = test_ledger("miner", DIFFICULTY);
        let request = signed_request(&wallet, "voucher", "EUR", 50.0);
        ledger.submit_transaction(&request).unwrap();

        let pool = ledger.get_transaction_pool();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].get_sender(), SYSTEM_ADDRESS);
        assert_eq!(pool[0].get_recipient(), wallet.address());
        assert_eq!(pool[0].get_value(), 5.0);
        assert_eq!(pool[0].get_currency(), "EUR");
    }

    #[test]
    fn test_foreign_amounts_verify_against_submitted_value() {
        let wallet = Wallet::generate().unwrap();
        let ledger = test_ledger("miner", DIFFICULTY);
        // a tenth of each, times ten, is not the same f32 again
        let values = [0.1f32, 0.03, 0.05, 0.12, 1.32];
        for value in values {
            let request = signed_request(&wallet, "voucher", "EUR", value);
            assert_eq!(ledger.submit_transaction(&request), Ok(()), "value {value}");
        }

        let pool = ledger.get_transaction_pool();
        assert_eq!(pool.len(), values.len());
        for (tx, value) in pool.iter().zip(values) {
            assert_eq!(tx.get_value(), value / 10.0);
        }
    }

    #[test]
    fn test_add_transaction_undoes_conversion_for_signature() {
        let wallet = Wallet::generate().unwrap();
        let ledger = test_ledger("miner", DIFFICULTY);
        let request = signed_request(&wallet, "voucher", "EUR", 40.0);
        let public_key = PublicKey::from_hex(&request.sender_public_key).unwrap();
        let signature = Signature::from_hex(&request.signature).unwrap();

        let converted = Transaction::from_request(&request).into_ledger_form();
        assert_eq!(converted.get_value(), 4.0);
        assert!(ledger
            .add_transaction(converted, Some(&public_key), Some(&signature))
            .is_ok());
    }

    #[test]
    fn test_key_with_leading_zero_coordinate_owns_its_address() {
        let wallet = leading_zero_wallet();
        let ledger = test_ledger("miner", DIFFICULTY);
        let request = signed_request(&wallet, "voucher", "EUR", 12.5);
        assert_eq!(request.sender_blockchain_address, LEADING_ZERO_ADDRESS);

        ledger.submit_transaction(&request).unwrap();
        assert_eq!(
            ledger.get_transaction_pool()[0].get_recipient(),
            LEADING_ZERO_ADDRESS
        );
    }

    #[test]
    fn test_foreign_currency_skips_pending_lock() {
        let wallet = Wallet::generate().unwrap();
        let ledger = test_ledger("miner", DIFFICULTY);
        for value in [10.0, 20.0, 30.0] {
            let request = signed_request(&wallet, "voucher", "USD", value);
            ledger.submit_transaction(&request).unwrap();
        }
        assert_eq!(ledger.get_transaction_pool().len(), 3);
    }

    #[test]
    fn test_pending_sender_is_rejected_before_signature_check() {
        let wallet = Wallet::generate().unwrap();
        let ledger = funded_ledger(&wallet, 10.0);
        let request = signed_request(&wallet, "tea", NATIVE_CURRENCY, 1.0);
        ledger.submit_transaction(&request).unwrap();

        // second one from the same sender, with garbage signature
        let mut second = signed_request(&wallet, "tea", NATIVE_CURRENCY, 2.0);
        second.signature = "00".repeat(64);
        match ledger.submit_transaction(&second) {
            Err(AdmissionError::PendingTransactionExists { sender }) => {
                assert_eq!(sender, wallet.address())
            }
            other => panic!("expected a pending transaction error, got {other:?}"),
        }
        assert_eq!(ledger.get_transaction_pool().len(), 1);
    }

    #[test]
    fn test_tampered_value_fails_signature() {
        let wallet = Wallet::generate().unwrap();
        let ledger = funded_ledger(&wallet, 10.0);
        let mut request = signed_request(&wallet, "tea", NATIVE_CURRENCY, 1.0);
        request.value = 2.0;
        assert_eq!(
            ledger.submit_transaction(&request),
            Err(AdmissionError::InvalidSignature)
        );
    }

    #[test]
    fn test_malformed_key_material_is_invalid_signature() {
        let wallet = Wallet::generate().unwrap();
        let ledger = test_ledger("miner", DIFFICULTY);
        let mut request = signed_request(&wallet, "tea", "EUR", 1.0);
        request.sender_public_key = "not hex".to_string();
        assert_eq!(
            ledger.submit_transaction(&request),
            Err(AdmissionError::InvalidSignature)
        );

        let mut request = signed_request(&wallet, "tea", "EUR", 1.0);
        request.signature = "abc".to_string();
        assert_eq!(
            ledger.submit_transaction(&request),
            Err(AdmissionError::InvalidSignature)
        );
    }

    #[test]
    fn test_key_must_own_sender_address() {
        let owner = Wallet::generate().unwrap();
        let thief = Wallet::generate().unwrap();
        let ledger = funded_ledger(&owner, 10.0);

        let mut request = signed_request(&thief, "tea", NATIVE_CURRENCY, 1.0);
        request.sender_blockchain_address = owner.address();
        assert_eq!(
            ledger.submit_transaction(&request),
            Err(AdmissionError::InvalidSignature)
        );

        let mut request = signed_request(&thief, "tea", NATIVE_CURRENCY, 1.0);
        request.sender_blockchain_address = MINING_SENDER.to_string();
        assert_eq!(
            ledger.submit_transaction(&request),
            Err(AdmissionError::InvalidSignature)
        );
    }

    #[test]
    fn test_add_transaction_without_signature() {
        let ledger = test_ledger("miner", DIFFICULTY);
        let reward = Transaction::mining_reward("someone", 1.0);
        assert!(ledger.add_transaction(reward, None, None).is_ok());

        let tx = Transaction::new("alice", SYSTEM_ADDRESS, "tea", NATIVE_CURRENCY, 0.0);
        assert_eq!(
            ledger.add_transaction(tx, None, None),
            Err(AdmissionError::InvalidSignature)
        );
        assert_eq!(ledger.get_transaction_pool().len(), 1);
    }

    #[test]
    fn test_balance_is_additive_over_blocks() {
        let wallet = Wallet::generate().unwrap();
        let ledger = funded_ledger(&wallet, 10.0);
        let address = wallet.address();

        let before = ledger.get_balance(&address);
        let request = signed_request(&wallet, "tea", NATIVE_CURRENCY, 2.5);
        ledger.submit_transaction(&request).unwrap();
        let block = ledger.mine().unwrap();

        let delta: f32 = block
            .get_transactions()
            .iter()
            .map(|tx| {
                let mut d = 0.0;
                if tx.get_recipient() == address {
                    d += tx.get_value();
                }
                if tx.get_sender() == address {
                    d -= tx.get_value();
                }
                d
            })
            .sum();
        assert_eq!(ledger.get_balance(&address), before + delta);
        assert_eq!(
            calculate_total_amount(&ledger.get_chain()[..2], &address),
            before
        );
    }

    #[test]
    fn test_concurrent_mining_cycles_commit_in_turn() {
        let ledger = Arc::new(test_ledger("miner", DIFFICULTY));
        let miners: Vec<_> = (0..4)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || ledger.mine().unwrap())
            })
            .collect();
        for miner in miners {
            miner.join().unwrap();
        }

        let chain = ledger.get_chain();
        assert_eq!(chain.len(), 5);
        assert!(crate::core::is_valid_chain(&chain, DIFFICULTY));
        // each cycle paid exactly one reward; none saw another's pool
        for block in &chain[1..] {
            assert_eq!(block.get_transactions().len(), 1);
        }
        assert_eq!(ledger.get_balance("miner"), 4.0 * MINING_REWARD);
        assert!(ledger.get_transaction_pool().is_empty());
    }

    #[test]
    fn test_clear_pool() {
        let wallet = Wallet::generate().unwrap();
        let ledger = test_ledger("miner", DIFFICULTY);
        ledger
            .submit_transaction(&signed_request(&wallet, "v", "EUR", 10.0))
            .unwrap();
        ledger.clear_pool();
        assert!(ledger.get_transaction_pool().is_empty());
        assert!(!ledger.has_pending_transaction(SYSTEM_ADDRESS));
    }

    #[test]
    fn test_mine_notifies_neighbors() {
        let transport = Arc::new(MockTransport::new());
        let ledger = Blockchain::new("miner", transport.clone())
            .unwrap()
            .with_difficulty(DIFFICULTY);
        ledger.get_neighbors().add("peer-a:5001");
        ledger.get_neighbors().add("peer-b:5002");
        ledger.mine().unwrap();

        assert_eq!(
            transport.delivered(),
            vec![
                ("peer-a:5001".to_string(), PeerMessage::ClearPool),
                ("peer-b:5002".to_string(), PeerMessage::ClearPool),
                ("peer-a:5001".to_string(), PeerMessage::TriggerConsensus),
                ("peer-b:5002".to_string(), PeerMessage::TriggerConsensus),
            ]
        );
    }

    #[test]
    fn test_mine_survives_unreachable_neighbors() {
        let transport = Arc::new(MockTransport::new());
        transport.set_unreachable("down:5001");
        let ledger = Blockchain::new("miner", transport.clone())
            .unwrap()
            .with_difficulty(DIFFICULTY);
        ledger.get_neighbors().add("down:5001");
        assert!(ledger.mine().is_ok());
        assert_eq!(ledger.get_best_height(), 2);
    }

    #[test]
    fn test_relay_forwards_original_request() {
        let transport = Arc::new(MockTransport::new());
        let ledger = Blockchain::new("miner", transport.clone())
            .unwrap()
            .with_difficulty(DIFFICULTY);
        ledger.get_neighbors().add("peer:5001");

        let wallet = Wallet::generate().unwrap();
        let request = signed_request(&wallet, "voucher", "EUR", 30.0);
        ledger.relay_transaction(&request).unwrap();
        assert_eq!(ledger.get_transaction_pool()[0].get_value(), 3.0);

        let deadline = Instant::now() + Duration::from_secs(5);
        while transport.delivered().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(
            transport.delivered(),
            vec![(
                "peer:5001".to_string(),
                PeerMessage::RelayTransaction(request)
            )]
        );
    }

    #[test]
    fn test_rejected_relay_is_not_forwarded() {
        let transport = Arc::new(MockTransport::new());
        let ledger = Blockchain::new("miner", transport.clone())
            .unwrap()
            .with_difficulty(DIFFICULTY);
        ledger.get_neighbors().add("peer:5001");

        let wallet = Wallet::generate().unwrap();
        let request = signed_request(&wallet, "tea", NATIVE_CURRENCY, 1.0);
        assert!(ledger.relay_transaction(&request).is_err());
        thread::sleep(Duration::from_millis(50));
        assert!(transport.delivered().is_empty());
    }

    #[test]
    fn test_resolve_conflicts_adopts_longer_valid_chain() {
        let transport = Arc::new(MockTransport::new());
        let longer = build_chain(4, DIFFICULTY);
        transport.serve_chain("peer:5001", longer.clone());

        let ledger = Blockchain::new("miner", transport.clone())
            .unwrap()
            .with_difficulty(DIFFICULTY);
        ledger.get_neighbors().add("peer:5001");
        let wallet = Wallet::generate().unwrap();
        ledger
            .submit_transaction(&signed_request(&wallet, "v", "EUR", 10.0))
            .unwrap();

        assert!(ledger.resolve_conflicts());
        assert_eq!(ledger.get_chain(), longer);
        // the pool survives a chain swap
        assert_eq!(ledger.get_transaction_pool().len(), 1);
        assert!(!ledger.trigger_consensus());
    }

    #[test]
    fn test_resolve_conflicts_rejects_longer_invalid_chain() {
        let transport = Arc::new(MockTransport::new());
        let mut invalid = build_chain(5, DIFFICULTY);
        let third = invalid[3].clone();
        invalid[3] = Block::with_timestamp(
            third.get_timestamp(),
            third.get_nonce(),
            [7u8; 32],
            third.get_transactions().to_vec(),
        );
        transport.serve_chain("peer:5001", invalid);

        let ledger = Blockchain::new("miner", transport.clone())
            .unwrap()
            .with_difficulty(DIFFICULTY)
            .with_chain(build_chain(3, DIFFICULTY));
        ledger.get_neighbors().add("peer:5001");
        let local = ledger.get_chain();

        assert!(!ledger.resolve_conflicts());
        assert_eq!(ledger.get_chain(), local);
    }

    #[test]
    fn test_resolve_conflicts_tie_keeps_first_peer() {
        let transport = Arc::new(MockTransport::new());
        let first = build_chain(4, DIFFICULTY);
        let second = build_chain(4, DIFFICULTY);
        transport.serve_chain("first:5001", first.clone());
        transport.serve_chain("second:5002", second);
        transport.set_unreachable("gone:5003");

        let ledger = Blockchain::new("miner", transport.clone())
            .unwrap()
            .with_difficulty(DIFFICULTY);
        ledger.get_neighbors().add("gone:5003");
        ledger.get_neighbors().add("first:5001");
        ledger.get_neighbors().add("second:5002");

        assert!(ledger.resolve_conflicts());
        assert_eq!(ledger.get_chain(), first);
    }

    // Chain fetches wait until the gate's sender sends or is dropped
    struct GatedTransport {
        inner: MockTransport,
        gate: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl PeerTransport for GatedTransport {
        fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>> {
            let _ = self.gate.lock().unwrap().recv();
            self.inner.fetch_chain(peer)
        }

        fn deliver(&self, peer: &str, message: &PeerMessage) -> Result<()> {
            self.inner.deliver(peer, message)
        }
    }

    #[test]
    fn test_consensus_requests_are_folded_together() {
        let (open, gate) = std::sync::mpsc::channel();
        let transport = Arc::new(GatedTransport {
            inner: MockTransport::new(),
            gate: Mutex::new(gate),
        });
        let longer = build_chain(3, DIFFICULTY);
        transport.inner.serve_chain("peer:5001", longer.clone());
        let ledger = Arc::new(
            Blockchain::new("miner", transport.clone())
                .unwrap()
                .with_difficulty(DIFFICULTY),
        );
        ledger.get_neighbors().add("peer:5001");

        // the first round is stuck fetching while the rest arrive
        for _ in 0..10 {
            ledger.request_consensus();
        }
        drop(open);

        wait_for("the longer chain", || ledger.get_chain() == longer);
        wait_for("the follow-up round", || transport.inner.fetches() == 2);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(transport.inner.fetches(), 2);

        // once idle, a new request starts a new round
        ledger.request_consensus();
        wait_for("another round", || transport.inner.fetches() == 3);
    }

    #[test]
    fn test_snapshot_wire_names() {
        let ledger = test_ledger("miner-address", DIFFICULTY);
        let json = serde_json::to_value(ledger.snapshot()).unwrap();
        assert_eq!(json["blockChainAddress"], "miner-address");
        assert!(json["transactionPool"].as_array().unwrap().is_empty());
        assert_eq!(json["chain"].as_array().unwrap().len(), 1);

        let go_style = r#"{"transactionPool":null,"chain":[],"blockChainAddress":"x"}"#;
        let parsed: ChainSnapshot = serde_json::from_str(go_style).unwrap();
        assert!(parsed.transaction_pool.is_empty());
    }
}
