//! Core ledger functionality
//!
//! This module contains the fundamental ledger components: transactions and
//! their signed payloads, blocks, proof-of-work, chain validation and
//! longest-chain selection, and the ledger state that ties them together.

pub mod block;
pub mod blockchain;
pub mod consensus;
pub mod monetary;
pub mod proof_of_work;
pub mod signature;
pub mod transaction;

pub use block::{Block, Hash, EMPTY_BLOCK_HASH};
pub use blockchain::{calculate_total_amount, Blockchain, ChainSnapshot};
pub use consensus::{is_valid_chain, select_longest_chain, validate_chain, CandidateChain};
pub use monetary::{
    CONVERSION_RATIO, MINING_PRODUCT, MINING_REWARD, MINING_SENDER, NATIVE_CURRENCY,
    SYSTEM_ADDRESS,
};
pub use proof_of_work::{valid_proof, ProofOfWork, MINING_DIFFICULTY};
pub use signature::{PublicKey, Signature, TransactionPayload};
pub use transaction::{Transaction, TransactionRequest};
