// Chain validity and longest-valid-chain selection. Nothing in here touches
// the network or the ledger lock: I fetch and check candidate chains first,
// and the ledger only locks to compare lengths and swap.

use crate::core::proof_of_work::valid_proof;
use crate::core::Block;
use crate::error::{BlockchainError, Result};
use log::{debug, warn};

/// Walks `chain` from its first block and reports the first broken link or
/// failed proof. The first block itself is trusted.
pub fn validate_chain(chain: &[Block], difficulty: usize) -> Result<()> {
    if chain.is_empty() {
        return Err(BlockchainError::ChainValidation {
            index: 0,
            reason: "chain has no blocks".to_string(),
        });
    }
    for (offset, pair) in chain.windows(2).enumerate() {
        let (previous, block) = (&pair[0], &pair[1]);
        let index = offset + 1;
        if block.get_previous_hash() != &previous.hash() {
            return Err(BlockchainError::ChainValidation {
                index,
                reason: "previous_hash does not match predecessor".to_string(),
            });
        }
        if !valid_proof(
            block.get_nonce(),
            block.get_previous_hash(),
            block.get_transactions(),
            difficulty,
        ) {
            return Err(BlockchainError::ChainValidation {
                index,
                reason: format!("nonce {} fails difficulty {difficulty}", block.get_nonce()),
            });
        }
    }
    Ok(())
}

pub fn is_valid_chain(chain: &[Block], difficulty: usize) -> bool {
    validate_chain(chain, difficulty).is_ok()
}

/// A neighbor's chain together with the outcome of validating it.
#[derive(Debug, Clone)]
pub struct CandidateChain {
    pub peer: String,
    pub blocks: Vec<Block>,
    pub valid: bool,
}

impl CandidateChain {
    pub fn evaluate(peer: impl Into<String>, blocks: Vec<Block>, difficulty: usize) -> Self {
        let peer = peer.into();
        let valid = match validate_chain(&blocks, difficulty) {
            Ok(()) => true,
            Err(e) => {
                warn!("Chain from {peer} rejected: {e}");
                false
            }
        };
        CandidateChain {
            peer,
            blocks,
            valid,
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Picks the chain to adopt, if any.
///
/// Candidates are examined in order against a running maximum that starts at
/// `local_len`. A candidate only qualifies when it is strictly longer than
/// that maximum and valid, so the first valid chain seen at the winning
/// length is kept.
pub fn select_longest_chain(
    local_len: usize,
    candidates: impl IntoIterator<Item = CandidateChain>,
) -> Option<CandidateChain> {
    let mut max_length = local_len;
    let mut longest = None;
    for candidate in candidates {
        if candidate.len() > max_length && candidate.valid {
            debug!(
                "Chain from {} ({} blocks) is the longest so far",
                candidate.peer,
                candidate.len()
            );
            max_length = candidate.len();
            longest = Some(candidate);
        }
    }
    longest
}
