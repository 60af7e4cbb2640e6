use crate::core::block::{canonical_block_bytes, Hash};
use crate::core::Transaction;
use crate::error::{BlockchainError, Result};
use crate::utils::sha256_hash;
use log::debug;

/// Leading hex zeros a block hash needs by default
pub const MINING_DIFFICULTY: usize = 3;

/// Nonce search over `{nonce, previous_hash, transactions}`.
///
/// The timestamp is pinned to zero while searching and checking, so a proof
/// stays valid whatever time the block is finally stamped with.
pub struct ProofOfWork {
    difficulty: usize,
}

impl ProofOfWork {
    pub fn new(difficulty: usize) -> ProofOfWork {
        ProofOfWork { difficulty }
    }

    pub fn get_difficulty(&self) -> usize {
        self.difficulty
    }

    /// Checks a nonce the same way peers check it.
    pub fn validate(&self, nonce: i64, previous_hash: &Hash, transactions: &[Transaction]) -> bool {
        valid_proof(nonce, previous_hash, transactions, self.difficulty)
    }

    /// Linear search from nonce 0 for the first proof that satisfies the
    /// difficulty. Blocks the calling thread until found.
    pub fn run(&self, previous_hash: &Hash, transactions: &[Transaction]) -> Result<i64> {
        // Serialize the block once and splice each candidate nonce in between.
        let template = canonical_block_bytes(0, 0, previous_hash, transactions);
        let marker: &[u8] = b"\"nonce\":0,";
        let split = template
            .windows(marker.len())
            .position(|window| window == marker)
            .ok_or_else(|| {
                BlockchainError::Mining("candidate block has no nonce field".to_string())
            })?;
        let head = &template[..split + marker.len() - 2];
        let tail = &template[split + marker.len() - 1..];

        let mut candidate = Vec::with_capacity(template.len() + 20);
        for nonce in 0..=i64::MAX {
            candidate.clear();
            candidate.extend_from_slice(head);
            candidate.extend_from_slice(nonce.to_string().as_bytes());
            candidate.extend_from_slice(tail);
            if meets_difficulty(&sha256_hash(&candidate), self.difficulty) {
                debug!(
                    "Found nonce {nonce} for difficulty {} over {} transactions",
                    self.difficulty,
                    transactions.len()
                );
                return Ok(nonce);
            }
        }
        Err(BlockchainError::Mining("nonce space exhausted".to_string()))
    }
}

/// True when the timestamp-zeroed candidate block hashes to at least
/// `difficulty` leading `'0'` hex digits.
pub fn valid_proof(
    nonce: i64,
    previous_hash: &Hash,
    transactions: &[Transaction],
    difficulty: usize,
) -> bool {
    let guess = canonical_block_bytes(0, nonce, previous_hash, transactions);
    meets_difficulty(&sha256_hash(&guess), difficulty)
}

/// Counts leading zero nibbles of `hash` against `difficulty`.
pub fn meets_difficulty(hash: &Hash, difficulty: usize) -> bool {
    if difficulty > 2 * hash.len() {
        return false;
    }
    (0..difficulty).all(|i| {
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
        nibble == 0
    })
}
