use crate::core::Transaction;
use crate::error::{BlockchainError, Result};
use crate::utils::{current_timestamp, sha256_hash, to_canonical_vec};
use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// SHA-256 digest of a block's canonical serialization
pub type Hash = [u8; 32];

/// Hash of the all-zero block without transactions; the genesis block points at it.
pub static EMPTY_BLOCK_HASH: Lazy<Hash> =
    Lazy::new(|| Block::with_timestamp(0, 0, [0u8; 32], Vec::new()).hash());

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    timestamp: i64,
    nonce: i64,
    #[serde(with = "hash_hex")]
    previous_hash: Hash,
    #[serde(
        serialize_with = "empty_as_null",
        deserialize_with = "null_as_empty",
        default
    )]
    transactions: Vec<Transaction>,
}

impl Block {
    /// Creates a block stamped with the current time in nanoseconds.
    pub fn new(nonce: i64, previous_hash: Hash, transactions: Vec<Transaction>) -> Result<Block> {
        Ok(Block::with_timestamp(
            current_timestamp()?,
            nonce,
            previous_hash,
            transactions,
        ))
    }

    pub fn with_timestamp(
        timestamp: i64,
        nonce: i64,
        previous_hash: Hash,
        transactions: Vec<Transaction>,
    ) -> Block {
        Block {
            timestamp,
            nonce,
            previous_hash,
            transactions,
        }
    }

    /// The first block of every chain: nonce 0, no transactions, linked to
    /// the empty-block sentinel.
    pub fn generate_genesis_block() -> Result<Block> {
        Block::new(0, *EMPTY_BLOCK_HASH, Vec::new())
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_nonce(&self) -> i64 {
        self.nonce
    }

    pub fn get_previous_hash(&self) -> &Hash {
        &self.previous_hash
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn hash(&self) -> Hash {
        sha256_hash(&self.canonical_bytes())
    }

    pub fn hash_hex(&self) -> String {
        HEXLOWER.encode(&self.hash())
    }

    /// The exact bytes the block hash is computed over.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        canonical_block_bytes(
            self.timestamp,
            self.nonce,
            &self.previous_hash,
            &self.transactions,
        )
    }
}

/// What a block hash covers: fields in wire order, the previous hash as
/// lowercase hex, and `null` in place of an empty transaction list.
#[derive(Serialize)]
struct HashedBlock<'a> {
    timestamp: i64,
    nonce: i64,
    previous_hash: String,
    transactions: Option<&'a [Transaction]>,
}

/// Canonical bytes of a block with the given fields.
pub fn canonical_block_bytes(
    timestamp: i64,
    nonce: i64,
    previous_hash: &Hash,
    transactions: &[Transaction],
) -> Vec<u8> {
    to_canonical_vec(&HashedBlock {
        timestamp,
        nonce,
        previous_hash: HEXLOWER.encode(previous_hash),
        transactions: (!transactions.is_empty()).then_some(transactions),
    })
}

pub fn decode_hash(hex: &str) -> Result<Hash> {
    let bytes = HEXLOWER_PERMISSIVE
        .decode(hex.as_bytes())
        .map_err(|e| BlockchainError::InvalidBlock(format!("previous_hash is not hex: {e}")))?;
    if bytes.len() != 32 {
        return Err(BlockchainError::InvalidBlock(format!(
            "previous_hash must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&bytes);
    Ok(hash)
}

mod hash_hex {
    use super::{decode_hash, Hash};
    use data_encoding::HEXLOWER;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &Hash, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&HEXLOWER.encode(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash, D::Error> {
        let hex = String::deserialize(deserializer)?;
        decode_hash(&hex).map_err(D::Error::custom)
    }
}

fn empty_as_null<S: Serializer>(
    transactions: &[Transaction],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    if transactions.is_empty() {
        serializer.serialize_none()
    } else {
        serializer.collect_seq(transactions)
    }
}

/// Reads a JSON list that peers may send as `null` when empty.
pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
