//! Error handling for the ledger
//!
//! `BlockchainError` covers every fallible operation in the crate. Transaction
//! admission has its own `AdmissionError` so the HTTP boundary can report the
//! exact rejection reason back to the submitter.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

/// Reasons a transaction is refused entry into the pool.
///
/// A rejected transaction never leaves a trace in the pool.
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionError {
    /// The sender already has an uncommitted transaction waiting in the pool
    PendingTransactionExists { sender: String },
    /// The signature does not cover the transaction's economic fields
    InvalidSignature,
    /// Committed balance is lower than the value being spent
    InsufficientFunds {
        sender: String,
        required: f32,
        available: f32,
    },
}

impl fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionError::PendingTransactionExists { sender } => {
                write!(f, "pending transaction for {sender}")
            }
            AdmissionError::InvalidSignature => write!(f, "invalid transaction signature"),
            AdmissionError::InsufficientFunds {
                sender,
                required,
                available,
            } => write!(
                f,
                "{sender} has not enough coins: required {required}, available {available}"
            ),
        }
    }
}

impl std::error::Error for AdmissionError {}

/// Comprehensive error types for ledger operations
#[derive(Debug, Clone)]
pub enum BlockchainError {
    /// Cryptographic operation errors
    Crypto(String),
    /// Network communication errors
    Network(String),
    /// A neighbor could not be reached or answered with garbage
    PeerUnreachable { peer: String, reason: String },
    /// Configuration errors
    Config(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// File I/O errors
    Io(String),
    /// Invalid address format
    InvalidAddress(String),
    /// Block decoding or construction errors
    InvalidBlock(String),
    /// A candidate chain broke the hash link or proof-of-work rule at `index`
    ChainValidation { index: usize, reason: String },
    /// Mining errors
    Mining(String),
    /// Transaction admission was refused
    Admission(AdmissionError),
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            BlockchainError::Network(msg) => write!(f, "Network error: {msg}"),
            BlockchainError::PeerUnreachable { peer, reason } => {
                write!(f, "Peer {peer} unreachable: {reason}")
            }
            BlockchainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            BlockchainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
            BlockchainError::InvalidAddress(addr) => write!(f, "Invalid address: {addr}"),
            BlockchainError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            BlockchainError::ChainValidation { index, reason } => {
                write!(f, "Chain invalid at block {index}: {reason}")
            }
            BlockchainError::Mining(msg) => write!(f, "Mining error: {msg}"),
            BlockchainError::Admission(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<AdmissionError> for BlockchainError {
    fn from(err: AdmissionError) -> Self {
        BlockchainError::Admission(err)
    }
}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BlockchainError {
    fn from(err: serde_json::Error) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BlockchainError {
    fn from(err: toml::de::Error) -> Self {
        BlockchainError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for BlockchainError {
    fn from(err: reqwest::Error) -> Self {
        BlockchainError::Network(err.to_string())
    }
}
