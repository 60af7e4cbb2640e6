//! Utility functions and helpers
//!
//! This module contains cryptographic utilities, encoding functions,
//! and the canonical JSON formatter used for hashing and signing.

pub mod canonical;
pub mod crypto;

pub use canonical::{format_f32, to_canonical_vec, CanonicalFormatter};
pub use crypto::{
    base58_decode, base58_encode, current_timestamp, ecdsa_p256_sha256_sign,
    ecdsa_p256_sha256_sign_verify, new_key_pair, ripemd160_digest, sha256_digest, sha256_hash,
};
