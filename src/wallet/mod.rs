//! Wallet key management
//!
//! This module handles key-pair creation, address derivation, and signing
//! of transaction payloads. The ledger itself only verifies; signing lives
//! here for the CLI and for tests.

#[allow(clippy::module_inception)]
pub mod wallet;

pub use wallet::{
    address_from_public_key, convert_address, hash_pub_key, validate_address, Wallet,
    ADDRESS_CHECK_SUM_LEN,
};
