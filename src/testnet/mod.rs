//! Shared helpers for unit tests
//!
//! An in-memory peer transport, easy-difficulty ledgers, pre-mined chains,
//! and signed transaction requests.

pub mod test_utils;

pub use test_utils::*;
