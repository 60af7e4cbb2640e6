//! Configuration management
//!
//! This module handles the settings for one ledger node: where it listens,
//! who it mines for, how hard blocks are to mine, and how it finds neighbors.

pub mod settings;

pub use settings::LedgerConfig;
