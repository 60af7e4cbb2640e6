//! Command-line interface
//!
//! This module contains the CLI commands and argument parsing
//! for the ledger node and its wallet helpers.

pub mod commands;

pub use commands::{Command, Opt};
