//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Solana: RPC client, retry policy and partner wallet
//! - DBC: bonding-curve account layout and instruction builders
//! - Storage: JSON file store
//! - HTTP: axum API
//! - CLI: command-line interface definitions

pub mod cli;
pub mod dbc;
pub mod http;
pub mod solana;
pub mod storage;

pub use cli::CliApp;
pub use http::AppState;
pub use solana::{PartnerWallet, RetryPolicy, SolanaClient};
pub use storage::JsonFileStore;
