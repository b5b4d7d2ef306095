//! Curve Graduator - bonding-curve pool graduation service
//!
//! Claims partner trading fees from a bonding-curve pool that has crossed
//! its graduation threshold, then migrates its liquidity into a permanent
//! AMM pool.
//!
//! # Modules
//!
//! - `domain`: Core types (Token, pool snapshots, fee claims, migration phases)
//! - `ports`: Trait abstractions (LedgerPort, stores, Clock)
//! - `adapters`: External implementations (Solana RPC, JSON store, HTTP, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Ledger client, fee claims, migration and the orchestrator
//! - `app`: Component wiring shared by the binary and integration tests

pub mod adapters;
pub mod app;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
