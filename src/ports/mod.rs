//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - Ledger access (accounts, blockhashes, submission, confirmation)
//! - Persistence of tokens, fee claims and migration attempts
//! - Wall-clock time

pub mod clock;
pub mod ledger;
pub mod mocks;
pub mod storage;

pub use clock::{Clock, SystemClock};
pub use ledger::{
    AccountState, BlockhashMeta, ConfirmationOutcome, LedgerError, LedgerPort, LookupTableState,
};
pub use storage::{FeeClaimStore, MigrationAttemptStore, StoreError, TokenStore};
