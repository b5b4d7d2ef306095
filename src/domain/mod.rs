//! Domain Layer - Core types for bonding-curve graduation
//!
//! Pure data and rules with no I/O. All ledger and storage access happens
//! through the ports layer.
//!
//! - `token`: launched token identity and lifecycle
//! - `pool`: bonding-curve pool snapshots and graduation checks
//! - `fee_claim`: append-only fee claim records
//! - `migration`: per-attempt migration state machine
//! - `known_programs`: program ids and mints shared by all transactions

pub mod amount;
pub mod fee_claim;
pub mod known_programs;
pub mod migration;
pub mod pool;
pub mod serde_str;
pub mod token;

pub use amount::{lamports_to_sol, lamports_to_sol_f64, sol_to_lamports, LAMPORTS_PER_SOL};
pub use fee_claim::{FeeClaimRecord, InsertOutcome};
pub use migration::{
    ClaimAttempt, InvalidTransition, MigrationAttempt, MigrationPhase, RejectReason,
};
pub use pool::{BondingCurvePoolSnapshot, PoolAssessment, PoolProgress, PoolStateSnapshot};
pub use token::{MigrationStatus, Token, TokenStatus, TokenUpdate};
