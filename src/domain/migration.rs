//! Migration Attempt State Machine
//!
//! Each orchestration run is one `MigrationAttempt`, persisted after every
//! phase change so an interrupted run (crash between claim and migration)
//! is visible on the next invocation.
//!
//! ```text
//! Bonding -> Claiming -> Migrating -> Graduated
//!    |                       |
//!    v                       v
//! Rejected                 Failed
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use super::amount::lamports_to_sol_f64;

/// Disambiguates attempts started for the same pool within one millisecond
static ATTEMPT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Why a run was refused before touching the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    TokenNotFound {
        #[serde(with = "super::serde_str")]
        mint: Pubkey,
    },
    PoolNotFound {
        #[serde(with = "super::serde_str")]
        pool: Pubkey,
    },
    BelowThreshold {
        current_quote_lamports: u64,
        required_quote_lamports: u64,
    },
    InvalidAddress(String),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::TokenNotFound { mint } => write!(f, "token not found for mint {}", mint),
            RejectReason::PoolNotFound { pool } => {
                write!(f, "bonding curve pool {} not found", pool)
            }
            RejectReason::BelowThreshold {
                current_quote_lamports,
                required_quote_lamports,
            } => write!(
                f,
                "below threshold: {} SOL of {} SOL required",
                lamports_to_sol_f64(*current_quote_lamports),
                lamports_to_sol_f64(*required_quote_lamports)
            ),
            RejectReason::InvalidAddress(addr) => write!(f, "invalid address: {}", addr),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationPhase {
    Bonding,
    Claiming,
    Migrating,
    Graduated,
    Rejected(RejectReason),
    Failed(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Illegal migration transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: MigrationPhase,
    pub to: MigrationPhase,
}

impl MigrationPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MigrationPhase::Graduated | MigrationPhase::Rejected(_) | MigrationPhase::Failed(_)
        )
    }

    /// Run stopped mid-flight (process died between phases)
    pub fn is_interrupted(&self) -> bool {
        matches!(self, MigrationPhase::Claiming | MigrationPhase::Migrating)
    }

    /// Move to `next`, refusing anything that skips or reorders a phase.
    /// Claiming always precedes Migrating.
    pub fn advance(&self, next: MigrationPhase) -> Result<MigrationPhase, InvalidTransition> {
        use MigrationPhase::*;

        let allowed = match (self, &next) {
            (Bonding, Claiming) | (Bonding, Rejected(_)) => true,
            (Claiming, Migrating) => true,
            (Migrating, Graduated) | (Migrating, Failed(_)) => true,
            _ => false,
        };

        if allowed {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self.clone(),
                to: next,
            })
        }
    }
}

/// Outcome of the best-effort fee claim within an attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimAttempt {
    Claimed {
        #[serde(with = "super::serde_str")]
        signature: Signature,
        amount_lamports: u64,
    },
    NothingToClaim {
        claimable_lamports: u64,
    },
    Failed {
        reason: String,
    },
}

impl ClaimAttempt {
    pub fn signature(&self) -> Option<Signature> {
        match self {
            ClaimAttempt::Claimed { signature, .. } => Some(*signature),
            _ => None,
        }
    }

    pub fn claimed_lamports(&self) -> u64 {
        match self {
            ClaimAttempt::Claimed { amount_lamports, .. } => *amount_lamports,
            _ => 0,
        }
    }
}

/// One persisted orchestration run for a pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationAttempt {
    pub id: String,
    #[serde(with = "super::serde_str")]
    pub pool_address: Pubkey,
    #[serde(with = "super::serde_str")]
    pub mint_address: Pubkey,
    pub phase: MigrationPhase,
    pub claim: Option<ClaimAttempt>,
    #[serde(with = "super::serde_str::vec", default)]
    pub migration_signatures: Vec<Signature>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MigrationAttempt {
    pub fn start(pool_address: Pubkey, mint_address: Pubkey, now: DateTime<Utc>) -> Self {
        Self {
            id: format!(
                "{}-{}-{}",
                pool_address,
                now.timestamp_millis(),
                ATTEMPT_SEQUENCE.fetch_add(1, Ordering::Relaxed)
            ),
            pool_address,
            mint_address,
            phase: MigrationPhase::Bonding,
            claim: None,
            migration_signatures: Vec::new(),
            started_at: now,
            updated_at: now,
        }
    }

    pub fn transition(
        &mut self,
        next: MigrationPhase,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        self.phase = self.phase.advance(next)?;
        self.updated_at = now;
        Ok(())
    }
}
