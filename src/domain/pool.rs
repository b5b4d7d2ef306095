//! Bonding Curve Pool State
//!
//! Point-in-time view of a bonding-curve pool and the graduation checks
//! derived from it. Never persisted; recomputed on every read.

use chrono::{DateTime, Utc};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;

/// Decoded on-chain state of a bonding-curve pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BondingCurvePoolSnapshot {
    pub address: Pubkey,
    /// Pool config account (owns the fee claimer and migration settings)
    pub config: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub virtual_base_reserve: u64,
    /// Virtual quote reserve in lamports, compared against the threshold
    pub virtual_quote_reserve: u64,
    /// Quote actually deposited by traders, in lamports
    pub real_quote_reserve: u64,
    /// Partner share of trading fees not yet claimed (base token units)
    pub partner_base_fee: u64,
    /// Partner share of trading fees not yet claimed (lamports)
    pub partner_quote_fee: u64,
    pub is_migrated: bool,
}

/// Pool snapshot with graduation metrics computed against a threshold
#[derive(Debug, Clone, PartialEq)]
pub struct PoolStateSnapshot {
    pub pool: BondingCurvePoolSnapshot,
    pub threshold_lamports: u64,
    pub bonding_progress_percent: f64,
    pub is_eligible_for_graduation: bool,
    pub read_at: DateTime<Utc>,
}

impl PoolStateSnapshot {
    pub fn derive(
        pool: BondingCurvePoolSnapshot,
        threshold_lamports: u64,
        read_at: DateTime<Utc>,
    ) -> Self {
        let bonding_progress_percent =
            bonding_progress_percent(pool.real_quote_reserve, threshold_lamports);
        let is_eligible_for_graduation = is_eligible(&pool, threshold_lamports);
        Self {
            pool,
            threshold_lamports,
            bonding_progress_percent,
            is_eligible_for_graduation,
            read_at,
        }
    }

    pub fn address(&self) -> Pubkey {
        self.pool.address
    }
}

/// Percent of the threshold reached by real quote deposits, capped at 100
pub fn bonding_progress_percent(real_quote_reserve: u64, threshold_lamports: u64) -> f64 {
    if threshold_lamports == 0 {
        return 100.0;
    }
    let progress = real_quote_reserve as f64 / threshold_lamports as f64 * 100.0;
    progress.min(100.0)
}

/// Virtual quote reserve reached the threshold and the pool is still open
pub fn is_eligible(pool: &BondingCurvePoolSnapshot, threshold_lamports: u64) -> bool {
    pool.virtual_quote_reserve >= threshold_lamports && !pool.is_migrated
}

/// Graduation verdict for the migration flow
#[derive(Debug, Clone, PartialEq)]
pub enum PoolAssessment {
    Eligible(PoolStateSnapshot),
    BelowThreshold(PoolStateSnapshot),
    /// Migration already happened; callers treat this as success
    AlreadyMigrated(PoolStateSnapshot),
}

impl PoolAssessment {
    pub fn from_snapshot(snapshot: PoolStateSnapshot) -> Self {
        if snapshot.pool.is_migrated {
            PoolAssessment::AlreadyMigrated(snapshot)
        } else if snapshot.is_eligible_for_graduation {
            PoolAssessment::Eligible(snapshot)
        } else {
            PoolAssessment::BelowThreshold(snapshot)
        }
    }

    pub fn snapshot(&self) -> &PoolStateSnapshot {
        match self {
            PoolAssessment::Eligible(s)
            | PoolAssessment::BelowThreshold(s)
            | PoolAssessment::AlreadyMigrated(s) => s,
        }
    }
}

/// Read-only progress view served by the API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolProgress {
    pub pool_address: String,
    pub bonding_progress_percent: f64,
    pub is_eligible_for_graduation: bool,
    pub is_migrated: bool,
    pub current_quote: f64,
    pub required_quote: f64,
}

impl From<&PoolStateSnapshot> for PoolProgress {
    fn from(snapshot: &PoolStateSnapshot) -> Self {
        use super::amount::lamports_to_sol_f64;

        Self {
            pool_address: snapshot.pool.address.to_string(),
            bonding_progress_percent: snapshot.bonding_progress_percent,
            is_eligible_for_graduation: snapshot.is_eligible_for_graduation,
            is_migrated: snapshot.pool.is_migrated,
            current_quote: lamports_to_sol_f64(snapshot.pool.virtual_quote_reserve),
            required_quote: lamports_to_sol_f64(snapshot.threshold_lamports),
        }
    }
}
