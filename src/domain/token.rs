//! Launched Token
//!
//! Identity and lifecycle state of a token whose liquidity starts in a
//! bonding-curve pool and graduates into a permanent AMM pool.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

/// Trading status of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
    /// Still trading on the bonding curve
    Bonding,
    /// Liquidity migrated to the permanent pool
    Graduated,
}

/// Where the token's liquidity currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationStatus {
    Bonding,
    PermanentPoolActive,
}

/// A launched token as known to the persistence layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    #[serde(with = "super::serde_str")]
    pub mint_address: Pubkey,
    #[serde(with = "super::serde_str")]
    pub bonding_pool_address: Pubkey,
    /// Set once the token has graduated
    #[serde(with = "super::serde_str::option", default)]
    pub permanent_pool_address: Option<Pubkey>,
    pub status: TokenStatus,
    pub migration_status: MigrationStatus,
    pub graduated_at: Option<DateTime<Utc>>,
}

impl Token {
    /// Create a token that is still on its bonding curve
    pub fn new(id: impl Into<String>, mint_address: Pubkey, bonding_pool_address: Pubkey) -> Self {
        Self {
            id: id.into(),
            mint_address,
            bonding_pool_address,
            permanent_pool_address: None,
            status: TokenStatus::Bonding,
            migration_status: MigrationStatus::Bonding,
            graduated_at: None,
        }
    }

    pub fn is_graduated(&self) -> bool {
        self.status == TokenStatus::Graduated
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, update: &TokenUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(migration_status) = update.migration_status {
            self.migration_status = migration_status;
        }
        if let Some(pool) = update.permanent_pool_address {
            self.permanent_pool_address = Some(pool);
        }
        if let Some(at) = update.graduated_at {
            self.graduated_at = Some(at);
        }
    }
}

/// Partial token update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenUpdate {
    pub status: Option<TokenStatus>,
    pub migration_status: Option<MigrationStatus>,
    pub permanent_pool_address: Option<Pubkey>,
    pub graduated_at: Option<DateTime<Utc>>,
}

impl TokenUpdate {
    /// The only mutation the migration flow performs
    pub fn graduated(permanent_pool_address: Pubkey, at: DateTime<Utc>) -> Self {
        Self {
            status: Some(TokenStatus::Graduated),
            migration_status: Some(MigrationStatus::PermanentPoolActive),
            permanent_pool_address: Some(permanent_pool_address),
            graduated_at: Some(at),
        }
    }
}
