//! Storage Ports
//!
//! Persistence contracts owned by external collaborators. The migration flow
//! only reads tokens by mint, updates them once on graduation, appends fee
//! claims and records its own attempts.

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::domain::{FeeClaimRecord, InsertOutcome, MigrationAttempt, Token, TokenUpdate};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Storage backend failed: {0}")]
    Backend(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get_token_by_mint(&self, mint: &Pubkey) -> Result<Option<Token>, StoreError>;

    /// Fails with `StoreError::NotFound` for an unknown id
    async fn update_token(&self, id: &str, update: TokenUpdate) -> Result<Token, StoreError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeeClaimStore: Send + Sync {
    /// Upsert-or-ignore keyed by signature
    async fn insert_fee_claim(&self, record: FeeClaimRecord) -> Result<InsertOutcome, StoreError>;

    async fn fee_claims_for_pool(&self, pool: &Pubkey) -> Result<Vec<FeeClaimRecord>, StoreError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MigrationAttemptStore: Send + Sync {
    /// Insert or replace by attempt id
    async fn save_attempt(&self, attempt: &MigrationAttempt) -> Result<(), StoreError>;

    async fn latest_attempt(&self, pool: &Pubkey) -> Result<Option<MigrationAttempt>, StoreError>;
}
