//! JSON File Store
//!
//! Single-document persistence for tokens, fee claims and migration
//! attempts. Every mutation rewrites the document through a temp file and
//! rename, so a crash leaves either the old or the new state on disk.

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::state::StoreState;
use crate::domain::{FeeClaimRecord, InsertOutcome, MigrationAttempt, Token, TokenUpdate};
use crate::ports::{FeeClaimStore, MigrationAttemptStore, StoreError, TokenStore};

/// Default store file name inside the data directory
pub const DEFAULT_STORE_FILE: &str = "graduator_store.json";

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonFileStore {
    /// Open the store, starting empty when the file does not exist yet
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = Self::load(&path).await?;

        tracing::info!(
            "Store opened: {} ({} tokens, {} fee claims, {} attempts)",
            path.display(),
            state.tokens.len(),
            state.fee_claims.len(),
            state.attempts.len()
        );

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(path: &Path) -> Result<StoreState, StoreError> {
        if !path.exists() {
            return Ok(StoreState::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to read {}: {}", path.display(), e)))?;

        if content.trim().is_empty() {
            return Ok(StoreState::default());
        }

        serde_json::from_str(&content).map_err(|e| {
            StoreError::Backend(format!("Store file {} is corrupted: {}", path.display(), e))
        })
    }

    async fn persist(&self, state: &StoreState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    StoreError::Backend(format!("Failed to create directory: {}", e))
                })?;
            }
        }

        let content = serde_json::to_string_pretty(state)
            .map_err(|e| StoreError::Backend(format!("Failed to serialize store: {}", e)))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            StoreError::Backend(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Register or replace a token (used by the CLI `register` command)
    pub async fn upsert_token(&self, token: Token) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        next.upsert_token(token)?;
        self.persist(&next).await?;
        *state = next;
        Ok(())
    }

    pub async fn tokens(&self) -> Vec<Token> {
        self.state.lock().await.tokens.clone()
    }
}

#[async_trait]
impl TokenStore for JsonFileStore {
    async fn get_token_by_mint(&self, mint: &Pubkey) -> Result<Option<Token>, StoreError> {
        Ok(self.state.lock().await.token_by_mint(mint))
    }

    async fn update_token(&self, id: &str, update: TokenUpdate) -> Result<Token, StoreError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let token = next.update_token(id, &update)?;
        self.persist(&next).await?;
        *state = next;
        Ok(token)
    }
}

#[async_trait]
impl FeeClaimStore for JsonFileStore {
    async fn insert_fee_claim(&self, record: FeeClaimRecord) -> Result<InsertOutcome, StoreError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let outcome = next.insert_fee_claim(record);
        if outcome == InsertOutcome::Inserted {
            self.persist(&next).await?;
            *state = next;
        }
        Ok(outcome)
    }

    async fn fee_claims_for_pool(&self, pool: &Pubkey) -> Result<Vec<FeeClaimRecord>, StoreError> {
        Ok(self.state.lock().await.fee_claims_for_pool(pool))
    }
}

#[async_trait]
impl MigrationAttemptStore for JsonFileStore {
    async fn save_attempt(&self, attempt: &MigrationAttempt) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        next.save_attempt(attempt);
        self.persist(&next).await?;
        *state = next;
        Ok(())
    }

    async fn latest_attempt(&self, pool: &Pubkey) -> Result<Option<MigrationAttempt>, StoreError> {
        Ok(self.state.lock().await.latest_attempt(pool))
    }
}
