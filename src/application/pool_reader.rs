//! Pool State Reader
//!
//! Reads and decodes bonding-curve pool accounts and grades them against the
//! graduation threshold. Only accounts owned by the configured bonding-curve
//! program are decoded. The migration flow always reads fresh; only the
//! progress endpoint goes through `PoolStateCache`, which the orchestrator
//! invalidates whenever a pool graduates.

use chrono::Duration;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use super::ledger_client::{LedgerClient, LedgerClientError};
use crate::adapters::dbc::{LayoutError, VirtualPoolAccount};
use crate::domain::{PoolAssessment, PoolStateSnapshot};
use crate::ports::Clock;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolReadError {
    #[error("Bonding curve pool {0} not found")]
    PoolNotFound(Pubkey),
    #[error("Account {address} is owned by {owner}, not the bonding curve program")]
    WrongOwner { address: Pubkey, owner: Pubkey },
    #[error("Account {address} is not a bonding curve pool: {source}")]
    Decode { address: Pubkey, source: LayoutError },
    #[error(transparent)]
    Ledger(#[from] LedgerClientError),
}

#[derive(Clone)]
pub struct PoolStateReader {
    client: LedgerClient,
    clock: Arc<dyn Clock>,
    program_id: Pubkey,
    threshold_lamports: u64,
}

impl PoolStateReader {
    pub fn new(
        client: LedgerClient,
        clock: Arc<dyn Clock>,
        program_id: Pubkey,
        threshold_lamports: u64,
    ) -> Self {
        Self {
            client,
            clock,
            program_id,
            threshold_lamports,
        }
    }

    pub fn threshold_lamports(&self) -> u64 {
        self.threshold_lamports
    }

    pub async fn read(&self, pool: &Pubkey) -> Result<PoolStateSnapshot, PoolReadError> {
        let account = self
            .client
            .get_account(pool)
            .await?
            .ok_or(PoolReadError::PoolNotFound(*pool))?;

        if account.owner != self.program_id {
            return Err(PoolReadError::WrongOwner {
                address: *pool,
                owner: account.owner,
            });
        }

        let decoded =
            VirtualPoolAccount::decode(&account.data).map_err(|source| PoolReadError::Decode {
                address: *pool,
                source,
            })?;

        let snapshot = PoolStateSnapshot::derive(
            decoded.into_snapshot(*pool),
            self.threshold_lamports,
            self.clock.now(),
        );

        tracing::debug!(
            "Pool {}: virtual quote {} / {} lamports, progress {:.1}%, migrated={}",
            pool,
            snapshot.pool.virtual_quote_reserve,
            self.threshold_lamports,
            snapshot.bonding_progress_percent,
            snapshot.pool.is_migrated
        );

        Ok(snapshot)
    }

    pub async fn assess(&self, pool: &Pubkey) -> Result<PoolAssessment, PoolReadError> {
        Ok(PoolAssessment::from_snapshot(self.read(pool).await?))
    }
}

/// TTL cache in front of `PoolStateReader` for read-only progress queries
pub struct PoolStateCache {
    reader: PoolStateReader,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    /// Maximum entries before cleanup
    max_entries: usize,
    entries: Mutex<HashMap<Pubkey, PoolStateSnapshot>>,
}

impl PoolStateCache {
    /// Default max cache entries
    pub const DEFAULT_MAX_ENTRIES: usize = 1000;

    pub fn new(reader: PoolStateReader, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self::with_max_entries(reader, clock, ttl, Self::DEFAULT_MAX_ENTRIES)
    }

    pub fn with_max_entries(
        reader: PoolStateReader,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        max_entries: usize,
    ) -> Self {
        Self {
            reader,
            clock,
            ttl,
            max_entries: max_entries.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, pool: &Pubkey) -> Result<PoolStateSnapshot, PoolReadError> {
        let now = self.clock.now();
        {
            let entries = self.entries.lock().await;
            if let Some(snapshot) = entries.get(pool) {
                if now - snapshot.read_at < self.ttl {
                    return Ok(snapshot.clone());
                }
            }
        }

        let snapshot = self.reader.read(pool).await?;
        self.insert(snapshot.clone()).await;
        Ok(snapshot)
    }

    async fn insert(&self, snapshot: PoolStateSnapshot) {
        let mut entries = self.entries.lock().await;
        let address = snapshot.address();

        if !entries.contains_key(&address) && entries.len() >= self.max_entries {
            let now = self.clock.now();
            let ttl = self.ttl;
            entries.retain(|_, cached| now - cached.read_at < ttl);

            // Still at capacity after cleanup? Remove oldest entry
            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, cached)| cached.read_at)
                    .map(|(key, _)| *key);
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(address, snapshot);
    }

    /// Drop a pool's entry, e.g. after it migrated
    pub async fn invalidate(&self, pool: &Pubkey) {
        self.entries.lock().await.remove(pool);
    }

    /// Remove expired entries
    pub async fn cleanup(&self) {
        let now = self.clock.now();
        let ttl = self.ttl;
        self.entries
            .lock()
            .await
            .retain(|_, snapshot| now - snapshot.read_at < ttl);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
