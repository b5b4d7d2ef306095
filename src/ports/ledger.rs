//! Ledger Port
//!
//! The capability surface the graduation flow needs from Solana. Adapter
//! errors are classified once, at the adapter boundary, into
//! `LedgerError::RateLimited` (worth retrying) or `LedgerError::Fatal`.

use async_trait::async_trait;
use solana_sdk::{
    address_lookup_table::AddressLookupTableAccount, hash::Hash, pubkey::Pubkey,
    signature::Signature,
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// RPC quota exceeded; safe to retry after a delay
    #[error("Rate limited by RPC endpoint: {0}")]
    RateLimited(String),
    /// Anything else; never retried
    #[error("Ledger request failed: {0}")]
    Fatal(String),
}

impl LedgerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::RateLimited(_))
    }
}

/// Raw account as returned by the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
    pub address: Pubkey,
    pub owner: Pubkey,
    pub lamports: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockhashMeta {
    pub blockhash: Hash,
    /// Transactions using this blockhash expire after this block height
    pub last_valid_block_height: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Confirmed,
    /// Landed but the transaction errored
    Failed(String),
    /// Not observed within the confirmation window. The transaction may
    /// still land; re-check state before resubmitting.
    Timeout,
}

/// On-chain address lookup table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTableState {
    pub address: Pubkey,
    pub addresses: Vec<Pubkey>,
    pub loaded_count: usize,
}

impl LookupTableState {
    pub fn new(address: Pubkey, addresses: Vec<Pubkey>) -> Self {
        let loaded_count = addresses.len();
        Self {
            address,
            addresses,
            loaded_count,
        }
    }

    /// True when every address in `set` is already registered
    pub fn contains_all(&self, set: &[Pubkey]) -> bool {
        set.iter().all(|key| self.addresses.contains(key))
    }

    /// Form consumed by v0 message compilation
    pub fn to_account(&self) -> AddressLookupTableAccount {
        AddressLookupTableAccount {
            key: self.address,
            addresses: self.addresses.clone(),
        }
    }
}

/// Ledger access used by every graduation component
#[async_trait]
pub trait LedgerPort: Send + Sync {
    /// `Ok(None)` when the account does not exist
    async fn get_account(&self, address: &Pubkey) -> Result<Option<AccountState>, LedgerError>;

    async fn get_recent_blockhash_meta(&self) -> Result<BlockhashMeta, LedgerError>;

    /// Submit a bincode-serialized, fully signed versioned transaction
    async fn submit(&self, signed_tx: &[u8]) -> Result<Signature, LedgerError>;

    /// Wait for the transaction to reach the configured commitment
    async fn confirm(&self, signature: &Signature) -> Result<ConfirmationOutcome, LedgerError>;

    /// `Ok(None)` when no lookup table exists at `address`
    async fn get_lookup_table(
        &self,
        address: &Pubkey,
    ) -> Result<Option<LookupTableState>, LedgerError>;

    /// Current slot, used to derive new lookup table addresses
    async fn get_slot(&self) -> Result<u64, LedgerError>;
}
