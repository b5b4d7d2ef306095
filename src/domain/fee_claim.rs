//! Fee Claim Records
//!
//! Append-only accounting of partner fees claimed from bonding-curve pools.
//! The ledger signature is the natural key: one signature, one record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, signature::Signature};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeClaimRecord {
    pub id: String,
    pub token_id: Option<String>,
    #[serde(with = "super::serde_str")]
    pub pool_address: Pubkey,
    #[serde(with = "super::serde_str")]
    pub signature: Signature,
    /// Claimed quote amount in lamports
    pub claimed_amount: u64,
    pub claimed_at: DateTime<Utc>,
    /// Set by downstream revenue accounting
    pub processed: bool,
}

impl FeeClaimRecord {
    pub fn new(
        token_id: Option<String>,
        pool_address: Pubkey,
        signature: Signature,
        claimed_amount: u64,
        claimed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("claim-{}", signature),
            token_id,
            pool_address,
            signature,
            claimed_amount,
            claimed_at,
            processed: false,
        }
    }
}

/// Result of an upsert-or-ignore insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A record with the same signature already existed; nothing written
    Duplicate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_derives_from_signature() {
        let sig = Signature::new_unique();
        let a = FeeClaimRecord::new(None, Pubkey::new_unique(), sig, 1, Utc::now());
        let b = FeeClaimRecord::new(Some("tok".into()), Pubkey::new_unique(), sig, 2, Utc::now());
        assert_eq!(a.id, b.id);
        assert!(!a.processed);
    }
}
