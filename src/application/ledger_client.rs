//! Ledger Client
//!
//! Wraps a `LedgerPort` with the rate-limit retry policy. Reads retry;
//! submission never does, since a resubmitted transaction could land twice.

use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::sync::Arc;
use thiserror::Error;

use crate::adapters::solana::{RetryError, RetryPolicy};
use crate::ports::{
    AccountState, BlockhashMeta, ConfirmationOutcome, LedgerError, LedgerPort, LookupTableState,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerClientError {
    #[error("No recent blockhash after {attempts} rate-limited attempts")]
    BlockhashUnavailable { attempts: u32 },
    #[error("{operation} still rate limited after {attempts} attempts")]
    RetriesExhausted { operation: &'static str, attempts: u32 },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl LedgerClientError {
    fn from_retry(operation: &'static str, err: RetryError) -> Self {
        match err {
            RetryError::Fatal(e) => LedgerClientError::Ledger(e),
            RetryError::Exhausted { attempts, .. } => {
                LedgerClientError::RetriesExhausted { operation, attempts }
            }
        }
    }
}

#[derive(Clone)]
pub struct LedgerClient {
    port: Arc<dyn LedgerPort>,
    policy: RetryPolicy,
}

impl LedgerClient {
    pub fn new(port: Arc<dyn LedgerPort>, policy: RetryPolicy) -> Self {
        Self { port, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn get_account(
        &self,
        address: &Pubkey,
    ) -> Result<Option<AccountState>, LedgerClientError> {
        const OP: &str = "getAccountInfo";
        self.policy
            .run(OP, || self.port.get_account(address))
            .await
            .map_err(|e| LedgerClientError::from_retry(OP, e))
    }

    pub async fn get_recent_blockhash_meta(&self) -> Result<BlockhashMeta, LedgerClientError> {
        self.policy
            .run("getLatestBlockhash", || self.port.get_recent_blockhash_meta())
            .await
            .map_err(|e| match e {
                RetryError::Fatal(e) => LedgerClientError::Ledger(e),
                RetryError::Exhausted { attempts, .. } => {
                    LedgerClientError::BlockhashUnavailable { attempts }
                }
            })
    }

    /// Submitted once; errors surface unchanged
    pub async fn submit(&self, signed_tx: &[u8]) -> Result<Signature, LedgerClientError> {
        Ok(self.port.submit(signed_tx).await?)
    }

    pub async fn confirm(
        &self,
        signature: &Signature,
    ) -> Result<ConfirmationOutcome, LedgerClientError> {
        const OP: &str = "getSignatureStatuses";
        self.policy
            .run(OP, || self.port.confirm(signature))
            .await
            .map_err(|e| LedgerClientError::from_retry(OP, e))
    }

    pub async fn get_lookup_table(
        &self,
        address: &Pubkey,
    ) -> Result<Option<LookupTableState>, LedgerClientError> {
        const OP: &str = "getAddressLookupTable";
        self.policy
            .run(OP, || self.port.get_lookup_table(address))
            .await
            .map_err(|e| LedgerClientError::from_retry(OP, e))
    }

    pub async fn get_slot(&self) -> Result<u64, LedgerClientError> {
        const OP: &str = "getSlot";
        self.policy
            .run(OP, || self.port.get_slot())
            .await
            .map_err(|e| LedgerClientError::from_retry(OP, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mocks::MockLedger;
    use std::time::Duration;

    fn client(ledger: Arc<MockLedger>) -> LedgerClient {
        LedgerClient::new(ledger, RetryPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_blockhash_exhaustion_is_bounded() {
        let ledger = Arc::new(MockLedger::new());
        ledger.rate_limit_blockhash(u32::MAX);
        let start = tokio::time::Instant::now();

        let result = client(ledger.clone()).get_recent_blockhash_meta().await;

        assert_eq!(result, Err(LedgerClientError::BlockhashUnavailable { attempts: 5 }));
        assert_eq!(ledger.blockhash_calls(), 5);
        assert_eq!(start.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blockhash_recovers() {
        let ledger = Arc::new(MockLedger::new());
        ledger.rate_limit_blockhash(3);

        let result = client(ledger.clone()).get_recent_blockhash_meta().await;

        assert!(result.is_ok());
        assert_eq!(ledger.blockhash_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_account_read_exhaustion_names_operation() {
        let ledger = Arc::new(MockLedger::new());
        ledger.rate_limit_accounts(10);

        let result = client(ledger).get_account(&Pubkey::new_unique()).await;

        assert_eq!(
            result,
            Err(LedgerClientError::RetriesExhausted {
                operation: "getAccountInfo",
                attempts: 5
            })
        );
    }

    #[tokio::test]
    async fn test_submit_is_not_retried() {
        let ledger = Arc::new(MockLedger::new());
        let result = client(ledger.clone()).submit(&[0u8; 4]).await;

        assert!(matches!(result, Err(LedgerClientError::Ledger(LedgerError::Fatal(_)))));
        assert!(ledger.submissions().is_empty());
    }
}
