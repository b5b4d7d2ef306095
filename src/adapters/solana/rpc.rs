use async_trait::async_trait;
use solana_client::{
    client_error::{ClientError, ClientErrorKind},
    rpc_client::RpcClient,
    rpc_request::RpcError,
};
use solana_sdk::{
    address_lookup_table::state::AddressLookupTable,
    commitment_config::CommitmentConfig,
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::ports::{
    AccountState, BlockhashMeta, ConfirmationOutcome, LedgerError, LedgerPort, LookupTableState,
};

const HTTP_TOO_MANY_REQUESTS: u16 = 429;

/// Map an RPC client error to the ledger taxonomy. This is the only place
/// that inspects client errors; callers match on `LedgerError` variants.
pub fn classify_client_error(err: &ClientError) -> LedgerError {
    match &err.kind {
        ClientErrorKind::Reqwest(e)
            if e.status().map(|s| s.as_u16()) == Some(HTTP_TOO_MANY_REQUESTS) =>
        {
            LedgerError::RateLimited(err.to_string())
        }
        ClientErrorKind::RpcError(RpcError::RpcResponseError { code, .. })
            if *code == i64::from(HTTP_TOO_MANY_REQUESTS) =>
        {
            LedgerError::RateLimited(err.to_string())
        }
        _ => LedgerError::Fatal(err.to_string()),
    }
}

fn join_error(e: tokio::task::JoinError) -> LedgerError {
    LedgerError::Fatal(format!("Task join error: {}", e))
}

/// Wrapper around the Solana RPC client implementing `LedgerPort`
#[derive(Clone)]
pub struct SolanaClient {
    client: Arc<RpcClient>,
    commitment: CommitmentConfig,
    confirm_timeout: Duration,
    confirm_poll_interval: Duration,
}

impl SolanaClient {
    pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

    /// Create a new Solana RPC client at `confirmed` commitment
    pub fn new(rpc_url: String) -> Self {
        Self::with_config(
            rpc_url,
            CommitmentConfig::confirmed(),
            Self::DEFAULT_CONFIRM_TIMEOUT,
            Self::DEFAULT_POLL_INTERVAL,
        )
    }

    pub fn with_config(
        rpc_url: String,
        commitment: CommitmentConfig,
        confirm_timeout: Duration,
        confirm_poll_interval: Duration,
    ) -> Self {
        let client = Arc::new(RpcClient::new_with_commitment(rpc_url, commitment));
        Self {
            client,
            commitment,
            confirm_timeout,
            confirm_poll_interval,
        }
    }

    pub fn url(&self) -> String {
        self.client.url()
    }

    async fn fetch_account(
        &self,
        address: &Pubkey,
    ) -> Result<Option<solana_sdk::account::Account>, LedgerError> {
        let client = Arc::clone(&self.client);
        let address = *address;
        let commitment = self.commitment;

        // Spawn blocking to make sync RPC call async-compatible
        tokio::task::spawn_blocking(move || {
            client
                .get_account_with_commitment(&address, commitment)
                .map(|response| response.value)
                .map_err(|e| classify_client_error(&e))
        })
        .await
        .map_err(join_error)?
    }
}

#[async_trait]
impl LedgerPort for SolanaClient {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<AccountState>, LedgerError> {
        let account = self.fetch_account(address).await?;
        Ok(account.map(|account| AccountState {
            address: *address,
            owner: account.owner,
            lamports: account.lamports,
            data: account.data,
        }))
    }

    async fn get_recent_blockhash_meta(&self) -> Result<BlockhashMeta, LedgerError> {
        let client = Arc::clone(&self.client);
        let commitment = self.commitment;

        tokio::task::spawn_blocking(move || {
            client
                .get_latest_blockhash_with_commitment(commitment)
                .map(|(blockhash, last_valid_block_height)| BlockhashMeta {
                    blockhash,
                    last_valid_block_height,
                })
                .map_err(|e| classify_client_error(&e))
        })
        .await
        .map_err(join_error)?
    }

    async fn submit(&self, signed_tx: &[u8]) -> Result<Signature, LedgerError> {
        let tx: VersionedTransaction = bincode::deserialize(signed_tx)
            .map_err(|e| LedgerError::Fatal(format!("Malformed transaction bytes: {}", e)))?;
        let client = Arc::clone(&self.client);

        tokio::task::spawn_blocking(move || {
            client
                .send_transaction(&tx)
                .map_err(|e| classify_client_error(&e))
        })
        .await
        .map_err(join_error)?
    }

    async fn confirm(&self, signature: &Signature) -> Result<ConfirmationOutcome, LedgerError> {
        let start = Instant::now();
        let signature = *signature;

        loop {
            let client = Arc::clone(&self.client);
            let statuses = tokio::task::spawn_blocking(move || {
                client
                    .get_signature_statuses(&[signature])
                    .map(|response| response.value)
                    .map_err(|e| classify_client_error(&e))
            })
            .await
            .map_err(join_error)??;

            if let Some(Some(status)) = statuses.into_iter().next() {
                if let Some(err) = status.err {
                    return Ok(ConfirmationOutcome::Failed(err.to_string()));
                }
                if status.satisfies_commitment(self.commitment) {
                    return Ok(ConfirmationOutcome::Confirmed);
                }
            }

            if start.elapsed() >= self.confirm_timeout {
                tracing::warn!(
                    "Signature {} not confirmed after {:?}",
                    signature,
                    self.confirm_timeout
                );
                return Ok(ConfirmationOutcome::Timeout);
            }

            tokio::time::sleep(self.confirm_poll_interval).await;
        }
    }

    async fn get_lookup_table(
        &self,
        address: &Pubkey,
    ) -> Result<Option<LookupTableState>, LedgerError> {
        let Some(account) = self.fetch_account(address).await? else {
            return Ok(None);
        };

        let table = AddressLookupTable::deserialize(&account.data).map_err(|e| {
            LedgerError::Fatal(format!("Account {} is not a lookup table: {}", address, e))
        })?;

        Ok(Some(LookupTableState::new(*address, table.addresses.to_vec())))
    }

    async fn get_slot(&self) -> Result<u64, LedgerError> {
        let client = Arc::clone(&self.client);
        let commitment = self.commitment;

        tokio::task::spawn_blocking(move || {
            client
                .get_slot_with_commitment(commitment)
                .map_err(|e| classify_client_error(&e))
        })
        .await
        .map_err(join_error)?
    }
}
