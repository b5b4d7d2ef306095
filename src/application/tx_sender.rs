//! Transaction Sender
//!
//! Compile a v0 message (with lookup tables when available), sign with the
//! partner wallet, enforce the packet size limit, submit once and confirm.

use solana_sdk::{
    address_lookup_table::AddressLookupTableAccount,
    instruction::Instruction,
    message::{v0::Message as MessageV0, VersionedMessage},
    packet::PACKET_DATA_SIZE,
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
use thiserror::Error;

use super::ledger_client::{LedgerClient, LedgerClientError};
use crate::adapters::solana::PartnerWallet;
use crate::ports::ConfirmationOutcome;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("Failed to compile message: {0}")]
    Compile(String),
    #[error("Failed to sign transaction: {0}")]
    Signing(String),
    #[error("Transaction is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },
    #[error("Ledger unavailable before submission: {0}")]
    Ledger(LedgerClientError),
    #[error("Submission rejected: {0}")]
    Rejected(LedgerClientError),
    #[error("Transaction {signature} failed: {reason}")]
    ConfirmationFailed { signature: Signature, reason: String },
    #[error("Transaction {signature} not confirmed in time; check on-chain state before retrying")]
    ConfirmationTimeout { signature: Signature },
    #[error("Could not confirm {signature}: {source}")]
    ConfirmationUnavailable {
        signature: Signature,
        source: LedgerClientError,
    },
}

#[derive(Clone)]
pub struct TransactionSender {
    client: LedgerClient,
    wallet: PartnerWallet,
}

impl TransactionSender {
    pub fn new(client: LedgerClient, wallet: PartnerWallet) -> Self {
        Self { client, wallet }
    }

    pub fn client(&self) -> &LedgerClient {
        &self.client
    }

    pub fn payer(&self) -> Pubkey {
        self.wallet.pubkey()
    }

    /// Sign and serialize without submitting
    pub async fn build(
        &self,
        instructions: &[Instruction],
        lookup_tables: &[AddressLookupTableAccount],
    ) -> Result<Vec<u8>, SendError> {
        let meta = self
            .client
            .get_recent_blockhash_meta()
            .await
            .map_err(SendError::Ledger)?;

        let message =
            MessageV0::try_compile(&self.payer(), instructions, lookup_tables, meta.blockhash)
                .map_err(|e| SendError::Compile(e.to_string()))?;
        let tx =
            VersionedTransaction::try_new(VersionedMessage::V0(message), &[self.wallet.keypair()])
                .map_err(|e| SendError::Signing(e.to_string()))?;

        let bytes = bincode::serialize(&tx).map_err(|e| SendError::Compile(e.to_string()))?;
        if bytes.len() > PACKET_DATA_SIZE {
            return Err(SendError::TooLarge {
                size: bytes.len(),
                limit: PACKET_DATA_SIZE,
            });
        }
        Ok(bytes)
    }

    /// Submit once, then wait for confirmation
    pub async fn send_and_confirm(
        &self,
        label: &str,
        instructions: &[Instruction],
        lookup_tables: &[AddressLookupTableAccount],
    ) -> Result<Signature, SendError> {
        let bytes = self.build(instructions, lookup_tables).await?;
        tracing::debug!(
            "{}: {} bytes, {} instructions, {} lookup tables",
            label,
            bytes.len(),
            instructions.len(),
            lookup_tables.len()
        );

        let signature = self.client.submit(&bytes).await.map_err(SendError::Rejected)?;
        tracing::info!("{} submitted: {}", label, signature);

        let outcome = self
            .client
            .confirm(&signature)
            .await
            .map_err(|source| SendError::ConfirmationUnavailable { signature, source })?;

        match outcome {
            ConfirmationOutcome::Confirmed => {
                tracing::info!("{} confirmed: {}", label, signature);
                Ok(signature)
            }
            ConfirmationOutcome::Failed(reason) => {
                Err(SendError::ConfirmationFailed { signature, reason })
            }
            ConfirmationOutcome::Timeout => Err(SendError::ConfirmationTimeout { signature }),
        }
    }
}
