//! Fee Claim Coordinator
//!
//! Withdraws the partner share of trading fees from a bonding pool before it
//! is closed by migration. A claim is recorded only once its transaction is
//! confirmed, keyed by signature so a replay never produces a second row.

use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::sync::Arc;
use thiserror::Error;

use super::address_table::AddressTableManager;
use super::tx_sender::{SendError, TransactionSender};
use crate::adapters::dbc::{create_associated_token_account_idempotent, BondingCurveProgram};
use crate::domain::known_programs::TOKEN_PROGRAM;
use crate::domain::{lamports_to_sol, BondingCurvePoolSnapshot, FeeClaimRecord, InsertOutcome};
use crate::ports::{Clock, FeeClaimStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed { signature: Signature, amount_lamports: u64 },
    /// Claimable amount is below the dust threshold
    NoFeesToClaim { claimable_lamports: u64 },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeeClaimError {
    #[error("Claim transaction rejected: {0}")]
    SubmissionRejected(String),
    #[error("Claim transaction {signature} failed: {reason}")]
    ConfirmationFailed { signature: Signature, reason: String },
    #[error("Claim transaction {signature} not confirmed in time")]
    ConfirmationTimeout { signature: Signature },
    #[error("Could not build claim transaction: {0}")]
    Build(String),
    #[error("Ledger unavailable during claim: {0}")]
    Ledger(String),
}

impl From<SendError> for FeeClaimError {
    fn from(err: SendError) -> Self {
        match err {
            SendError::Rejected(e) => FeeClaimError::SubmissionRejected(e.to_string()),
            SendError::ConfirmationFailed { signature, reason } => {
                FeeClaimError::ConfirmationFailed { signature, reason }
            }
            SendError::ConfirmationTimeout { signature } => {
                FeeClaimError::ConfirmationTimeout { signature }
            }
            SendError::Ledger(e) | SendError::ConfirmationUnavailable { source: e, .. } => {
                FeeClaimError::Ledger(e.to_string())
            }
            e @ (SendError::Compile(_) | SendError::Signing(_) | SendError::TooLarge { .. }) => {
                FeeClaimError::Build(e.to_string())
            }
        }
    }
}

pub struct FeeClaimCoordinator {
    sender: TransactionSender,
    tables: Arc<AddressTableManager>,
    program: BondingCurveProgram,
    store: Arc<dyn FeeClaimStore>,
    clock: Arc<dyn Clock>,
    min_claim_lamports: u64,
}

impl FeeClaimCoordinator {
    pub fn new(
        sender: TransactionSender,
        tables: Arc<AddressTableManager>,
        program: BondingCurveProgram,
        store: Arc<dyn FeeClaimStore>,
        clock: Arc<dyn Clock>,
        min_claim_lamports: u64,
    ) -> Self {
        Self {
            sender,
            tables,
            program,
            store,
            clock,
            min_claim_lamports,
        }
    }

    pub fn fee_claimer(&self) -> Pubkey {
        self.sender.payer()
    }

    /// Claim all partner fees currently owed by `pool`
    pub async fn claim(
        &self,
        pool: &BondingCurvePoolSnapshot,
        token_id: Option<&str>,
    ) -> Result<ClaimOutcome, FeeClaimError> {
        let claimable = pool.partner_quote_fee;
        if claimable < self.min_claim_lamports {
            tracing::info!(
                "Pool {}: {} SOL claimable, below {} SOL minimum; skipping claim",
                pool.address,
                lamports_to_sol(claimable),
                lamports_to_sol(self.min_claim_lamports)
            );
            return Ok(ClaimOutcome::NoFeesToClaim {
                claimable_lamports: claimable,
            });
        }

        let claimer = self.fee_claimer();
        let instructions = [
            create_associated_token_account_idempotent(
                &claimer,
                &claimer,
                &pool.base_mint,
                &TOKEN_PROGRAM,
            ),
            create_associated_token_account_idempotent(
                &claimer,
                &claimer,
                &pool.quote_mint,
                &TOKEN_PROGRAM,
            ),
            self.program
                .claim_trading_fee(pool, &claimer, pool.partner_base_fee, claimable),
        ];
        let tables = self.tables.tables_for_transaction().await;

        tracing::info!(
            "Claiming {} SOL partner fees from pool {}",
            lamports_to_sol(claimable),
            pool.address
        );
        let signature = self
            .sender
            .send_and_confirm("claim trading fee", &instructions, &tables)
            .await?;

        let record = FeeClaimRecord::new(
            token_id.map(str::to_string),
            pool.address,
            signature,
            claimable,
            self.clock.now(),
        );
        match self.store.insert_fee_claim(record).await {
            Ok(InsertOutcome::Inserted) => {
                tracing::info!("Recorded fee claim {} for pool {}", signature, pool.address);
            }
            Ok(InsertOutcome::Duplicate) => {
                tracing::info!("Fee claim {} already recorded", signature);
            }
            // The claim landed; a missing row does not undo it
            Err(e) => {
                tracing::error!("Fee claim {} confirmed but not recorded: {}", signature, e);
            }
        }

        Ok(ClaimOutcome::Claimed {
            signature,
            amount_lamports: claimable,
        })
    }
}
