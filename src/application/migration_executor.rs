//! Migration Executor
//!
//! Two transactions: create the per-pool migration metadata account (skipped
//! when it already exists, so a resumed run is safe), then migrate the pool
//! into the AMM.

use serde::{Deserialize, Serialize};
use solana_sdk::{compute_budget::ComputeBudgetInstruction, pubkey::Pubkey, signature::Signature};
use std::sync::Arc;
use thiserror::Error;

use super::address_table::AddressTableManager;
use super::ledger_client::LedgerClientError;
use super::tx_sender::{SendError, TransactionSender};
use crate::adapters::dbc::BondingCurveProgram;
use crate::domain::BondingCurvePoolSnapshot;

const MIGRATION_COMPUTE_UNITS: u32 = 400_000;

/// Which address is reported and stored as the token's permanent pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermanentPoolAddressing {
    /// Keep using the bonding pool address as the token's pool identifier
    #[default]
    AliasBondingPool,
    /// The AMM pool PDA the migration creates
    DerivedPda,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MigrationError {
    #[error("Failed to check migration metadata: {0}")]
    Ledger(#[from] LedgerClientError),
    #[error("{step} failed: {source}")]
    Transaction { step: &'static str, source: SendError },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOutput {
    pub signatures: Vec<Signature>,
    pub permanent_pool_address: Pubkey,
}

pub struct MigrationExecutor {
    sender: TransactionSender,
    tables: Arc<AddressTableManager>,
    program: BondingCurveProgram,
    migration_config: Pubkey,
    addressing: PermanentPoolAddressing,
}

impl MigrationExecutor {
    pub fn new(
        sender: TransactionSender,
        tables: Arc<AddressTableManager>,
        program: BondingCurveProgram,
        migration_config: Pubkey,
        addressing: PermanentPoolAddressing,
    ) -> Self {
        Self {
            sender,
            tables,
            program,
            migration_config,
            addressing,
        }
    }

    pub fn permanent_pool_address(&self, pool: &BondingCurvePoolSnapshot) -> Pubkey {
        match self.addressing {
            PermanentPoolAddressing::AliasBondingPool => pool.address,
            PermanentPoolAddressing::DerivedPda => {
                self.program
                    .amm_pool(&self.migration_config, &pool.base_mint, &pool.quote_mint)
            }
        }
    }

    pub async fn migrate(
        &self,
        pool: &BondingCurvePoolSnapshot,
    ) -> Result<MigrationOutput, MigrationError> {
        let payer = self.sender.payer();
        let tables = self.tables.tables_for_transaction().await;
        let mut signatures = Vec::with_capacity(2);

        let metadata = self.program.migration_metadata(&pool.address);
        if self.sender.client().get_account(&metadata).await?.is_some() {
            tracing::info!("Migration metadata {} exists; skipping creation", metadata);
        } else {
            let ix = self.program.create_migration_metadata(pool, &payer);
            let signature = self
                .sender
                .send_and_confirm("create migration metadata", &[ix], &tables)
                .await
                .map_err(|source| MigrationError::Transaction {
                    step: "create migration metadata",
                    source,
                })?;
            signatures.push(signature);
        }

        let instructions = [
            ComputeBudgetInstruction::set_compute_unit_limit(MIGRATION_COMPUTE_UNITS),
            self.program.migrate_to_amm(pool, &self.migration_config, &payer),
        ];
        let signature = self
            .sender
            .send_and_confirm("migrate to amm", &instructions, &tables)
            .await
            .map_err(|source| MigrationError::Transaction {
                step: "migrate to amm",
                source,
            })?;
        signatures.push(signature);

        let permanent_pool_address = self.permanent_pool_address(pool);
        tracing::info!(
            "Pool {} migrated; permanent pool {} ({} transactions)",
            pool.address,
            permanent_pool_address,
            signatures.len()
        );

        Ok(MigrationOutput {
            signatures,
            permanent_pool_address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::dbc::{CREATE_MIGRATION_METADATA, MIGRATE_TO_AMM};
    use crate::adapters::solana::{PartnerWallet, RetryPolicy};
    use crate::application::LedgerClient;
    use crate::ports::mocks::{virtual_pool, MockLedger};
    use crate::ports::{ConfirmationOutcome, LookupTableState};

    fn executor(
        ledger: Arc<MockLedger>,
        addressing: PermanentPoolAddressing,
        table: Option<Pubkey>,
    ) -> (MigrationExecutor, Arc<AddressTableManager>) {
        let sender = TransactionSender::new(
            LedgerClient::new(ledger, RetryPolicy::default()),
            PartnerWallet::new_random(),
        );
        let program = BondingCurveProgram::new(Pubkey::new_unique(), Pubkey::new_unique());
        let tables = Arc::new(AddressTableManager::new(
            sender.clone(),
            program,
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            table,
        ));
        let executor = MigrationExecutor::new(
            sender,
            tables.clone(),
            program,
            Pubkey::new_unique(),
            addressing,
        );
        (executor, tables)
    }

    fn eligible_pool(ledger: &MockLedger) -> BondingCurvePoolSnapshot {
        let address = Pubkey::new_unique();
        let account = virtual_pool(Pubkey::new_unique(), 90_000_000_000, 85_000_000_000, 0);
        ledger.put_pool(address, &account).unwrap();
        account.into_snapshot(address)
    }

    #[tokio::test]
    async fn test_two_transactions_in_order() {
        let ledger = Arc::new(MockLedger::new());
        let (executor, _) =
            executor(ledger.clone(), PermanentPoolAddressing::AliasBondingPool, None);
        let pool = eligible_pool(&ledger);

        let output = executor.migrate(&pool).await.unwrap();

        assert_eq!(output.signatures.len(), 2);
        assert_eq!(output.permanent_pool_address, pool.address);
        assert_eq!(ledger.submission_index(CREATE_MIGRATION_METADATA), Some(0));
        assert_eq!(ledger.submission_index(MIGRATE_TO_AMM), Some(1));
        assert_eq!(ledger.pool(&pool.address).unwrap().is_migrated, 1);
    }

    #[tokio::test]
    async fn test_existing_metadata_is_skipped() {
        let ledger = Arc::new(MockLedger::new());
        let (executor, _) =
            executor(ledger.clone(), PermanentPoolAddressing::AliasBondingPool, None);
        let pool = eligible_pool(&ledger);
        let metadata = executor.program.migration_metadata(&pool.address);
        ledger.put_account(metadata, executor.program.program_id, vec![0u8; 8]);

        let output = executor.migrate(&pool).await.unwrap();

        assert_eq!(output.signatures.len(), 1);
        assert_eq!(ledger.submission_index(CREATE_MIGRATION_METADATA), None);
    }

    #[tokio::test]
    async fn test_derived_pda_addressing() {
        let ledger = Arc::new(MockLedger::new());
        let (executor, _) = executor(ledger.clone(), PermanentPoolAddressing::DerivedPda, None);
        let pool = eligible_pool(&ledger);

        let output = executor.migrate(&pool).await.unwrap();

        assert_ne!(output.permanent_pool_address, pool.address);
        assert_eq!(
            output.permanent_pool_address,
            executor
                .program
                .amm_pool(&executor.migration_config, &pool.base_mint, &pool.quote_mint)
        );
    }

    #[tokio::test]
    async fn test_failed_migration_is_reported() {
        let ledger = Arc::new(MockLedger::new());
        ledger.confirm_instruction_with(
            MIGRATE_TO_AMM,
            ConfirmationOutcome::Failed("insufficient funds".into()),
        );
        let (executor, _) =
            executor(ledger.clone(), PermanentPoolAddressing::AliasBondingPool, None);
        let pool = eligible_pool(&ledger);

        let result = executor.migrate(&pool).await;

        assert!(matches!(
            result,
            Err(MigrationError::Transaction { step: "migrate to amm", .. })
        ));
    }

    #[tokio::test]
    async fn test_uses_lookup_table_when_configured() {
        let ledger = Arc::new(MockLedger::new());
        let table = Pubkey::new_unique();
        let (executor, tables) = executor(
            ledger.clone(),
            PermanentPoolAddressing::AliasBondingPool,
            Some(table),
        );
        ledger.put_lookup_table(LookupTableState::new(table, tables.static_addresses()));
        let pool = eligible_pool(&ledger);

        executor.migrate(&pool).await.unwrap();

        let submissions = ledger.submissions();
        assert!(submissions.iter().all(|s| s.uses_lookup_tables()));
    }
}
