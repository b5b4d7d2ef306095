//! Component wiring
//!
//! Builds the application graph from a validated `Config`, a ledger port,
//! the partner wallet and a store.

use std::sync::Arc;

use crate::adapters::http::AppState;
use crate::adapters::solana::PartnerWallet;
use crate::application::{
    AddressTableManager, FeeClaimCoordinator, LedgerClient, MigrationExecutor,
    MigrationOrchestrator, PoolStateCache, PoolStateReader, TransactionSender,
};
use crate::config::{Config, ConfigError};
use crate::ports::{Clock, FeeClaimStore, LedgerPort, MigrationAttemptStore, TokenStore};

/// Every long-lived component of a running graduator
pub struct Graduator {
    pub sender: TransactionSender,
    pub tables: Arc<AddressTableManager>,
    pub orchestrator: Arc<MigrationOrchestrator>,
    pub progress: Arc<PoolStateCache>,
}

impl Graduator {
    pub fn build<S>(
        config: &Config,
        ledger: Arc<dyn LedgerPort>,
        wallet: PartnerWallet,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError>
    where
        S: TokenStore + FeeClaimStore + MigrationAttemptStore + 'static,
    {
        let program = config.programs.program()?;
        let threshold = config.migration.threshold_lamports()?;

        let client = LedgerClient::new(ledger, config.retry.policy());
        let sender = TransactionSender::new(client.clone(), wallet);
        let tables = Arc::new(AddressTableManager::new(
            sender.clone(),
            program,
            config.programs.fee_collection()?,
            config.programs.migration_fee()?,
            config.programs.lookup_table()?,
        ));

        let claims = FeeClaimCoordinator::new(
            sender.clone(),
            tables.clone(),
            program,
            store.clone(),
            clock.clone(),
            config.migration.min_claim_lamports()?,
        );
        let executor = MigrationExecutor::new(
            sender.clone(),
            tables.clone(),
            program,
            config.programs.migration_config()?,
            config.migration.permanent_pool_addressing,
        );

        let reader = PoolStateReader::new(client, clock.clone(), program.program_id, threshold);
        let progress = Arc::new(PoolStateCache::new(
            reader.clone(),
            clock.clone(),
            config.migration.pool_cache_ttl(),
        ));
        let orchestrator = Arc::new(
            MigrationOrchestrator::new(store.clone(), store, reader, claims, executor, clock)
                .with_progress_cache(progress.clone()),
        );

        tracing::info!(
            "Graduator ready: partner {}, threshold {} lamports, program {}",
            sender.payer(),
            threshold,
            program.program_id
        );

        Ok(Self {
            sender,
            tables,
            orchestrator,
            progress,
        })
    }

    pub fn app_state(&self) -> Arc<AppState> {
        Arc::new(AppState {
            orchestrator: self.orchestrator.clone(),
            progress: self.progress.clone(),
        })
    }
}
