//! Migration Orchestrator
//!
//! Sequences one graduation run for a pool: lock, read, gate on the
//! threshold, claim fees (best-effort), migrate, update the token. Every
//! phase change is persisted as a `MigrationAttempt`. Cached progress for a
//! pool is dropped once the pool is known to be migrated.

use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

use super::fee_claim::{ClaimOutcome, FeeClaimCoordinator};
use super::migration_executor::MigrationExecutor;
use super::pool_reader::{PoolReadError, PoolStateCache, PoolStateReader};
use crate::domain::{
    lamports_to_sol, ClaimAttempt, InvalidTransition, MigrationAttempt, MigrationPhase,
    PoolAssessment, PoolStateSnapshot, RejectReason, Token, TokenUpdate,
};
use crate::ports::{Clock, MigrationAttemptStore, StoreError, TokenStore};

/// Shown with every execution failure; the outcome on-chain may differ
pub const RECHECK_HINT: &str =
    "Check the pool's isMigrated flag on-chain before retrying; the migration may have landed";

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Migration rejected: {0}")]
    Rejected(RejectReason),
    #[error("Migration already in progress for pool {0}")]
    InProgress(Pubkey),
    #[error("Migration failed: {reason}")]
    Failed {
        reason: String,
        claim: Option<ClaimAttempt>,
    },
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

impl OrchestratorError {
    /// Claim outcome carried by an execution failure
    pub fn claim(&self) -> Option<&ClaimAttempt> {
        match self {
            OrchestratorError::Failed { claim, .. } => claim.as_ref(),
            _ => None,
        }
    }
}

/// Result of a successful (or already satisfied) run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub signatures: Vec<Signature>,
    pub permanent_pool_address: Pubkey,
    pub pre_claim_signature: Option<Signature>,
    pub pre_claim_lamports: u64,
    pub message: String,
    pub already_migrated: bool,
}

/// Advisory per-pool locks. Different pools never contend.
#[derive(Debug, Default)]
pub struct PoolLockRegistry {
    held: Mutex<HashSet<Pubkey>>,
}

impl PoolLockRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `None` when another run holds the pool
    pub fn try_acquire(self: &Arc<Self>, pool: Pubkey) -> Option<PoolLockGuard> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(pool) {
            return None;
        }
        Some(PoolLockGuard {
            registry: Arc::clone(self),
            pool,
        })
    }

    pub fn is_held(&self, pool: &Pubkey) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(pool)
    }
}

/// Releases the pool on drop, including on early return and panic unwind
#[derive(Debug)]
pub struct PoolLockGuard {
    registry: Arc<PoolLockRegistry>,
    pool: Pubkey,
}

impl Drop for PoolLockGuard {
    fn drop(&mut self) {
        self.registry
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.pool);
    }
}

pub struct MigrationOrchestrator {
    tokens: Arc<dyn TokenStore>,
    attempts: Arc<dyn MigrationAttemptStore>,
    reader: PoolStateReader,
    claims: FeeClaimCoordinator,
    executor: MigrationExecutor,
    clock: Arc<dyn Clock>,
    locks: Arc<PoolLockRegistry>,
    progress: Option<Arc<PoolStateCache>>,
}

impl MigrationOrchestrator {
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        attempts: Arc<dyn MigrationAttemptStore>,
        reader: PoolStateReader,
        claims: FeeClaimCoordinator,
        executor: MigrationExecutor,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tokens,
            attempts,
            reader,
            claims,
            executor,
            clock,
            locks: PoolLockRegistry::new(),
            progress: None,
        }
    }

    /// Invalidate `cache` entries for pools this orchestrator migrates
    pub fn with_progress_cache(mut self, cache: Arc<PoolStateCache>) -> Self {
        self.progress = Some(cache);
        self
    }

    pub fn locks(&self) -> &Arc<PoolLockRegistry> {
        &self.locks
    }

    pub async fn migrate_by_mint(
        &self,
        mint: &Pubkey,
    ) -> Result<MigrationReport, OrchestratorError> {
        let token = self
            .tokens
            .get_token_by_mint(mint)
            .await?
            .ok_or(OrchestratorError::Rejected(RejectReason::TokenNotFound {
                mint: *mint,
            }))?;
        self.migrate_pool(&token).await
    }

    pub async fn migrate_pool(&self, token: &Token) -> Result<MigrationReport, OrchestratorError> {
        let pool = token.bonding_pool_address;
        let _guard = self
            .locks
            .try_acquire(pool)
            .ok_or(OrchestratorError::InProgress(pool))?;

        let snapshot = match self.reader.assess(&pool).await {
            Ok(PoolAssessment::Eligible(snapshot)) => snapshot,
            Ok(PoolAssessment::AlreadyMigrated(snapshot)) => {
                return self.already_migrated(token, &snapshot).await;
            }
            Ok(PoolAssessment::BelowThreshold(snapshot)) => {
                let reason = RejectReason::BelowThreshold {
                    current_quote_lamports: snapshot.pool.virtual_quote_reserve,
                    required_quote_lamports: snapshot.threshold_lamports,
                };
                return Err(self.reject(token, reason).await);
            }
            Err(PoolReadError::PoolNotFound(pool)) => {
                return Err(self.reject(token, RejectReason::PoolNotFound { pool }).await);
            }
            Err(e) => {
                return Err(OrchestratorError::Failed {
                    reason: e.to_string(),
                    claim: None,
                });
            }
        };

        let resumable_claim = self
            .attempts
            .latest_attempt(&pool)
            .await?
            .filter(|prior| prior.phase.is_interrupted())
            .and_then(|prior| prior.claim)
            .filter(|claim| claim.signature().is_some());

        let mut attempt = MigrationAttempt::start(pool, token.mint_address, self.clock.now());
        attempt.transition(MigrationPhase::Claiming, self.clock.now())?;
        self.attempts.save_attempt(&attempt).await?;
        tracing::info!("Pool {} eligible; claiming fees before migration", pool);

        let claim = match resumable_claim {
            Some(claim) => {
                tracing::info!(
                    "Pool {}: fees already claimed by interrupted run ({:?}); not claiming again",
                    pool,
                    claim.signature()
                );
                claim
            }
            None => self.claim_fees(token, &snapshot).await,
        };

        attempt.claim = Some(claim.clone());
        attempt.transition(MigrationPhase::Migrating, self.clock.now())?;
        self.attempts.save_attempt(&attempt).await?;

        let output = match self.executor.migrate(&snapshot.pool).await {
            Ok(output) => output,
            Err(e) => {
                tracing::error!("Pool {} migration failed: {}", pool, e);
                let reason = e.to_string();
                attempt.transition(MigrationPhase::Failed(reason.clone()), self.clock.now())?;
                if let Err(store_err) = self.attempts.save_attempt(&attempt).await {
                    tracing::warn!(
                        "Could not persist failed attempt {}: {}",
                        attempt.id,
                        store_err
                    );
                }
                return Err(OrchestratorError::Failed {
                    reason,
                    claim: Some(claim),
                });
            }
        };

        attempt.migration_signatures = output.signatures.clone();
        let now = self.clock.now();
        attempt.transition(MigrationPhase::Graduated, now)?;
        if let Err(e) = self.attempts.save_attempt(&attempt).await {
            tracing::warn!("Could not persist graduated attempt {}: {}", attempt.id, e);
        }
        self.forget_progress(&pool).await;

        self.tokens
            .update_token(
                &token.id,
                TokenUpdate::graduated(output.permanent_pool_address, now),
            )
            .await?;
        tracing::info!(
            "Token {} graduated to pool {}",
            token.id,
            output.permanent_pool_address
        );

        let claimed = claim.claimed_lamports();
        Ok(MigrationReport {
            signatures: output.signatures,
            permanent_pool_address: output.permanent_pool_address,
            pre_claim_signature: claim.signature(),
            pre_claim_lamports: claimed,
            message: format!(
                "Pool migrated to {} after claiming {} SOL in fees",
                output.permanent_pool_address,
                lamports_to_sol(claimed)
            ),
            already_migrated: false,
        })
    }

    async fn claim_fees(&self, token: &Token, snapshot: &PoolStateSnapshot) -> ClaimAttempt {
        match self.claims.claim(&snapshot.pool, Some(&token.id)).await {
            Ok(ClaimOutcome::Claimed {
                signature,
                amount_lamports,
            }) => ClaimAttempt::Claimed {
                signature,
                amount_lamports,
            },
            Ok(ClaimOutcome::NoFeesToClaim { claimable_lamports }) => {
                ClaimAttempt::NothingToClaim { claimable_lamports }
            }
            Err(e) => {
                tracing::warn!(
                    "Fee claim for pool {} failed, migrating anyway: {}",
                    snapshot.address(),
                    e
                );
                ClaimAttempt::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Record the refusal and hand back the error
    async fn reject(&self, token: &Token, reason: RejectReason) -> OrchestratorError {
        tracing::info!("Pool {} rejected: {}", token.bonding_pool_address, reason);

        let mut attempt = MigrationAttempt::start(
            token.bonding_pool_address,
            token.mint_address,
            self.clock.now(),
        );
        if attempt
            .transition(MigrationPhase::Rejected(reason.clone()), self.clock.now())
            .is_ok()
        {
            if let Err(e) = self.attempts.save_attempt(&attempt).await {
                tracing::warn!("Could not persist rejected attempt {}: {}", attempt.id, e);
            }
        }
        OrchestratorError::Rejected(reason)
    }

    async fn already_migrated(
        &self,
        token: &Token,
        snapshot: &PoolStateSnapshot,
    ) -> Result<MigrationReport, OrchestratorError> {
        let permanent_pool_address = token
            .permanent_pool_address
            .unwrap_or_else(|| self.executor.permanent_pool_address(&snapshot.pool));
        self.forget_progress(&snapshot.address()).await;

        // Migrated on-chain by an earlier run that did not reach the token update
        if !token.is_graduated() {
            tracing::warn!(
                "Pool {} migrated on-chain but token {} still bonding; reconciling",
                snapshot.address(),
                token.id
            );
            self.tokens
                .update_token(
                    &token.id,
                    TokenUpdate::graduated(permanent_pool_address, self.clock.now()),
                )
                .await?;
        }

        Ok(MigrationReport {
            signatures: Vec::new(),
            permanent_pool_address,
            pre_claim_signature: None,
            pre_claim_lamports: 0,
            message: "Pool already migrated".to_string(),
            already_migrated: true,
        })
    }

    async fn forget_progress(&self, pool: &Pubkey) {
        if let Some(cache) = &self.progress {
            cache.invalidate(pool).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::dbc::{BondingCurveProgram, CLAIM_TRADING_FEE, MIGRATE_TO_AMM};
    use crate::adapters::solana::{PartnerWallet, RetryPolicy};
    use crate::application::{
        AddressTableManager, LedgerClient, PermanentPoolAddressing, TransactionSender,
    };
    use crate::domain::TokenStatus;
    use crate::ports::mocks::{virtual_pool, InMemoryStore, ManualClock, MockLedger};
    use crate::ports::ConfirmationOutcome;

    const THRESHOLD: u64 = 85_000_000_000;

    struct Harness {
        ledger: Arc<MockLedger>,
        store: Arc<InMemoryStore>,
        clock: Arc<ManualClock>,
        orchestrator: MigrationOrchestrator,
        progress: Arc<PoolStateCache>,
        token: Token,
    }

    fn harness(virtual_quote: u64, fees: u64) -> Harness {
        let ledger = Arc::new(MockLedger::new());
        let clock = Arc::new(ManualClock::default());
        let mint = Pubkey::new_unique();
        let pool = Pubkey::new_unique();
        let account = virtual_pool(mint, virtual_quote, virtual_quote.min(THRESHOLD), fees);
        ledger.put_pool(pool, &account).unwrap();

        let token = Token::new("tok-1", mint, pool);
        let store = Arc::new(InMemoryStore::new().with_token(token.clone()));

        let client = LedgerClient::new(ledger.clone(), RetryPolicy::default());
        let sender = TransactionSender::new(client.clone(), PartnerWallet::new_random());
        let program = BondingCurveProgram::new(ledger.pool_program(), Pubkey::new_unique());
        let reader =
            PoolStateReader::new(client.clone(), clock.clone(), program.program_id, THRESHOLD);
        let progress = Arc::new(PoolStateCache::new(
            reader.clone(),
            clock.clone(),
            chrono::Duration::seconds(30),
        ));
        let tables = Arc::new(AddressTableManager::new(
            sender.clone(),
            program,
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            None,
        ));

        let orchestrator = MigrationOrchestrator::new(
            store.clone(),
            store.clone(),
            reader,
            FeeClaimCoordinator::new(
                sender.clone(),
                tables.clone(),
                program,
                store.clone(),
                clock.clone(),
                1_000_000,
            ),
            MigrationExecutor::new(
                sender,
                tables,
                program,
                Pubkey::new_unique(),
                PermanentPoolAddressing::AliasBondingPool,
            ),
            clock.clone(),
        )
        .with_progress_cache(progress.clone());

        Harness {
            ledger,
            store,
            clock,
            orchestrator,
            progress,
            token,
        }
    }

    #[test]
    fn test_lock_released_on_drop() {
        let registry = PoolLockRegistry::new();
        let pool = Pubkey::new_unique();

        let guard = registry.try_acquire(pool).unwrap();
        assert!(registry.try_acquire(pool).is_none());
        assert!(registry.try_acquire(Pubkey::new_unique()).is_some());
        drop(guard);
        assert!(!registry.is_held(&pool));
        assert!(registry.try_acquire(pool).is_some());
    }

    #[tokio::test]
    async fn test_graduates_eligible_pool() {
        let h = harness(90_000_000_000, 20_000_000);

        let report = h.orchestrator.migrate_by_mint(&h.token.mint_address).await.unwrap();

        assert_eq!(report.signatures.len(), 2);
        assert_eq!(report.pre_claim_lamports, 20_000_000);
        assert!(report.pre_claim_signature.is_some());
        assert!(!report.already_migrated);

        let token = h.store.token("tok-1").unwrap();
        assert_eq!(token.status, TokenStatus::Graduated);
        assert_eq!(token.graduated_at, Some(h.clock.now()));
        assert_eq!(
            h.store.phase_history(&h.token.bonding_pool_address),
            vec![MigrationPhase::Claiming, MigrationPhase::Migrating, MigrationPhase::Graduated]
        );
        assert!(!h.orchestrator.locks().is_held(&h.token.bonding_pool_address));
    }

    #[tokio::test]
    async fn test_claim_precedes_migration() {
        let h = harness(90_000_000_000, 20_000_000);
        h.orchestrator.migrate_by_mint(&h.token.mint_address).await.unwrap();

        let claim = h.ledger.submission_index(CLAIM_TRADING_FEE).unwrap();
        let migrate = h.ledger.submission_index(MIGRATE_TO_AMM).unwrap();
        assert!(claim < migrate);
    }

    #[tokio::test]
    async fn test_below_threshold_rejected() {
        let h = harness(40_000_000_000, 20_000_000);

        let err = h.orchestrator.migrate_by_mint(&h.token.mint_address).await.unwrap_err();

        assert!(matches!(
            err,
            OrchestratorError::Rejected(RejectReason::BelowThreshold {
                current_quote_lamports: 40_000_000_000,
                required_quote_lamports: THRESHOLD,
            })
        ));
        assert!(h.ledger.submissions().is_empty());
        assert_eq!(h.store.token("tok-1").unwrap(), h.token);
    }

    #[tokio::test]
    async fn test_unknown_mint_and_missing_pool_rejected() {
        let h = harness(90_000_000_000, 0);
        let err = h.orchestrator.migrate_by_mint(&Pubkey::new_unique()).await.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Rejected(RejectReason::TokenNotFound { .. })
        ));

        let orphan = Token::new("tok-2", Pubkey::new_unique(), Pubkey::new_unique());
        let err = h.orchestrator.migrate_pool(&orphan).await.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Rejected(RejectReason::PoolNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_already_migrated_is_idempotent() {
        let h = harness(90_000_000_000, 20_000_000);
        let first = h.orchestrator.migrate_by_mint(&h.token.mint_address).await.unwrap();
        let submissions = h.ledger.submissions().len();
        h.clock.advance(chrono::Duration::seconds(5));

        let second = h.orchestrator.migrate_by_mint(&h.token.mint_address).await.unwrap();

        assert!(second.already_migrated);
        assert!(second.signatures.is_empty());
        assert_eq!(second.permanent_pool_address, first.permanent_pool_address);
        assert_eq!(h.ledger.submissions().len(), submissions);
        assert_eq!(h.store.fee_claims().len(), 1);
    }

    #[tokio::test]
    async fn test_on_chain_migration_reconciles_token() {
        let h = harness(90_000_000_000, 0);
        let pool = h.token.bonding_pool_address;
        assert!(!h.progress.get(&pool).await.unwrap().pool.is_migrated);

        let mut account = h.ledger.pool(&pool).unwrap();
        account.is_migrated = 1;
        h.ledger.put_pool(pool, &account).unwrap();

        let report = h.orchestrator.migrate_by_mint(&h.token.mint_address).await.unwrap();

        assert!(report.already_migrated);
        assert!(h.store.token("tok-1").unwrap().is_graduated());
        assert!(h.ledger.submissions().is_empty());
        assert!(h.progress.get(&pool).await.unwrap().pool.is_migrated);
    }

    #[tokio::test]
    async fn test_graduation_refreshes_cached_progress() {
        let h = harness(90_000_000_000, 20_000_000);
        let pool = h.token.bonding_pool_address;

        let before = h.progress.get(&pool).await.unwrap();
        assert!(!before.pool.is_migrated);
        assert!(before.is_eligible_for_graduation);

        h.orchestrator.migrate_by_mint(&h.token.mint_address).await.unwrap();

        let after = h.progress.get(&pool).await.unwrap();
        assert!(after.pool.is_migrated);
        assert!(!after.is_eligible_for_graduation);
        assert_eq!(after.pool.partner_quote_fee, 0);
    }

    #[tokio::test]
    async fn test_foreign_owned_pool_fails_without_submitting() {
        let h = harness(90_000_000_000, 20_000_000);
        let pool = h.token.bonding_pool_address;
        let data = h.ledger.pool(&pool).unwrap().encode().unwrap();
        h.ledger.put_account(pool, Pubkey::new_unique(), data);

        let err = h.orchestrator.migrate_by_mint(&h.token.mint_address).await.unwrap_err();

        assert!(matches!(err, OrchestratorError::Failed { claim: None, .. }));
        assert!(h.ledger.submissions().is_empty());
        assert_eq!(h.store.token("tok-1").unwrap(), h.token);
    }

    #[tokio::test]
    async fn test_claim_failure_does_not_block_migration() {
        let h = harness(90_000_000_000, 20_000_000);
        h.ledger.reject_instruction(CLAIM_TRADING_FEE);

        let report = h.orchestrator.migrate_by_mint(&h.token.mint_address).await.unwrap();

        assert_eq!(report.pre_claim_signature, None);
        assert_eq!(report.pre_claim_lamports, 0);
        assert_eq!(report.signatures.len(), 2);
        assert!(h.store.fee_claims().is_empty());
        let attempt = h.store.attempts().pop().unwrap();
        assert!(matches!(attempt.claim, Some(ClaimAttempt::Failed { .. })));
    }

    #[tokio::test]
    async fn test_migration_failure_leaves_token_unchanged() {
        let h = harness(90_000_000_000, 20_000_000);
        h.ledger.confirm_instruction_with(
            MIGRATE_TO_AMM,
            ConfirmationOutcome::Failed("custom program error".into()),
        );

        let err = h.orchestrator.migrate_by_mint(&h.token.mint_address).await.unwrap_err();

        assert!(matches!(err, OrchestratorError::Failed { .. }));
        assert!(matches!(err.claim(), Some(ClaimAttempt::Claimed { .. })));
        assert_eq!(h.store.token("tok-1").unwrap(), h.token);
        assert!(matches!(
            h.store.attempts().pop().unwrap().phase,
            MigrationPhase::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_held_lock_reports_in_progress() {
        let h = harness(90_000_000_000, 0);
        let _guard = h
            .orchestrator
            .locks()
            .try_acquire(h.token.bonding_pool_address)
            .unwrap();

        let err = h.orchestrator.migrate_by_mint(&h.token.mint_address).await.unwrap_err();

        assert!(matches!(
            err,
            OrchestratorError::InProgress(pool) if pool == h.token.bonding_pool_address
        ));
        assert!(h.ledger.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_interrupted_claim_is_not_repeated() {
        let h = harness(90_000_000_000, 20_000_000);
        let pool = h.token.bonding_pool_address;

        let mut interrupted = MigrationAttempt::start(pool, h.token.mint_address, h.clock.now());
        interrupted.transition(MigrationPhase::Claiming, h.clock.now()).unwrap();
        interrupted.claim = Some(ClaimAttempt::Claimed {
            signature: Signature::new_unique(),
            amount_lamports: 20_000_000,
        });
        interrupted.transition(MigrationPhase::Migrating, h.clock.now()).unwrap();
        h.store.save_attempt(&interrupted).await.unwrap();
        h.clock.advance(chrono::Duration::seconds(60));

        let report = h.orchestrator.migrate_by_mint(&h.token.mint_address).await.unwrap();

        assert_eq!(h.ledger.submission_index(CLAIM_TRADING_FEE), None);
        assert_eq!(report.pre_claim_signature, interrupted.claim.unwrap().signature());
        assert_eq!(report.pre_claim_lamports, 20_000_000);
    }
}
