//! Test doubles for the ports
//!
//! `MockLedger` is a small in-memory ledger: it records every submitted
//! transaction, applies the effects of the bonding-curve and lookup-table
//! instructions it recognises, and can be scripted to rate-limit reads,
//! reject submissions or fail confirmations. `InMemoryStore` implements all
//! storage ports over the same document type as the JSON store.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use solana_sdk::{
    address_lookup_table,
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{
    AccountState, BlockhashMeta, Clock, ConfirmationOutcome, FeeClaimStore, LedgerError,
    LedgerPort, LookupTableState, MigrationAttemptStore, StoreError, TokenStore,
};
use crate::adapters::dbc::{
    instruction_discriminator, VirtualPoolAccount, CLAIM_TRADING_FEE, CREATE_MIGRATION_METADATA,
    MIGRATE_TO_AMM,
};
use crate::adapters::storage::StoreState;
use crate::domain::{
    FeeClaimRecord, InsertOutcome, MigrationAttempt, MigrationPhase, Token, TokenUpdate,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

const LOOKUP_TABLE_CREATE_TAG: u32 = 0;
const LOOKUP_TABLE_EXTEND_TAG: u32 = 2;

/// A transaction accepted by `MockLedger::submit`
#[derive(Debug, Clone)]
pub struct SubmittedTransaction {
    pub signature: Signature,
    pub transaction: VersionedTransaction,
    pub serialized_len: usize,
}

impl SubmittedTransaction {
    /// `(program id, instruction data, account keys)` for every instruction
    /// whose keys resolve from the static key list
    fn instructions(&self) -> Vec<(Pubkey, Vec<u8>, Vec<Pubkey>)> {
        let keys = self.transaction.message.static_account_keys();
        self.transaction
            .message
            .instructions()
            .iter()
            .filter_map(|ix| {
                let program = *keys.get(usize::from(ix.program_id_index))?;
                let accounts = ix
                    .accounts
                    .iter()
                    .map(|i| keys.get(usize::from(*i)).copied().unwrap_or_default())
                    .collect();
                Some((program, ix.data.clone(), accounts))
            })
            .collect()
    }

    /// True when the transaction invokes the named Anchor instruction
    pub fn has_instruction(&self, name: &str) -> bool {
        let tag = instruction_discriminator(name);
        self.transaction
            .message
            .instructions()
            .iter()
            .any(|ix| ix.data.len() >= 8 && ix.data[..8] == tag)
    }

    pub fn uses_lookup_tables(&self) -> bool {
        self.transaction
            .message
            .address_table_lookups()
            .map(|lookups| !lookups.is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<Pubkey, AccountState>,
    lookup_tables: HashMap<Pubkey, LookupTableState>,
    submissions: Vec<SubmittedTransaction>,
    rejected_instructions: Vec<String>,
    confirm_overrides: Vec<(String, ConfirmationOutcome)>,
    blockhash_rate_limits: u32,
    account_rate_limits: u32,
}

/// In-memory ledger for tests
#[derive(Debug)]
pub struct MockLedger {
    state: Mutex<LedgerState>,
    blockhash: Hash,
    slot: u64,
    pool_program: Pubkey,
    blockhash_calls: AtomicU32,
    account_calls: AtomicU32,
    confirm_delay: Mutex<Option<Duration>>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            blockhash: Hash::new_unique(),
            slot: 300_000_000,
            pool_program: Pubkey::new_unique(),
            blockhash_calls: AtomicU32::new(0),
            account_calls: AtomicU32::new(0),
            confirm_delay: Mutex::new(None),
        }
    }

    /// Owner given to accounts stored through `put_pool`
    pub fn with_pool_program(mut self, program: Pubkey) -> Self {
        self.pool_program = program;
        self
    }

    pub fn pool_program(&self) -> Pubkey {
        self.pool_program
    }

    pub fn put_account(&self, address: Pubkey, owner: Pubkey, data: Vec<u8>) {
        lock(&self.state).accounts.insert(
            address,
            AccountState {
                address,
                owner,
                lamports: 1_461_600,
                data,
            },
        );
    }

    /// Store a bonding-curve pool account owned by `pool_program`
    pub fn put_pool(&self, address: Pubkey, pool: &VirtualPoolAccount) -> Result<(), LedgerError> {
        let data = pool
            .encode()
            .map_err(|e| LedgerError::Fatal(e.to_string()))?;
        self.put_account(address, self.pool_program, data);
        Ok(())
    }

    pub fn pool(&self, address: &Pubkey) -> Option<VirtualPoolAccount> {
        let state = lock(&self.state);
        let account = state.accounts.get(address)?;
        VirtualPoolAccount::decode(&account.data).ok()
    }

    pub fn has_account(&self, address: &Pubkey) -> bool {
        lock(&self.state).accounts.contains_key(address)
    }

    pub fn put_lookup_table(&self, table: LookupTableState) {
        lock(&self.state).lookup_tables.insert(table.address, table);
    }

    pub fn lookup_tables(&self) -> Vec<LookupTableState> {
        lock(&self.state).lookup_tables.values().cloned().collect()
    }

    /// Rate-limit the next `times` blockhash reads
    pub fn rate_limit_blockhash(&self, times: u32) {
        lock(&self.state).blockhash_rate_limits = times;
    }

    /// Rate-limit the next `times` account reads
    pub fn rate_limit_accounts(&self, times: u32) {
        lock(&self.state).account_rate_limits = times;
    }

    /// Reject any submission containing the named instruction
    pub fn reject_instruction(&self, name: &str) {
        lock(&self.state).rejected_instructions.push(name.to_string());
    }

    /// Report `outcome` when confirming a transaction with the named instruction
    pub fn confirm_instruction_with(&self, name: &str, outcome: ConfirmationOutcome) {
        lock(&self.state)
            .confirm_overrides
            .push((name.to_string(), outcome));
    }

    /// Make every confirmation wait, so concurrent runs overlap
    pub fn set_confirm_delay(&self, delay: Duration) {
        *lock(&self.confirm_delay) = Some(delay);
    }

    pub fn submissions(&self) -> Vec<SubmittedTransaction> {
        lock(&self.state).submissions.clone()
    }

    /// Index of the first submission invoking `name`
    pub fn submission_index(&self, name: &str) -> Option<usize> {
        lock(&self.state)
            .submissions
            .iter()
            .position(|s| s.has_instruction(name))
    }

    pub fn blockhash_calls(&self) -> u32 {
        self.blockhash_calls.load(Ordering::SeqCst)
    }

    pub fn account_calls(&self) -> u32 {
        self.account_calls.load(Ordering::SeqCst)
    }

    fn apply_effects(state: &mut LedgerState, submitted: &SubmittedTransaction) {
        let claim = instruction_discriminator(CLAIM_TRADING_FEE);
        let metadata = instruction_discriminator(CREATE_MIGRATION_METADATA);
        let migrate = instruction_discriminator(MIGRATE_TO_AMM);

        for (program, data, accounts) in submitted.instructions() {
            if program == address_lookup_table::program::id() {
                Self::apply_lookup_table(state, &data, &accounts);
                continue;
            }
            if data.len() < 8 {
                continue;
            }
            let tag = &data[..8];
            if tag == claim {
                if let Some(pool) = accounts.get(2) {
                    Self::update_pool(state, pool, |p| p.partner_quote_fee = 0);
                }
            } else if tag == metadata {
                if let Some(address) = accounts.get(2) {
                    state.accounts.insert(
                        *address,
                        AccountState {
                            address: *address,
                            owner: program,
                            lamports: 1_000_000,
                            data: vec![0u8; 8],
                        },
                    );
                }
            } else if tag == migrate {
                if let Some(pool) = accounts.first() {
                    Self::update_pool(state, pool, |p| p.is_migrated = 1);
                }
            }
        }
    }

    fn apply_lookup_table(state: &mut LedgerState, data: &[u8], accounts: &[Pubkey]) {
        let (Some(tag), Some(table)) = (data.get(..4), accounts.first()) else {
            return;
        };
        let tag = u32::from_le_bytes([tag[0], tag[1], tag[2], tag[3]]);
        match tag {
            LOOKUP_TABLE_CREATE_TAG => {
                state
                    .lookup_tables
                    .insert(*table, LookupTableState::new(*table, Vec::new()));
            }
            LOOKUP_TABLE_EXTEND_TAG => {
                let Ok(addresses) = bincode::deserialize::<Vec<Pubkey>>(&data[4..]) else {
                    return;
                };
                if let Some(existing) = state.lookup_tables.get_mut(table) {
                    let mut all = existing.addresses.clone();
                    all.extend(addresses);
                    *existing = LookupTableState::new(*table, all);
                }
            }
            _ => {}
        }
    }

    fn update_pool(
        state: &mut LedgerState,
        address: &Pubkey,
        f: impl FnOnce(&mut VirtualPoolAccount),
    ) {
        let Some(account) = state.accounts.get_mut(address) else {
            return;
        };
        let Ok(mut pool) = VirtualPoolAccount::decode(&account.data) else {
            return;
        };
        f(&mut pool);
        if let Ok(data) = pool.encode() {
            account.data = data;
        }
    }
}

#[async_trait]
impl LedgerPort for MockLedger {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<AccountState>, LedgerError> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = lock(&self.state);
        if state.account_rate_limits > 0 {
            state.account_rate_limits -= 1;
            return Err(LedgerError::RateLimited("HTTP 429 Too Many Requests".into()));
        }
        Ok(state.accounts.get(address).cloned())
    }

    async fn get_recent_blockhash_meta(&self) -> Result<BlockhashMeta, LedgerError> {
        self.blockhash_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = lock(&self.state);
        if state.blockhash_rate_limits > 0 {
            state.blockhash_rate_limits -= 1;
            return Err(LedgerError::RateLimited("HTTP 429 Too Many Requests".into()));
        }
        Ok(BlockhashMeta {
            blockhash: self.blockhash,
            last_valid_block_height: self.slot + 150,
        })
    }

    async fn submit(&self, signed_tx: &[u8]) -> Result<Signature, LedgerError> {
        let transaction: VersionedTransaction = bincode::deserialize(signed_tx)
            .map_err(|e| LedgerError::Fatal(format!("Malformed transaction bytes: {}", e)))?;
        let signature = transaction
            .signatures
            .first()
            .copied()
            .ok_or_else(|| LedgerError::Fatal("Transaction has no signatures".into()))?;

        let submitted = SubmittedTransaction {
            signature,
            transaction,
            serialized_len: signed_tx.len(),
        };

        let mut state = lock(&self.state);
        if let Some(name) = state
            .rejected_instructions
            .iter()
            .find(|name| submitted.has_instruction(name))
        {
            return Err(LedgerError::Fatal(format!(
                "Transaction simulation failed: {} rejected",
                name
            )));
        }

        Self::apply_effects(&mut state, &submitted);
        state.submissions.push(submitted);
        Ok(signature)
    }

    async fn confirm(&self, signature: &Signature) -> Result<ConfirmationOutcome, LedgerError> {
        let delay = *lock(&self.confirm_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = lock(&self.state);
        let Some(submitted) = state.submissions.iter().find(|s| s.signature == *signature) else {
            return Ok(ConfirmationOutcome::Timeout);
        };
        let outcome = state
            .confirm_overrides
            .iter()
            .find(|(name, _)| submitted.has_instruction(name))
            .map(|(_, outcome)| outcome.clone())
            .unwrap_or(ConfirmationOutcome::Confirmed);
        Ok(outcome)
    }

    async fn get_lookup_table(
        &self,
        address: &Pubkey,
    ) -> Result<Option<LookupTableState>, LedgerError> {
        Ok(lock(&self.state).lookup_tables.get(address).cloned())
    }

    async fn get_slot(&self) -> Result<u64, LedgerError> {
        Ok(self.slot)
    }
}

/// All storage ports over one in-memory document
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    phase_history: Mutex<Vec<(Pubkey, MigrationPhase)>>,
    fail_token_updates: Mutex<bool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(self, token: Token) -> Self {
        lock(&self.state).tokens.push(token);
        self
    }

    pub fn token(&self, id: &str) -> Option<Token> {
        lock(&self.state).tokens.iter().find(|t| t.id == id).cloned()
    }

    pub fn fee_claims(&self) -> Vec<FeeClaimRecord> {
        lock(&self.state).fee_claims.clone()
    }

    pub fn attempts(&self) -> Vec<MigrationAttempt> {
        lock(&self.state).attempts.clone()
    }

    /// Every phase saved for `pool`, in save order
    pub fn phase_history(&self, pool: &Pubkey) -> Vec<MigrationPhase> {
        lock(&self.phase_history)
            .iter()
            .filter(|(p, _)| p == pool)
            .map(|(_, phase)| phase.clone())
            .collect()
    }

    pub fn fail_token_updates(&self) {
        *lock(&self.fail_token_updates) = true;
    }
}

#[async_trait]
impl TokenStore for InMemoryStore {
    async fn get_token_by_mint(&self, mint: &Pubkey) -> Result<Option<Token>, StoreError> {
        Ok(lock(&self.state).token_by_mint(mint))
    }

    async fn update_token(&self, id: &str, update: TokenUpdate) -> Result<Token, StoreError> {
        if *lock(&self.fail_token_updates) {
            return Err(StoreError::Backend("token store unavailable".into()));
        }
        lock(&self.state).update_token(id, &update)
    }
}

#[async_trait]
impl FeeClaimStore for InMemoryStore {
    async fn insert_fee_claim(&self, record: FeeClaimRecord) -> Result<InsertOutcome, StoreError> {
        Ok(lock(&self.state).insert_fee_claim(record))
    }

    async fn fee_claims_for_pool(&self, pool: &Pubkey) -> Result<Vec<FeeClaimRecord>, StoreError> {
        Ok(lock(&self.state).fee_claims_for_pool(pool))
    }
}

#[async_trait]
impl MigrationAttemptStore for InMemoryStore {
    async fn save_attempt(&self, attempt: &MigrationAttempt) -> Result<(), StoreError> {
        lock(&self.phase_history).push((attempt.pool_address, attempt.phase.clone()));
        lock(&self.state).save_attempt(attempt);
        Ok(())
    }

    async fn latest_attempt(&self, pool: &Pubkey) -> Result<Option<MigrationAttempt>, StoreError> {
        Ok(lock(&self.state).latest_attempt(pool))
    }
}

/// Clock that only moves when told to, with nanosecond resolution
#[derive(Debug)]
pub struct ManualClock {
    nanos: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            nanos: AtomicI64::new(start.timestamp_nanos_opt().unwrap_or_default()),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let nanos = by.num_nanoseconds().unwrap_or(i64::MAX);
        self.nanos.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

/// Pool account fixture with the given reserves (lamports)
pub fn virtual_pool(
    base_mint: Pubkey,
    virtual_quote_reserve: u64,
    real_quote_reserve: u64,
    partner_quote_fee: u64,
) -> VirtualPoolAccount {
    VirtualPoolAccount {
        config: Pubkey::new_unique(),
        creator: Pubkey::new_unique(),
        base_mint,
        quote_mint: crate::domain::known_programs::WRAPPED_SOL_MINT,
        base_vault: Pubkey::new_unique(),
        quote_vault: Pubkey::new_unique(),
        virtual_base_reserve: 1_073_000_000_000_000,
        virtual_quote_reserve,
        real_base_reserve: 800_000_000_000_000,
        real_quote_reserve,
        protocol_base_fee: 0,
        protocol_quote_fee: 0,
        partner_base_fee: 0,
        partner_quote_fee,
        is_migrated: 0,
        migration_progress: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limits_are_consumed() {
        let ledger = MockLedger::new();
        ledger.rate_limit_blockhash(2);

        assert!(matches!(
            ledger.get_recent_blockhash_meta().await,
            Err(LedgerError::RateLimited(_))
        ));
        assert!(ledger.get_recent_blockhash_meta().await.is_err());
        assert!(ledger.get_recent_blockhash_meta().await.is_ok());
        assert_eq!(ledger.blockhash_calls(), 3);
    }

    #[tokio::test]
    async fn test_missing_account() {
        let ledger = MockLedger::new();
        assert_eq!(ledger.get_account(&Pubkey::new_unique()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_submission_is_fatal() {
        let ledger = MockLedger::new();
        assert!(matches!(
            ledger.submit(&[1, 2, 3]).await,
            Err(LedgerError::Fatal(_))
        ));
    }

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(chrono::Duration::seconds(30));
        assert_eq!(clock.now() - start, chrono::Duration::seconds(30));
        assert_eq!((clock.now() - start).num_seconds(), 30);
    }

    #[test]
    fn test_manual_clock_keeps_sub_millisecond_start() {
        let start = Utc.timestamp_nanos(1_700_000_000_999_999_999);
        let clock = ManualClock::new(start);
        clock.advance(chrono::Duration::nanoseconds(1));
        assert_eq!(clock.now(), Utc.timestamp_nanos(1_700_000_001_000_000_000));
    }

    #[tokio::test]
    async fn test_pools_are_owned_by_pool_program() {
        let program = Pubkey::new_unique();
        let ledger = MockLedger::new().with_pool_program(program);
        let pool = Pubkey::new_unique();
        ledger
            .put_pool(pool, &virtual_pool(Pubkey::new_unique(), 1, 1, 0))
            .unwrap();

        let account = ledger.get_account(&pool).await.unwrap().unwrap();
        assert_eq!(account.owner, program);
        assert_eq!(ledger.pool_program(), program);
    }

    #[tokio::test]
    async fn test_in_memory_store_records_phases() {
        let store = InMemoryStore::new();
        let pool = Pubkey::new_unique();
        let mut attempt = MigrationAttempt::start(pool, Pubkey::new_unique(), Utc::now());
        store.save_attempt(&attempt).await.unwrap();
        attempt.transition(MigrationPhase::Claiming, Utc::now()).unwrap();
        store.save_attempt(&attempt).await.unwrap();

        assert_eq!(
            store.phase_history(&pool),
            vec![MigrationPhase::Bonding, MigrationPhase::Claiming]
        );
        assert_eq!(store.attempts().len(), 1);
    }
}
