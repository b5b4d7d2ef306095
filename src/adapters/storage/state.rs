//! Store document
//!
//! The full persisted state of the graduation service. Shared by the JSON
//! file store and the in-memory store so both enforce the same rules.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::domain::{FeeClaimRecord, InsertOutcome, MigrationAttempt, Token, TokenUpdate};
use crate::ports::StoreError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub fee_claims: Vec<FeeClaimRecord>,
    #[serde(default)]
    pub attempts: Vec<MigrationAttempt>,
}

impl StoreState {
    pub fn token_by_mint(&self, mint: &Pubkey) -> Option<Token> {
        self.tokens.iter().find(|t| t.mint_address == *mint).cloned()
    }

    pub fn update_token(&mut self, id: &str, update: &TokenUpdate) -> Result<Token, StoreError> {
        let token = self
            .tokens
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("token {}", id)))?;
        token.apply(update);
        Ok(token.clone())
    }

    /// Insert or replace by id, and refuse a second token for the same mint
    pub fn upsert_token(&mut self, token: Token) -> Result<(), StoreError> {
        if let Some(existing) = self
            .tokens
            .iter()
            .find(|t| t.mint_address == token.mint_address && t.id != token.id)
        {
            return Err(StoreError::Backend(format!(
                "mint {} already registered as token {}",
                token.mint_address, existing.id
            )));
        }
        match self.tokens.iter_mut().find(|t| t.id == token.id) {
            Some(slot) => *slot = token,
            None => self.tokens.push(token),
        }
        Ok(())
    }

    /// Append unless a claim with the same signature exists
    pub fn insert_fee_claim(&mut self, record: FeeClaimRecord) -> InsertOutcome {
        if self.fee_claims.iter().any(|c| c.signature == record.signature) {
            return InsertOutcome::Duplicate;
        }
        self.fee_claims.push(record);
        InsertOutcome::Inserted
    }

    pub fn fee_claims_for_pool(&self, pool: &Pubkey) -> Vec<FeeClaimRecord> {
        self.fee_claims
            .iter()
            .filter(|c| c.pool_address == *pool)
            .cloned()
            .collect()
    }

    pub fn save_attempt(&mut self, attempt: &MigrationAttempt) {
        match self.attempts.iter_mut().find(|a| a.id == attempt.id) {
            Some(slot) => *slot = attempt.clone(),
            None => self.attempts.push(attempt.clone()),
        }
    }

    pub fn latest_attempt(&self, pool: &Pubkey) -> Option<MigrationAttempt> {
        self.attempts
            .iter()
            .filter(|a| a.pool_address == *pool)
            .max_by_key(|a| a.started_at)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MigrationPhase, RejectReason};
    use chrono::{Duration, Utc};
    use solana_sdk::signature::Signature;

    #[test]
    fn test_duplicate_signature_is_ignored() {
        let mut state = StoreState::default();
        let pool = Pubkey::new_unique();
        let sig = Signature::new_unique();

        let first = state.insert_fee_claim(FeeClaimRecord::new(None, pool, sig, 10, Utc::now()));
        let second = state.insert_fee_claim(FeeClaimRecord::new(None, pool, sig, 10, Utc::now()));

        assert_eq!(first, InsertOutcome::Inserted);
        assert_eq!(second, InsertOutcome::Duplicate);
        assert_eq!(state.fee_claims_for_pool(&pool).len(), 1);
    }

    #[test]
    fn test_same_instant_attempts_are_both_kept() {
        let mut state = StoreState::default();
        let pool = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let now = Utc::now();

        let mut rejected = MigrationAttempt::start(pool, mint, now);
        rejected
            .transition(
                MigrationPhase::Rejected(RejectReason::PoolNotFound { pool }),
                now,
            )
            .unwrap();
        state.save_attempt(&rejected);

        let mut rerun = MigrationAttempt::start(pool, mint, now);
        rerun.transition(MigrationPhase::Claiming, now).unwrap();
        state.save_attempt(&rerun);

        assert_eq!(state.attempts.len(), 2);
        assert_eq!(state.latest_attempt(&pool).unwrap().id, rerun.id);
    }

    #[test]
    fn test_update_unknown_token() {
        let mut state = StoreState::default();
        let result = state.update_token("missing", &TokenUpdate::default());
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_upsert_rejects_second_token_for_mint() {
        let mut state = StoreState::default();
        let mint = Pubkey::new_unique();
        state.upsert_token(Token::new("a", mint, Pubkey::new_unique())).unwrap();
        assert!(state.upsert_token(Token::new("b", mint, Pubkey::new_unique())).is_err());
        // Same id replaces
        state.upsert_token(Token::new("a", mint, Pubkey::new_unique())).unwrap();
        assert_eq!(state.tokens.len(), 1);
    }

    #[test]
    fn test_latest_attempt_by_start_time() {
        let mut state = StoreState::default();
        let pool = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let now = Utc::now();

        let older = MigrationAttempt::start(pool, mint, now - Duration::minutes(5));
        let newer = MigrationAttempt::start(pool, mint, now);
        state.save_attempt(&newer);
        state.save_attempt(&older);

        assert_eq!(state.latest_attempt(&pool).unwrap().id, newer.id);
        assert!(state.latest_attempt(&Pubkey::new_unique()).is_none());
    }
}
