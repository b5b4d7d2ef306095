//! Bonding Curve Program Instructions
//!
//! PDA derivation and instruction builders for the bonding-curve program
//! (fee claim, migration metadata, migration) and the permanent AMM
//! accounts the migration seeds.

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

use super::layout::instruction_discriminator;
use crate::domain::known_programs::{
    associated_token_address, ASSOCIATED_TOKEN_PROGRAM, SYSTEM_PROGRAM, TOKEN_PROGRAM,
};
use crate::domain::BondingCurvePoolSnapshot;

pub const CLAIM_TRADING_FEE: &str = "claim_trading_fee";
pub const CREATE_MIGRATION_METADATA: &str = "migration_damm_v2_create_metadata";
pub const MIGRATE_TO_AMM: &str = "migration_damm_v2";

const POOL_AUTHORITY_SEED: &[u8] = b"pool_authority";
const EVENT_AUTHORITY_SEED: &[u8] = b"__event_authority";
const MIGRATION_METADATA_SEED: &[u8] = b"damm_v2";
const AMM_POOL_SEED: &[u8] = b"pool";
const AMM_TOKEN_VAULT_SEED: &[u8] = b"token_vault";

/// Addresses of the bonding-curve program and the AMM it migrates into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BondingCurveProgram {
    pub program_id: Pubkey,
    pub amm_program_id: Pubkey,
}

impl BondingCurveProgram {
    pub fn new(program_id: Pubkey, amm_program_id: Pubkey) -> Self {
        Self {
            program_id,
            amm_program_id,
        }
    }

    pub fn pool_authority(&self) -> Pubkey {
        Pubkey::find_program_address(&[POOL_AUTHORITY_SEED], &self.program_id).0
    }

    pub fn event_authority(&self) -> Pubkey {
        Pubkey::find_program_address(&[EVENT_AUTHORITY_SEED], &self.program_id).0
    }

    pub fn amm_pool_authority(&self) -> Pubkey {
        Pubkey::find_program_address(&[POOL_AUTHORITY_SEED], &self.amm_program_id).0
    }

    pub fn amm_event_authority(&self) -> Pubkey {
        Pubkey::find_program_address(&[EVENT_AUTHORITY_SEED], &self.amm_program_id).0
    }

    pub fn migration_metadata(&self, pool: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[MIGRATION_METADATA_SEED, pool.as_ref()], &self.program_id).0
    }

    /// AMM pool PDA: `["pool", config, larger mint, smaller mint]`
    pub fn amm_pool(&self, migration_config: &Pubkey, mint_a: &Pubkey, mint_b: &Pubkey) -> Pubkey {
        let (first, second) = if mint_a > mint_b { (mint_a, mint_b) } else { (mint_b, mint_a) };
        Pubkey::find_program_address(
            &[AMM_POOL_SEED, migration_config.as_ref(), first.as_ref(), second.as_ref()],
            &self.amm_program_id,
        )
        .0
    }

    pub fn amm_token_vault(&self, amm_pool: &Pubkey, mint: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(
            &[AMM_TOKEN_VAULT_SEED, mint.as_ref(), amm_pool.as_ref()],
            &self.amm_program_id,
        )
        .0
    }

    /// Withdraw the partner share of trading fees to `fee_claimer`'s token accounts
    pub fn claim_trading_fee(
        &self,
        pool: &BondingCurvePoolSnapshot,
        fee_claimer: &Pubkey,
        max_base_amount: u64,
        max_quote_amount: u64,
    ) -> Instruction {
        let token_base_account =
            associated_token_address(fee_claimer, &pool.base_mint, &TOKEN_PROGRAM);
        let token_quote_account =
            associated_token_address(fee_claimer, &pool.quote_mint, &TOKEN_PROGRAM);

        let mut data = instruction_discriminator(CLAIM_TRADING_FEE).to_vec();
        data.extend_from_slice(&max_base_amount.to_le_bytes());
        data.extend_from_slice(&max_quote_amount.to_le_bytes());

        Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new_readonly(self.pool_authority(), false),
                AccountMeta::new_readonly(pool.config, false),
                AccountMeta::new(pool.address, false),
                AccountMeta::new(token_base_account, false),
                AccountMeta::new(token_quote_account, false),
                AccountMeta::new(pool.base_vault, false),
                AccountMeta::new(pool.quote_vault, false),
                AccountMeta::new_readonly(pool.base_mint, false),
                AccountMeta::new_readonly(pool.quote_mint, false),
                AccountMeta::new_readonly(*fee_claimer, true),
                AccountMeta::new_readonly(TOKEN_PROGRAM, false),
                AccountMeta::new_readonly(TOKEN_PROGRAM, false),
                AccountMeta::new_readonly(self.event_authority(), false),
                AccountMeta::new_readonly(self.program_id, false),
            ],
            data,
        }
    }

    /// Create the per-pool migration metadata account
    pub fn create_migration_metadata(
        &self,
        pool: &BondingCurvePoolSnapshot,
        payer: &Pubkey,
    ) -> Instruction {
        Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new_readonly(pool.address, false),
                AccountMeta::new_readonly(pool.config, false),
                AccountMeta::new(self.migration_metadata(&pool.address), false),
                AccountMeta::new(*payer, true),
                AccountMeta::new_readonly(SYSTEM_PROGRAM, false),
                AccountMeta::new_readonly(self.event_authority(), false),
                AccountMeta::new_readonly(self.program_id, false),
            ],
            data: instruction_discriminator(CREATE_MIGRATION_METADATA).to_vec(),
        }
    }

    /// Close the bonding curve and seed the AMM pool with its reserves
    pub fn migrate_to_amm(
        &self,
        pool: &BondingCurvePoolSnapshot,
        migration_config: &Pubkey,
        payer: &Pubkey,
    ) -> Instruction {
        let amm_pool = self.amm_pool(migration_config, &pool.base_mint, &pool.quote_mint);

        Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new(pool.address, false),
                AccountMeta::new(self.migration_metadata(&pool.address), false),
                AccountMeta::new_readonly(pool.config, false),
                AccountMeta::new(self.pool_authority(), false),
                AccountMeta::new(amm_pool, false),
                AccountMeta::new_readonly(*migration_config, false),
                AccountMeta::new_readonly(self.amm_pool_authority(), false),
                AccountMeta::new(self.amm_token_vault(&amm_pool, &pool.base_mint), false),
                AccountMeta::new(self.amm_token_vault(&amm_pool, &pool.quote_mint), false),
                AccountMeta::new(pool.base_mint, false),
                AccountMeta::new_readonly(pool.quote_mint, false),
                AccountMeta::new(pool.base_vault, false),
                AccountMeta::new(pool.quote_vault, false),
                AccountMeta::new(*payer, true),
                AccountMeta::new_readonly(TOKEN_PROGRAM, false),
                AccountMeta::new_readonly(TOKEN_PROGRAM, false),
                AccountMeta::new_readonly(SYSTEM_PROGRAM, false),
                AccountMeta::new_readonly(self.amm_program_id, false),
                AccountMeta::new_readonly(self.amm_event_authority(), false),
                AccountMeta::new_readonly(self.event_authority(), false),
                AccountMeta::new_readonly(self.program_id, false),
            ],
            data: instruction_discriminator(MIGRATE_TO_AMM).to_vec(),
        }
    }
}

/// Associated-token-program `CreateIdempotent` (instruction index 1)
pub fn create_associated_token_account_idempotent(
    payer: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
    token_program: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(associated_token_address(owner, mint, token_program), false),
            AccountMeta::new_readonly(*owner, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM, false),
            AccountMeta::new_readonly(*token_program, false),
        ],
        data: vec![1],
    }
}
