//! Bonding Curve Pool Account Layout
//!
//! Anchor-style account: 8-byte discriminator (`sha256("account:VirtualPool")[..8]`)
//! followed by fixed-width little-endian fields. Fixed-width structs encode
//! identically under bincode's default options and borsh, so bincode is used
//! for both directions.
//!
//! This is the pool layout of the bonding-curve program deployed at
//! `[programs] bonding_curve_program`. There is no built-in program id: the
//! deployment is always configured, and `PoolStateReader` decodes only
//! accounts owned by it. A program with a different `VirtualPool` layout is
//! unsupported: the discriminator check does not validate field offsets.

use serde::{Deserialize, Serialize};
use solana_sdk::{hash::hashv, pubkey::Pubkey};
use thiserror::Error;

use crate::domain::BondingCurvePoolSnapshot;

pub const POOL_ACCOUNT_NAME: &str = "VirtualPool";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Account data too short: need {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("Account discriminator mismatch: not a {0} account")]
    DiscriminatorMismatch(&'static str),
    #[error("Failed to decode account: {0}")]
    Decode(String),
}

/// `sha256("account:<name>")[..8]`
pub fn account_discriminator(name: &str) -> [u8; 8] {
    let hash = hashv(&[b"account:", name.as_bytes()]).to_bytes();
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}

/// `sha256("global:<name>")[..8]`
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    let hash = hashv(&[b"global:", name.as_bytes()]).to_bytes();
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualPoolAccount {
    pub config: Pubkey,
    pub creator: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub virtual_base_reserve: u64,
    pub virtual_quote_reserve: u64,
    pub real_base_reserve: u64,
    pub real_quote_reserve: u64,
    pub protocol_base_fee: u64,
    pub protocol_quote_fee: u64,
    pub partner_base_fee: u64,
    pub partner_quote_fee: u64,
    /// 0 = bonding, 1 = migrated
    pub is_migrated: u8,
    pub migration_progress: u8,
}

impl VirtualPoolAccount {
    pub const LEN: usize = 8 + // discriminator
        32 * 6 + // config, creator, mints, vaults
        8 * 4 + // reserves
        8 * 4 + // fees
        1 + // is_migrated
        1; // migration_progress

    /// Decode account data. Trailing bytes (reserved padding) are ignored.
    pub fn decode(data: &[u8]) -> Result<Self, LayoutError> {
        if data.len() < Self::LEN {
            return Err(LayoutError::TooShort {
                expected: Self::LEN,
                actual: data.len(),
            });
        }
        if data[..8] != account_discriminator(POOL_ACCOUNT_NAME) {
            return Err(LayoutError::DiscriminatorMismatch(POOL_ACCOUNT_NAME));
        }
        bincode::deserialize(&data[8..]).map_err(|e| LayoutError::Decode(e.to_string()))
    }

    /// Encode with discriminator (account fixtures and local validators)
    pub fn encode(&self) -> Result<Vec<u8>, LayoutError> {
        let body = bincode::serialize(self).map_err(|e| LayoutError::Decode(e.to_string()))?;
        let mut data = Vec::with_capacity(Self::LEN);
        data.extend_from_slice(&account_discriminator(POOL_ACCOUNT_NAME));
        data.extend_from_slice(&body);
        Ok(data)
    }

    pub fn into_snapshot(self, address: Pubkey) -> BondingCurvePoolSnapshot {
        BondingCurvePoolSnapshot {
            address,
            config: self.config,
            base_mint: self.base_mint,
            quote_mint: self.quote_mint,
            base_vault: self.base_vault,
            quote_vault: self.quote_vault,
            virtual_base_reserve: self.virtual_base_reserve,
            virtual_quote_reserve: self.virtual_quote_reserve,
            real_quote_reserve: self.real_quote_reserve,
            partner_base_fee: self.partner_base_fee,
            partner_quote_fee: self.partner_quote_fee,
            is_migrated: self.is_migrated != 0,
        }
    }
}
