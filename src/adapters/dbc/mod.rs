//! Bonding Curve Program Adapter
//!
//! Account layout decoding and instruction builders for the on-chain
//! bonding-curve program and the AMM it graduates into.

mod layout;
mod program;

pub use layout::{
    account_discriminator, instruction_discriminator, LayoutError, VirtualPoolAccount,
    POOL_ACCOUNT_NAME,
};
pub use program::{
    create_associated_token_account_idempotent, BondingCurveProgram, CLAIM_TRADING_FEE,
    CREATE_MIGRATION_METADATA, MIGRATE_TO_AMM,
};
