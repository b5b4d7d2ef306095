//! Known Program Addresses
//!
//! Well-known Solana programs and mints referenced by graduation
//! transactions. Together with the configured program ids they form the
//! static set registered in the address lookup table.

use solana_sdk::{pubkey, pubkey::Pubkey};

pub const SYSTEM_PROGRAM: Pubkey = solana_sdk::system_program::ID;
pub const TOKEN_PROGRAM: Pubkey = spl_token::ID;
pub const TOKEN_2022_PROGRAM: Pubkey = pubkey!("TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb");
pub const ASSOCIATED_TOKEN_PROGRAM: Pubkey =
    pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");
pub const COMPUTE_BUDGET_PROGRAM: Pubkey = solana_sdk::compute_budget::ID;
pub const RENT_SYSVAR: Pubkey = solana_sdk::sysvar::rent::ID;

/// Wrapped SOL, the quote mint of every bonding-curve pool
pub const WRAPPED_SOL_MINT: Pubkey = spl_token::native_mint::ID;

/// Programs every graduation transaction may touch
pub const STATIC_PROGRAMS: &[Pubkey] = &[
    SYSTEM_PROGRAM,
    TOKEN_PROGRAM,
    TOKEN_2022_PROGRAM,
    ASSOCIATED_TOKEN_PROGRAM,
    COMPUTE_BUDGET_PROGRAM,
    RENT_SYSVAR,
];

/// Associated token account address for `owner` / `mint` under `token_program`
pub fn associated_token_address(
    owner: &Pubkey,
    mint: &Pubkey,
    token_program: &Pubkey,
) -> Pubkey {
    Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM,
    )
    .0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_programs_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for program in STATIC_PROGRAMS {
            assert!(seen.insert(*program), "duplicate program {}", program);
        }
    }

    #[test]
    fn test_wrapped_sol_mint() {
        assert_eq!(
            WRAPPED_SOL_MINT.to_string(),
            "So11111111111111111111111111111111111111112"
        );
    }

    #[test]
    fn test_associated_token_address_is_deterministic() {
        let owner = Pubkey::new_unique();
        let a = associated_token_address(&owner, &WRAPPED_SOL_MINT, &TOKEN_PROGRAM);
        let b = associated_token_address(&owner, &WRAPPED_SOL_MINT, &TOKEN_PROGRAM);
        assert_eq!(a, b);
        assert_ne!(a, owner);
    }
}
