//! Lamport / SOL conversions
//!
//! Reserves, fees and thresholds are accounted in lamports. SOL values only
//! appear at the edges (config and API responses) and go through `Decimal`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Convert lamports to SOL
pub fn lamports_to_sol(lamports: u64) -> Decimal {
    Decimal::from(lamports) / Decimal::from(LAMPORTS_PER_SOL)
}

/// Convert SOL to lamports, truncating sub-lamport precision.
/// Returns `None` for negative or overflowing values.
pub fn sol_to_lamports(sol: Decimal) -> Option<u64> {
    if sol.is_sign_negative() {
        return None;
    }
    sol.checked_mul(Decimal::from(LAMPORTS_PER_SOL))?
        .trunc()
        .to_u64()
}

/// SOL as f64 for JSON responses
pub fn lamports_to_sol_f64(lamports: u64) -> f64 {
    lamports_to_sol(lamports).to_f64().unwrap_or(0.0)
}
