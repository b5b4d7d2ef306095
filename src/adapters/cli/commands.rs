//! CLI Command Definitions
//!
//! Argument parsing for the graduator binary. Handlers live in `main.rs`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Curve Graduator - moves bonding-curve pools into permanent AMM pools
#[derive(Parser, Debug)]
#[command(
    name = "curve-graduator",
    version = env!("CARGO_PKG_VERSION"),
    about = "Graduates bonding-curve pools into permanent AMM pools",
    long_about = "Claims accrued partner trading fees from a bonding-curve pool that has \
                  crossed its graduation threshold, then migrates its liquidity into a \
                  permanent AMM pool."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        default_value = "config/graduator.toml"
    )]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API
    Serve(ServeCmd),

    /// Claim fees and migrate the pool of a registered token
    Migrate(MigrateCmd),

    /// Show bonding progress for a pool
    PoolStatus(PoolStatusCmd),

    /// Create (or reuse) the address lookup table for graduation transactions
    CreateLookupTable(CreateLookupTableCmd),

    /// Register a launched token with its bonding-curve pool
    Register(RegisterCmd),
}

#[derive(Parser, Debug)]
pub struct ServeCmd {
    /// Override the configured bind address
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,
}

#[derive(Parser, Debug)]
pub struct MigrateCmd {
    /// Token mint address
    #[arg(value_name = "MINT")]
    pub mint: String,
}

#[derive(Parser, Debug)]
pub struct PoolStatusCmd {
    /// Bonding-curve pool address
    #[arg(value_name = "POOL")]
    pub pool: String,

    /// Print the progress as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct CreateLookupTableCmd {}

#[derive(Parser, Debug)]
pub struct RegisterCmd {
    /// Token mint address
    #[arg(long, value_name = "MINT")]
    pub mint: String,

    /// Bonding-curve pool address
    #[arg(long, value_name = "POOL")]
    pub pool: String,

    /// Token id (defaults to the mint address)
    #[arg(long, value_name = "ID")]
    pub id: Option<String>,
}
