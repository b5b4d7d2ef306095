//! Curve Graduator
//!
//! Graduates bonding-curve pools into permanent AMM pools.

use anyhow::{bail, Context, Result};
use clap::Parser;
use solana_sdk::pubkey::Pubkey;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use curve_graduator::adapters::cli::{
    CliApp, Command, CreateLookupTableCmd, MigrateCmd, PoolStatusCmd, RegisterCmd, ServeCmd,
};
use curve_graduator::adapters::http;
use curve_graduator::adapters::solana::{PartnerWallet, SolanaClient};
use curve_graduator::adapters::storage::JsonFileStore;
use curve_graduator::app::Graduator;
use curve_graduator::application::LOOKUP_TABLE_SET_VERSION;
use curve_graduator::config::{load_config, Config};
use curve_graduator::domain::{lamports_to_sol, PoolProgress, Token};
use curve_graduator::ports::SystemClock;

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets (PARTNER_PRIVATE_KEY, RPC URL) come from .env, not the config file
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    let config = load_config(&app.config)
        .with_context(|| format!("Failed to load config from {}", app.config.display()))?;
    init_logging(app.verbose, app.debug, &config.logging.level)?;

    match app.command {
        Command::Serve(cmd) => serve_command(&config, cmd).await,
        Command::Migrate(cmd) => migrate_command(&config, cmd).await,
        Command::PoolStatus(cmd) => pool_status_command(&config, cmd).await,
        Command::CreateLookupTable(cmd) => create_lookup_table_command(&config, cmd).await,
        Command::Register(cmd) => register_command(&config, cmd).await,
    }
}

fn init_logging(verbose: bool, debug: bool, configured_level: &str) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured_level))
    };

    fmt().with_env_filter(filter).init();
    Ok(())
}

async fn build(config: &Config) -> Result<Graduator> {
    let rpc = SolanaClient::with_config(
        config.solana.get_rpc_url(),
        config.solana.commitment_config()?,
        config.solana.confirm_timeout(),
        config.solana.confirm_poll_interval(),
    );
    tracing::info!("Using RPC endpoint {}", rpc.url());

    let wallet = load_partner_wallet(config)?;
    let store = open_store(config).await?;

    Graduator::build(config, Arc::new(rpc), wallet, store, Arc::new(SystemClock))
        .context("Invalid configuration")
}

async fn open_store(config: &Config) -> Result<Arc<JsonFileStore>> {
    let path = config.storage.data_path();
    let store = JsonFileStore::open(&path)
        .await
        .with_context(|| format!("Failed to open store at {}", path))?;
    Ok(Arc::new(store))
}

/// PARTNER_PRIVATE_KEY (base58) wins over the configured keypair file
fn load_partner_wallet(config: &Config) -> Result<PartnerWallet> {
    if let Ok(secret) = std::env::var("PARTNER_PRIVATE_KEY") {
        if !secret.trim().is_empty() {
            return PartnerWallet::from_base58(secret.trim())
                .context("PARTNER_PRIVATE_KEY is not a valid base58 keypair");
        }
    }

    let keypair_path = config.solana.get_keypair_path();
    if !Path::new(&keypair_path).exists() {
        bail!(
            "Partner wallet not found: {}\n\n\
             Set PARTNER_PRIVATE_KEY in .env, or point 'keypair_path' in your config \
             at a keypair file. To create one, run:\n  \
             solana-keygen new --outfile {}",
            keypair_path,
            keypair_path
        );
    }

    PartnerWallet::from_file(&keypair_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load partner wallet from '{}': {}\n\n\
             Expected format: JSON array of bytes (e.g., [1,2,3,...])",
            keypair_path,
            e
        )
    })
}

fn parse_address(label: &str, value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value.trim()).with_context(|| format!("Invalid {} address: {}", label, value))
}

async fn serve_command(config: &Config, cmd: ServeCmd) -> Result<()> {
    let graduator = build(config).await?;
    let bind_addr = cmd.bind.unwrap_or_else(|| config.server.bind_addr.clone());

    if graduator.tables.get_or_load().await?.is_none() {
        tracing::warn!(
            "No lookup table configured; run `create-lookup-table` to shrink graduation transactions"
        );
    }

    let state = graduator.app_state();
    tokio::select! {
        result = http::serve(state, &bind_addr) => {
            result.with_context(|| format!("HTTP server on {} failed", bind_addr))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("Curve Graduator stopped");
    Ok(())
}

async fn migrate_command(config: &Config, cmd: MigrateCmd) -> Result<()> {
    let mint = parse_address("mint", &cmd.mint)?;
    let graduator = build(config).await?;

    match graduator.orchestrator.migrate_by_mint(&mint).await {
        Ok(report) => {
            println!("{}", report.message);
            println!("Permanent pool: {}", report.permanent_pool_address);
            if let Some(signature) = report.pre_claim_signature {
                println!(
                    "Pre-claim: {} SOL ({})",
                    lamports_to_sol(report.pre_claim_lamports),
                    signature
                );
            }
            for signature in &report.signatures {
                println!("Signature: {}", signature);
            }
            Ok(())
        }
        Err(err) => {
            if let Some(signature) = err.claim().and_then(|c| c.signature()) {
                eprintln!("Fees were claimed before the failure: {}", signature);
            }
            Err(err).context("Migration did not complete")
        }
    }
}

async fn pool_status_command(config: &Config, cmd: PoolStatusCmd) -> Result<()> {
    let pool = parse_address("pool", &cmd.pool)?;
    let graduator = build(config).await?;

    let snapshot = graduator
        .progress
        .get(&pool)
        .await
        .with_context(|| format!("Failed to read pool {}", pool))?;
    let progress = PoolProgress::from(&snapshot);

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&progress)?);
        return Ok(());
    }

    println!("Pool: {}", pool);
    println!("Mint: {}", snapshot.pool.base_mint);
    println!(
        "Virtual quote reserve: {} / {} SOL",
        lamports_to_sol(snapshot.pool.virtual_quote_reserve),
        lamports_to_sol(snapshot.threshold_lamports)
    );
    println!(
        "Real quote deposits: {} SOL ({:.2}% bonded)",
        lamports_to_sol(snapshot.pool.real_quote_reserve),
        progress.bonding_progress_percent
    );
    println!("Claimable partner fees: {} SOL", lamports_to_sol(snapshot.pool.partner_quote_fee));
    println!("Eligible: {}", progress.is_eligible_for_graduation);
    println!("Migrated: {}", progress.is_migrated);
    Ok(())
}

async fn create_lookup_table_command(config: &Config, _cmd: CreateLookupTableCmd) -> Result<()> {
    let graduator = build(config).await?;
    let address = graduator
        .tables
        .create_on_chain()
        .await
        .context("Failed to create lookup table")?;

    println!("Lookup table (set v{}): {}", LOOKUP_TABLE_SET_VERSION, address);
    println!();
    println!("Add this to your .env:");
    println!("LOOKUP_TABLE_ADDRESS={}", address);
    Ok(())
}

async fn register_command(config: &Config, cmd: RegisterCmd) -> Result<()> {
    let mint = parse_address("mint", &cmd.mint)?;
    let pool = parse_address("pool", &cmd.pool)?;
    let store = open_store(config).await?;

    let id = cmd.id.unwrap_or_else(|| mint.to_string());
    store
        .upsert_token(Token::new(id.clone(), mint, pool))
        .await
        .context("Failed to register token")?;

    println!("Registered token {} (mint {}, pool {})", id, mint, pool);
    Ok(())
}
