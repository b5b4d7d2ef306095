//! Address Lookup Table Manager
//!
//! Keeps one on-chain lookup table holding the static accounts every claim
//! and migration transaction touches. Without it the migration transaction
//! does not fit in a packet, but reads degrade to uncompressed transactions
//! when no table is configured.

use solana_sdk::{
    address_lookup_table::{
        instruction::{create_lookup_table, extend_lookup_table},
        AddressLookupTableAccount,
    },
    pubkey::Pubkey,
};
use thiserror::Error;
use tokio::sync::RwLock;

use super::ledger_client::LedgerClientError;
use super::tx_sender::{SendError, TransactionSender};
use crate::adapters::dbc::BondingCurveProgram;
use crate::domain::known_programs::{STATIC_PROGRAMS, WRAPPED_SOL_MINT};

/// Bumped whenever `static_addresses` changes; an older table is replaced
pub const LOOKUP_TABLE_SET_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum AddressTableError {
    #[error("Failed to read lookup table: {0}")]
    Ledger(#[from] LedgerClientError),
    #[error("Failed to create lookup table: {0}")]
    Send(#[from] SendError),
}

pub struct AddressTableManager {
    sender: TransactionSender,
    program: BondingCurveProgram,
    fee_collection_address: Pubkey,
    migration_fee_address: Pubkey,
    configured: Option<Pubkey>,
    cached: RwLock<Option<AddressLookupTableAccount>>,
}

impl AddressTableManager {
    pub fn new(
        sender: TransactionSender,
        program: BondingCurveProgram,
        fee_collection_address: Pubkey,
        migration_fee_address: Pubkey,
        configured: Option<Pubkey>,
    ) -> Self {
        Self {
            sender,
            program,
            fee_collection_address,
            migration_fee_address,
            configured,
            cached: RwLock::new(None),
        }
    }

    /// Deterministic address set for `LOOKUP_TABLE_SET_VERSION`
    pub fn static_addresses(&self) -> Vec<Pubkey> {
        let mut set: Vec<Pubkey> = STATIC_PROGRAMS.to_vec();
        set.extend([
            WRAPPED_SOL_MINT,
            self.program.program_id,
            self.program.pool_authority(),
            self.program.event_authority(),
            self.program.amm_program_id,
            self.program.amm_pool_authority(),
            self.program.amm_event_authority(),
            self.fee_collection_address,
            self.migration_fee_address,
        ]);

        let mut seen = std::collections::HashSet::new();
        set.retain(|key| seen.insert(*key));
        set
    }

    /// Configured table, loaded once. `None` means send uncompressed.
    pub async fn get_or_load(
        &self,
    ) -> Result<Option<AddressLookupTableAccount>, AddressTableError> {
        if let Some(table) = self.cached.read().await.as_ref() {
            return Ok(Some(table.clone()));
        }

        let Some(address) = self.configured else {
            tracing::warn!("No lookup table configured; sending uncompressed transactions");
            return Ok(None);
        };

        match self.sender.client().get_lookup_table(&address).await? {
            Some(state) => {
                tracing::info!(
                    "Loaded lookup table {} ({} addresses)",
                    address,
                    state.loaded_count
                );
                let account = state.to_account();
                *self.cached.write().await = Some(account.clone());
                Ok(Some(account))
            }
            None => {
                tracing::warn!(
                    "Lookup table {} not found on ledger; sending uncompressed transactions",
                    address
                );
                Ok(None)
            }
        }
    }

    /// Tables to compile a transaction against; read errors degrade to none
    pub async fn tables_for_transaction(&self) -> Vec<AddressLookupTableAccount> {
        match self.get_or_load().await {
            Ok(table) => table.into_iter().collect(),
            Err(e) => {
                tracing::warn!("Lookup table unavailable, sending uncompressed: {}", e);
                Vec::new()
            }
        }
    }

    /// Return a table holding the current static set, creating one if needed.
    /// An outdated table is never extended; a new one replaces it.
    pub async fn create_on_chain(&self) -> Result<Pubkey, AddressTableError> {
        let set = self.static_addresses();
        let existing = match self.cached.read().await.as_ref() {
            Some(table) => Some(table.key),
            None => self.configured,
        };

        if let Some(address) = existing {
            match self.sender.client().get_lookup_table(&address).await? {
                Some(state) if state.contains_all(&set) => {
                    tracing::info!(
                        "Lookup table {} already holds the v{} address set",
                        address,
                        LOOKUP_TABLE_SET_VERSION
                    );
                    *self.cached.write().await = Some(state.to_account());
                    return Ok(address);
                }
                Some(_) => {
                    tracing::warn!(
                        "Lookup table {} predates address set v{}; creating a replacement",
                        address,
                        LOOKUP_TABLE_SET_VERSION
                    );
                }
                None => {
                    tracing::warn!(
                        "Configured lookup table {} not found; creating a new one",
                        address
                    );
                }
            }
        }

        let payer = self.sender.payer();
        let slot = self.sender.client().get_slot().await?;
        let (create_ix, table_address) = create_lookup_table(payer, payer, slot);
        let extend_ix = extend_lookup_table(table_address, payer, Some(payer), set.clone());

        self.sender
            .send_and_confirm("create lookup table", &[create_ix, extend_ix], &[])
            .await?;

        tracing::info!("Created lookup table {} with {} addresses", table_address, set.len());
        *self.cached.write().await = Some(AddressLookupTableAccount {
            key: table_address,
            addresses: set,
        });
        Ok(table_address)
    }
}
