//! Application Layer - graduation use cases
//!
//! Components in dependency order: ledger client and transaction sender,
//! lookup table manager, pool reader, fee claim coordinator, migration
//! executor, and the orchestrator that sequences them.

pub mod address_table;
pub mod fee_claim;
pub mod ledger_client;
pub mod migration_executor;
pub mod orchestrator;
pub mod pool_reader;
pub mod tx_sender;

pub use address_table::{AddressTableError, AddressTableManager, LOOKUP_TABLE_SET_VERSION};
pub use fee_claim::{ClaimOutcome, FeeClaimCoordinator, FeeClaimError};
pub use ledger_client::{LedgerClient, LedgerClientError};
pub use migration_executor::{
    MigrationError, MigrationExecutor, MigrationOutput, PermanentPoolAddressing,
};
pub use orchestrator::{
    MigrationOrchestrator, MigrationReport, OrchestratorError, PoolLockGuard, PoolLockRegistry,
    RECHECK_HINT,
};
pub use pool_reader::{PoolReadError, PoolStateCache, PoolStateReader};
pub use tx_sender::{SendError, TransactionSender};
