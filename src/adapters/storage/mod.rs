//! Storage Adapter
//!
//! File-backed implementation of the token, fee-claim and migration-attempt
//! stores.

mod json_store;
mod state;

pub use json_store::{JsonFileStore, DEFAULT_STORE_FILE};
pub use state::StoreState;
