pub mod retry;
pub mod rpc;
pub mod wallet;

pub use retry::{RetryError, RetryPolicy};
pub use rpc::{classify_client_error, SolanaClient};
pub use wallet::{PartnerWallet, WalletError};
