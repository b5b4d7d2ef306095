use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Failed to load keypair from file: {0}")]
    LoadError(String),
    #[error("Invalid keypair bytes: {0}")]
    InvalidKeypair(String),
    #[error("Invalid base58 secret key: {0}")]
    InvalidBase58(String),
}

/// Partner wallet: fee claimer, migration payer and lookup table authority
#[derive(Clone)]
pub struct PartnerWallet {
    keypair: Arc<Keypair>,
}

impl std::fmt::Debug for PartnerWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartnerWallet")
            .field("pubkey", &self.pubkey())
            .finish()
    }
}

impl PartnerWallet {
    /// Load keypair from a file path (JSON array format, `~` expanded)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, WalletError> {
        let raw = path.as_ref().to_string_lossy();
        let expanded = shellexpand::tilde(&raw);
        let contents = fs::read_to_string(expanded.as_ref())
            .map_err(|e| WalletError::LoadError(format!("Failed to read {}: {}", expanded, e)))?;

        // Parse JSON array of bytes
        let bytes: Vec<u8> = serde_json::from_str(&contents)
            .map_err(|e| WalletError::LoadError(format!("Invalid JSON format: {}", e)))?;

        Self::from_bytes(&bytes)
    }

    /// Load keypair from a base58-encoded 64-byte secret
    pub fn from_base58(secret: &str) -> Result<Self, WalletError> {
        let bytes = bs58::decode(secret.trim())
            .into_vec()
            .map_err(|e| WalletError::InvalidBase58(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Load keypair from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        let keypair = Keypair::try_from(bytes)
            .map_err(|e| WalletError::InvalidKeypair(e.to_string()))?;

        Ok(Self {
            keypair: Arc::new(keypair),
        })
    }

    /// Create a new random keypair (for testing)
    pub fn new_random() -> Self {
        Self {
            keypair: Arc::new(Keypair::new()),
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}
