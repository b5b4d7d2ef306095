#![allow(dead_code)]

use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;

use curve_graduator::adapters::solana::PartnerWallet;
use curve_graduator::app::Graduator;
use curve_graduator::config::Config;
use curve_graduator::domain::Token;
use curve_graduator::ports::mocks::{virtual_pool, InMemoryStore, ManualClock, MockLedger};

pub const THRESHOLD_LAMPORTS: u64 = 85_000_000_000;

pub const TEST_CONFIG: &str = r#"
[solana]
rpc_url = "http://127.0.0.1:8899"
keypair_path = "unused.json"

[retry]
max_attempts = 5
base_delay_ms = 1000

[migration]
graduation_threshold_sol = 85
min_claim_sol = 0.001
pool_cache_ttl_secs = 30

[programs]
bonding_curve_program = "dbcij3LWUppWqq96dh6gJWwBifmcGfLSB5D4DuSMaqN"
amm_program = "cpamdpZCGKUy5JxQXB4dcpGPiikHawvSWAd6mEn1sGG"
fee_collection_address = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU"
migration_fee_address = "CHRkrgcfM5kJcs6SMnWQuNcGmhwJbjmw8uzqs4B4VKz2"
migration_config = "7F6dnUcRuyM2TwR8myT1dYypFXpPSxqwKNSFNkxyNESd"
"#;

pub struct TestEnv {
    pub ledger: Arc<MockLedger>,
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
    pub graduator: Graduator,
    pub token: Token,
}

impl TestEnv {
    /// One registered token whose pool holds `virtual_quote` and `partner_fees` lamports
    pub fn new(virtual_quote: u64, partner_fees: u64) -> Self {
        let config: Config = toml::from_str(TEST_CONFIG).unwrap();
        config.validate().unwrap();

        let program = config.programs.program().unwrap();
        let ledger = Arc::new(MockLedger::new().with_pool_program(program.program_id));
        let clock = Arc::new(ManualClock::default());
        let mint = Pubkey::new_unique();
        let pool = Pubkey::new_unique();
        let real_quote = virtual_quote.min(THRESHOLD_LAMPORTS);
        ledger
            .put_pool(pool, &virtual_pool(mint, virtual_quote, real_quote, partner_fees))
            .unwrap();

        let token = Token::new("tok-1", mint, pool);
        let store = Arc::new(InMemoryStore::new().with_token(token.clone()));
        let graduator = Graduator::build(
            &config,
            ledger.clone(),
            PartnerWallet::new_random(),
            store.clone(),
            clock.clone(),
        )
        .unwrap();

        Self {
            ledger,
            store,
            clock,
            graduator,
            token,
        }
    }

    pub fn mark_pool_migrated(&self) {
        let mut account = self.ledger.pool(&self.token.bonding_pool_address).unwrap();
        account.is_migrated = 1;
        self.ledger
            .put_pool(self.token.bonding_pool_address, &account)
            .unwrap();
    }
}
