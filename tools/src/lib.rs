//! Fixtures for exercising `qsdk` in tests: deterministic keys, signed transactions and genesis
//! documents.

pub mod chain;
pub mod genesis;
pub mod keys;
pub mod txs;

pub use chain::TestChain;
pub use genesis::GenesisBuilder;
pub use keys::TestKey;
pub use txs::{send_msg, send_msg_with_fee, TxBuilder};

/// Install `env_logger` for the test binary. Safe to call from every test.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
