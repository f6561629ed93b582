use rlp_derive::{RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};

use crate::rat::Rat;
use crate::store::StoreKey;

pub type Gas = u64;

// mounted sub-stores
pub const STORE_ACC: StoreKey = "acc";
pub const STORE_STAKE: StoreKey = "stake";
pub const STORE_SLASHING: StoreKey = "slashing";
pub const STORE_MAIN: StoreKey = "main";
pub const STORES: &[StoreKey] =
    &[STORE_ACC, STORE_MAIN, STORE_SLASHING, STORE_STAKE];

// gas consumption parameters
pub const GAS_READ_COST_FLAT: Gas = 10;
pub const GAS_READ_COST_PER_BYTE: Gas = 1;
pub const GAS_WRITE_COST_FLAT: Gas = 10;
pub const GAS_WRITE_COST_PER_BYTE: Gas = 10;

// stake defaults
pub const DEFAULT_UNBONDING_TIME: u64 = 60 * 60 * 24 * 3 * 7; // three weeks
pub const DEFAULT_MAX_VALIDATORS: u16 = 100;
pub const DEFAULT_BOND_DENOM: &str = "steak";

// slashing defaults
pub const DEFAULT_SIGNED_BLOCKS_WINDOW: u64 = 100;
pub const DEFAULT_DOWNTIME_UNBOND_DURATION: u64 = 60 * 60 * 24 * 2;
pub const DEFAULT_MAX_EVIDENCE_AGE: u64 = 60 * 60 * 24 * 3 * 7;

#[derive(
    Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable, Serialize,
    Deserialize,
)]
#[serde(default)]
pub struct StakeParams {
    /// Seconds an unbonding delegation or redelegation waits before it matures.
    pub unbonding_time: u64,
    /// Size of the active bonded set.
    pub max_validators: u16,
    pub bond_denom: String,
}

impl Default for StakeParams {
    fn default() -> Self {
        Self {
            unbonding_time: DEFAULT_UNBONDING_TIME,
            max_validators: DEFAULT_MAX_VALIDATORS,
            bond_denom: DEFAULT_BOND_DENOM.into(),
        }
    }
}

#[derive(
    Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable, Serialize,
    Deserialize,
)]
#[serde(default)]
pub struct SlashingParams {
    /// Number of blocks in the sliding liveness window.
    pub signed_blocks_window: u64,
    /// Minimum fraction of the window a validator must sign.
    pub min_signed_per_window: Rat,
    /// Seconds a validator stays jailed after downtime.
    pub downtime_unbond_duration: u64,
    pub slash_fraction_double_sign: Rat,
    pub slash_fraction_downtime: Rat,
    /// Evidence older than this many seconds is ignored.
    pub max_evidence_age: u64,
}

impl SlashingParams {
    /// Blocks a validator may miss within the window before it is slashed.
    pub fn max_missed_blocks(&self) -> u64 {
        let signed = &Rat::new(self.signed_blocks_window, 1) *
            &self.min_signed_per_window;
        let min_signed =
            signed.floor_amount().map(|a| a.as_u256().low_u64()).unwrap_or(0);
        self.signed_blocks_window.saturating_sub(min_signed)
    }

    pub fn is_valid(&self) -> bool {
        self.signed_blocks_window > 0 &&
            self.min_signed_per_window.is_fraction() &&
            self.slash_fraction_double_sign.is_fraction() &&
            self.slash_fraction_downtime.is_fraction()
    }
}

impl Default for SlashingParams {
    fn default() -> Self {
        Self {
            signed_blocks_window: DEFAULT_SIGNED_BLOCKS_WINDOW,
            min_signed_per_window: Rat::new(1, 2),
            downtime_unbond_duration: DEFAULT_DOWNTIME_UNBOND_DURATION,
            slash_fraction_double_sign: Rat::new(1, 20),
            slash_fraction_downtime: Rat::new(1, 100),
            max_evidence_age: DEFAULT_MAX_EVIDENCE_AGE,
        }
    }
}

/// Application-level settings fixed at construction.
#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub app_name: String,
    /// May also be set through `SetOption("base/chain_id")` before the first block.
    pub chain_id: Option<String>,
}

#[test]
fn test_max_missed_blocks() {
    let p = SlashingParams::default();
    assert_eq!(p.max_missed_blocks(), 50);
    assert!(p.is_valid());
    let p: SlashingParams =
        serde_json::from_str(r#"{"slash_fraction_downtime":"2"}"#).unwrap();
    assert!(!p.is_valid());
    assert_eq!(p.signed_blocks_window, DEFAULT_SIGNED_BLOCKS_WINDOW);
}
