use serde_json::{json, Value};

use qsdk::auth::AppAccount;
use qsdk::coin::Coins;
use qsdk::common::Addr;
use qsdk::params::{SlashingParams, StakeParams};
use qsdk::rat::Rat;
use qsdk::stake::{Delegation, Description, Validator};

use crate::keys::TestKey;

/// Builds the `app_state` document handed to `InitChain`.
#[derive(Default)]
pub struct GenesisBuilder {
    accounts: Vec<AppAccount>,
    issuers: Vec<Addr>,
    stake_params: StakeParams,
    slashing_params: SlashingParams,
    validators: Vec<Validator>,
    delegations: Vec<Delegation>,
}

impl GenesisBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(self, addr: &Addr, coins: Coins) -> Self {
        self.account_with_sequence(addr, coins, 0)
    }

    pub fn account_with_sequence(
        mut self, addr: &Addr, coins: Coins, sequence: u64,
    ) -> Self {
        let mut acc = AppAccount::new(*addr);
        acc.base.coins = coins;
        acc.base.sequence = sequence;
        self.accounts.push(acc);
        self
    }

    pub fn issuer(mut self, addr: &Addr) -> Self {
        self.issuers.push(*addr);
        self
    }

    pub fn stake_params(mut self, params: StakeParams) -> Self {
        self.stake_params = params;
        self
    }

    pub fn slashing_params(mut self, params: SlashingParams) -> Self {
        self.slashing_params = params;
        self
    }

    /// A validator owned by `key`, self-bonded with `tokens` of the bond denom.
    pub fn validator(mut self, key: &TestKey, tokens: u64) -> Self {
        let mut v = Validator::new(
            key.address,
            key.pub_key.clone(),
            Description::new(&key.hex_address()),
        );
        v.tokens = tokens.into();
        v.delegator_shares = Rat::from_amount(&v.tokens);
        self.delegations.push(Delegation {
            delegator: key.address,
            validator: key.address,
            shares: v.delegator_shares.clone(),
            height: 0,
        });
        self.validators.push(v);
        self
    }

    pub fn build(self) -> Value {
        json!({
            "bank": {
                "accounts": self.accounts,
                "issuers": self.issuers,
            },
            "stake": {
                "params": self.stake_params,
                "validators": self.validators,
                "delegations": self.delegations,
            },
            "slashing": {
                "params": self.slashing_params,
            },
        })
    }
}
