//! Requests and responses exchanged with the consensus engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::Hash;
use crate::context::Header;
use crate::error::{Error, CODE_OK};
use crate::params::Gas;
use crate::router::{HandlerResult, Tag};
use crate::slashing::{Evidence, SigningValidator};
use crate::stake::ValidatorUpdate;
use crate::store::StoreProof;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseSetOption {
    pub code: u32,
    pub log: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RequestInitChain {
    /// Block time of the genesis, unix seconds.
    #[serde(default)]
    pub time: u64,
    #[serde(default)]
    pub chain_id: Option<String>,
    /// One entry per route with a genesis initializer, keyed by route name.
    pub app_state: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseInitChain {
    pub validators: Vec<ValidatorUpdate>,
}

#[derive(Clone, Debug, Default)]
pub struct RequestBeginBlock {
    pub header: Header,
    /// Members of the last validator set and whether they signed.
    pub signing_validators: Vec<SigningValidator>,
    pub byzantine_validators: Vec<Evidence>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseBeginBlock {
    pub tags: Vec<Tag>,
}

/// Outcome of `CheckTx` and `DeliverTx`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseTx {
    pub code: u32,
    pub log: String,
    pub data: Vec<u8>,
    pub tags: Vec<Tag>,
    pub gas_wanted: Gas,
    pub gas_used: Gas,
}

impl ResponseTx {
    pub fn ok(res: HandlerResult, gas_wanted: Gas, gas_used: Gas) -> Self {
        Self {
            code: CODE_OK as u32,
            log: res.log,
            data: res.data,
            tags: res.tags,
            gas_wanted,
            gas_used,
        }
    }

    pub fn err(e: &Error, gas_wanted: Gas, gas_used: Gas) -> Self {
        let (code, log) = e.result();
        Self {
            code,
            log,
            gas_wanted,
            gas_used,
            ..Default::default()
        }
    }

    #[inline(always)]
    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK as u32
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseEndBlock {
    /// Consensus keys whose power changed; zero power removes the key.
    pub validator_updates: Vec<ValidatorUpdate>,
    pub tags: Vec<Tag>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResponseCommit {
    pub version: u64,
    /// The app hash of the new version.
    pub data: Hash,
}

#[derive(Clone, Debug, Default)]
pub struct RequestQuery {
    pub path: String,
    pub data: Vec<u8>,
    /// Zero means the latest committed version.
    pub height: u64,
    pub prove: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ResponseQuery {
    pub code: u32,
    pub log: String,
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
    pub height: u64,
    pub proof: Option<StoreProof>,
}

impl ResponseQuery {
    pub fn err(e: &Error) -> Self {
        let (code, log) = e.result();
        Self {
            code,
            log,
            ..Default::default()
        }
    }

    #[inline(always)]
    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK as u32
    }
}
