//! The application shell: owns the stores, the message registry and the route table, and drives
//! them through the block lifecycle requested by the consensus engine.
//!
//! Calls arrive one at a time. `CheckTx` runs against a check state rebuilt from the last commit
//! at every [BaseApp::commit]; `DeliverTx` runs against the working state of the block being
//! built. Read-only queries go through a [Querier], which only sees committed versions and can be
//! moved to other threads.

use std::sync::Arc;

use serde::Deserialize;

pub mod abci;

pub use abci::*;

use crate::auth::mapper::fee_pool;
use crate::auth::{ante_handler, get_account, set_account, AppAccount};
use crate::codec::MsgRegistry;
use crate::coin::Coins;
use crate::common::Addr;
use crate::context::{Context, Header, Mode};
use crate::crypto::PubKey;
use crate::error::{Error, Result};
use crate::params::{AppConfig, STORES};
use crate::router::{Handler, InitGenesis, Router};
use crate::store::{
    CacheMultiStore, CommitId, CommitMultiStore, MemMultiStore, MultiStore,
    Snapshot, VersionMap,
};
use crate::tx::StdTx;
use crate::{bank, slashing, stake};

/// Account payload of `SetOption("acc/account")`. The address may be left out when the key is
/// given.
#[derive(Deserialize)]
struct OptionAccount {
    #[serde(default)]
    address: Option<Addr>,
    #[serde(default)]
    pub_key: Option<PubKey>,
    #[serde(default)]
    coins: Coins,
    #[serde(default)]
    name: String,
}

impl OptionAccount {
    fn into_account(self) -> Result<AppAccount> {
        let address = match (self.address, &self.pub_key) {
            (Some(a), Some(pk)) if pk.address() != a => {
                return Err(Error::InvalidPubKey(format!(
                    "pubkey does not belong to {}",
                    a
                )))
            }
            (Some(a), _) => a,
            (None, Some(pk)) => pk.address(),
            (None, None) => {
                return Err(Error::InvalidAddress(
                    "account needs an address or a pubkey".into(),
                ))
            }
        };
        if !self.coins.is_valid() {
            return Err(Error::InvalidCoins(format!("{}", self.coins)))
        }
        let mut acc = AppAccount::new(address);
        acc.base.pub_key = self.pub_key;
        acc.base.coins = self.coins;
        acc.name = self.name;
        Ok(acc)
    }
}

pub struct BaseApp {
    name: String,
    chain_id: Option<String>,
    registry: MsgRegistry,
    router: Router,
    cms: CommitMultiStore,
    check_state: MemMultiStore,
    check_header: Header,
    /// Set between `BeginBlock` and `Commit`.
    deliver_header: Option<Header>,
}

impl BaseApp {
    /// Build the application with the bank, stake and slashing routes mounted.
    pub fn new(config: AppConfig) -> Result<Self> {
        let mut registry = MsgRegistry::new();
        bank::register_msgs(&mut registry)?;
        stake::register_msgs(&mut registry)?;
        slashing::register_msgs(&mut registry)?;

        let mut router = Router::new();
        router
            .add_route(
                bank::ROUTE,
                bank::new_handler(),
                Some(bank::genesis_initializer()),
            )?
            .add_route(
                stake::ROUTE,
                stake::new_handler(),
                Some(stake::genesis_initializer()),
            )?
            .add_route(
                slashing::ROUTE,
                slashing::new_handler(),
                Some(slashing::genesis_initializer()),
            )?;

        let cms = CommitMultiStore::new(STORES);
        let check_state = cms.latest();
        let check_header = Header {
            chain_id: config.chain_id.clone().unwrap_or_default(),
            ..Default::default()
        };
        Ok(Self {
            name: config.app_name,
            chain_id: config.chain_id,
            registry,
            router,
            cms,
            check_state,
            check_header,
            deliver_header: None,
        })
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chain_id(&self) -> Option<&str> {
        self.chain_id.as_deref()
    }

    /// Mount an extra route. Must happen before the first transaction.
    pub fn add_route(
        &mut self, name: &str, handler: Handler,
        init_genesis: Option<InitGenesis>,
    ) -> Result<()> {
        self.router.add_route(name, handler, init_genesis)?;
        Ok(())
    }

    #[inline(always)]
    pub fn registry_mut(&mut self) -> &mut MsgRegistry {
        &mut self.registry
    }

    #[inline(always)]
    pub fn registry(&self) -> &MsgRegistry {
        &self.registry
    }

    pub fn last_commit_id(&self) -> CommitId {
        self.cms.last_commit_id()
    }

    /// A query handle over the committed versions, usable from any thread.
    pub fn querier(&self) -> Querier {
        Querier {
            versions: self.cms.versions(),
        }
    }

    fn set_chain_id(&mut self, id: &str) {
        self.chain_id = Some(id.into());
        self.check_header.chain_id = id.into();
    }

    pub fn set_option(&mut self, key: &str, value: &str) -> ResponseSetOption {
        match self.apply_option(key, value) {
            Ok(()) => ResponseSetOption {
                code: 0,
                log: "Success".into(),
            },
            Err(e) => {
                log::debug!("set_option {} failed: {}", key, e);
                let (code, log) = e.result();
                ResponseSetOption { code, log }
            }
        }
    }

    fn apply_option(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "base/chain_id" => {
                self.set_chain_id(value);
                Ok(())
            }
            "acc/account" | "coin/account" => {
                let opt: OptionAccount = serde_json::from_str(value)
                    .map_err(|e| Error::TxDecode(format!("{}: {}", key, e)))?;
                let acc = opt.into_account()?;
                set_account(self.cms.working(), &acc);
                set_account(&mut self.check_state, &acc);
                log::debug!("set_option created account {}", acc.base.address);
                Ok(())
            }
            _ => Err(Error::UnknownRequest(format!(
                "unknown option key {}",
                key
            ))),
        }
    }

    /// Load the genesis state and derive the initial validator set.
    ///
    /// An error here is fatal: the caller must stop the node instead of starting the chain from
    /// a partially loaded state. Nothing is written to the working state on error.
    pub fn init_chain(
        &mut self, req: RequestInitChain,
    ) -> Result<ResponseInitChain> {
        if let Some(id) = &req.chain_id {
            self.set_chain_id(id);
        }
        let state = req.app_state.as_object().ok_or_else(|| {
            Error::GenesisParse("app state must be a JSON object".into())
        })?;
        let header = Header {
            chain_id: self.check_header.chain_id.clone(),
            height: 0,
            time: req.time,
            proposer: None,
        };
        let ctx = Context::new(header.clone(), Mode::Deliver, &[]);
        let validators = {
            let mut cache = CacheMultiStore::new(self.cms.working());
            self.router.init_genesis(&ctx, &mut cache, state)?;
            let v = stake::keeper::apply_validator_set_changes(
                &ctx.with_module("stake"),
                &mut cache,
            )?;
            cache.write();
            v
        };
        self.check_state = self.cms.working().clone();
        self.check_header = header;
        log::info!(
            "{}: genesis loaded for chain {} with {} validator(s)",
            self.name,
            self.check_header.chain_id,
            validators.len()
        );
        Ok(ResponseInitChain { validators })
    }

    /// Open block `req.header.height`: liveness accounting and evidence handling.
    ///
    /// Errors are fatal for the node: the working state may already be partly updated.
    pub fn begin_block(
        &mut self, req: RequestBeginBlock,
    ) -> Result<ResponseBeginBlock> {
        let header = req.header;
        match &self.chain_id {
            Some(id) if *id != header.chain_id => {
                return Err(Error::Internal(format!(
                    "block for chain {} delivered to chain {}",
                    header.chain_id, id
                )))
            }
            Some(_) => (),
            None => self.set_chain_id(&header.chain_id),
        }
        log::debug!("begin block {} at {}", header.height, header.time);
        let ctx = Context::new(header.clone(), Mode::Deliver, &[]);
        let tags = slashing::begin_blocker(
            &ctx.with_module("slashing"),
            self.cms.working(),
            &req.signing_validators,
            &req.byzantine_validators,
        )?;
        self.deliver_header = Some(header);
        Ok(ResponseBeginBlock { tags })
    }

    /// Mempool admission against the check state.
    pub fn check_tx(&mut self, tx_bytes: &[u8]) -> ResponseTx {
        self.run_tx(Mode::Check, tx_bytes)
    }

    pub fn deliver_tx(&mut self, tx_bytes: &[u8]) -> ResponseTx {
        self.run_tx(Mode::Deliver, tx_bytes)
    }

    /// Decode, authenticate and dispatch one transaction.
    ///
    /// The ante stage runs in a cache over the mode's state and the handler in a cache nested in
    /// it. The handler's writes are kept only when it succeeds within the gas limit; the ante
    /// writes (sequence bump, fee) are kept whenever authentication succeeds.
    fn run_tx(&mut self, mode: Mode, tx_bytes: &[u8]) -> ResponseTx {
        let tx = match StdTx::decode(tx_bytes, &self.registry) {
            Ok(tx) => tx,
            Err(e) => {
                log::debug!("rejected undecodable tx: {}", e);
                return ResponseTx::err(&e, 0, 0)
            }
        };
        if let Err(e) = tx.validate_basic() {
            log::debug!("rejected invalid {}: {}", tx.msg.type_tag(), e);
            return ResponseTx::err(&e, 0, 0)
        }
        let header = match (mode, &self.deliver_header) {
            (Mode::Check, _) => self.check_header.clone(),
            (Mode::Deliver, Some(h)) => h.clone(),
            (Mode::Deliver, None) => {
                let e = Error::Internal("tx delivered outside of a block".into());
                return ResponseTx::err(&e, 0, 0)
            }
        };
        let state: &mut dyn MultiStore = match mode {
            Mode::Check => &mut self.check_state,
            Mode::Deliver => self.cms.working(),
        };
        let route = tx.msg.route();
        let handler = match self.router.route(route) {
            Some(h) => h,
            None => {
                let e = Error::UnknownRequest(format!(
                    "no route for message type {}",
                    tx.msg.type_tag()
                ));
                return ResponseTx::err(&e, 0, 0)
            }
        };
        let ctx = Context::new(header, mode, tx_bytes).with_fee(tx.fee_amount());

        let mut tx_cache = CacheMultiStore::new(state);
        let ante = match ante_handler(&ctx.with_module("auth"), &mut tx_cache, &tx) {
            Ok(a) => a,
            Err(e) => {
                log::debug!("{:?} ante rejected {}: {}", mode, tx.msg.type_tag(), e);
                return ResponseTx::err(&e, 0, tx_cache.gas_used())
            }
        };
        let ante_gas = tx_cache.gas_used();
        let (result, gas_used) = {
            let mut msg_cache = CacheMultiStore::new(&mut tx_cache);
            let result = handler(&ctx.with_module(route), &mut msg_cache, &tx.msg);
            let gas_used = ante_gas + msg_cache.gas_used();
            match result {
                Ok(_) if ante.gas_wanted > 0 && gas_used > ante.gas_wanted => (
                    Err(Error::OutOfGas(format!(
                        "used {} of {} gas",
                        gas_used, ante.gas_wanted
                    ))),
                    gas_used,
                ),
                Ok(r) => {
                    msg_cache.write();
                    (Ok(r), gas_used)
                }
                Err(e) => (Err(e), gas_used),
            }
        };
        tx_cache.write();

        match result {
            Ok(r) => {
                log::debug!("{:?} accepted {} ({} gas)", mode, tx.msg.type_tag(), gas_used);
                ResponseTx::ok(r, ante.gas_wanted, gas_used)
            }
            Err(e) => {
                log::debug!("{:?} failed {}: {}", mode, tx.msg.type_tag(), e);
                ResponseTx::err(&e, ante.gas_wanted, gas_used)
            }
        }
    }

    /// Close the current block: mature queues and report the validator-set delta.
    ///
    /// Errors are fatal for the node.
    pub fn end_block(&mut self, height: u64) -> Result<ResponseEndBlock> {
        let header = match &self.deliver_header {
            Some(h) if h.height == height => h.clone(),
            Some(h) => {
                return Err(Error::Internal(format!(
                    "end of block {} requested while in block {}",
                    height, h.height
                )))
            }
            None => {
                return Err(Error::Internal(format!(
                    "end of block {} requested outside of a block",
                    height
                )))
            }
        };
        let ctx = Context::new(header, Mode::Deliver, &[]).with_module("stake");
        let validator_updates = stake::end_blocker(&ctx, self.cms.working())?;
        log::debug!(
            "end block {}: {} validator update(s)",
            height,
            validator_updates.len()
        );
        Ok(ResponseEndBlock {
            validator_updates,
            tags: Vec::new(),
        })
    }

    /// Publish the working state and reset the check state to it.
    pub fn commit(&mut self) -> ResponseCommit {
        let id = self.cms.commit();
        if let Some(h) = self.deliver_header.take() {
            self.check_header = h;
        }
        self.check_state = self.cms.latest();
        log::debug!("commit version {} app hash {}", id.version, id.hash);
        ResponseCommit {
            version: id.version,
            data: id.hash,
        }
    }

    #[inline]
    pub fn query(&self, req: &RequestQuery) -> ResponseQuery {
        self.querier().query(req)
    }
}

/// Read-only access to committed versions.
#[derive(Clone)]
pub struct Querier {
    versions: VersionMap,
}

impl Querier {
    /// Supported paths:
    ///
    /// - `/store/<name>/key` with the raw key as data, answered with a proof when asked for;
    /// - `/app/account/<hex address>` and `/app/validator/<hex owner>`, answered in JSON;
    /// - `/app/fee_pool`, the fees collected so far;
    /// - `/app/validators`, the set reported at the last end-block.
    pub fn query(&self, req: &RequestQuery) -> ResponseQuery {
        match self.try_query(req) {
            Ok(r) => r,
            Err(e) => ResponseQuery::err(&e),
        }
    }

    fn snapshot(&self, height: u64) -> Result<Arc<Snapshot>> {
        let versions = self.versions.read();
        let snap = if height == 0 {
            versions.values().next_back()
        } else {
            versions.get(&height)
        };
        snap.cloned().ok_or_else(|| {
            Error::UnknownRequest(format!("no committed version at height {}", height))
        })
    }

    fn try_query(&self, req: &RequestQuery) -> Result<ResponseQuery> {
        let snap = self.snapshot(req.height)?;
        let parts: Vec<&str> = req.path.trim_start_matches('/').split('/').collect();
        let value = match parts.as_slice() {
            ["store", name, "key"] => {
                let store = STORES.iter().copied().find(|s| s == name).ok_or_else(
                    || Error::UnknownRequest(format!("no store named {}", name)),
                )?;
                let r = snap.query(store, &req.data);
                return Ok(ResponseQuery {
                    key: req.data.clone(),
                    value: r.value,
                    height: r.height,
                    proof: if req.prove { r.proof } else { None },
                    ..Default::default()
                })
            }
            ["app", "account", addr] => {
                let addr = parse_addr(addr)?;
                let acc = get_account(snap.stores(), &addr).ok_or_else(|| {
                    Error::UnknownAddress(format!("no account for {}", addr))
                })?;
                to_json(&acc)?
            }
            ["app", "validator", addr] => {
                let addr = parse_addr(addr)?;
                let v = stake::keeper::get_validator(snap.stores(), &addr)
                    .ok_or_else(|| {
                        Error::UnknownAddress(format!("no validator owned by {}", addr))
                    })?;
                to_json(&v)?
            }
            ["app", "fee_pool"] => to_json(&fee_pool(snap.stores()))?,
            ["app", "validators"] => {
                to_json(&stake::keeper::last_validator_powers(snap.stores()))?
            }
            _ => {
                return Err(Error::UnknownRequest(format!(
                    "unknown query path {}",
                    req.path
                )))
            }
        };
        Ok(ResponseQuery {
            key: req.data.clone(),
            value: Some(value),
            height: snap.id.version,
            ..Default::default()
        })
    }
}

fn parse_addr(s: &str) -> Result<Addr> {
    s.parse()
        .map_err(|_| Error::InvalidAddress(format!("cannot parse address {}", s)))
}

fn to_json<T: serde::Serialize>(v: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(v).map_err(|e| Error::Internal(e.to_string()))
}
