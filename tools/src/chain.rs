use serde_json::Value;

use qsdk::app::{
    BaseApp, RequestBeginBlock, RequestInitChain, RequestQuery,
    ResponseEndBlock, ResponseQuery, ResponseTx,
};
use qsdk::auth::AppAccount;
use qsdk::coin::Coins;
use qsdk::common::Addr;
use qsdk::context::Header;
use qsdk::params::AppConfig;
use qsdk::slashing::{Evidence, SigningValidator};
use qsdk::stake::{Validator, ValidatorUpdate};

/// Seconds between two blocks unless a test says otherwise.
pub const BLOCK_INTERVAL: u64 = 5;

/// An in-process chain driving a [BaseApp] the way a consensus engine would, one block at a time.
pub struct TestChain {
    pub app: BaseApp,
    chain_id: String,
    height: u64,
    time: u64,
    /// Delta returned by `InitChain`.
    pub genesis_validators: Vec<ValidatorUpdate>,
}

impl TestChain {
    /// Start a chain from `app_state` at time `genesis_time`. Panics if the genesis does not
    /// load.
    pub fn new(chain_id: &str, app_state: Value, genesis_time: u64) -> Self {
        let mut app = BaseApp::new(AppConfig {
            app_name: "qsdk-test".into(),
            chain_id: None,
        })
        .expect("application builds");
        let res = app
            .init_chain(RequestInitChain {
                time: genesis_time,
                chain_id: Some(chain_id.into()),
                app_state,
            })
            .expect("genesis loads");
        Self {
            app,
            chain_id: chain_id.into(),
            height: 0,
            time: genesis_time,
            genesis_validators: res.validators,
        }
    }

    #[inline(always)]
    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    #[inline(always)]
    pub fn height(&self) -> u64 {
        self.height
    }

    #[inline(always)]
    pub fn time(&self) -> u64 {
        self.time
    }

    /// Let `secs` pass on top of the regular block interval before the next block.
    pub fn advance_time(&mut self, secs: u64) {
        self.time += secs;
    }

    pub fn begin_block(&mut self) {
        self.begin_block_with(Vec::new(), Vec::new())
    }

    pub fn begin_block_with(
        &mut self, signing_validators: Vec<SigningValidator>,
        byzantine_validators: Vec<Evidence>,
    ) {
        self.height += 1;
        self.time += BLOCK_INTERVAL;
        let header = Header {
            chain_id: self.chain_id.clone(),
            height: self.height,
            time: self.time,
            proposer: None,
        };
        self.app
            .begin_block(RequestBeginBlock {
                header,
                signing_validators,
                byzantine_validators,
            })
            .expect("begin block");
    }

    pub fn deliver(&mut self, tx: &[u8]) -> ResponseTx {
        self.app.deliver_tx(tx)
    }

    pub fn check(&mut self, tx: &[u8]) -> ResponseTx {
        self.app.check_tx(tx)
    }

    /// End the current block and commit it.
    pub fn end_block(&mut self) -> ResponseEndBlock {
        let res = self.app.end_block(self.height).expect("end block");
        self.app.commit();
        res
    }

    /// A whole block carrying `txs`.
    pub fn block(&mut self, txs: &[Vec<u8>]) -> (Vec<ResponseTx>, ResponseEndBlock) {
        self.begin_block();
        let results = txs.iter().map(|tx| self.deliver(tx)).collect();
        (results, self.end_block())
    }

    pub fn query(&self, path: &str, data: &[u8]) -> ResponseQuery {
        self.app.query(&RequestQuery {
            path: path.into(),
            data: data.to_vec(),
            height: 0,
            prove: true,
        })
    }

    /// Committed account record.
    pub fn account(&self, addr: &Addr) -> Option<AppAccount> {
        let res = self.query(&format!("/app/account/{}", addr), &[]);
        res.value
            .map(|v| serde_json::from_slice(&v).expect("account json"))
    }

    /// Committed sequence of `addr`, zero for an unknown account.
    pub fn sequence(&self, addr: &Addr) -> u64 {
        self.account(addr).map(|a| a.base.sequence).unwrap_or(0)
    }

    /// Committed fee pool.
    pub fn fee_pool(&self) -> Coins {
        let res = self.query("/app/fee_pool", &[]);
        res.value
            .map(|v| serde_json::from_slice(&v).expect("fee pool json"))
            .unwrap_or_default()
    }

    pub fn validator(&self, owner: &Addr) -> Option<Validator> {
        let res = self.query(&format!("/app/validator/{}", owner), &[]);
        res.value
            .map(|v| serde_json::from_slice(&v).expect("validator json"))
    }
}
