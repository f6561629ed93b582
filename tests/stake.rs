use qsdk::auth::account::Account;
use qsdk::coin::{Coin, Coins};
use qsdk::common::{Addr, Amount};
use qsdk::error::*;
use qsdk::params::{SlashingParams, StakeParams};
use qsdk::rat::Rat;
use qsdk::slashing::msgs::{CODE_VALIDATOR_JAILED, CODE_VALIDATOR_NOT_REVOKED};
use qsdk::slashing::{Evidence, EvidenceKind, MsgUnrevoke, SigningValidator};
use qsdk::stake::keys::power_rank_key_of;
use qsdk::stake::msgs::{CODE_INVALID_DELEGATION, CODE_VALIDATOR_REVOKED};
use qsdk::stake::{
    BondStatus, Description, MsgBeginRedelegate, MsgBeginUnbonding,
    MsgCreateValidator, MsgDelegate, ValidatorUpdate,
};
use qsdk::tx::Msg;
use qsdk_tools::*;

const CHAIN: &str = "stake-chain";
const UNBONDING_TIME: u64 = 60;
const JAIL_TIME: u64 = 300;

fn steak(n: u64) -> Coins {
    Coins::single("steak", n)
}

struct Net {
    chain: TestChain,
    v1: TestKey,
    v2: TestKey,
    del: TestKey,
}

impl Net {
    fn new() -> Self {
        init_logger();
        let v1 = TestKey::from_seed("validator-1");
        let v2 = TestKey::from_seed("validator-2");
        let del = TestKey::from_seed("delegator");
        let mut slashing = SlashingParams::default();
        slashing.signed_blocks_window = 10;
        slashing.downtime_unbond_duration = JAIL_TIME;
        let genesis = GenesisBuilder::new()
            .account(&v1.address, steak(10))
            .account(&v2.address, steak(500))
            .account(&del.address, steak(1000))
            .stake_params(StakeParams {
                unbonding_time: UNBONDING_TIME,
                ..Default::default()
            })
            .slashing_params(slashing)
            .validator(&v1, 100)
            .build();
        Self {
            chain: TestChain::new(CHAIN, genesis, 10_000),
            v1,
            v2,
            del,
        }
    }

    fn tx(&self, msg: Msg, by: &TestKey) -> Vec<u8> {
        let seq = self.chain.sequence(&by.address);
        TxBuilder::new(CHAIN, msg).sign_encoded(&[(by, seq)])
    }

    fn create_v2(&mut self, bond: u64) {
        let msg = Msg::CreateValidator(MsgCreateValidator {
            description: Description::new("second"),
            owner: self.v2.address,
            pub_key: self.v2.pub_key.clone(),
            self_delegation: Coin::new("steak", bond),
        });
        let tx = self.tx(msg, &self.v2);
        let (res, _) = self.chain.block(&[tx]);
        assert!(res[0].is_ok(), "{}", res[0].log);
    }

    fn power_of(&self, key: &TestKey) -> Option<u64> {
        let res = self.chain.query("/app/validators", &[]);
        let set: Vec<ValidatorUpdate> =
            serde_json::from_slice(&res.value.unwrap()).unwrap();
        set.into_iter()
            .find(|u| u.pub_key == key.pub_key)
            .map(|u| u.power)
    }

    fn balance(&self, key: &TestKey) -> Coins {
        self.chain
            .account(&key.address)
            .map(|a| a.coins().clone())
            .unwrap_or_default()
    }
}

fn update(key: &TestKey, power: u64) -> ValidatorUpdate {
    ValidatorUpdate {
        pub_key: key.pub_key.clone(),
        power,
    }
}

#[test]
fn test_genesis_validator_set() {
    let net = Net::new();
    assert_eq!(net.chain.genesis_validators, vec![update(&net.v1, 100)]);
    let v = net.chain.validator(&net.v1.address);
    // nothing is committed before the first block
    assert!(v.is_none());
}

#[test]
fn test_create_and_delegate() {
    let mut net = Net::new();
    let msg = Msg::CreateValidator(MsgCreateValidator {
        description: Description::new("second"),
        owner: net.v2.address,
        pub_key: net.v2.pub_key.clone(),
        self_delegation: Coin::new("steak", 50),
    });
    let tx = net.tx(msg, &net.v2);
    let (res, end) = net.chain.block(&[tx]);
    assert!(res[0].is_ok(), "{}", res[0].log);
    assert_eq!(end.validator_updates, vec![update(&net.v2, 50)]);
    assert_eq!(net.balance(&net.v2), steak(450));
    let v = net.chain.validator(&net.v2.address).unwrap();
    assert_eq!(v.status, BondStatus::Bonded);
    assert_eq!(v.bond_height, 1);

    // same key again
    let msg = Msg::CreateValidator(MsgCreateValidator {
        description: Description::new("copy"),
        owner: net.del.address,
        pub_key: net.v2.pub_key.clone(),
        self_delegation: Coin::new("steak", 1),
    });
    let tx = net.tx(msg, &net.del);
    let (res, _) = net.chain.block(&[tx]);
    assert_eq!(res[0].code, to_abci_code(CODESPACE_STAKE, 101));

    let delegate = |net: &Net, amount: u64, denom: &str| {
        net.tx(
            Msg::Delegate(MsgDelegate {
                delegator: net.del.address,
                validator: net.v2.address,
                bond: Coin::new(denom, amount),
            }),
            &net.del,
        )
    };
    let tx = delegate(&net, 100, "mycoin");
    let (res, _) = net.chain.block(&[tx]);
    assert_eq!(res[0].code, to_abci_code(CODESPACE_STAKE, 103));

    let tx = delegate(&net, 100, "steak");
    let (res, end) = net.chain.block(&[tx]);
    assert!(res[0].is_ok(), "{}", res[0].log);
    assert_eq!(end.validator_updates, vec![update(&net.v2, 150)]);
    assert_eq!(net.balance(&net.del), steak(900));
    assert_eq!(net.power_of(&net.v2), Some(150));
    assert_eq!(net.power_of(&net.v1), Some(100));
}

#[test]
fn test_unbonding_matures() {
    let mut net = Net::new();
    net.create_v2(50);
    let tx = net.tx(
        Msg::Delegate(MsgDelegate {
            delegator: net.del.address,
            validator: net.v2.address,
            bond: Coin::new("steak", 100),
        }),
        &net.del,
    );
    net.chain.block(&[tx]);

    let unbond = |net: &Net, shares: u64| {
        net.tx(
            Msg::BeginUnbonding(MsgBeginUnbonding {
                delegator: net.del.address,
                validator: net.v2.address,
                shares: Rat::new(shares, 1),
            }),
            &net.del,
        )
    };
    // more than delegated
    let tx = unbond(&net, 101);
    let (res, _) = net.chain.block(&[tx]);
    assert!(!res[0].is_ok());

    let tx = unbond(&net, 40);
    let (res, end) = net.chain.block(&[tx]);
    assert!(res[0].is_ok(), "{}", res[0].log);
    let end_time: u64 = rlp::decode(&res[0].data).unwrap();
    assert_eq!(end_time, net.chain.time() + UNBONDING_TIME);
    assert!(res[0].tags.iter().any(|t| t.key == "end-time"));
    assert_eq!(end.validator_updates, vec![update(&net.v2, 110)]);
    assert_eq!(net.balance(&net.del), steak(900));

    // one unbonding per pair at a time
    let tx = unbond(&net, 10);
    let (res, _) = net.chain.block(&[tx]);
    assert_eq!(
        res[0].code,
        to_abci_code(CODESPACE_STAKE, CODE_INVALID_DELEGATION)
    );

    net.chain.advance_time(UNBONDING_TIME);
    net.chain.block(&[]);
    assert_eq!(net.balance(&net.del), steak(940));

    // now possible again
    let tx = unbond(&net, 10);
    let (res, _) = net.chain.block(&[tx]);
    assert!(res[0].is_ok(), "{}", res[0].log);
}

#[test]
fn test_redelegation() {
    let mut net = Net::new();
    net.create_v2(50);
    let tx = net.tx(
        Msg::Delegate(MsgDelegate {
            delegator: net.del.address,
            validator: net.v1.address,
            bond: Coin::new("steak", 100),
        }),
        &net.del,
    );
    net.chain.block(&[tx]);

    let redelegate = |net: &Net, src: &Addr, dst: &Addr, shares: u64| {
        net.tx(
            Msg::BeginRedelegate(MsgBeginRedelegate {
                delegator: net.del.address,
                validator_src: *src,
                validator_dst: *dst,
                shares: Rat::new(shares, 1),
            }),
            &net.del,
        )
    };
    let (v1, v2) = (net.v1.address, net.v2.address);
    let tx = redelegate(&net, &v1, &v2, 60);
    let (res, end) = net.chain.block(&[tx]);
    assert!(res[0].is_ok(), "{}", res[0].log);
    let mut updates = end.validator_updates.clone();
    updates.sort_by_key(|u| u.power);
    assert_eq!(updates, vec![update(&net.v2, 110), update(&net.v1, 140)]);
    // the tokens never left the module
    assert_eq!(net.balance(&net.del), steak(900));

    // no onward hop while the first one is pending
    let tx = redelegate(&net, &v2, &v1, 10);
    let (res, _) = net.chain.block(&[tx]);
    assert_eq!(
        res[0].code,
        to_abci_code(CODESPACE_STAKE, CODE_INVALID_DELEGATION)
    );

    net.chain.advance_time(UNBONDING_TIME);
    net.chain.block(&[]);
    let tx = redelegate(&net, &v2, &v1, 10);
    let (res, _) = net.chain.block(&[tx]);
    assert!(res[0].is_ok(), "{}", res[0].log);
}

#[test]
fn test_downtime_and_unrevoke() {
    let mut net = Net::new();
    let absent = || {
        vec![SigningValidator {
            pub_key: TestKey::from_seed("validator-1").pub_key,
            power: 100,
            signed_last_block: false,
        }]
    };
    // the first full window is free
    for _ in 0..11 {
        net.chain.begin_block_with(absent(), Vec::new());
        let end = net.chain.end_block();
        assert!(end.validator_updates.is_empty());
    }
    net.chain.begin_block_with(absent(), Vec::new());
    let end = net.chain.end_block();
    assert_eq!(end.validator_updates, vec![update(&net.v1, 0)]);
    let v = net.chain.validator(&net.v1.address).unwrap();
    assert!(v.revoked);
    assert_eq!(v.status, BondStatus::Unbonding);
    assert_eq!(v.tokens, Amount::from(99));

    // revoked validators take no new delegations
    let tx = net.tx(
        Msg::Delegate(MsgDelegate {
            delegator: net.del.address,
            validator: net.v1.address,
            bond: Coin::new("steak", 10),
        }),
        &net.del,
    );
    let (res, _) = net.chain.block(&[tx]);
    assert_eq!(
        res[0].code,
        to_abci_code(CODESPACE_STAKE, CODE_VALIDATOR_REVOKED)
    );

    let unrevoke = |net: &Net| {
        net.tx(
            Msg::Unrevoke(MsgUnrevoke {
                address: net.v1.address,
            }),
            &net.v1,
        )
    };
    let tx = unrevoke(&net);
    let (res, _) = net.chain.block(&[tx]);
    assert_eq!(
        res[0].code,
        to_abci_code(CODESPACE_SLASHING, CODE_VALIDATOR_JAILED)
    );

    net.chain.advance_time(JAIL_TIME);
    let tx = unrevoke(&net);
    let (res, end) = net.chain.block(&[tx]);
    assert!(res[0].is_ok(), "{}", res[0].log);
    assert_eq!(end.validator_updates, vec![update(&net.v1, 99)]);

    let tx = unrevoke(&net);
    let (res, _) = net.chain.block(&[tx]);
    assert_eq!(
        res[0].code,
        to_abci_code(CODESPACE_SLASHING, CODE_VALIDATOR_NOT_REVOKED)
    );
}

#[test]
fn test_double_sign_evidence() {
    let mut net = Net::new();
    net.chain.block(&[]);
    net.chain.block(&[]);
    let evidence = Evidence {
        kind: EvidenceKind::DuplicateVote,
        pub_key: net.v1.pub_key.clone(),
        power: 100,
        height: 1,
        time: net.chain.time(),
    };
    let other = Evidence {
        kind: EvidenceKind::Other("light-client-attack".into()),
        ..evidence.clone()
    };
    net.chain.begin_block_with(Vec::new(), vec![other, evidence]);
    let end = net.chain.end_block();
    assert_eq!(end.validator_updates, vec![update(&net.v1, 0)]);
    let v = net.chain.validator(&net.v1.address).unwrap();
    assert!(v.revoked);
    assert_eq!(v.tokens, Amount::from(95));
}

#[test]
fn test_power_rank_total_order() {
    // distinct (revoked, power, height, counter) tuples from a small LCG
    let mut seed: u64 = 7;
    let mut next = || {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        seed >> 33
    };
    let mut tuples = Vec::new();
    for i in 0..200u64 {
        let t = (next() % 2 == 0, next() % 50, next() % 20, (next() % 5) as u16);
        if !tuples.iter().any(|(u, _)| *u == t) {
            tuples.push((t, Addr::from([i as u8; 20])));
        }
    }
    let mut keys: Vec<Vec<u8>> = tuples
        .iter()
        .map(|((revoked, power, height, counter), owner)| {
            power_rank_key_of(*revoked, &Amount::from(*power), *height, *counter, owner)
        })
        .collect();
    keys.sort();
    for w in keys.windows(2) {
        assert!(w[0] < w[1]);
    }
    let mut again = keys.clone();
    again.reverse();
    again.sort();
    assert_eq!(again, keys);

    // non-revoked first, then by power descending, then by earlier bond
    let key = |revoked, power: u64, height, counter| {
        power_rank_key_of(revoked, &Amount::from(power), height, counter, &Addr::from([1; 20]))
    };
    assert!(key(false, 1, 0, 0) < key(true, 100, 0, 0));
    assert!(key(false, 100, 0, 0) < key(false, 99, 0, 0));
    assert!(key(false, 10, 1, 0) < key(false, 10, 2, 0));
    assert!(key(false, 10, 1, 0) < key(false, 10, 1, 1));
}
