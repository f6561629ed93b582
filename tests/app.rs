use serde_json::json;

use qsdk::app::{BaseApp, RequestInitChain, RequestQuery};
use qsdk::auth::account::Account;
use qsdk::auth::mapper::account_key;
use qsdk::bank::msgs::CODE_NOT_ISSUER;
use qsdk::bank::{Input, MsgIssue, MsgSend, Output};
use qsdk::coin::Coins;
use qsdk::context::Context;
use qsdk::error::*;
use qsdk::params::{AppConfig, STORE_ACC};
use qsdk::router::{Handler, HandlerResult};
use qsdk::store::MultiStore;
use qsdk::tx::Msg;
use qsdk_tools::*;

const CHAIN: &str = "test-chain";

fn mycoin(n: u64) -> Coins {
    Coins::single("mycoin", n)
}

fn balance(chain: &TestChain, key: &TestKey) -> Coins {
    chain
        .account(&key.address)
        .map(|a| a.coins().clone())
        .unwrap_or_default()
}

fn two_accounts(a_coins: u64) -> (TestChain, TestKey, TestKey) {
    init_logger();
    let a = TestKey::from_seed("a");
    let b = TestKey::from_seed("b");
    let genesis = GenesisBuilder::new()
        .account_with_sequence(&a.address, mycoin(a_coins), 1)
        .account(&b.address, mycoin(7))
        .build();
    (TestChain::new(CHAIN, genesis, 1_000), a, b)
}

#[test]
fn test_send() {
    let (mut chain, a, b) = two_accounts(7);
    let tx = TxBuilder::new(CHAIN, send_msg(&a.address, &b.address, mycoin(5)))
        .sign_encoded(&[(&a, 1)]);
    let (res, _) = chain.block(&[tx]);
    assert!(res[0].is_ok(), "{}", res[0].log);
    assert!(res[0].tags.iter().any(|t| t.key == "action" && t.value == "send"));
    assert_eq!(balance(&chain, &a), mycoin(2));
    assert_eq!(balance(&chain, &b), mycoin(12));
    assert_eq!(chain.sequence(&a.address), 2);
}

#[test]
fn test_send_insufficient() {
    let (mut chain, a, b) = two_accounts(2);
    let tx = TxBuilder::new(CHAIN, send_msg(&a.address, &b.address, mycoin(5)))
        .sign_encoded(&[(&a, 1)]);
    let code = Error::InsufficientCoins(String::new()).abci_code();

    let res = chain.check(&tx);
    assert_eq!(res.code, code, "{}", res.log);
    let (res, _) = chain.block(&[tx]);
    assert_eq!(res[0].code, code, "{}", res[0].log);

    assert_eq!(balance(&chain, &a), mycoin(2));
    assert_eq!(balance(&chain, &b), mycoin(7));
    // the handler failed, the sequence bump stays
    assert_eq!(chain.sequence(&a.address), 2);
}

#[test]
fn test_send_with_fee() {
    let (mut chain, a, b) = two_accounts(7);
    // input 5 = output 4 + fee 1
    let msg = send_msg_with_fee(&a.address, &b.address, mycoin(4), &mycoin(1));
    let tx = TxBuilder::new(CHAIN, msg).fee(mycoin(1), 0).sign_encoded(&[(&a, 1)]);
    let (res, _) = chain.block(&[tx]);
    assert!(res[0].is_ok(), "{}", res[0].log);
    assert_eq!(balance(&chain, &a), mycoin(2));
    assert_eq!(balance(&chain, &b), mycoin(11));
    assert_eq!(chain.fee_pool(), mycoin(1));

    // fee plus transfer beyond the balance is refused up front
    let msg = send_msg_with_fee(&a.address, &b.address, mycoin(2), &mycoin(1));
    let tx = TxBuilder::new(CHAIN, msg).fee(mycoin(1), 0).sign_encoded(&[(&a, 2)]);
    let (res, _) = chain.block(&[tx]);
    assert_eq!(
        res[0].code,
        Error::InsufficientFunds(String::new()).abci_code()
    );
    assert_eq!(balance(&chain, &a), mycoin(2));
    assert_eq!(chain.sequence(&a.address), 2);
    assert_eq!(chain.fee_pool(), mycoin(1));
}

#[test]
fn test_send_fee_must_balance() {
    let (mut chain, a, b) = two_accounts(7);
    chain.block(&[]);
    let invalid = Error::InvalidCoins(String::new()).abci_code();
    let five_to_four = || {
        Msg::Send(MsgSend::new(
            vec![Input::new(a.address, mycoin(5))],
            vec![Output::new(b.address, mycoin(4))],
        ))
    };

    // no fee declared, so one coin is unaccounted for
    let tx = TxBuilder::new(CHAIN, five_to_four()).sign_encoded(&[(&a, 1)]);
    assert_eq!(chain.check(&tx).code, invalid);

    // the declared fee overshoots the difference
    let tx = TxBuilder::new(CHAIN, five_to_four())
        .fee(mycoin(2), 0)
        .sign_encoded(&[(&a, 1)]);
    assert_eq!(chain.check(&tx).code, invalid);

    // fee in another denom than the gap
    let tx = TxBuilder::new(CHAIN, five_to_four())
        .fee(Coins::single("othercoin", 1), 0)
        .sign_encoded(&[(&a, 1)]);
    assert_eq!(chain.check(&tx).code, invalid);
    assert_eq!(chain.sequence(&a.address), 1);

    let tx = TxBuilder::new(CHAIN, five_to_four())
        .fee(mycoin(1), 0)
        .sign_encoded(&[(&a, 1)]);
    assert!(chain.check(&tx).is_ok());
    let (res, _) = chain.block(&[tx]);
    assert!(res[0].is_ok(), "{}", res[0].log);
    assert_eq!(balance(&chain, &a), mycoin(2));
    assert_eq!(balance(&chain, &b), mycoin(11));
    assert_eq!(chain.fee_pool(), mycoin(1));
}

#[test]
fn test_bad_route_name() {
    let mut app = BaseApp::new(AppConfig::default()).unwrap();
    let nop: fn() -> Handler = || {
        Box::new(|_: &Context, _: &mut dyn MultiStore, _: &Msg| {
            Ok(HandlerResult::default())
        })
    };
    for name in ["bank2", "my-route", "a/b"] {
        assert!(matches!(
            app.add_route(name, nop(), None),
            Err(Error::Configuration(_))
        ));
    }
    // already mounted
    assert!(matches!(
        app.add_route("bank", nop(), None),
        Err(Error::Configuration(_))
    ));
    assert!(app.add_route("custom", nop(), None).is_ok());
}

#[test]
fn test_sequence_monotonic() {
    let (mut chain, a, b) = two_accounts(7);
    for seq in [0, 2, 7] {
        let tx = TxBuilder::new(CHAIN, send_msg(&a.address, &b.address, mycoin(1)))
            .sign_encoded(&[(&a, seq)]);
        let res = chain.check(&tx);
        assert_eq!(
            res.code,
            Error::InvalidSequence(String::new()).abci_code(),
            "sequence {}",
            seq
        );
    }
    let (res, _) = chain.block(&[]);
    assert!(res.is_empty());
    assert_eq!(chain.sequence(&a.address), 1);

    // the same sequence twice in one block: the second is a replay
    let tx = TxBuilder::new(CHAIN, send_msg(&a.address, &b.address, mycoin(1)))
        .sign_encoded(&[(&a, 1)]);
    let (res, _) = chain.block(&[tx.clone(), tx]);
    assert!(res[0].is_ok());
    assert_eq!(
        res[1].code,
        Error::InvalidSequence(String::new()).abci_code()
    );
    assert_eq!(chain.sequence(&a.address), 2);
    assert_eq!(balance(&chain, &a), mycoin(6));
}

#[test]
fn test_check_state_is_ephemeral() {
    let (mut chain, a, b) = two_accounts(7);
    let tx = TxBuilder::new(CHAIN, send_msg(&a.address, &b.address, mycoin(5)))
        .sign_encoded(&[(&a, 1)]);
    assert!(chain.check(&tx).is_ok());
    // the check state already spent the coins
    let again = TxBuilder::new(CHAIN, send_msg(&a.address, &b.address, mycoin(5)))
        .sign_encoded(&[(&a, 2)]);
    assert!(!chain.check(&again).is_ok());
    // nothing reached the committed state
    chain.block(&[]);
    assert_eq!(balance(&chain, &a), mycoin(7));
    // and the check state was reset by the commit
    assert!(chain.check(&tx).is_ok());
}

#[test]
fn test_rejections() {
    let (mut chain, a, b) = two_accounts(7);
    let c = TestKey::from_seed("c");
    chain.block(&[]);

    let wrong_chain = TxBuilder::new("other", send_msg(&a.address, &b.address, mycoin(1)))
        .sign_encoded(&[(&a, 1)]);
    assert_eq!(
        chain.check(&wrong_chain).code,
        Error::Unauthorized(String::new()).abci_code()
    );

    let expired = TxBuilder::new(CHAIN, send_msg(&a.address, &b.address, mycoin(1)))
        .expires_at(1)
        .sign_encoded(&[(&a, 1)]);
    chain.block(&[]);
    chain.begin_block();
    assert_eq!(
        chain.deliver(&expired).code,
        Error::Unauthorized(String::new()).abci_code()
    );
    chain.end_block();

    // signed by someone else
    let forged = TxBuilder::new(CHAIN, send_msg(&a.address, &b.address, mycoin(1)))
        .sign_encoded(&[(&b, 1)]);
    assert_eq!(
        chain.check(&forged).code,
        Error::InvalidPubKey(String::new()).abci_code()
    );

    let unknown = TxBuilder::new(CHAIN, send_msg(&c.address, &b.address, mycoin(1)))
        .sign_encoded(&[(&c, 0)]);
    assert_eq!(
        chain.check(&unknown).code,
        Error::UnknownAddress(String::new()).abci_code()
    );

    assert_eq!(
        chain.check(b"garbage").code,
        Error::TxDecode(String::new()).abci_code()
    );

    // without a fee, inputs must match outputs exactly
    let unbalanced = Msg::Send(MsgSend::new(
        vec![Input::new(a.address, mycoin(2))],
        vec![Output::new(b.address, mycoin(1))],
    ));
    let tx = TxBuilder::new(CHAIN, unbalanced).sign_encoded(&[(&a, 1)]);
    assert_eq!(
        chain.check(&tx).code,
        Error::InvalidCoins(String::new()).abci_code()
    );
    assert_eq!(chain.sequence(&a.address), 1);
}

#[test]
fn test_out_of_gas() {
    let (mut chain, a, b) = two_accounts(7);
    let msg = send_msg_with_fee(&a.address, &b.address, mycoin(1), &mycoin(1));
    let tx = TxBuilder::new(CHAIN, msg).fee(mycoin(1), 1).sign_encoded(&[(&a, 1)]);
    let (res, _) = chain.block(&[tx]);
    assert_eq!(res[0].code, Error::OutOfGas(String::new()).abci_code());
    assert_eq!(res[0].gas_wanted, 1);
    assert!(res[0].gas_used > 1);
    // the fee is kept, the transfer is not
    assert_eq!(balance(&chain, &a), mycoin(6));
    assert_eq!(balance(&chain, &b), mycoin(7));

    let msg = send_msg_with_fee(&a.address, &b.address, mycoin(1), &mycoin(1));
    let tx = TxBuilder::new(CHAIN, msg)
        .fee(mycoin(1), 100_000)
        .sign_encoded(&[(&a, 2)]);
    let (res, _) = chain.block(&[tx]);
    assert!(res[0].is_ok(), "{}", res[0].log);
    assert!(res[0].gas_used > 0 && res[0].gas_used <= 100_000);
}

#[test]
fn test_issue() {
    init_logger();
    let issuer = TestKey::from_seed("issuer");
    let a = TestKey::from_seed("a");
    let genesis = GenesisBuilder::new()
        .account(&issuer.address, Coins::empty())
        .account(&a.address, Coins::empty())
        .issuer(&issuer.address)
        .build();
    let mut chain = TestChain::new(CHAIN, genesis, 0);
    let issue = |by: &TestKey, seq: u64| {
        TxBuilder::new(
            CHAIN,
            Msg::Issue(MsgIssue {
                issuer: by.address,
                outputs: vec![Output::new(a.address, mycoin(10))],
            }),
        )
        .sign_encoded(&[(by, seq)])
    };
    let (res, _) = chain.block(&[issue(&issuer, 0), issue(&a, 0)]);
    assert!(res[0].is_ok(), "{}", res[0].log);
    assert_eq!(res[1].code, to_abci_code(CODESPACE_BANK, CODE_NOT_ISSUER));
    assert_eq!(balance(&chain, &a), mycoin(10));
}

#[test]
fn test_genesis_missing_module() {
    init_logger();
    let a = TestKey::from_seed("a");
    let mut app = BaseApp::new(AppConfig::default()).unwrap();
    let mut state = GenesisBuilder::new().account(&a.address, mycoin(7)).build();
    state.as_object_mut().unwrap().remove("slashing");
    let err = app
        .init_chain(RequestInitChain {
            time: 0,
            chain_id: Some(CHAIN.into()),
            app_state: state,
        })
        .unwrap_err();
    match err {
        Error::GenesisParse(msg) => assert!(msg.contains("slashing"), "{}", msg),
        e => panic!("unexpected {:?}", e),
    }
    // bank ran first but nothing was kept
    app.commit();
    let res = app.query(&RequestQuery {
        path: format!("/app/account/{}", a.address),
        ..Default::default()
    });
    assert_eq!(res.code, Error::UnknownAddress(String::new()).abci_code());

    let err = app
        .init_chain(RequestInitChain {
            app_state: json!([1, 2]),
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, Error::GenesisParse(_)));
}

#[test]
fn test_set_option() {
    init_logger();
    let a = TestKey::from_seed("a");
    let b = TestKey::from_seed("b");
    let mut app = BaseApp::new(AppConfig::default()).unwrap();
    let res = app.set_option("base/chain_id", CHAIN);
    assert_eq!(res.log, "Success");
    assert_eq!(app.chain_id(), Some(CHAIN));

    let acc = json!({
        "pub_key": a.pub_key,
        "coins": [{"denom": "zcoin", "amount": "3"}, {"denom": "mycoin", "amount": "7"}],
    });
    let res = app.set_option("acc/account", &acc.to_string());
    assert_eq!(res.code, 0, "{}", res.log);
    let acc = json!({"address": b.address, "coins": []});
    assert_eq!(app.set_option("coin/account", &acc.to_string()).code, 0);

    let res = app.set_option("base/unknown", "x");
    assert_eq!(res.code, Error::UnknownRequest(String::new()).abci_code());
    let res = app.set_option("acc/account", "{}");
    assert_eq!(res.code, Error::InvalidAddress(String::new()).abci_code());

    // accounts are visible to CheckTx right away
    let tx = TxBuilder::new(CHAIN, send_msg(&a.address, &b.address, mycoin(5)))
        .sign_encoded(&[(&a, 0)]);
    assert!(app.check_tx(&tx).is_ok());

    app.commit();
    let res = app.query(&RequestQuery {
        path: format!("/app/account/{}", a.address),
        ..Default::default()
    });
    assert!(res.is_ok(), "{}", res.log);
    let stored: qsdk::auth::AppAccount =
        serde_json::from_slice(&res.value.unwrap()).unwrap();
    // sorted on load
    assert_eq!(stored.coins().iter().next().unwrap().denom, "mycoin");
    assert_eq!(stored.pub_key(), Some(&a.pub_key));
}

#[test]
fn test_store_query_with_proof() {
    let (mut chain, a, b) = two_accounts(7);
    let tx = TxBuilder::new(CHAIN, send_msg(&a.address, &b.address, mycoin(5)))
        .sign_encoded(&[(&a, 1)]);
    chain.block(&[tx]);
    let app_hash = chain.app.last_commit_id().hash;

    let key = account_key(&b.address);
    let res = chain.query(&format!("/store/{}/key", STORE_ACC), &key);
    assert!(res.is_ok(), "{}", res.log);
    let value = res.value.unwrap();
    let proof = res.proof.unwrap();
    assert!(proof.verify(&key, &value, &app_hash));
    assert!(!proof.verify(&key, b"forged", &app_hash));

    let res = chain.query("/store/nope/key", &key);
    assert_eq!(res.code, Error::UnknownRequest(String::new()).abci_code());
    let res = chain.query("/app/whatever", &[]);
    assert_eq!(res.code, Error::UnknownRequest(String::new()).abci_code());

    // older versions stay readable
    let res = chain.app.query(&RequestQuery {
        path: format!("/app/account/{}", b.address),
        height: 1,
        ..Default::default()
    });
    assert!(res.is_ok());
    assert_eq!(res.height, 1);
}
