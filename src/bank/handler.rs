use serde::Deserialize;
use serde_json::Value;

use crate::auth::account::{Account, AppAccount};
use crate::auth::mapper::{get_account, set_account};
use crate::bank::keeper::{
    add_coins, add_issuer, input_output_coins, is_issuer,
};
use crate::bank::msgs::{Input, MsgIssue, MsgSend, CODE_NOT_ISSUER};
use crate::coin::Coins;
use crate::common::Addr;
use crate::context::Context;
use crate::error::{Error, Result, CODESPACE_BANK};
use crate::router::{Handler, HandlerResult, InitGenesis, Tag};
use crate::store::MultiStore;
use crate::tx::Msg;

pub fn new_handler() -> Handler {
    Box::new(|ctx: &Context, store: &mut dyn MultiStore, msg: &Msg| {
        match msg {
            Msg::Send(m) => handle_send(ctx, store, m),
            Msg::Issue(m) => handle_issue(ctx, store, m),
            _ => Err(Error::UnknownRequest(format!(
                "unrecognized bank msg type {}",
                msg.type_tag()
            ))),
        }
    })
}

fn handle_send(
    ctx: &Context, store: &mut dyn MultiStore, msg: &MsgSend,
) -> Result<HandlerResult> {
    let inputs = net_of_fee(&msg.inputs, ctx.fee())?;
    let mut tags = input_output_coins(store, &inputs, &msg.outputs)?;
    tags.push(Tag::new("action", "send"));
    ctx.logger().debug(format_args!(
        "send: {} input(s) to {} output(s)",
        msg.inputs.len(),
        msg.outputs.len()
    ));
    Ok(HandlerResult::with_tags(tags))
}

/// `inputs` without the fee the ante stage already took from the first one.
fn net_of_fee(inputs: &[Input], fee: &Coins) -> Result<Vec<Input>> {
    let mut net = inputs.to_vec();
    if let Some(first) = net.first_mut() {
        first.coins = first.coins.minus(fee).ok_or_else(|| {
            Error::InvalidCoins(format!(
                "fee {} exceeds input {}",
                fee, first.coins
            ))
        })?;
    }
    net.retain(|i| !i.coins.is_empty());
    Ok(net)
}

fn handle_issue(
    ctx: &Context, store: &mut dyn MultiStore, msg: &MsgIssue,
) -> Result<HandlerResult> {
    if !is_issuer(store, &msg.issuer) {
        return Err(Error::module(
            CODESPACE_BANK,
            CODE_NOT_ISSUER,
            format!("{} is not an issuer", msg.issuer),
        ))
    }
    let mut tags =
        vec![Tag::new("action", "issue"), Tag::new("issuer", &msg.issuer)];
    for o in &msg.outputs {
        add_coins(store, &o.address, &o.coins)?;
        tags.push(Tag::new("recipient", &o.address));
    }
    ctx.logger().info(format_args!(
        "{} issued to {} output(s)",
        msg.issuer,
        msg.outputs.len()
    ));
    Ok(HandlerResult::with_tags(tags))
}

#[derive(Deserialize)]
struct GenesisState {
    #[serde(default)]
    accounts: Vec<AppAccount>,
    #[serde(default)]
    issuers: Vec<Addr>,
}

pub fn init_genesis(
    ctx: &Context, store: &mut dyn MultiStore, data: &Value,
) -> Result<()> {
    let state: GenesisState = serde_json::from_value(data.clone())
        .map_err(|e| Error::GenesisParse(format!("bank: {}", e)))?;
    for acc in state.accounts {
        if !acc.coins().is_valid() {
            return Err(Error::InvalidCoins(format!(
                "genesis account {} holds {}",
                acc.address(),
                acc.coins()
            )))
        }
        if get_account(store, acc.address()).is_some() {
            return Err(Error::GenesisParse(format!(
                "account {} listed twice",
                acc.address()
            )))
        }
        set_account(store, &acc);
    }
    for i in &state.issuers {
        add_issuer(store, i);
    }
    ctx.logger().info(format_args!("bank genesis loaded"));
    Ok(())
}

pub fn genesis_initializer() -> InitGenesis {
    Box::new(init_genesis)
}
