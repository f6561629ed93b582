use serde::Deserialize;
use serde_json::Value;

use crate::coin::Coin;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::params::StakeParams;
use crate::router::{Handler, HandlerResult, InitGenesis, Tag};
use crate::stake::keeper::*;
use crate::stake::msgs::*;
use crate::stake::types::{Delegation, Pool, Validator};
use crate::store::MultiStore;
use crate::tx::Msg;

pub fn new_handler() -> Handler {
    Box::new(|ctx: &Context, store: &mut dyn MultiStore, msg: &Msg| {
        match msg {
            Msg::CreateValidator(m) => handle_create_validator(ctx, store, m),
            Msg::EditValidator(m) => handle_edit_validator(ctx, store, m),
            Msg::Delegate(m) => handle_delegate(ctx, store, m),
            Msg::BeginUnbonding(m) => handle_begin_unbonding(ctx, store, m),
            Msg::BeginRedelegate(m) => handle_begin_redelegate(ctx, store, m),
            _ => Err(Error::UnknownRequest(format!(
                "unrecognized stake msg type {}",
                msg.type_tag()
            ))),
        }
    })
}

fn check_denom(store: &dyn MultiStore, bond: &Coin) -> Result<()> {
    let denom = get_params(store).bond_denom;
    if bond.denom != denom {
        return Err(stake_err(
            CODE_INVALID_INPUT,
            format!("invalid coin denomination {}, want {}", bond.denom, denom),
        ))
    }
    Ok(())
}

fn handle_create_validator(
    ctx: &Context, store: &mut dyn MultiStore, msg: &MsgCreateValidator,
) -> Result<HandlerResult> {
    if get_validator(store, &msg.owner).is_some() {
        return Err(stake_err(
            CODE_INVALID_VALIDATOR,
            "validator already exist for this owner-address, must use new validator-owner address".into(),
        ))
    }
    if get_validator_by_pubkey(store, &msg.pub_key).is_some() {
        return Err(stake_err(
            CODE_INVALID_VALIDATOR,
            "validator already exist for this pubkey, must use new validator pubkey".into(),
        ))
    }
    check_denom(store, &msg.self_delegation)?;

    let mut v = Validator::new(
        msg.owner,
        msg.pub_key.clone(),
        msg.description.clone(),
    );
    v.bond_height = ctx.block_height();
    v.bond_intra_tx_counter = next_intra_tx_counter(store);
    delegate(ctx, store, &msg.owner, &msg.self_delegation, v, true)?;

    ctx.logger().info(format_args!(
        "validator {} created with {}",
        msg.owner, msg.self_delegation
    ));
    Ok(HandlerResult::with_tags(vec![
        Tag::new("action", "create_validator"),
        Tag::new("validator", &msg.owner),
        Tag::new("moniker", &msg.description.moniker),
    ]))
}

fn handle_edit_validator(
    ctx: &Context, store: &mut dyn MultiStore, msg: &MsgEditValidator,
) -> Result<HandlerResult> {
    let mut v = get_validator(store, &msg.owner).ok_or_else(|| {
        stake_err(
            CODE_INVALID_VALIDATOR,
            "validator does not exist for that address".into(),
        )
    })?;
    v.description = msg.description.clone();
    update_validator(store, &v);
    ctx.logger().debug(format_args!("validator {} edited", msg.owner));
    Ok(HandlerResult::with_tags(vec![
        Tag::new("action", "edit_validator"),
        Tag::new("validator", &msg.owner),
        Tag::new("moniker", &msg.description.moniker),
    ]))
}

fn handle_delegate(
    ctx: &Context, store: &mut dyn MultiStore, msg: &MsgDelegate,
) -> Result<HandlerResult> {
    let v = get_validator(store, &msg.validator).ok_or_else(|| {
        stake_err(
            CODE_INVALID_VALIDATOR,
            "validator does not exist for that address".into(),
        )
    })?;
    check_denom(store, &msg.bond)?;
    if v.revoked {
        return Err(stake_err(
            CODE_VALIDATOR_REVOKED,
            "validator for this address is currently revoked".into(),
        ))
    }
    let shares = delegate(ctx, store, &msg.delegator, &msg.bond, v, true)?;
    ctx.logger().debug(format_args!(
        "{} delegated {} to {} for {} shares",
        msg.delegator, msg.bond, msg.validator, shares
    ));
    Ok(HandlerResult::with_tags(vec![
        Tag::new("action", "delegate"),
        Tag::new("delegator", &msg.delegator),
        Tag::new("validator", &msg.validator),
    ]))
}

fn handle_begin_unbonding(
    ctx: &Context, store: &mut dyn MultiStore, msg: &MsgBeginUnbonding,
) -> Result<HandlerResult> {
    let ubd =
        begin_unbonding(ctx, store, &msg.delegator, &msg.validator, &msg.shares)?;
    let mut res = HandlerResult::with_tags(vec![
        Tag::new("action", "begin_unbonding"),
        Tag::new("delegator", &msg.delegator),
        Tag::new("validator", &msg.validator),
        Tag::new("end-time", ubd.min_time),
    ]);
    res.data = rlp::encode(&ubd.min_time).to_vec();
    Ok(res)
}

fn handle_begin_redelegate(
    ctx: &Context, store: &mut dyn MultiStore, msg: &MsgBeginRedelegate,
) -> Result<HandlerResult> {
    let red = begin_redelegation(
        ctx,
        store,
        &msg.delegator,
        &msg.validator_src,
        &msg.validator_dst,
        &msg.shares,
    )?;
    let mut res = HandlerResult::with_tags(vec![
        Tag::new("action", "begin_redelegate"),
        Tag::new("delegator", &msg.delegator),
        Tag::new("source-validator", &msg.validator_src),
        Tag::new("destination-validator", &msg.validator_dst),
        Tag::new("end-time", red.min_time),
    ]);
    res.data = rlp::encode(&red.min_time).to_vec();
    Ok(res)
}

#[derive(Deserialize)]
struct GenesisState {
    #[serde(default)]
    params: StakeParams,
    #[serde(default)]
    pool: Option<Pool>,
    #[serde(default)]
    validators: Vec<Validator>,
    #[serde(default)]
    delegations: Vec<Delegation>,
}

/// Load `{params, pool?, validators?, delegations?}`. Without an explicit pool, one is derived
/// from the validators' tokens.
pub fn init_genesis(
    ctx: &Context, store: &mut dyn MultiStore, data: &Value,
) -> Result<()> {
    let state: GenesisState = serde_json::from_value(data.clone())
        .map_err(|e| Error::GenesisParse(format!("stake: {}", e)))?;
    let params = state.params;
    if params.max_validators == 0 || params.bond_denom.is_empty() {
        return Err(Error::GenesisParse(format!(
            "stake: invalid params {:?}",
            params
        )))
    }
    set_params(store, &params);

    let mut pool = Pool::default();
    for v in &state.validators {
        if get_validator(store, &v.owner).is_some() ||
            get_validator_by_pubkey(store, &v.pub_key).is_some()
        {
            return Err(Error::GenesisParse(format!(
                "stake: validator {} listed twice",
                v.owner
            )))
        }
        pool.add(v.status, &v.tokens).ok_or_else(|| {
            Error::GenesisParse("stake: validator tokens overflow".into())
        })?;
        update_validator(store, v);
    }
    for d in &state.delegations {
        if get_validator(store, &d.validator).is_none() {
            return Err(Error::GenesisParse(format!(
                "stake: delegation to unknown validator {}",
                d.validator
            )))
        }
        set_delegation(store, d);
    }
    set_pool(store, &state.pool.unwrap_or(pool));
    ctx.logger().info(format_args!(
        "stake genesis loaded: {} validator(s)",
        state.validators.len()
    ));
    Ok(())
}

pub fn genesis_initializer() -> InitGenesis {
    Box::new(init_genesis)
}
