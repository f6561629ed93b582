//! Stake state over the `stake` store: validators and their power index, delegations, pending
//! unbondings and redelegations, and the module's token pool.
//!
//! Every change to a validator goes through [update_validator], which moves the validator's
//! power-index entry along with the record.

use std::collections::{BTreeMap, BTreeSet};

use rlp_derive::{RlpDecodable, RlpEncodable};

use crate::bank::keeper::{add_coins, subtract_coins};
use crate::codec::{decode_stored, load, save};
use crate::coin::{Coin, Coins};
use crate::common::{Addr, Amount};
use crate::context::Context;
use crate::crypto::PubKey;
use crate::error::{Error, Result};
use crate::params::{StakeParams, STORE_STAKE};
use crate::rat::Rat;
use crate::stake::keys::*;
use crate::stake::msgs::{
    stake_err, CODE_INVALID_DELEGATION, CODE_INVALID_VALIDATOR,
    CODE_VALIDATOR_REVOKED,
};
use crate::stake::types::{
    BondStatus, Delegation, Pool, Redelegation, UnbondingDelegation, Validator,
    ValidatorUpdate,
};
use crate::store::MultiStore;

fn get<T: rlp::Decodable>(store: &dyn MultiStore, key: &[u8]) -> Option<T> {
    load(&*store.reader(STORE_STAKE), key)
}

fn put<T: rlp::Encodable>(store: &mut dyn MultiStore, key: &[u8], v: &T) {
    save(&mut *store.writer(STORE_STAKE), key, v)
}

fn remove(store: &mut dyn MultiStore, key: &[u8]) {
    store.writer(STORE_STAKE).delete(key)
}

fn scan<T: rlp::Decodable>(store: &dyn MultiStore, prefix: &[u8]) -> Vec<T> {
    store
        .reader(STORE_STAKE)
        .iter_prefix(prefix)
        .into_iter()
        .map(|(k, v)| decode_stored(&k, &v))
        .collect()
}

fn scan_keys(store: &dyn MultiStore, prefix: &[u8]) -> Vec<Vec<u8>> {
    store
        .reader(STORE_STAKE)
        .iter_prefix(prefix)
        .into_iter()
        .map(|(k, _)| k)
        .collect()
}

fn pool_broken(what: &str) -> Error {
    Error::Internal(format!("stake pool {} out of range", what))
}

// params and pool

pub fn get_params(store: &dyn MultiStore) -> StakeParams {
    get(store, PARAMS_KEY).unwrap_or_default()
}

pub fn set_params(store: &mut dyn MultiStore, params: &StakeParams) {
    put(store, PARAMS_KEY, params)
}

pub fn get_pool(store: &dyn MultiStore) -> Pool {
    get(store, POOL_KEY).unwrap_or_default()
}

pub fn set_pool(store: &mut dyn MultiStore, pool: &Pool) {
    put(store, POOL_KEY, pool)
}

fn pool_add(
    store: &mut dyn MultiStore, status: BondStatus, amount: &Amount,
) -> Result<()> {
    let mut pool = get_pool(store);
    pool.add(status, amount).ok_or_else(|| pool_broken("credit"))?;
    set_pool(store, &pool);
    Ok(())
}

fn pool_sub(
    store: &mut dyn MultiStore, status: BondStatus, amount: &Amount,
) -> Result<()> {
    let mut pool = get_pool(store);
    pool.sub(status, amount).ok_or_else(|| pool_broken("debit"))?;
    set_pool(store, &pool);
    Ok(())
}

fn pool_unbonding(
    store: &mut dyn MultiStore, add: Option<&Amount>, sub: Option<&Amount>,
) -> Result<()> {
    let mut pool = get_pool(store);
    if let Some(a) = add {
        pool.unbonding_tokens = pool
            .unbonding_tokens
            .checked_add(a)
            .ok_or_else(|| pool_broken("unbonding credit"))?;
    }
    if let Some(s) = sub {
        pool.unbonding_tokens = pool
            .unbonding_tokens
            .checked_sub(s)
            .ok_or_else(|| pool_broken("unbonding debit"))?;
    }
    set_pool(store, &pool);
    Ok(())
}

// validators

pub fn get_validator(store: &dyn MultiStore, owner: &Addr) -> Option<Validator> {
    get(store, &validator_key(owner))
}

pub fn get_validator_by_pubkey(
    store: &dyn MultiStore, pk: &PubKey,
) -> Option<Validator> {
    let raw = store.reader(STORE_STAKE).get(&validator_by_pubkey_key(pk))?;
    get_validator(store, &Addr::try_from_slice(&raw)?)
}

/// All validators in owner order.
pub fn validators(store: &dyn MultiStore) -> Vec<Validator> {
    scan(store, VALIDATORS_KEY)
}

/// Validators in power-index order.
pub fn validators_by_power(store: &dyn MultiStore) -> Vec<Validator> {
    scan_keys(store, VALIDATORS_BY_POWER_KEY)
        .iter()
        .filter_map(|k| owner_of_power_key(k))
        .filter_map(|owner| get_validator(store, &owner))
        .collect()
}

/// Persist `v` and re-derive its power-index entry from its current fields.
pub fn update_validator(store: &mut dyn MultiStore, v: &Validator) {
    if let Some(old) = get_validator(store, &v.owner) {
        remove(store, &power_rank_key(&old));
    }
    let mut w = store.writer(STORE_STAKE);
    w.set(&power_rank_key(v), v.owner.as_bytes().to_vec());
    w.set(&validator_by_pubkey_key(&v.pub_key), v.owner.as_bytes().to_vec());
    save(&mut *w, &validator_key(&v.owner), v);
}

pub fn remove_validator(store: &mut dyn MultiStore, owner: &Addr) {
    if let Some(v) = get_validator(store, owner) {
        let mut w = store.writer(STORE_STAKE);
        w.delete(&power_rank_key(&v));
        w.delete(&validator_by_pubkey_key(&v.pub_key));
        w.delete(&validator_key(owner));
    }
}

/// Hand out the next intra-block creation counter.
pub fn next_intra_tx_counter(store: &mut dyn MultiStore) -> u16 {
    let c: u16 = get(store, INTRA_TX_COUNTER_KEY).unwrap_or(0);
    put(store, INTRA_TX_COUNTER_KEY, &c.saturating_add(1));
    c
}

pub fn reset_intra_tx_counter(store: &mut dyn MultiStore) {
    put(store, INTRA_TX_COUNTER_KEY, &0u16)
}

pub fn set_revoked(
    ctx: &Context, store: &mut dyn MultiStore, pk: &PubKey, revoked: bool,
) -> Result<()> {
    let mut v = get_validator_by_pubkey(store, pk).ok_or_else(|| {
        stake_err(
            CODE_INVALID_VALIDATOR,
            format!("no validator with pubkey {}", pk),
        )
    })?;
    v.revoked = revoked;
    update_validator(store, &v);
    ctx.logger().info(format_args!(
        "validator {} {}",
        v.owner,
        if revoked { "revoked" } else { "unrevoked" }
    ));
    Ok(())
}

#[inline]
pub fn revoke(ctx: &Context, store: &mut dyn MultiStore, pk: &PubKey) -> Result<()> {
    set_revoked(ctx, store, pk, true)
}

#[inline]
pub fn unrevoke(ctx: &Context, store: &mut dyn MultiStore, pk: &PubKey) -> Result<()> {
    set_revoked(ctx, store, pk, false)
}

// delegations

pub fn get_delegation(
    store: &dyn MultiStore, delegator: &Addr, validator: &Addr,
) -> Option<Delegation> {
    get(store, &delegation_key(delegator, validator))
}

pub fn set_delegation(store: &mut dyn MultiStore, d: &Delegation) {
    put(store, &delegation_key(&d.delegator, &d.validator), d)
}

pub fn remove_delegation(store: &mut dyn MultiStore, d: &Delegation) {
    remove(store, &delegation_key(&d.delegator, &d.validator))
}

pub fn delegations_of(store: &dyn MultiStore, delegator: &Addr) -> Vec<Delegation> {
    scan(store, &delegations_key(delegator))
}

/// Bond `bond` to `validator` on behalf of `delegator` and return the shares issued. With
/// `from_account` the tokens are taken from the delegator's balance; otherwise they are already
/// held by the module (redelegation).
pub fn delegate(
    ctx: &Context, store: &mut dyn MultiStore, delegator: &Addr, bond: &Coin,
    mut validator: Validator, from_account: bool,
) -> Result<Rat> {
    if from_account {
        let coins = Coins::single(&bond.denom, bond.amount.clone());
        subtract_coins(store, delegator, &coins)?;
    }
    let issued = validator.add_tokens_from_del(&bond.amount).ok_or_else(|| {
        stake_err(
            CODE_INVALID_DELEGATION,
            format!(
                "validator {} cannot issue shares for {}",
                validator.owner, bond
            ),
        )
    })?;
    pool_add(store, validator.status, &bond.amount)?;

    let mut d = get_delegation(store, delegator, &validator.owner).unwrap_or(
        Delegation {
            delegator: *delegator,
            validator: validator.owner,
            shares: Rat::zero(),
            height: 0,
        },
    );
    d.shares = &d.shares + &issued;
    d.height = ctx.block_height();
    set_delegation(store, &d);
    update_validator(store, &validator);
    Ok(issued)
}

/// Burn `shares` of `delegator`'s delegation to `owner`; returns the tokens released and the
/// updated validator.
pub fn unbond(
    ctx: &Context, store: &mut dyn MultiStore, delegator: &Addr, owner: &Addr,
    shares: &Rat,
) -> Result<(Amount, Validator)> {
    let mut d = get_delegation(store, delegator, owner).ok_or_else(|| {
        stake_err(
            CODE_INVALID_DELEGATION,
            "no delegation for this (address, validator) pair".into(),
        )
    })?;
    let left = d.shares.checked_sub(shares).ok_or_else(|| {
        stake_err(
            CODE_INVALID_DELEGATION,
            format!("not enough shares: have {}, asked {}", d.shares, shares),
        )
    })?;
    let mut v = get_validator(store, owner).ok_or_else(|| {
        stake_err(CODE_INVALID_VALIDATOR, format!("no validator {}", owner))
    })?;

    if left.is_zero() {
        remove_delegation(store, &d);
        // an owner withdrawing its whole self-bond leaves the set
        if delegator == owner && !v.revoked {
            v.revoked = true;
        }
    } else {
        d.shares = left;
        d.height = ctx.block_height();
        set_delegation(store, &d);
    }

    let tokens = v
        .remove_del_shares(shares)
        .ok_or_else(|| Error::Internal("validator shares out of range".into()))?;
    pool_sub(store, v.status, &tokens)?;
    if v.delegator_shares.is_zero() && v.status == BondStatus::Unbonded {
        remove_validator(store, owner);
    } else {
        update_validator(store, &v);
    }
    Ok((tokens, v))
}

// unbonding delegations

pub fn get_ubd(
    store: &dyn MultiStore, delegator: &Addr, validator: &Addr,
) -> Option<UnbondingDelegation> {
    get(store, &ubd_key(delegator, validator))
}

pub fn set_ubd(store: &mut dyn MultiStore, ubd: &UnbondingDelegation) {
    let mut w = store.writer(STORE_STAKE);
    save(&mut *w, &ubd_key(&ubd.delegator, &ubd.validator), ubd);
    w.set(&ubd_by_val_key(&ubd.delegator, &ubd.validator), vec![]);
    w.set(
        &ubd_queue_key(ubd.min_time, &ubd.delegator, &ubd.validator),
        vec![],
    );
}

pub fn remove_ubd(store: &mut dyn MultiStore, ubd: &UnbondingDelegation) {
    let mut w = store.writer(STORE_STAKE);
    w.delete(&ubd_key(&ubd.delegator, &ubd.validator));
    w.delete(&ubd_by_val_key(&ubd.delegator, &ubd.validator));
    w.delete(&ubd_queue_key(ubd.min_time, &ubd.delegator, &ubd.validator));
}

pub fn ubds_from_validator(
    store: &dyn MultiStore, validator: &Addr,
) -> Vec<UnbondingDelegation> {
    scan_keys(store, &ubds_by_val_key(validator))
        .iter()
        .filter_map(|k| addrs_suffix(k, 1))
        .filter_map(|a| get_ubd(store, &a[0], validator))
        .collect()
}

/// Burn delegated shares now and queue the tokens for release after the unbonding period.
pub fn begin_unbonding(
    ctx: &Context, store: &mut dyn MultiStore, delegator: &Addr, owner: &Addr,
    shares: &Rat,
) -> Result<UnbondingDelegation> {
    if get_ubd(store, delegator, owner).is_some() {
        return Err(stake_err(
            CODE_INVALID_DELEGATION,
            "existing unbonding delegation found".into(),
        ))
    }
    let params = get_params(store);
    let (tokens, _) = unbond(ctx, store, delegator, owner, shares)?;
    let balance = Coin::new(&params.bond_denom, tokens.clone());
    let ubd = UnbondingDelegation {
        delegator: *delegator,
        validator: *owner,
        creation_height: ctx.block_height(),
        min_time: ctx.block_time().saturating_add(params.unbonding_time),
        initial_balance: balance.clone(),
        balance,
    };
    pool_unbonding(store, Some(&tokens), None)?;
    set_ubd(store, &ubd);
    Ok(ubd)
}

/// Release a matured unbonding delegation to the delegator's account.
pub fn complete_unbonding(
    ctx: &Context, store: &mut dyn MultiStore, delegator: &Addr, owner: &Addr,
) -> Result<()> {
    let ubd = get_ubd(store, delegator, owner).ok_or_else(|| {
        stake_err(
            CODE_INVALID_DELEGATION,
            "no unbonding delegation found".into(),
        )
    })?;
    if ubd.min_time > ctx.block_time() {
        return Err(stake_err(
            CODE_INVALID_DELEGATION,
            format!("unbonding delegation matures at {}", ubd.min_time),
        ))
    }
    if !ubd.balance.amount.is_zero() {
        let coins =
            Coins::single(&ubd.balance.denom, ubd.balance.amount.clone());
        add_coins(store, delegator, &coins)?;
    }
    pool_unbonding(store, None, Some(&ubd.balance.amount))?;
    remove_ubd(store, &ubd);
    ctx.logger().debug(format_args!(
        "released {} to {} from {}",
        ubd.balance, delegator, owner
    ));
    Ok(())
}

// redelegations

pub fn get_red(
    store: &dyn MultiStore, delegator: &Addr, src: &Addr, dst: &Addr,
) -> Option<Redelegation> {
    get(store, &red_key(delegator, src, dst))
}

pub fn set_red(store: &mut dyn MultiStore, red: &Redelegation) {
    let (d, s, t) = (&red.delegator, &red.validator_src, &red.validator_dst);
    let mut w = store.writer(STORE_STAKE);
    save(&mut *w, &red_key(d, s, t), red);
    w.set(&red_by_val_src_key(d, s, t), vec![]);
    w.set(&red_by_val_dst_key(d, s, t), vec![]);
    w.set(&red_queue_key(red.min_time, d, s, t), vec![]);
}

pub fn remove_red(store: &mut dyn MultiStore, red: &Redelegation) {
    let (d, s, t) = (&red.delegator, &red.validator_src, &red.validator_dst);
    let mut w = store.writer(STORE_STAKE);
    w.delete(&red_key(d, s, t));
    w.delete(&red_by_val_src_key(d, s, t));
    w.delete(&red_by_val_dst_key(d, s, t));
    w.delete(&red_queue_key(red.min_time, d, s, t));
}

pub fn reds_from_validator(store: &dyn MultiStore, src: &Addr) -> Vec<Redelegation> {
    scan_keys(store, &reds_from_val_src_key(src))
        .iter()
        .filter_map(|k| addrs_suffix(k, 2))
        .filter_map(|a| get_red(store, &a[0], src, &a[1]))
        .collect()
}

/// Whether `delegator` has a pending redelegation into `dst`.
pub fn has_receiving_redelegation(
    store: &dyn MultiStore, delegator: &Addr, dst: &Addr,
) -> bool {
    !store
        .reader(STORE_STAKE)
        .iter_prefix(&reds_by_del_to_val_dst_key(delegator, dst))
        .is_empty()
}

/// Move shares from `src` to `dst` at once. The record stays until the unbonding period has
/// passed; while it does, the same stake cannot be redelegated again, either along the same
/// pair or onward from `dst`.
pub fn begin_redelegation(
    ctx: &Context, store: &mut dyn MultiStore, delegator: &Addr, src: &Addr,
    dst: &Addr, shares: &Rat,
) -> Result<Redelegation> {
    if get_red(store, delegator, src, dst).is_some() {
        return Err(stake_err(
            CODE_INVALID_DELEGATION,
            "redelegation already in progress for this pair".into(),
        ))
    }
    if has_receiving_redelegation(store, delegator, src) {
        return Err(stake_err(
            CODE_INVALID_DELEGATION,
            "redelegation to this validator already in progress; first redelegation to this validator must complete before next redelegation".into(),
        ))
    }
    let dst_val = get_validator(store, dst).ok_or_else(|| {
        stake_err(CODE_INVALID_VALIDATOR, format!("no validator {}", dst))
    })?;
    if dst_val.revoked {
        return Err(stake_err(
            CODE_VALIDATOR_REVOKED,
            format!("destination validator {} is currently revoked", dst),
        ))
    }
    let params = get_params(store);
    let (tokens, _) = unbond(ctx, store, delegator, src, shares)?;
    let moved = Coin::new(&params.bond_denom, tokens);
    let shares_dst = delegate(ctx, store, delegator, &moved, dst_val, false)?;
    let red = Redelegation {
        delegator: *delegator,
        validator_src: *src,
        validator_dst: *dst,
        creation_height: ctx.block_height(),
        min_time: ctx.block_time().saturating_add(params.unbonding_time),
        initial_balance: moved.clone(),
        balance: moved,
        shares_src: shares.clone(),
        shares_dst,
    };
    set_red(store, &red);
    Ok(red)
}

pub fn complete_redelegation(
    ctx: &Context, store: &mut dyn MultiStore, delegator: &Addr, src: &Addr,
    dst: &Addr,
) -> Result<()> {
    let red = get_red(store, delegator, src, dst).ok_or_else(|| {
        stake_err(CODE_INVALID_DELEGATION, "no redelegation found".into())
    })?;
    if red.min_time > ctx.block_time() {
        return Err(stake_err(
            CODE_INVALID_DELEGATION,
            format!("redelegation matures at {}", red.min_time),
        ))
    }
    remove_red(store, &red);
    Ok(())
}

/// Complete every unbonding delegation and redelegation whose time has come, and let unbonding
/// validators past their period become unbonded.
pub fn mature_queues(ctx: &Context, store: &mut dyn MultiStore) -> Result<()> {
    let now = ctx.block_time();
    let due = |store: &dyn MultiStore, prefix: &[u8]| -> Vec<Vec<u8>> {
        let end = queue_end(prefix, now);
        store
            .reader(STORE_STAKE)
            .range(prefix, Some(end.as_slice()))
            .into_iter()
            .map(|(k, _)| k)
            .collect()
    };
    for k in due(&*store, UNBONDING_QUEUE_KEY) {
        if let Some(a) = addrs_suffix(&k, 2) {
            complete_unbonding(ctx, store, &a[0], &a[1])?;
        }
    }
    for k in due(&*store, REDELEGATION_QUEUE_KEY) {
        if let Some(a) = addrs_suffix(&k, 3) {
            complete_redelegation(ctx, store, &a[0], &a[1], &a[2])?;
        }
    }
    for mut v in validators(store) {
        if v.status == BondStatus::Unbonding && v.unbonding_min_time <= now {
            v.status = BondStatus::Unbonded;
            if v.delegator_shares.is_zero() {
                remove_validator(store, &v.owner);
            } else {
                update_validator(store, &v);
            }
        }
    }
    Ok(())
}

// slashing

/// Burn `fraction` of the stake that backed the validator with key `pk` at
/// `infraction_height`, when it had `power`. Stake that has since left through unbonding or
/// redelegation is slashed first; the rest is taken from the validator's tokens. Returns the
/// amount burned from the validator itself.
pub fn slash(
    ctx: &Context, store: &mut dyn MultiStore, pk: &PubKey,
    infraction_height: u64, power: u64, fraction: &Rat,
) -> Result<Amount> {
    let v = match get_validator_by_pubkey(store, pk) {
        Some(v) => v,
        None => {
            ctx.logger().warn(format_args!(
                "ignored attempt to slash a nonexistent validator {}",
                pk
            ));
            return Ok(Amount::default())
        }
    };
    let owner = v.owner;
    let mut remaining = (&Rat::new(power, 1) * fraction)
        .floor_amount()
        .unwrap_or_default();

    if infraction_height < ctx.block_height() {
        for ubd in ubds_from_validator(store, &owner) {
            let s = slash_ubd(ctx, store, ubd, infraction_height, fraction)?;
            remaining = remaining.checked_sub(&s).unwrap_or_default();
        }
        for red in reds_from_validator(store, &owner) {
            let s = slash_red(ctx, store, red, infraction_height, fraction)?;
            remaining = remaining.checked_sub(&s).unwrap_or_default();
        }
    }

    let mut v = match get_validator(store, &owner) {
        Some(v) => v,
        None => return Ok(Amount::default()),
    };
    let burned = v.remove_tokens(&remaining);
    pool_sub(store, v.status, &burned)?;
    update_validator(store, &v);
    ctx.logger().info(format_args!(
        "validator {} slashed by {}: burned {} tokens",
        owner, fraction, burned
    ));
    Ok(burned)
}

/// Entries created before the infraction, or already matured, are out of reach.
fn slashable(
    creation_height: u64, min_time: u64, ctx: &Context, infraction: u64,
) -> bool {
    creation_height >= infraction && min_time > ctx.block_time()
}

fn slash_ubd(
    ctx: &Context, store: &mut dyn MultiStore, mut ubd: UnbondingDelegation,
    infraction_height: u64, fraction: &Rat,
) -> Result<Amount> {
    if !slashable(ubd.creation_height, ubd.min_time, ctx, infraction_height) {
        return Ok(Amount::default())
    }
    let due = (&Rat::from_amount(&ubd.initial_balance.amount) * fraction)
        .floor_amount()
        .unwrap_or_default();
    let cut = std::cmp::min(due.clone(), ubd.balance.amount.clone());
    ubd.balance.amount = ubd.balance.amount.checked_sub(&cut).unwrap_or_default();
    pool_unbonding(store, None, Some(&cut))?;
    set_ubd(store, &ubd);
    Ok(due)
}

fn slash_red(
    ctx: &Context, store: &mut dyn MultiStore, mut red: Redelegation,
    infraction_height: u64, fraction: &Rat,
) -> Result<Amount> {
    if !slashable(red.creation_height, red.min_time, ctx, infraction_height) {
        return Ok(Amount::default())
    }
    let due = (&Rat::from_amount(&red.initial_balance.amount) * fraction)
        .floor_amount()
        .unwrap_or_default();
    let cut = std::cmp::min(due.clone(), red.balance.amount.clone());
    red.balance.amount = red.balance.amount.checked_sub(&cut).unwrap_or_default();
    set_red(store, &red);

    let (del, dst) = (red.delegator, red.validator_dst);
    if let Some(d) = get_delegation(store, &del, &dst) {
        let shares = std::cmp::min(&red.shares_dst * fraction, d.shares.clone());
        if !shares.is_zero() {
            // tokens released by the unbond are burned
            unbond(ctx, store, &del, &dst, &shares)?;
        }
    }
    Ok(due)
}

// validator set

#[derive(RlpEncodable, RlpDecodable)]
struct LastPower {
    pub_key: PubKey,
    power: u64,
}

/// Give `v` the seniority of a validator bonding now: the current height and the next counter.
fn restart_seniority(ctx: &Context, store: &mut dyn MultiStore, v: &mut Validator) {
    v.bond_height = ctx.block_height();
    v.bond_intra_tx_counter = next_intra_tx_counter(store);
}

/// Re-derive the active set (the first `max_validators` non-revoked validators with power in
/// the power index), update bond statuses and return the changes against the set reported last
/// time: new or changed powers, and power zero for validators that left.
///
/// A validator entering or leaving the set restarts its seniority at the current height, so one
/// that drops out and returns ranks behind validators that stayed bonded at equal power.
pub fn apply_validator_set_changes(
    ctx: &Context, store: &mut dyn MultiStore,
) -> Result<Vec<ValidatorUpdate>> {
    let params = get_params(store);
    let active: Vec<Validator> = validators_by_power(store)
        .into_iter()
        .take_while(|v| !v.revoked && !v.tokens.is_zero())
        .take(params.max_validators as usize)
        .collect();
    let active_owners: BTreeSet<Addr> = active.iter().map(|v| v.owner).collect();

    let mut last: BTreeMap<Addr, LastPower> = BTreeMap::new();
    for (k, raw) in store
        .reader(STORE_STAKE)
        .iter_prefix(LAST_VALIDATOR_POWER_KEY)
    {
        if let Some(a) = addrs_suffix(&k, 1) {
            last.insert(a[0], decode_stored(&k, &raw));
        }
    }

    let mut updates = Vec::new();
    for mut v in active {
        if v.status != BondStatus::Bonded {
            let mut pool = get_pool(store);
            pool.transfer(v.status, BondStatus::Bonded, &v.tokens)
                .ok_or_else(|| pool_broken("bonding transfer"))?;
            set_pool(store, &pool);
            v.status = BondStatus::Bonded;
            restart_seniority(ctx, store, &mut v);
            update_validator(store, &v);
        }
        let power = v.consensus_power();
        let prev = last.remove(&v.owner);
        if prev.map(|p| p.power) != Some(power) {
            updates.push(ValidatorUpdate {
                pub_key: v.pub_key.clone(),
                power,
            });
        }
        put(
            store,
            &last_validator_power_key(&v.owner),
            &LastPower {
                pub_key: v.pub_key.clone(),
                power,
            },
        );
    }

    for (owner, prev) in last {
        remove(store, &last_validator_power_key(&owner));
        updates.push(ValidatorUpdate {
            pub_key: prev.pub_key,
            power: 0,
        });
    }

    // everything still marked bonded outside the set leaves it, including bonded genesis
    // entries the engine was never told about
    let leaving: Vec<Validator> = validators(store)
        .into_iter()
        .filter(|v| {
            v.status == BondStatus::Bonded && !active_owners.contains(&v.owner)
        })
        .collect();
    for mut v in leaving {
        let mut pool = get_pool(store);
        pool.transfer(BondStatus::Bonded, BondStatus::Unbonding, &v.tokens)
            .ok_or_else(|| pool_broken("unbonding transfer"))?;
        set_pool(store, &pool);
        v.status = BondStatus::Unbonding;
        v.unbonding_min_time =
            ctx.block_time().saturating_add(params.unbonding_time);
        restart_seniority(ctx, store, &mut v);
        update_validator(store, &v);
    }
    if !updates.is_empty() {
        ctx.logger().info(format_args!(
            "validator set changed: {} update(s)",
            updates.len()
        ));
    }
    Ok(updates)
}

/// Validators reported active at the last end-block, with their power.
pub fn last_validator_powers(store: &dyn MultiStore) -> Vec<ValidatorUpdate> {
    scan::<LastPower>(store, LAST_VALIDATOR_POWER_KEY)
        .into_iter()
        .map(|p| ValidatorUpdate {
            pub_key: p.pub_key,
            power: p.power,
        })
        .collect()
}
