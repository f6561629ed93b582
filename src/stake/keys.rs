//! Key layout of the stake store.
//!
//! Every key starts with a one-byte prefix naming its table; the rest is a fixed-width encoding of
//! the record's identity, so distinct records never share a key. Numeric fields are big-endian so
//! that byte order matches numeric order.

use crate::common::{concat_key, Addr, Amount};
use crate::crypto::PubKey;
use crate::stake::types::Validator;

pub const PARAMS_KEY: &[u8] = &[0x00];
pub const POOL_KEY: &[u8] = &[0x01];
pub const VALIDATORS_KEY: &[u8] = &[0x02];
pub const VALIDATORS_BY_PUBKEY_KEY: &[u8] = &[0x03];
/// owner -> power reported to the consensus engine at the last end-block
pub const LAST_VALIDATOR_POWER_KEY: &[u8] = &[0x04];
pub const VALIDATORS_BY_POWER_KEY: &[u8] = &[0x05];
pub const INTRA_TX_COUNTER_KEY: &[u8] = &[0x09];
pub const DELEGATION_KEY: &[u8] = &[0x0A];
pub const UNBONDING_DELEGATION_KEY: &[u8] = &[0x0B];
pub const UNBONDING_DELEGATION_BY_VAL_KEY: &[u8] = &[0x0C];
pub const REDELEGATION_KEY: &[u8] = &[0x0D];
pub const REDELEGATION_BY_VAL_SRC_KEY: &[u8] = &[0x0E];
pub const REDELEGATION_BY_VAL_DST_KEY: &[u8] = &[0x0F];
pub const UNBONDING_QUEUE_KEY: &[u8] = &[0x10];
pub const REDELEGATION_QUEUE_KEY: &[u8] = &[0x11];

#[inline(always)]
pub fn validator_key(owner: &Addr) -> Vec<u8> {
    concat_key(&[VALIDATORS_KEY, owner.as_bytes()])
}

#[inline(always)]
pub fn validator_by_pubkey_key(pk: &PubKey) -> Vec<u8> {
    concat_key(&[VALIDATORS_BY_PUBKEY_KEY, pk.as_bytes()])
}

#[inline(always)]
pub fn last_validator_power_key(owner: &Addr) -> Vec<u8> {
    concat_key(&[LAST_VALIDATOR_POWER_KEY, owner.as_bytes()])
}

/// Position of `v` in the power index. Ascending key order is: non-revoked before revoked, higher
/// power first, then lower bond height, then lower intra-block counter. The owner suffix keeps
/// the key unique.
pub fn power_rank_key(v: &Validator) -> Vec<u8> {
    power_rank_key_of(
        v.revoked,
        v.power(),
        v.bond_height,
        v.bond_intra_tx_counter,
        &v.owner,
    )
}

pub fn power_rank_key_of(
    revoked: bool, power: &Amount, bond_height: u64, counter: u16, owner: &Addr,
) -> Vec<u8> {
    let mut inverted = power.to_big_endian();
    for b in inverted.iter_mut() {
        *b = !*b;
    }
    let height = bond_height.to_be_bytes();
    concat_key(&[
        VALIDATORS_BY_POWER_KEY,
        &[revoked as u8],
        &inverted,
        &height,
        &counter.to_be_bytes(),
        owner.as_bytes(),
    ])
}

/// Owner address stored at the tail of a power-index key.
pub fn owner_of_power_key(key: &[u8]) -> Option<Addr> {
    if key.len() < Addr::LEN {
        return None
    }
    Addr::try_from_slice(&key[key.len() - Addr::LEN..])
}

pub fn delegations_key(delegator: &Addr) -> Vec<u8> {
    concat_key(&[DELEGATION_KEY, delegator.as_bytes()])
}

pub fn delegation_key(delegator: &Addr, validator: &Addr) -> Vec<u8> {
    concat_key(&[DELEGATION_KEY, delegator.as_bytes(), validator.as_bytes()])
}

pub fn ubd_key(delegator: &Addr, validator: &Addr) -> Vec<u8> {
    concat_key(&[
        UNBONDING_DELEGATION_KEY,
        delegator.as_bytes(),
        validator.as_bytes(),
    ])
}

pub fn ubds_by_val_key(validator: &Addr) -> Vec<u8> {
    concat_key(&[UNBONDING_DELEGATION_BY_VAL_KEY, validator.as_bytes()])
}

pub fn ubd_by_val_key(delegator: &Addr, validator: &Addr) -> Vec<u8> {
    concat_key(&[
        UNBONDING_DELEGATION_BY_VAL_KEY,
        validator.as_bytes(),
        delegator.as_bytes(),
    ])
}

pub fn red_key(delegator: &Addr, src: &Addr, dst: &Addr) -> Vec<u8> {
    concat_key(&[
        REDELEGATION_KEY,
        delegator.as_bytes(),
        src.as_bytes(),
        dst.as_bytes(),
    ])
}

pub fn reds_from_val_src_key(src: &Addr) -> Vec<u8> {
    concat_key(&[REDELEGATION_BY_VAL_SRC_KEY, src.as_bytes()])
}

pub fn red_by_val_src_key(delegator: &Addr, src: &Addr, dst: &Addr) -> Vec<u8> {
    concat_key(&[
        REDELEGATION_BY_VAL_SRC_KEY,
        src.as_bytes(),
        delegator.as_bytes(),
        dst.as_bytes(),
    ])
}

/// Prefix of every redelegation by `delegator` into `dst`.
pub fn reds_by_del_to_val_dst_key(delegator: &Addr, dst: &Addr) -> Vec<u8> {
    concat_key(&[
        REDELEGATION_BY_VAL_DST_KEY,
        dst.as_bytes(),
        delegator.as_bytes(),
    ])
}

pub fn red_by_val_dst_key(delegator: &Addr, src: &Addr, dst: &Addr) -> Vec<u8> {
    concat_key(&[
        REDELEGATION_BY_VAL_DST_KEY,
        dst.as_bytes(),
        delegator.as_bytes(),
        src.as_bytes(),
    ])
}

fn time_bytes(t: u64) -> [u8; 8] {
    t.to_be_bytes()
}

pub fn ubd_queue_key(min_time: u64, delegator: &Addr, validator: &Addr) -> Vec<u8> {
    concat_key(&[
        UNBONDING_QUEUE_KEY,
        &time_bytes(min_time),
        delegator.as_bytes(),
        validator.as_bytes(),
    ])
}

pub fn red_queue_key(
    min_time: u64, delegator: &Addr, src: &Addr, dst: &Addr,
) -> Vec<u8> {
    concat_key(&[
        REDELEGATION_QUEUE_KEY,
        &time_bytes(min_time),
        delegator.as_bytes(),
        src.as_bytes(),
        dst.as_bytes(),
    ])
}

/// Exclusive upper bound of the queue entries maturing at or before `now`.
pub fn queue_end(prefix: &[u8], now: u64) -> Vec<u8> {
    concat_key(&[prefix, &time_bytes(now.saturating_add(1))])
}

/// Split the address tail of a key whose last `n` components are addresses.
pub fn addrs_suffix(key: &[u8], n: usize) -> Option<Vec<Addr>> {
    let len = n * Addr::LEN;
    if key.len() < len {
        return None
    }
    key[key.len() - len..]
        .chunks(Addr::LEN)
        .map(Addr::try_from_slice)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Addr {
        Addr::from([b; 20])
    }

    #[test]
    fn test_power_rank_order() {
        let a = power_rank_key_of(false, &10.into(), 5, 0, &addr(1));
        let more_power = power_rank_key_of(false, &11.into(), 9, 9, &addr(2));
        let revoked = power_rank_key_of(true, &1000.into(), 0, 0, &addr(3));
        let later = power_rank_key_of(false, &10.into(), 6, 0, &addr(4));
        let same_block = power_rank_key_of(false, &10.into(), 5, 1, &addr(5));
        assert!(more_power < a);
        assert!(a < same_block);
        assert!(same_block < later);
        assert!(later < revoked);
        assert_eq!(owner_of_power_key(&a), Some(addr(1)));
    }

    #[test]
    fn test_suffix() {
        let k = red_queue_key(77, &addr(1), &addr(2), &addr(3));
        assert_eq!(addrs_suffix(&k, 3), Some(vec![addr(1), addr(2), addr(3)]));
        assert!(k < queue_end(REDELEGATION_QUEUE_KEY, 77));
        assert!(k >= queue_end(REDELEGATION_QUEUE_KEY, 76));
    }
}
