//! Liveness and double-sign accounting over the `slashing` store.
//!
//! Signing records are keyed by the validator's consensus address (the address of its
//! consensus key). The window is a ring of `signed_blocks_window` bits, one per height,
//! indexed by `index_offset % signed_blocks_window`.

use rlp_derive::{RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};

use crate::codec::{load, save};
use crate::common::{concat_key, Addr};
use crate::context::Context;
use crate::crypto::PubKey;
use crate::error::Result;
use crate::params::{SlashingParams, STORE_SLASHING};
use crate::stake::keeper as stake;
use crate::store::MultiStore;

const PARAMS_KEY: &[u8] = &[0x00];
const SIGNING_INFO_KEY: &[u8] = &[0x01];
const SIGNED_BITS_KEY: &[u8] = &[0x02];

#[derive(
    Clone, Debug, Default, PartialEq, Eq, RlpEncodable, RlpDecodable,
    Serialize, Deserialize,
)]
pub struct ValidatorSigningInfo {
    /// Height the current window started at.
    pub start_height: u64,
    /// Blocks seen since `start_height`.
    pub index_offset: u64,
    /// Unix time before which the validator may not unrevoke.
    pub jailed_until: u64,
    /// Signed blocks within the window.
    pub signed_blocks_counter: u64,
}

impl ValidatorSigningInfo {
    pub fn new(start_height: u64) -> Self {
        Self {
            start_height,
            ..Default::default()
        }
    }
}

pub fn get_params(store: &dyn MultiStore) -> SlashingParams {
    load(&*store.reader(STORE_SLASHING), PARAMS_KEY).unwrap_or_default()
}

pub fn set_params(store: &mut dyn MultiStore, params: &SlashingParams) {
    save(&mut *store.writer(STORE_SLASHING), PARAMS_KEY, params)
}

fn signing_info_key(addr: &Addr) -> Vec<u8> {
    concat_key(&[SIGNING_INFO_KEY, addr.as_bytes()])
}

fn signed_bit_key(addr: &Addr, index: u64) -> Vec<u8> {
    concat_key(&[SIGNED_BITS_KEY, addr.as_bytes(), &index.to_be_bytes()])
}

pub fn get_signing_info(
    store: &dyn MultiStore, addr: &Addr,
) -> Option<ValidatorSigningInfo> {
    load(&*store.reader(STORE_SLASHING), &signing_info_key(addr))
}

pub fn set_signing_info(
    store: &mut dyn MultiStore, addr: &Addr, info: &ValidatorSigningInfo,
) {
    save(&mut *store.writer(STORE_SLASHING), &signing_info_key(addr), info)
}

#[inline]
pub fn get_signed_bit(store: &dyn MultiStore, addr: &Addr, index: u64) -> bool {
    store
        .reader(STORE_SLASHING)
        .has(&signed_bit_key(addr, index))
}

pub fn set_signed_bit(
    store: &mut dyn MultiStore, addr: &Addr, index: u64, signed: bool,
) {
    let key = signed_bit_key(addr, index);
    let mut w = store.writer(STORE_SLASHING);
    if signed {
        w.set(&key, vec![1])
    } else {
        w.delete(&key)
    }
}

fn clear_signed_bits(store: &mut dyn MultiStore, addr: &Addr) {
    let prefix = concat_key(&[SIGNED_BITS_KEY, addr.as_bytes()]);
    let keys: Vec<Vec<u8>> = store
        .reader(STORE_SLASHING)
        .iter_prefix(&prefix)
        .into_iter()
        .map(|(k, _)| k)
        .collect();
    let mut w = store.writer(STORE_SLASHING);
    for k in keys {
        w.delete(&k);
    }
}

/// Record whether the validator with consensus key `pk` signed the current block. Once the first
/// full window has passed, a validator whose signed count is below the threshold is slashed by
/// `slash_fraction_downtime`, revoked, jailed for `downtime_unbond_duration` and starts a fresh
/// window.
pub fn handle_validator_signature(
    ctx: &Context, store: &mut dyn MultiStore, pk: &PubKey, power: u64,
    signed: bool,
) -> Result<()> {
    let params = get_params(store);
    let addr = pk.address();
    let height = ctx.block_height();
    let mut info = get_signing_info(store, &addr)
        .unwrap_or_else(|| ValidatorSigningInfo::new(height));

    let window = params.signed_blocks_window;
    let index = info.index_offset % window;
    info.index_offset += 1;
    let previous = get_signed_bit(store, &addr, index);
    if previous != signed {
        set_signed_bit(store, &addr, index, signed);
        if signed {
            info.signed_blocks_counter += 1;
        } else {
            info.signed_blocks_counter =
                info.signed_blocks_counter.saturating_sub(1);
        }
    }
    if !signed {
        ctx.logger().debug(format_args!(
            "absent validator {} at height {}, signed {} of window",
            addr, height, info.signed_blocks_counter
        ));
    }

    let min_height = info.start_height.saturating_add(window);
    let min_signed = window - params.max_missed_blocks();
    if height > min_height && info.signed_blocks_counter < min_signed {
        let revoked = stake::get_validator_by_pubkey(store, pk)
            .map(|v| v.revoked)
            .unwrap_or(true);
        if !revoked {
            ctx.logger().info(format_args!(
                "validator {} past min height {} and below signed blocks threshold {}",
                addr, min_height, min_signed
            ));
            stake::slash(
                ctx,
                store,
                pk,
                height,
                power,
                &params.slash_fraction_downtime,
            )?;
            stake::revoke(ctx, store, pk)?;
            info = ValidatorSigningInfo {
                start_height: height,
                index_offset: 0,
                jailed_until: ctx
                    .block_time()
                    .saturating_add(params.downtime_unbond_duration),
                signed_blocks_counter: 0,
            };
            clear_signed_bits(store, &addr);
        }
    }
    set_signing_info(store, &addr, &info);
    Ok(())
}

/// Punish a validator for signing two blocks at `infraction_height`. Evidence older than
/// `max_evidence_age` is ignored.
pub fn handle_double_sign(
    ctx: &Context, store: &mut dyn MultiStore, pk: &PubKey,
    infraction_height: u64, infraction_time: u64, power: u64,
) -> Result<()> {
    let params = get_params(store);
    let addr = pk.address();
    let age = ctx.block_time().saturating_sub(infraction_time);
    if age > params.max_evidence_age {
        ctx.logger().info(format_args!(
            "ignored double sign from {} at height {}, age of {} past max age of {}",
            addr, infraction_height, age, params.max_evidence_age
        ));
        return Ok(())
    }
    ctx.logger().info(format_args!(
        "confirmed double sign from {} at height {}, age of {} less than max age of {}",
        addr, infraction_height, age, params.max_evidence_age
    ));
    stake::slash(
        ctx,
        store,
        pk,
        infraction_height,
        power,
        &params.slash_fraction_double_sign,
    )?;
    match stake::get_validator_by_pubkey(store, pk) {
        Some(v) if !v.revoked => stake::revoke(ctx, store, pk)?,
        _ => (),
    }
    let mut info = get_signing_info(store, &addr)
        .unwrap_or_else(|| ValidatorSigningInfo::new(ctx.block_height()));
    let until = ctx.block_time().saturating_add(params.max_evidence_age);
    info.jailed_until = info.jailed_until.max(until);
    set_signing_info(store, &addr, &info);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::keeper::set_coins;
    use crate::coin::{Coin, Coins};
    use crate::context::{Header, Mode};
    use crate::crypto::PrivKey;
    use crate::params::STORES;
    use crate::slashing::tick::{begin_blocker, Evidence, EvidenceKind};
    use crate::stake::types::{Description, Validator};
    use crate::store::MemMultiStore;

    fn ctx(height: u64, time: u64) -> Context {
        let header = Header {
            chain_id: "test".into(),
            height,
            time,
            proposer: None,
        };
        Context::new(header, Mode::Deliver, &[])
    }

    fn setup(store: &mut MemMultiStore) -> PubKey {
        let mut p = SlashingParams::default();
        p.signed_blocks_window = 10;
        set_params(store, &p);
        let pk = PrivKey::from_bytes(&[9; 32]).unwrap().pub_key();
        let owner = pk.address();
        set_coins(store, &owner, Coins::single("steak", 100));
        let v = Validator::new(owner, pk.clone(), Description::new("v"));
        stake::delegate(&ctx(1, 0), store, &owner, &Coin::new("steak", 100), v, true)
            .unwrap();
        stake::apply_validator_set_changes(&ctx(1, 0), store).unwrap();
        pk
    }

    #[test]
    fn test_downtime() {
        let mut store = MemMultiStore::new(STORES);
        let pk = setup(&mut store);
        // signs the first window in full
        for h in 1..=10 {
            handle_validator_signature(&ctx(h, h), &mut store, &pk, 100, true)
                .unwrap();
        }
        // may miss up to half of it
        for h in 11..=15 {
            handle_validator_signature(&ctx(h, h), &mut store, &pk, 100, false)
                .unwrap();
        }
        let v = stake::get_validator_by_pubkey(&store, &pk).unwrap();
        assert!(!v.revoked);
        handle_validator_signature(&ctx(16, 16), &mut store, &pk, 100, false)
            .unwrap();
        let v = stake::get_validator_by_pubkey(&store, &pk).unwrap();
        assert!(v.revoked);
        assert_eq!(v.tokens, 99.into());
        let info = get_signing_info(&store, &pk.address()).unwrap();
        assert_eq!(info.start_height, 16);
        assert_eq!(info.signed_blocks_counter, 0);
        assert_eq!(info.jailed_until, 16 + params_downtime());
    }

    fn params_downtime() -> u64 {
        SlashingParams::default().downtime_unbond_duration
    }

    #[test]
    fn test_double_sign() {
        let mut store = MemMultiStore::new(STORES);
        let pk = setup(&mut store);
        let max_age = SlashingParams::default().max_evidence_age;
        // too old
        handle_double_sign(&ctx(5, max_age + 10), &mut store, &pk, 1, 5, 100)
            .unwrap();
        assert!(!stake::get_validator_by_pubkey(&store, &pk).unwrap().revoked);

        handle_double_sign(&ctx(5, 100), &mut store, &pk, 4, 90, 100).unwrap();
        let v = stake::get_validator_by_pubkey(&store, &pk).unwrap();
        assert!(v.revoked);
        assert_eq!(v.tokens, 95.into());
    }

    #[test]
    fn test_unknown_evidence_is_skipped() {
        let mut store = MemMultiStore::new(STORES);
        let pk = setup(&mut store);
        let evidence = Evidence {
            kind: EvidenceKind::Other("light_client_attack".into()),
            pub_key: pk.clone(),
            power: 100,
            height: 4,
            time: 90,
        };
        let tags = begin_blocker(&ctx(5, 100), &mut store, &[], &[evidence]).unwrap();
        assert_eq!(tags.len(), 1);
        let v = stake::get_validator_by_pubkey(&store, &pk).unwrap();
        assert!(!v.revoked);
        assert_eq!(v.tokens, 100.into());
    }
}
