//! Balance mutation. Every multi-account operation runs in its own cache over the caller's view
//! and is flushed only when all of its steps succeeded.

use crate::auth::account::Account;
use crate::auth::mapper::{get_account, get_or_new_account, set_account};
use crate::bank::msgs::{Input, Output};
use crate::coin::Coins;
use crate::common::{concat_key, Addr};
use crate::error::{Error, Result};
use crate::router::Tag;
use crate::params::STORE_ACC;
use crate::store::{CacheMultiStore, MultiStore};

const ISSUER_PREFIX: &[u8] = &[0x02];

/// Balance of `addr`; empty for an address without a record.
pub fn get_coins(store: &dyn MultiStore, addr: &Addr) -> Coins {
    get_account(store, addr)
        .map(|a| a.coins().clone())
        .unwrap_or_default()
}

/// Overwrite the balance, creating the account if needed.
pub fn set_coins(store: &mut dyn MultiStore, addr: &Addr, coins: Coins) {
    let mut acc = get_or_new_account(store, addr);
    acc.set_coins(coins);
    set_account(store, &acc)
}

pub fn has_coins(store: &dyn MultiStore, addr: &Addr, want: &Coins) -> bool {
    get_coins(store, addr).is_gte(want)
}

pub fn add_coins(
    store: &mut dyn MultiStore, addr: &Addr, delta: &Coins,
) -> Result<Coins> {
    let new = get_coins(store, addr).plus(delta).ok_or_else(|| {
        Error::InvalidCoins(format!("{} overflows balance of {}", delta, addr))
    })?;
    set_coins(store, addr, new.clone());
    Ok(new)
}

/// Fails without touching the balance if any denom would go negative.
pub fn subtract_coins(
    store: &mut dyn MultiStore, addr: &Addr, delta: &Coins,
) -> Result<Coins> {
    let old = get_coins(store, addr);
    let new = old.minus(delta).ok_or_else(|| {
        Error::InsufficientCoins(format!("{} < {}", old, delta))
    })?;
    set_coins(store, addr, new.clone());
    Ok(new)
}

pub fn send_coins(
    store: &mut dyn MultiStore, from: &Addr, to: &Addr, amt: &Coins,
) -> Result<Vec<Tag>> {
    let mut cache = CacheMultiStore::new(store);
    subtract_coins(&mut cache, from, amt)?;
    add_coins(&mut cache, to, amt)?;
    cache.write();
    Ok(vec![Tag::new("sender", from), Tag::new("recipient", to)])
}

/// Apply every input debit and every output credit as one batch. Input and output totals are
/// expected to match (checked by message validation).
pub fn input_output_coins(
    store: &mut dyn MultiStore, inputs: &[Input], outputs: &[Output],
) -> Result<Vec<Tag>> {
    let mut cache = CacheMultiStore::new(store);
    let mut tags = Vec::with_capacity(inputs.len() + outputs.len());
    for i in inputs {
        subtract_coins(&mut cache, &i.address, &i.coins)?;
        tags.push(Tag::new("sender", &i.address));
    }
    for o in outputs {
        add_coins(&mut cache, &o.address, &o.coins)?;
        tags.push(Tag::new("recipient", &o.address));
    }
    cache.write();
    Ok(tags)
}

pub fn is_issuer(store: &dyn MultiStore, addr: &Addr) -> bool {
    store
        .reader(STORE_ACC)
        .has(&concat_key(&[ISSUER_PREFIX, addr.as_bytes()]))
}

pub fn add_issuer(store: &mut dyn MultiStore, addr: &Addr) {
    store
        .writer(STORE_ACC)
        .set(&concat_key(&[ISSUER_PREFIX, addr.as_bytes()]), vec![1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::STORES;
    use crate::store::MemMultiStore;

    fn coins(pairs: &[(&str, u64)]) -> Coins {
        Coins::from_unsorted(
            pairs
                .iter()
                .map(|(d, a)| crate::coin::Coin::new(d, *a))
                .collect(),
        )
    }

    #[test]
    fn test_keeper() {
        let mut ms = MemMultiStore::new(STORES);
        let (addr, addr2, addr3) = (
            Addr::from([1; 20]),
            Addr::from([2; 20]),
            Addr::from([3; 20]),
        );
        assert_eq!(get_coins(&ms, &addr), Coins::empty());

        set_coins(&mut ms, &addr, coins(&[("foocoin", 10)]));
        assert!(has_coins(&ms, &addr, &coins(&[("foocoin", 10)])));
        assert!(has_coins(&ms, &addr, &coins(&[("foocoin", 5)])));
        assert!(!has_coins(&ms, &addr, &coins(&[("foocoin", 15)])));
        assert!(!has_coins(&ms, &addr, &coins(&[("barcoin", 5)])));

        add_coins(&mut ms, &addr, &coins(&[("foocoin", 15)])).unwrap();
        add_coins(&mut ms, &addr, &coins(&[("barcoin", 15)])).unwrap();
        assert_eq!(
            get_coins(&ms, &addr),
            coins(&[("barcoin", 15), ("foocoin", 25)])
        );

        subtract_coins(&mut ms, &addr, &coins(&[("foocoin", 10)])).unwrap();
        subtract_coins(&mut ms, &addr, &coins(&[("barcoin", 5)])).unwrap();
        assert!(matches!(
            subtract_coins(&mut ms, &addr, &coins(&[("barcoin", 11)])),
            Err(Error::InsufficientCoins(_))
        ));
        assert_eq!(
            get_coins(&ms, &addr),
            coins(&[("barcoin", 10), ("foocoin", 15)])
        );
        subtract_coins(&mut ms, &addr, &coins(&[("barcoin", 10)])).unwrap();
        assert_eq!(get_coins(&ms, &addr), coins(&[("foocoin", 15)]));

        send_coins(&mut ms, &addr, &addr2, &coins(&[("foocoin", 5)])).unwrap();
        assert_eq!(get_coins(&ms, &addr), coins(&[("foocoin", 10)]));
        assert_eq!(get_coins(&ms, &addr2), coins(&[("foocoin", 5)]));

        assert!(
            send_coins(&mut ms, &addr, &addr2, &coins(&[("foocoin", 50)]))
                .is_err()
        );
        assert_eq!(get_coins(&ms, &addr), coins(&[("foocoin", 10)]));
        assert_eq!(get_coins(&ms, &addr2), coins(&[("foocoin", 5)]));

        add_coins(&mut ms, &addr, &coins(&[("barcoin", 30)])).unwrap();
        send_coins(
            &mut ms,
            &addr,
            &addr2,
            &coins(&[("barcoin", 10), ("foocoin", 5)]),
        )
        .unwrap();
        assert_eq!(
            get_coins(&ms, &addr),
            coins(&[("barcoin", 20), ("foocoin", 5)])
        );
        assert_eq!(
            get_coins(&ms, &addr2),
            coins(&[("barcoin", 10), ("foocoin", 10)])
        );

        let inputs = vec![
            Input::new(addr, coins(&[("foocoin", 3)])),
            Input::new(addr2, coins(&[("barcoin", 3), ("foocoin", 2)])),
        ];
        let outputs = vec![
            Output::new(addr, coins(&[("barcoin", 1)])),
            Output::new(addr3, coins(&[("barcoin", 2), ("foocoin", 5)])),
        ];
        input_output_coins(&mut ms, &inputs, &outputs).unwrap();
        assert_eq!(
            get_coins(&ms, &addr),
            coins(&[("barcoin", 21), ("foocoin", 2)])
        );
        assert_eq!(
            get_coins(&ms, &addr2),
            coins(&[("barcoin", 7), ("foocoin", 8)])
        );
        assert_eq!(
            get_coins(&ms, &addr3),
            coins(&[("barcoin", 2), ("foocoin", 5)])
        );
    }

    #[test]
    fn test_input_output_atomic() {
        let mut ms = MemMultiStore::new(STORES);
        let (a, b, c) = (
            Addr::from([1; 20]),
            Addr::from([2; 20]),
            Addr::from([3; 20]),
        );
        set_coins(&mut ms, &a, coins(&[("foo", 10)]));
        set_coins(&mut ms, &b, coins(&[("foo", 1)]));
        // second input cannot pay
        let inputs = vec![
            Input::new(a, coins(&[("foo", 5)])),
            Input::new(b, coins(&[("foo", 5)])),
        ];
        let outputs = vec![Output::new(c, coins(&[("foo", 10)]))];
        assert!(matches!(
            input_output_coins(&mut ms, &inputs, &outputs),
            Err(Error::InsufficientCoins(_))
        ));
        assert_eq!(get_coins(&ms, &a), coins(&[("foo", 10)]));
        assert_eq!(get_coins(&ms, &b), coins(&[("foo", 1)]));
        assert!(get_account(&ms, &c).is_none());
    }
}
