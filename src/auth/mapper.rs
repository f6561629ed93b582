//! Persistence of account records and the fee pool in the `acc` store.

use crate::auth::account::{Account, AppAccount};
use crate::codec::{load, save};
use crate::coin::Coins;
use crate::common::{concat_key, Addr};
use crate::error::{Error, Result};
use crate::params::STORE_ACC;
use crate::store::MultiStore;

const FEE_POOL_KEY: &[u8] = &[0x00];
const ACCOUNT_PREFIX: &[u8] = &[0x01];

#[inline]
pub fn account_key(addr: &Addr) -> Vec<u8> {
    concat_key(&[ACCOUNT_PREFIX, addr.as_bytes()])
}

pub fn get_account(store: &dyn MultiStore, addr: &Addr) -> Option<AppAccount> {
    load(&*store.reader(STORE_ACC), &account_key(addr))
}

pub fn set_account(store: &mut dyn MultiStore, acc: &AppAccount) {
    save(&mut *store.writer(STORE_ACC), &account_key(acc.address()), acc)
}

/// The account at `addr`, or a fresh one (not yet persisted) if none exists.
pub fn get_or_new_account(store: &dyn MultiStore, addr: &Addr) -> AppAccount {
    get_account(store, addr).unwrap_or_else(|| AppAccount::new(*addr))
}

/// All accounts in address order.
pub fn iter_accounts(store: &dyn MultiStore) -> Vec<AppAccount> {
    store
        .reader(STORE_ACC)
        .iter_prefix(ACCOUNT_PREFIX)
        .into_iter()
        .map(|(k, v)| crate::codec::decode_stored(&k, &v))
        .collect()
}

pub fn fee_pool(store: &dyn MultiStore) -> Coins {
    load(&*store.reader(STORE_ACC), FEE_POOL_KEY).unwrap_or_default()
}

pub fn add_to_fee_pool(store: &mut dyn MultiStore, fee: &Coins) -> Result<()> {
    let pool = fee_pool(store)
        .plus(fee)
        .ok_or_else(|| Error::InvalidCoins("fee pool overflow".into()))?;
    save(&mut *store.writer(STORE_ACC), FEE_POOL_KEY, &pool);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemMultiStore;

    #[test]
    fn test_get_set() {
        let mut ms = MemMultiStore::new(crate::params::STORES);
        let a = Addr::from([1; 20]);
        assert!(get_account(&ms, &a).is_none());
        let mut acc = get_or_new_account(&ms, &a);
        acc.set_sequence(4);
        set_account(&mut ms, &acc);
        assert_eq!(get_account(&ms, &a).unwrap().sequence(), 4);
        set_account(&mut ms, &AppAccount::new(Addr::from([0; 20])));
        let all = iter_accounts(&ms);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].address(), &Addr::from([0; 20]));

        add_to_fee_pool(&mut ms, &Coins::single("mycoin", 1u64)).unwrap();
        add_to_fee_pool(&mut ms, &Coins::single("mycoin", 2u64)).unwrap();
        assert_eq!(fee_pool(&ms), Coins::single("mycoin", 3u64));
    }
}
