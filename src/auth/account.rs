use rlp::{Rlp, RlpStream};
use serde::{Deserialize, Serialize};

use crate::coin::Coins;
use crate::common::Addr;
use crate::crypto::PubKey;
use crate::error::{Error, Result};

/// Capability interface over account records. Implementors only expose their [BaseAccount]; every
/// accessor is provided on top of it.
pub trait Account {
    fn base(&self) -> &BaseAccount;
    fn base_mut(&mut self) -> &mut BaseAccount;

    #[inline(always)]
    fn address(&self) -> &Addr {
        &self.base().address
    }

    #[inline(always)]
    fn pub_key(&self) -> Option<&PubKey> {
        self.base().pub_key.as_ref()
    }

    #[inline(always)]
    fn coins(&self) -> &Coins {
        &self.base().coins
    }

    #[inline(always)]
    fn sequence(&self) -> u64 {
        self.base().sequence
    }

    /// Binds the key once; any later attempt fails.
    fn set_pub_key(&mut self, pk: PubKey) -> Result<()> {
        let base = self.base_mut();
        if base.pub_key.is_some() {
            return Err(Error::InvalidPubKey(
                "cannot override BaseAccount pubkey".into(),
            ))
        }
        base.pub_key = Some(pk);
        Ok(())
    }

    fn set_coins(&mut self, coins: Coins) {
        self.base_mut().coins = coins
    }

    fn set_sequence(&mut self, seq: u64) {
        self.base_mut().sequence = seq
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseAccount {
    pub address: Addr,
    #[serde(default)]
    pub coins: Coins,
    #[serde(default)]
    pub pub_key: Option<PubKey>,
    #[serde(default)]
    pub sequence: u64,
}

impl BaseAccount {
    pub fn new(address: Addr) -> Self {
        Self {
            address,
            ..Default::default()
        }
    }

    /// Set the address of an account created without one.
    pub fn set_address(&mut self, addr: Addr) -> Result<()> {
        if !self.address.is_zero() {
            return Err(Error::InvalidAddress(
                "cannot override BaseAccount address".into(),
            ))
        }
        self.address = addr;
        Ok(())
    }
}

impl Account for BaseAccount {
    #[inline(always)]
    fn base(&self) -> &BaseAccount {
        self
    }

    #[inline(always)]
    fn base_mut(&mut self) -> &mut BaseAccount {
        self
    }
}

impl rlp::Encodable for BaseAccount {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(4).append(&self.address).append(&self.coins);
        match &self.pub_key {
            Some(pk) => s.append(pk),
            None => s.append_empty_data(),
        };
        s.append(&self.sequence);
    }
}

impl rlp::Decodable for BaseAccount {
    fn decode(rlp: &Rlp) -> std::result::Result<Self, rlp::DecoderError> {
        if rlp.item_count()? != 4 {
            return Err(rlp::DecoderError::RlpIncorrectListLen)
        }
        let pk = rlp.at(2)?;
        Ok(Self {
            address: rlp.val_at(0)?,
            coins: rlp.val_at(1)?,
            pub_key: if pk.is_empty() { None } else { Some(pk.as_val()?) },
            sequence: rlp.val_at(3)?,
        })
    }
}

/// The account record the application stores: a [BaseAccount] plus a display name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppAccount {
    #[serde(flatten)]
    pub base: BaseAccount,
    #[serde(default)]
    pub name: String,
}

impl AppAccount {
    pub fn new(address: Addr) -> Self {
        Self {
            base: BaseAccount::new(address),
            name: String::new(),
        }
    }
}

impl Account for AppAccount {
    #[inline(always)]
    fn base(&self) -> &BaseAccount {
        &self.base
    }

    #[inline(always)]
    fn base_mut(&mut self) -> &mut BaseAccount {
        &mut self.base
    }
}

impl rlp::Encodable for AppAccount {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2).append(&self.base).append(&self.name);
    }
}

impl rlp::Decodable for AppAccount {
    fn decode(rlp: &Rlp) -> std::result::Result<Self, rlp::DecoderError> {
        Ok(Self {
            base: rlp.val_at(0)?,
            name: rlp.val_at(1)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Hash;
    use crate::crypto::PrivKey;

    fn pk(seed: &[u8]) -> PubKey {
        PrivKey::from_bytes(&Hash::hash(seed).to_fixed_bytes())
            .unwrap()
            .pub_key()
    }

    #[test]
    fn test_pubkey_bound_once() {
        let mut acc = AppAccount::new(pk(b"a").address());
        acc.set_pub_key(pk(b"a")).unwrap();
        assert!(matches!(
            acc.set_pub_key(pk(b"b")),
            Err(Error::InvalidPubKey(_))
        ));
        assert_eq!(acc.pub_key(), Some(&pk(b"a")));
    }

    #[test]
    fn test_address_set_once() {
        let mut acc = BaseAccount::default();
        acc.set_address(Addr::from([1; 20])).unwrap();
        assert!(acc.set_address(Addr::from([2; 20])).is_err());
    }

    #[test]
    fn test_codec() {
        let mut acc = AppAccount::new(Addr::from([7; 20]));
        acc.name = "alice".into();
        acc.set_coins(Coins::single("mycoin", 7u64));
        acc.set_sequence(3);
        let back: AppAccount = rlp::decode(&rlp::encode(&acc)).unwrap();
        assert_eq!(back, acc);
        acc.set_pub_key(pk(b"x")).unwrap();
        let back: AppAccount = rlp::decode(&rlp::encode(&acc)).unwrap();
        assert_eq!(back, acc);
        let json = serde_json::to_string(&acc).unwrap();
        let back: AppAccount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, acc);
    }
}
