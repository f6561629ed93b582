use num_traits::FromPrimitive;
use rlp::{Rlp, RlpStream};
use rlp_derive::{RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};

use crate::coin::Coin;
use crate::common::{Addr, Amount};
use crate::crypto::PubKey;
use crate::rat::Rat;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, FromPrimitive,
    Serialize, Deserialize,
)]
pub enum BondStatus {
    Unbonded = 0x00,
    Unbonding = 0x01,
    Bonded = 0x02,
}

impl Default for BondStatus {
    fn default() -> Self {
        BondStatus::Unbonded
    }
}

impl rlp::Encodable for BondStatus {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.append(&(*self as u8));
    }
}

impl rlp::Decodable for BondStatus {
    fn decode(rlp: &Rlp) -> Result<Self, rlp::DecoderError> {
        FromPrimitive::from_u8(rlp.as_val::<u8>()?)
            .ok_or(rlp::DecoderError::Custom("unknown bond status"))
    }
}

#[derive(
    Clone, Debug, Default, PartialEq, Eq, RlpEncodable, RlpDecodable,
    Serialize, Deserialize,
)]
#[serde(default)]
pub struct Description {
    pub moniker: String,
    pub identity: String,
    pub website: String,
    pub details: String,
}

impl Description {
    pub fn new(moniker: &str) -> Self {
        Self {
            moniker: moniker.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.moniker.is_empty() &&
            self.identity.is_empty() &&
            self.website.is_empty() &&
            self.details.is_empty()
    }
}

/// A validator candidate.
///
/// `tokens` is the bonded stake backing the validator; the delegators' claim on it is
/// `delegator_shares`, so one share is worth `tokens / delegator_shares`.
#[derive(
    Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable, Serialize,
    Deserialize,
)]
pub struct Validator {
    pub owner: Addr,
    pub pub_key: PubKey,
    #[serde(default)]
    pub revoked: bool,
    #[serde(default)]
    pub status: BondStatus,
    pub tokens: Amount,
    pub delegator_shares: Rat,
    #[serde(default)]
    pub description: Description,
    /// Height at which the validator was created.
    #[serde(default)]
    pub bond_height: u64,
    /// Order of creation within the block at `bond_height`.
    #[serde(default)]
    pub bond_intra_tx_counter: u16,
    /// When an `Unbonding` validator becomes `Unbonded`.
    #[serde(default)]
    pub unbonding_min_time: u64,
}

impl Validator {
    pub fn new(owner: Addr, pub_key: PubKey, description: Description) -> Self {
        Self {
            owner,
            pub_key,
            revoked: false,
            status: BondStatus::Unbonded,
            tokens: Amount::default(),
            delegator_shares: Rat::zero(),
            description,
            bond_height: 0,
            bond_intra_tx_counter: 0,
            unbonding_min_time: 0,
        }
    }

    /// Tokens per share; one while no share was issued.
    pub fn exchange_rate(&self) -> Rat {
        if self.delegator_shares.is_zero() {
            return Rat::one()
        }
        Rat::from_amount(&self.tokens)
            .checked_div(&self.delegator_shares)
            .unwrap_or_else(Rat::one)
    }

    /// Consensus power, recomputed from the current tokens.
    #[inline(always)]
    pub fn power(&self) -> &Amount {
        &self.tokens
    }

    /// Power as reported to the consensus engine.
    pub fn consensus_power(&self) -> u64 {
        to_power(&self.tokens)
    }

    /// Add delegated tokens and return the shares issued for them.
    pub fn add_tokens_from_del(&mut self, amount: &Amount) -> Option<Rat> {
        let rate = self.exchange_rate();
        let issued = Rat::from_amount(amount).checked_div(&rate)?;
        if rate.is_zero() || issued.is_zero() {
            return None
        }
        self.tokens = self.tokens.checked_add(amount)?;
        self.delegator_shares = &self.delegator_shares + &issued;
        Some(issued)
    }

    /// Burn `shares` and return the tokens they were worth (rounded down).
    pub fn remove_del_shares(&mut self, shares: &Rat) -> Option<Amount> {
        let remaining = self.delegator_shares.checked_sub(shares)?;
        let removed = if remaining.is_zero() {
            self.tokens.clone()
        } else {
            (shares * &self.exchange_rate()).floor_amount()?
        };
        self.tokens = self.tokens.checked_sub(&removed)?;
        self.delegator_shares = remaining;
        Some(removed)
    }

    /// Remove tokens without touching shares, i.e. lower the exchange rate.
    pub fn remove_tokens(&mut self, amount: &Amount) -> Amount {
        let burned = std::cmp::min(amount, &self.tokens).clone();
        self.tokens = self.tokens.checked_sub(&burned).unwrap_or_default();
        burned
    }
}

/// Saturating conversion of a token amount to consensus power.
pub fn to_power(a: &Amount) -> u64 {
    let v = a.as_u256();
    if v.bits() > 64 {
        return u64::MAX
    }
    v.low_u64()
}

/// Stake held by the module, bucketed by state.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, RlpEncodable, RlpDecodable,
    Serialize, Deserialize,
)]
#[serde(default)]
pub struct Pool {
    /// Tokens of bonded validators.
    pub bonded_tokens: Amount,
    /// Tokens of unbonding and unbonded validators.
    pub unbonded_tokens: Amount,
    /// Balances of pending unbonding delegations.
    pub unbonding_tokens: Amount,
}

impl Pool {
    fn bucket(&mut self, status: BondStatus) -> &mut Amount {
        match status {
            BondStatus::Bonded => &mut self.bonded_tokens,
            _ => &mut self.unbonded_tokens,
        }
    }

    pub fn add(&mut self, status: BondStatus, amount: &Amount) -> Option<()> {
        let b = self.bucket(status);
        *b = b.checked_add(amount)?;
        Some(())
    }

    pub fn sub(&mut self, status: BondStatus, amount: &Amount) -> Option<()> {
        let b = self.bucket(status);
        *b = b.checked_sub(amount)?;
        Some(())
    }

    /// Move a validator's tokens when its status changes.
    pub fn transfer(
        &mut self, from: BondStatus, to: BondStatus, amount: &Amount,
    ) -> Option<()> {
        self.sub(from, amount)?;
        self.add(to, amount)
    }
}

#[derive(
    Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable, Serialize,
    Deserialize,
)]
pub struct Delegation {
    pub delegator: Addr,
    pub validator: Addr,
    pub shares: Rat,
    /// Last height the delegation changed.
    #[serde(default)]
    pub height: u64,
}

#[derive(
    Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable, Serialize,
    Deserialize,
)]
pub struct UnbondingDelegation {
    pub delegator: Addr,
    pub validator: Addr,
    pub creation_height: u64,
    /// Unix time at which `balance` is released.
    pub min_time: u64,
    pub initial_balance: Coin,
    /// What is left after slashing.
    pub balance: Coin,
}

#[derive(
    Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable, Serialize,
    Deserialize,
)]
pub struct Redelegation {
    pub delegator: Addr,
    pub validator_src: Addr,
    pub validator_dst: Addr,
    pub creation_height: u64,
    pub min_time: u64,
    pub initial_balance: Coin,
    pub balance: Coin,
    pub shares_src: Rat,
    pub shares_dst: Rat,
}

/// One entry of the validator-set delta handed to the consensus engine. Power zero removes the
/// validator from the active set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    pub pub_key: PubKey,
    pub power: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivKey;

    fn validator() -> Validator {
        let pk = PrivKey::from_bytes(&[7; 32]).unwrap().pub_key();
        Validator::new(pk.address(), pk, Description::new("v"))
    }

    #[test]
    fn test_shares() {
        let mut v = validator();
        assert_eq!(v.add_tokens_from_del(&100.into()), Some(Rat::new(100, 1)));
        // halve the exchange rate
        v.remove_tokens(&50.into());
        assert_eq!(v.exchange_rate(), Rat::new(1, 2));
        assert_eq!(v.add_tokens_from_del(&10.into()), Some(Rat::new(20, 1)));
        assert_eq!(v.delegator_shares, Rat::new(120, 1));
        assert_eq!(v.remove_del_shares(&Rat::new(30, 1)), Some(15.into()));
        assert_eq!(v.remove_del_shares(&Rat::new(91, 1)), None);
        assert_eq!(v.remove_del_shares(&Rat::new(90, 1)), Some(45.into()));
        assert!(v.tokens.is_zero());
        assert!(v.delegator_shares.is_zero());
    }

    #[test]
    fn test_rlp() {
        let mut v = validator();
        v.status = BondStatus::Bonded;
        v.add_tokens_from_del(&3.into());
        let d: Validator = rlp::decode(&rlp::encode(&v)).unwrap();
        assert_eq!(d, v);
    }
}
