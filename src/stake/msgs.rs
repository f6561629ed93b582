use rlp_derive::{RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};

use crate::coin::{Coin, Coins};
use crate::common::Addr;
use crate::crypto::PubKey;
use crate::error::{Error, Result, CODESPACE_STAKE};
use crate::rat::Rat;
use crate::stake::types::Description;
use crate::tx::MsgBody;

pub const TAG_CREATE_VALIDATOR: &str = "stake/create_validator";
pub const TAG_EDIT_VALIDATOR: &str = "stake/edit_validator";
pub const TAG_DELEGATE: &str = "stake/delegate";
pub const TAG_BEGIN_UNBONDING: &str = "stake/begin_unbonding";
pub const TAG_BEGIN_REDELEGATE: &str = "stake/begin_redelegate";

pub const CODE_INVALID_VALIDATOR: u16 = 101;
pub const CODE_INVALID_DELEGATION: u16 = 102;
pub const CODE_INVALID_INPUT: u16 = 103;
pub const CODE_VALIDATOR_REVOKED: u16 = 104;

#[inline]
pub(crate) fn stake_err(code: u16, msg: String) -> Error {
    Error::module(CODESPACE_STAKE, code, msg)
}

fn check_addr(a: &Addr, what: &str) -> Result<()> {
    if a.is_zero() {
        return Err(Error::InvalidAddress(format!("empty {} address", what)))
    }
    Ok(())
}

fn check_bond(bond: &Coin) -> Result<()> {
    let coins = Coins::single(&bond.denom, bond.amount.clone());
    if bond.amount.is_zero() || !coins.is_valid() {
        return Err(stake_err(
            CODE_INVALID_INPUT,
            format!("invalid bond amount {}", bond),
        ))
    }
    Ok(())
}

fn check_shares(shares: &Rat) -> Result<()> {
    if shares.is_zero() {
        return Err(stake_err(
            CODE_INVALID_INPUT,
            "shares must be positive".into(),
        ))
    }
    Ok(())
}

#[derive(
    Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable, Serialize,
    Deserialize,
)]
pub struct MsgCreateValidator {
    pub description: Description,
    pub owner: Addr,
    pub pub_key: PubKey,
    pub self_delegation: Coin,
}

impl MsgBody for MsgCreateValidator {
    fn tag(&self) -> &'static str {
        TAG_CREATE_VALIDATOR
    }

    fn signers(&self) -> Vec<Addr> {
        vec![self.owner]
    }

    fn validate_basic(&self) -> Result<()> {
        check_addr(&self.owner, "validator owner")?;
        check_bond(&self.self_delegation)?;
        if self.description.is_empty() {
            return Err(stake_err(
                CODE_INVALID_INPUT,
                "description must be included".into(),
            ))
        }
        Ok(())
    }

    fn outflow(&self, addr: &Addr) -> Option<Coins> {
        if *addr != self.owner {
            return Some(Coins::empty())
        }
        Some(Coins::single(
            &self.self_delegation.denom,
            self.self_delegation.amount.clone(),
        ))
    }
}

#[derive(
    Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable, Serialize,
    Deserialize,
)]
pub struct MsgEditValidator {
    pub description: Description,
    pub owner: Addr,
}

impl MsgBody for MsgEditValidator {
    fn tag(&self) -> &'static str {
        TAG_EDIT_VALIDATOR
    }

    fn signers(&self) -> Vec<Addr> {
        vec![self.owner]
    }

    fn validate_basic(&self) -> Result<()> {
        check_addr(&self.owner, "validator owner")?;
        if self.description.is_empty() {
            return Err(stake_err(
                CODE_INVALID_INPUT,
                "transaction must include some information to modify".into(),
            ))
        }
        Ok(())
    }
}

#[derive(
    Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable, Serialize,
    Deserialize,
)]
pub struct MsgDelegate {
    pub delegator: Addr,
    pub validator: Addr,
    pub bond: Coin,
}

impl MsgBody for MsgDelegate {
    fn tag(&self) -> &'static str {
        TAG_DELEGATE
    }

    fn signers(&self) -> Vec<Addr> {
        vec![self.delegator]
    }

    fn validate_basic(&self) -> Result<()> {
        check_addr(&self.delegator, "delegator")?;
        check_addr(&self.validator, "validator")?;
        check_bond(&self.bond)
    }

    fn outflow(&self, addr: &Addr) -> Option<Coins> {
        if *addr != self.delegator {
            return Some(Coins::empty())
        }
        Some(Coins::single(&self.bond.denom, self.bond.amount.clone()))
    }
}

#[derive(
    Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable, Serialize,
    Deserialize,
)]
pub struct MsgBeginUnbonding {
    pub delegator: Addr,
    pub validator: Addr,
    pub shares: Rat,
}

impl MsgBody for MsgBeginUnbonding {
    fn tag(&self) -> &'static str {
        TAG_BEGIN_UNBONDING
    }

    fn signers(&self) -> Vec<Addr> {
        vec![self.delegator]
    }

    fn validate_basic(&self) -> Result<()> {
        check_addr(&self.delegator, "delegator")?;
        check_addr(&self.validator, "validator")?;
        check_shares(&self.shares)
    }
}

#[derive(
    Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable, Serialize,
    Deserialize,
)]
pub struct MsgBeginRedelegate {
    pub delegator: Addr,
    pub validator_src: Addr,
    pub validator_dst: Addr,
    pub shares: Rat,
}

impl MsgBody for MsgBeginRedelegate {
    fn tag(&self) -> &'static str {
        TAG_BEGIN_REDELEGATE
    }

    fn signers(&self) -> Vec<Addr> {
        vec![self.delegator]
    }

    fn validate_basic(&self) -> Result<()> {
        check_addr(&self.delegator, "delegator")?;
        check_addr(&self.validator_src, "source validator")?;
        check_addr(&self.validator_dst, "destination validator")?;
        if self.validator_src == self.validator_dst {
            return Err(stake_err(
                CODE_INVALID_INPUT,
                "cannot redelegate to the same validator".into(),
            ))
        }
        check_shares(&self.shares)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivKey;

    #[test]
    fn test_validate_basic() {
        let pk = PrivKey::from_bytes(&[3; 32]).unwrap().pub_key();
        let owner = pk.address();
        let mut m = MsgCreateValidator {
            description: Description::new("alice"),
            owner,
            pub_key: pk,
            self_delegation: Coin::new("steak", 10),
        };
        assert!(m.validate_basic().is_ok());
        assert_eq!(m.outflow(&owner), Some(Coins::single("steak", 10)));

        m.self_delegation = Coin::new("steak", 0);
        let e = m.validate_basic().unwrap_err();
        assert_eq!(e.codespace(), CODESPACE_STAKE);
        assert_eq!(e.code(), CODE_INVALID_INPUT);

        let r = MsgBeginRedelegate {
            delegator: owner,
            validator_src: owner,
            validator_dst: owner,
            shares: Rat::one(),
        };
        assert!(r.validate_basic().is_err());

        let u = MsgBeginUnbonding {
            delegator: owner,
            validator: owner,
            shares: Rat::zero(),
        };
        assert!(u.validate_basic().is_err());
    }
}
