use rlp_derive::{RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};

use crate::common::Addr;
use crate::error::{Error, Result, CODESPACE_SLASHING};
use crate::tx::MsgBody;

pub const TAG_UNREVOKE: &str = "slashing/unrevoke";

pub const CODE_INVALID_VALIDATOR: u16 = 101;
pub const CODE_VALIDATOR_JAILED: u16 = 102;
pub const CODE_VALIDATOR_NOT_REVOKED: u16 = 103;

#[inline]
pub(crate) fn slashing_err(code: u16, msg: String) -> Error {
    Error::module(CODESPACE_SLASHING, code, msg)
}

/// Ask for a revoked validator to rejoin once its jail time is over.
#[derive(
    Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable, Serialize,
    Deserialize,
)]
pub struct MsgUnrevoke {
    /// Owner of the validator.
    pub address: Addr,
}

impl MsgBody for MsgUnrevoke {
    fn tag(&self) -> &'static str {
        TAG_UNREVOKE
    }

    fn signers(&self) -> Vec<Addr> {
        vec![self.address]
    }

    fn validate_basic(&self) -> Result<()> {
        if self.address.is_zero() {
            return Err(Error::InvalidAddress("empty validator address".into()))
        }
        Ok(())
    }
}
