//! Validator bonding: candidates, delegations, the power ranking and the validator-set delta.

mod handler;
pub mod keeper;
pub mod keys;
pub mod msgs;
mod tick;
pub mod types;

pub use handler::{genesis_initializer, init_genesis, new_handler};
pub use msgs::{
    MsgBeginRedelegate, MsgBeginUnbonding, MsgCreateValidator, MsgDelegate,
    MsgEditValidator,
};
pub use tick::end_blocker;
pub use types::{
    BondStatus, Delegation, Description, Pool, Redelegation,
    UnbondingDelegation, Validator, ValidatorUpdate,
};

use crate::codec::MsgRegistry;
use crate::error::Result;
use crate::tx::Msg;

pub const ROUTE: &str = "stake";

pub fn register_msgs(reg: &mut MsgRegistry) -> Result<()> {
    reg.register(msgs::TAG_CREATE_VALIDATOR, |b| {
        Ok(Msg::CreateValidator(rlp::decode(b)?))
    })?;
    reg.register(msgs::TAG_EDIT_VALIDATOR, |b| {
        Ok(Msg::EditValidator(rlp::decode(b)?))
    })?;
    reg.register(msgs::TAG_DELEGATE, |b| Ok(Msg::Delegate(rlp::decode(b)?)))?;
    reg.register(msgs::TAG_BEGIN_UNBONDING, |b| {
        Ok(Msg::BeginUnbonding(rlp::decode(b)?))
    })?;
    reg.register(msgs::TAG_BEGIN_REDELEGATE, |b| {
        Ok(Msg::BeginRedelegate(rlp::decode(b)?))
    })?;
    Ok(())
}
