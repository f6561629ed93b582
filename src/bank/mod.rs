//! Coin accounting: balances, transfers and issuance.

mod handler;
pub mod keeper;
pub mod msgs;

pub use handler::{genesis_initializer, init_genesis, new_handler};
pub use msgs::{Input, MsgIssue, MsgSend, Output};

use crate::codec::MsgRegistry;
use crate::error::Result;
use crate::tx::Msg;

pub const ROUTE: &str = "bank";

pub fn register_msgs(reg: &mut MsgRegistry) -> Result<()> {
    reg.register(msgs::TAG_SEND, |b| Ok(Msg::Send(rlp::decode(b)?)))?;
    reg.register(msgs::TAG_ISSUE, |b| Ok(Msg::Issue(rlp::decode(b)?)))?;
    Ok(())
}
