//! Penalties for downtime and double signing, and the way back for a revoked validator.

mod handler;
pub mod keeper;
pub mod msgs;
mod tick;

pub use handler::{genesis_initializer, init_genesis, new_handler};
pub use keeper::ValidatorSigningInfo;
pub use msgs::MsgUnrevoke;
pub use tick::{begin_blocker, Evidence, EvidenceKind, SigningValidator};

use crate::codec::MsgRegistry;
use crate::error::Result;
use crate::tx::Msg;

pub const ROUTE: &str = "slashing";

pub fn register_msgs(reg: &mut MsgRegistry) -> Result<()> {
    reg.register(msgs::TAG_UNREVOKE, |b| Ok(Msg::Unrevoke(rlp::decode(b)?)))
}
