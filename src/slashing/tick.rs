use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::crypto::PubKey;
use crate::error::Result;
use crate::router::Tag;
use crate::slashing::keeper::{handle_double_sign, handle_validator_signature};
use crate::store::MultiStore;

/// A member of the last validator set and whether it signed the previous block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningValidator {
    pub pub_key: PubKey,
    pub power: u64,
    pub signed_last_block: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvidenceKind {
    DuplicateVote,
    Other(String),
}

/// Byzantine behaviour reported by the consensus engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub kind: EvidenceKind,
    pub pub_key: PubKey,
    /// Power of the validator at `height`.
    pub power: u64,
    pub height: u64,
    pub time: u64,
}

/// Block-begin processing: liveness accounting for every validator that should have signed,
/// then evidence handling.
pub fn begin_blocker(
    ctx: &Context, store: &mut dyn MultiStore, signers: &[SigningValidator],
    evidence: &[Evidence],
) -> Result<Vec<Tag>> {
    for s in signers {
        handle_validator_signature(
            ctx,
            store,
            &s.pub_key,
            s.power,
            s.signed_last_block,
        )?;
    }
    for e in evidence {
        match &e.kind {
            EvidenceKind::DuplicateVote => handle_double_sign(
                ctx, store, &e.pub_key, e.height, e.time, e.power,
            )?,
            EvidenceKind::Other(kind) => ctx.logger().warn(format_args!(
                "ignored unknown evidence type: {}",
                kind
            )),
        }
    }
    Ok(vec![Tag::new("height", ctx.block_height())])
}
