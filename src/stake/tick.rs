use crate::context::Context;
use crate::error::Result;
use crate::stake::keeper::{
    apply_validator_set_changes, mature_queues, reset_intra_tx_counter,
};
use crate::stake::types::ValidatorUpdate;
use crate::store::MultiStore;

/// Block-end processing: release matured unbondings and redelegations, then compute the
/// validator-set delta for the consensus engine.
pub fn end_blocker(
    ctx: &Context, store: &mut dyn MultiStore,
) -> Result<Vec<ValidatorUpdate>> {
    mature_queues(ctx, store)?;
    let updates = apply_validator_set_changes(ctx, store)?;
    reset_intra_tx_counter(store);
    Ok(updates)
}
