use meridian_types::Share;

use crate::database::Database;
use crate::error::ChainResult;
use crate::objects::{
    AccountStatisticsObject, DynamicGlobalPropertyObject, GlobalPropertyObject, ValidatorObject,
};
use crate::operations::Block;

/// The periodic maintenance pass: refresh the active validator set from the
/// validator index, sweep per-account pending fees into the chain-wide
/// accumulator, and schedule the next pass. Runs inside the block's undo
/// session through the same store contracts as any evaluator.
pub(crate) fn perform_maintenance(chain: &mut Database, block: &Block) -> ChainResult<()> {
    let parameters = chain.global_properties()?.parameters.clone();

    let active: Vec<_> = chain
        .store
        .index::<ValidatorObject>()?
        .iter()
        .take(usize::from(parameters.maximum_validator_count))
        .map(|v| v.id())
        .collect();

    let sweeps: Vec<(u64, Share)> = chain
        .store
        .index::<AccountStatisticsObject>()?
        .iter()
        .filter(|s| !s.pending_fees.is_zero())
        .map(|s| (s.instance, s.pending_fees))
        .collect();

    let mut accumulated = chain.dynamic_global_properties()?.accumulated_fees;
    for (instance, fees) in &sweeps {
        accumulated = accumulated.checked_add(*fees)?;
        chain
            .store
            .modify::<AccountStatisticsObject>(*instance, |s| {
                s.pending_fees = Share::zero();
            })?;
    }

    let mut next = chain.dynamic_global_properties()?.next_maintenance_time;
    while next <= block.timestamp {
        next = next.saturating_add_seconds(parameters.maintenance_interval);
    }

    chain
        .store
        .modify::<GlobalPropertyObject>(0, |gp| gp.active_validators = active.clone())?;
    chain
        .store
        .modify::<DynamicGlobalPropertyObject>(0, |dgp| {
            dgp.accumulated_fees = accumulated;
            dgp.next_maintenance_time = next;
            dgp.maintenance_flag = true;
        })?;

    tracing::debug!(
        active = active.len(),
        swept_accounts = sweeps.len(),
        fee_pool = %accumulated,
        next_maintenance = %next,
        "maintenance pass complete"
    );
    Ok(())
}
