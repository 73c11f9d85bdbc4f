use meridian_types::{BlockTimestamp, ValidatorId};

use crate::database::Database;
use crate::error::{ChainError, ChainResult};
use crate::objects::{
    DynamicGlobalPropertyObject, ProducerScheduleObject, ValidatorObject, CHAIN_100_PERCENT,
};
use crate::operations::Block;

/// Multiplier from the xorshift* generator family. Large, odd, fixed by the
/// protocol.
pub const SHUFFLE_MULTIPLIER: u64 = 2_685_821_657_736_338_717;

/// Width of the participation bitmap in slots.
pub const PARTICIPATION_SLOTS: u32 = 128;

/// Fisher-Yates shuffle driven by a deterministic per-position xorshift*
/// stream seeded from the head block time. Reproducible: two nodes with the
/// same time and producer set derive the identical order.
pub fn shuffle_producers(producers: &mut [ValidatorId], head_block_time: BlockTimestamp) {
    let now_hi = u64::from(head_block_time.seconds()) << 32;
    let len = producers.len();
    for i in 0..len {
        let mut k = now_hi.wrapping_add((i as u64).wrapping_mul(SHUFFLE_MULTIPLIER));
        k ^= k >> 12;
        k ^= k << 25;
        k ^= k >> 27;
        k = k.wrapping_mul(SHUFFLE_MULTIPLIER);
        let jmax = (len - i) as u64;
        let j = i + (k % jmax) as usize;
        producers.swap(i, j);
    }
}

impl Database {
    /// Timestamp of future slot `slot_num` (slot 0 is "no slot"). Slot
    /// boundaries are multiples of the block interval; after a maintenance
    /// pass the configured skip-slots are inserted first.
    pub fn get_slot_time(&self, slot_num: u32) -> ChainResult<BlockTimestamp> {
        if slot_num == 0 {
            return Ok(BlockTimestamp::from_seconds(0));
        }
        let gp = self.global_properties()?;
        let interval = u32::from(gp.parameters.block_interval);
        let skip_slots = u32::from(gp.parameters.maintenance_skip_slots);
        let dgp = self.dynamic_global_properties()?;

        if dgp.head_block_number == 0 {
            // the first production slot is one interval past genesis time
            return Ok(dgp
                .head_block_time
                .saturating_add_seconds(slot_num.saturating_mul(interval)));
        }

        let head_slot_time = dgp.head_block_time.align_to_interval(interval);
        let mut slots = slot_num;
        if dgp.maintenance_flag {
            slots = slots.saturating_add(skip_slots);
        }
        Ok(head_slot_time.saturating_add_seconds(slots.saturating_mul(interval)))
    }

    /// The slot number that `when` falls into, relative to head; 0 if it is
    /// at or before the head block's slot.
    pub fn get_slot_at_time(&self, when: BlockTimestamp) -> ChainResult<u32> {
        let first_slot_time = self.get_slot_time(1)?;
        if when < first_slot_time {
            return Ok(0);
        }
        let interval = self.block_interval()?;
        Ok(when.seconds_since(first_slot_time) / interval + 1)
    }

    /// The validator scheduled to produce at future slot `slot_num`.
    pub fn get_scheduled_producer(&self, slot_num: u32) -> ChainResult<ValidatorId> {
        let dgp = self.dynamic_global_properties()?;
        let schedule = self.producer_schedule()?;
        let shuffled = &schedule.current_shuffled_producers;
        if shuffled.is_empty() {
            return Err(ChainError::Corruption("producer schedule is empty".into()));
        }
        let aslot = dgp.current_aslot + u64::from(slot_num);
        Ok(shuffled[(aslot % shuffled.len() as u64) as usize])
    }

    /// Charge each producer scheduled for a slot strictly between the
    /// previous and current block that it did not fill, skipping slots that
    /// belonged to the block's actual producer. Charging is capped at one
    /// pass over the shuffled set.
    pub(crate) fn update_producer_missed_blocks(&mut self, block: &Block) -> ChainResult<u32> {
        let slot_num = self.get_slot_at_time(block.timestamp)?;
        if slot_num == 0 {
            return Err(ChainError::Block(format!(
                "timestamp {} is not a future slot",
                block.timestamp
            )));
        }
        let missed = slot_num - 1;
        let schedule_len = self.producer_schedule()?.current_shuffled_producers.len() as u32;
        if missed >= schedule_len {
            return Ok(missed);
        }
        for slot in 1..=missed {
            let scheduled = self.get_scheduled_producer(slot)?;
            if scheduled != block.producer {
                self.store
                    .modify::<ValidatorObject>(scheduled.0, |v| v.total_missed += 1)?;
            }
        }
        Ok(missed)
    }

    /// Re-shuffle the producer order from the active validator set. Runs
    /// only when the head block number is an exact multiple of the active
    /// set size, so each epoch's order holds for one full rotation.
    pub(crate) fn update_producer_schedule(&mut self) -> ChainResult<()> {
        let gp = self.global_properties()?;
        let active = gp.active_validators.clone();
        if active.is_empty() {
            return Err(ChainError::Corruption("active validator set is empty".into()));
        }
        let dgp = self.dynamic_global_properties()?;
        if u64::from(dgp.head_block_number) % active.len() as u64 != 0 {
            return Ok(());
        }
        let head_time = dgp.head_block_time;
        let mut shuffled = active;
        shuffle_producers(&mut shuffled, head_time);
        self.store.modify::<ProducerScheduleObject>(0, |s| {
            s.current_shuffled_producers = shuffled;
        })?;
        Ok(())
    }

    /// Fraction of the last 128 slots that were filled, in basis points of
    /// [`CHAIN_100_PERCENT`].
    pub fn producer_participation_rate(&self) -> ChainResult<u32> {
        let dgp = self.store.get::<DynamicGlobalPropertyObject>(0)?;
        Ok(dgp.recent_slots_filled.count_ones() * CHAIN_100_PERCENT / PARTICIPATION_SLOTS)
    }
}
