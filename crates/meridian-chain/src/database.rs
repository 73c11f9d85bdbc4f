use meridian_store::ObjectDatabase;
use meridian_types::BlockTimestamp;

use crate::error::{ChainError, ChainResult};
use crate::evaluator::{self, EvaluatorRegistry};
use crate::evaluators::{
    AccountCreateEvaluator, ProducerRewardEvaluator, TransferEvaluator, ValidatorCreateEvaluator,
    ValidatorUpdateEvaluator,
};
use crate::genesis::{self, GenesisState};
use crate::indexes::AccountNameIndex;
use crate::maintenance;
use crate::objects::{
    AccountObject, AccountStatisticsObject, DynamicGlobalPropertyObject, GlobalPropertyObject,
    ProducerScheduleObject, ValidatorObject,
};
use crate::operations::{Block, Operation, OperationResult, Transaction, OPERATION_COUNT};

/// The global-properties singleton. Exists from genesis on (instance 0).
pub fn global_properties(db: &ObjectDatabase) -> ChainResult<&GlobalPropertyObject> {
    Ok(db.get::<GlobalPropertyObject>(0)?)
}

/// The dynamic-globals singleton.
pub fn dynamic_global_properties(db: &ObjectDatabase) -> ChainResult<&DynamicGlobalPropertyObject> {
    Ok(db.get::<DynamicGlobalPropertyObject>(0)?)
}

/// The producer-schedule singleton.
pub fn producer_schedule(db: &ObjectDatabase) -> ChainResult<&ProducerScheduleObject> {
    Ok(db.get::<ProducerScheduleObject>(0)?)
}

type AppliedBlockObserver = Box<dyn FnMut(&Block, u32) + Send>;

/// The chain state machine: the object store, the evaluator dispatch table,
/// and block application.
///
/// Single-threaded and fully deterministic. Two databases fed the same
/// genesis and the same block sequence hold byte-identical state.
pub struct Database {
    pub(crate) store: ObjectDatabase,
    registry: EvaluatorRegistry,
    applied_block_observers: Vec<AppliedBlockObserver>,
    /// A speculative session holding pending transactions is open.
    pending_open: bool,
}

impl Database {
    /// Build a chain database from genesis: registers every index and
    /// evaluator, then populates initial state with undo capture disabled.
    pub fn open(genesis: GenesisState) -> ChainResult<Self> {
        let mut store = ObjectDatabase::new();
        store.register_index::<AccountObject>()?;
        store.register_index::<AccountStatisticsObject>()?;
        store.register_index::<ValidatorObject>()?;
        store.register_index::<GlobalPropertyObject>()?;
        store.register_index::<DynamicGlobalPropertyObject>()?;
        store.register_index::<ProducerScheduleObject>()?;
        store.attach_secondary::<AccountObject>(Box::new(AccountNameIndex::default()))?;

        let mut registry = EvaluatorRegistry::new();
        registry.register::<TransferEvaluator>(0)?;
        registry.register::<AccountCreateEvaluator>(1)?;
        registry.register::<ValidatorCreateEvaluator>(2)?;
        registry.register::<ValidatorUpdateEvaluator>(3)?;
        registry.register::<ProducerRewardEvaluator>(4)?;
        registry.ensure_complete(OPERATION_COUNT)?;

        genesis::initialize(&mut store, &genesis)?;
        let max_depth = global_properties(&store)?.parameters.maximum_undo_depth;
        store.set_max_undo_size(max_depth as usize);

        Ok(Self {
            store,
            registry,
            applied_block_observers: Vec::new(),
            pending_open: false,
        })
    }

    pub fn store(&self) -> &ObjectDatabase {
        &self.store
    }

    pub fn global_properties(&self) -> ChainResult<&GlobalPropertyObject> {
        global_properties(&self.store)
    }

    pub fn dynamic_global_properties(&self) -> ChainResult<&DynamicGlobalPropertyObject> {
        dynamic_global_properties(&self.store)
    }

    pub fn producer_schedule(&self) -> ChainResult<&ProducerScheduleObject> {
        producer_schedule(&self.store)
    }

    pub fn head_block_num(&self) -> ChainResult<u32> {
        Ok(self.dynamic_global_properties()?.head_block_number)
    }

    pub fn head_block_time(&self) -> ChainResult<BlockTimestamp> {
        Ok(self.dynamic_global_properties()?.head_block_time)
    }

    pub fn block_interval(&self) -> ChainResult<u32> {
        Ok(u32::from(self.global_properties()?.parameters.block_interval))
    }

    /// The highest block number that can no longer be rolled back. In-flight
    /// speculative sessions occupy the undo stack without corresponding to
    /// committed blocks, so they are subtracted from the raw depth.
    pub fn last_non_undoable_block_num(&self) -> ChainResult<u32> {
        let head = self.head_block_num()?;
        let reversible = self.store.undo_size() as u32 - self.store.active_sessions();
        Ok(head.saturating_sub(reversible))
    }

    /// Subscribe to successfully applied blocks. Fires after the block's
    /// session is committed, never for a reverted block, with the block and
    /// its number.
    pub fn subscribe_applied_block(
        &mut self,
        observer: impl FnMut(&Block, u32) + Send + 'static,
    ) {
        self.applied_block_observers.push(Box::new(observer));
    }

    /// Revert any speculative pending-transaction state.
    pub fn clear_pending(&mut self) -> ChainResult<()> {
        if self.pending_open {
            self.pending_open = false;
            self.store.undo_active_session()?;
        }
        Ok(())
    }

    /// Speculatively apply a transaction on top of head plus earlier pending
    /// transactions. A rejected transaction leaves no trace; an accepted one
    /// stays visible in pending state until the next block or
    /// [`clear_pending`](Self::clear_pending).
    pub fn push_transaction(&mut self, tx: &Transaction) -> ChainResult<Vec<OperationResult>> {
        if !self.pending_open {
            self.store.start_session()?;
            self.pending_open = true;
        }
        self.store.start_session()?;
        match self.apply_transaction(tx) {
            Ok(results) => {
                self.store.merge_session()?;
                Ok(results)
            }
            Err(err) => {
                self.store.undo_active_session()?;
                Err(err)
            }
        }
    }

    /// Apply a produced block. The whole block is one undo session: a
    /// transaction failure rejects the block and reverts everything. On
    /// success the session is committed and applied-block observers fire.
    pub fn push_block(&mut self, block: &Block) -> ChainResult<u32> {
        self.clear_pending()?;
        self.store.start_session()?;
        match self.apply_block(block) {
            Ok(block_num) => {
                self.store.commit_session()?;
                tracing::debug!(
                    block_num,
                    producer = %block.producer,
                    transactions = block.transactions.len(),
                    "block applied"
                );
                for observer in &mut self.applied_block_observers {
                    observer(block, block_num);
                }
                Ok(block_num)
            }
            Err(err) => {
                self.store.undo_active_session()?;
                Err(err)
            }
        }
    }

    fn apply_block(&mut self, block: &Block) -> ChainResult<u32> {
        let interval = self.block_interval()?;
        let head_time = self.head_block_time()?;

        if block.timestamp <= head_time {
            return Err(ChainError::Block(format!(
                "timestamp {} not after head {head_time}",
                block.timestamp
            )));
        }
        if block.timestamp.seconds() % interval != 0 {
            return Err(ChainError::Block(format!(
                "timestamp {} not aligned to the {interval}s interval",
                block.timestamp
            )));
        }
        let slot_num = self.get_slot_at_time(block.timestamp)?;
        if slot_num == 0 {
            return Err(ChainError::Block(format!(
                "timestamp {} is before the next production slot",
                block.timestamp
            )));
        }
        let scheduled = self.get_scheduled_producer(slot_num)?;
        if scheduled != block.producer {
            return Err(ChainError::Block(format!(
                "slot belongs to {scheduled}, block produced by {}",
                block.producer
            )));
        }

        self.update_producer_missed_blocks(block)?;

        for tx in &block.transactions {
            self.store.start_session()?;
            match self.apply_transaction(tx) {
                Ok(_) => self.store.merge_session()?,
                Err(err) => {
                    self.store.undo_active_session()?;
                    return Err(err);
                }
            }
        }

        self.update_global_dynamics(block, slot_num)?;

        let next_maintenance = self.dynamic_global_properties()?.next_maintenance_time;
        if block.timestamp >= next_maintenance {
            maintenance::perform_maintenance(self, block)?;
        }

        self.update_producer_schedule()?;
        self.head_block_num()
    }

    /// Apply each operation of `tx` in order. Called inside a session owned
    /// by the caller.
    fn apply_transaction(&mut self, tx: &Transaction) -> ChainResult<Vec<OperationResult>> {
        if tx.operations.is_empty() {
            return Err(ChainError::Validation("transaction has no operations".into()));
        }
        let mut results = Vec::with_capacity(tx.operations.len());
        for op in &tx.operations {
            results.push(self.apply_operation(op)?);
        }
        Ok(results)
    }

    fn apply_operation(&mut self, op: &Operation) -> ChainResult<OperationResult> {
        evaluator::apply_operation(&mut self.store, &self.registry, op)
    }

    /// Advance head state for an applied block: head number and time, the
    /// producer, the absolute slot, and the participation bitmap (one bit
    /// per elapsed slot, set only for the produced one).
    fn update_global_dynamics(&mut self, block: &Block, slot_num: u32) -> ChainResult<()> {
        let missed = slot_num - 1;
        let prior = self.dynamic_global_properties()?.recent_slots_filled;
        let filled = if missed < 127 {
            ((prior << missed) << 1) | 1
        } else {
            1
        };
        self.store.modify::<DynamicGlobalPropertyObject>(0, |d| {
            d.head_block_number += 1;
            d.head_block_time = block.timestamp;
            d.current_producer = block.producer;
            d.current_aslot += u64::from(slot_num);
            d.recent_slots_filled = filled;
            d.maintenance_flag = false;
        })?;
        Ok(())
    }
}
