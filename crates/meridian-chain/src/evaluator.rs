use meridian_store::ObjectDatabase;
use meridian_types::{AccountId, Share};

use crate::error::{ChainError, ChainResult};
use crate::objects::{AccountObject, AccountStatisticsObject};
use crate::operations::{Operation, OperationResult};

/// State handed to an evaluator for the duration of one operation.
///
/// `fee` is the core fee the framework calculated for this operation before
/// `do_evaluate` ran; evaluators that check balances must account for it,
/// since it is deducted from the payer before `do_apply`.
pub struct EvalContext<'a> {
    pub db: &'a mut ObjectDatabase,
    pub fee: Share,
}

/// One operation type's validation and application logic.
///
/// A fresh evaluator instance is constructed per operation, so scratch
/// fields resolved during `do_evaluate` (payer references, looked-up ids)
/// are naturally scoped to that one operation and can never leak into the
/// next.
pub trait Evaluator: Send {
    /// Read-only checks against current state. Must not mutate any store.
    fn do_evaluate(&mut self, ctx: &mut EvalContext<'_>, op: &Operation) -> ChainResult<()>;

    /// Perform the state mutation. Runs only after `do_evaluate` and the fee
    /// deduction succeeded.
    fn do_apply(&mut self, ctx: &mut EvalContext<'_>, op: &Operation)
        -> ChainResult<OperationResult>;

    /// Route the fee out of the payer's balance. The default credits the
    /// payer's statistics `pending_fees` accumulator, which the maintenance
    /// pass later sweeps into the chain-wide fee pool.
    fn pay_fee(&mut self, ctx: &mut EvalContext<'_>, payer: AccountId) -> ChainResult<()> {
        let fee = ctx.fee;
        if fee.is_zero() {
            return Ok(());
        }
        let stats_id = ctx.db.get::<AccountObject>(payer.0)?.statistics;
        let stats = ctx.db.get::<AccountStatisticsObject>(stats_id.0)?;
        let balance = stats.core_balance.checked_sub(fee)?;
        let pending = stats.pending_fees.checked_add(fee)?;
        let lifetime = stats.lifetime_fees_paid.checked_add(fee)?;
        ctx.db.modify::<AccountStatisticsObject>(stats_id.0, |s| {
            s.core_balance = balance;
            s.pending_fees = pending;
            s.lifetime_fees_paid = lifetime;
        })?;
        Ok(())
    }
}

type EvaluatorFactory = Box<dyn Fn() -> Box<dyn Evaluator> + Send + Sync>;

/// Fixed dispatch-table ceiling. Operation tags are a dense enumeration
/// capped well below this.
pub const EVALUATOR_TABLE_CAPACITY: usize = 16;

/// Dispatch table from operation tag to evaluator factory.
///
/// Registration happens once at initialization; a duplicate registration is
/// a programming error surfaced there, never per-operation.
pub struct EvaluatorRegistry {
    slots: Vec<Option<EvaluatorFactory>>,
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        Self {
            slots: (0..EVALUATOR_TABLE_CAPACITY).map(|_| None).collect(),
        }
    }
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `E` as the evaluator for `tag`.
    pub fn register<E>(&mut self, tag: u8) -> ChainResult<()>
    where
        E: Evaluator + Default + 'static,
    {
        let idx = tag as usize;
        if idx >= EVALUATOR_TABLE_CAPACITY {
            return Err(ChainError::TagOutOfRange(tag, EVALUATOR_TABLE_CAPACITY));
        }
        if self.slots[idx].is_some() {
            return Err(ChainError::DuplicateEvaluator(tag));
        }
        self.slots[idx] = Some(Box::new(|| Box::new(E::default())));
        Ok(())
    }

    /// A fresh evaluator for `tag`.
    pub fn instantiate(&self, tag: u8) -> ChainResult<Box<dyn Evaluator>> {
        self.slots
            .get(tag as usize)
            .and_then(|slot| slot.as_ref())
            .map(|factory| factory())
            .ok_or(ChainError::MissingEvaluator(tag))
    }

    /// Verify every tag in `0..count` has an evaluator. Called before the
    /// first block is processed.
    pub fn ensure_complete(&self, count: usize) -> ChainResult<()> {
        for tag in 0..count {
            if self.slots.get(tag).map_or(true, |s| s.is_none()) {
                return Err(ChainError::MissingEvaluator(tag as u8));
            }
        }
        Ok(())
    }
}

/// Run one operation through the full evaluator pipeline: price the fee,
/// verify the payer covers it, validate, deduct the fee, apply.
///
/// Any `Err` leaves partial effects behind only within the enclosing undo
/// session; the caller reverts that session on failure.
pub fn apply_operation(
    db: &mut ObjectDatabase,
    registry: &EvaluatorRegistry,
    op: &Operation,
) -> ChainResult<OperationResult> {
    let mut evaluator = registry.instantiate(op.tag())?;
    let payer = op.fee_payer();

    let fee = {
        let gp = crate::database::global_properties(db)?;
        gp.parameters.current_fees.calculate_fee_core(op)?
    };

    if !fee.is_zero() {
        let stats_id = db.get::<AccountObject>(payer.0)?.statistics;
        let stats = db.get::<AccountStatisticsObject>(stats_id.0)?;
        if stats.core_balance < fee {
            return Err(ChainError::Validation(format!(
                "account {payer} balance {} cannot cover fee {fee}",
                stats.core_balance
            )));
        }
    }

    let mut ctx = EvalContext { db, fee };
    evaluator.do_evaluate(&mut ctx, op)?;
    evaluator.pay_fee(&mut ctx, payer)?;
    evaluator.do_apply(&mut ctx, op)
}
