use meridian_types::{AccountId, AccountStatisticsId, ObjectClass, Share};

use crate::error::{ensure, ChainError, ChainResult};
use crate::evaluator::{EvalContext, Evaluator};
use crate::indexes::AccountNameIndex;
use crate::objects::{
    AccountObject, AccountStatisticsObject, GlobalPropertyObject, ValidatorObject,
};
use crate::operations::{Operation, OperationResult};

/// Account names: 1-63 chars, lowercase ascii letters, digits and hyphens,
/// starting with a letter, no trailing or doubled hyphen.
pub fn is_valid_account_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 63 {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    let mut prev_hyphen = false;
    for c in name.chars().skip(1) {
        match c {
            'a'..='z' | '0'..='9' => prev_hyphen = false,
            '-' if !prev_hyphen => prev_hyphen = true,
            _ => return false,
        }
    }
    !name.ends_with('-')
}

/// Compressed public key length in bytes, hex-encoded in operations.
const SIGNING_KEY_LEN: usize = 33;

/// Signing keys travel as hex strings; they must decode to a compressed
/// public key.
pub fn is_valid_signing_key(key: &str) -> bool {
    matches!(hex::decode(key), Ok(bytes) if bytes.len() == SIGNING_KEY_LEN)
}

fn wrong_operation(expected: &str, op: &Operation) -> ChainError {
    ChainError::Corruption(format!(
        "{expected} evaluator dispatched for operation tag {}",
        op.tag()
    ))
}

/// Moves core asset between two existing accounts.
#[derive(Default)]
pub struct TransferEvaluator {
    from_statistics: Option<AccountStatisticsId>,
    to_statistics: Option<AccountStatisticsId>,
}

impl Evaluator for TransferEvaluator {
    fn do_evaluate(&mut self, ctx: &mut EvalContext<'_>, op: &Operation) -> ChainResult<()> {
        let Operation::Transfer(op) = op else {
            return Err(wrong_operation("transfer", op));
        };
        ensure!(
            op.amount.asset_id.is_core(),
            "only the core asset is transferable, got asset {}",
            op.amount.asset_id.0
        );
        ensure!(
            op.amount.amount > Share::zero(),
            "transfer amount must be positive, got {}",
            op.amount.amount
        );
        ensure!(op.from != op.to, "transfer from an account to itself");

        let from_stats_id = ctx.db.get::<AccountObject>(op.from.0)?.statistics;
        let to_stats_id = ctx.db.get::<AccountObject>(op.to.0)?.statistics;

        let from_stats = ctx.db.get::<AccountStatisticsObject>(from_stats_id.0)?;
        let required = op.amount.amount.checked_add(ctx.fee)?;
        ensure!(
            from_stats.core_balance >= required,
            "account {} balance {} cannot cover transfer {} plus fee {}",
            op.from,
            from_stats.core_balance,
            op.amount.amount,
            ctx.fee
        );

        self.from_statistics = Some(from_stats_id);
        self.to_statistics = Some(to_stats_id);
        Ok(())
    }

    fn do_apply(
        &mut self,
        ctx: &mut EvalContext<'_>,
        op: &Operation,
    ) -> ChainResult<OperationResult> {
        let Operation::Transfer(op) = op else {
            return Err(wrong_operation("transfer", op));
        };
        let from_stats_id = self
            .from_statistics
            .ok_or_else(|| ChainError::Corruption("transfer applied without evaluation".into()))?;
        let to_stats_id = self
            .to_statistics
            .ok_or_else(|| ChainError::Corruption("transfer applied without evaluation".into()))?;

        let from_balance = ctx
            .db
            .get::<AccountStatisticsObject>(from_stats_id.0)?
            .core_balance
            .checked_sub(op.amount.amount)?;
        let to_balance = ctx
            .db
            .get::<AccountStatisticsObject>(to_stats_id.0)?
            .core_balance
            .checked_add(op.amount.amount)?;

        ctx.db
            .modify::<AccountStatisticsObject>(from_stats_id.0, |s| s.core_balance = from_balance)?;
        ctx.db
            .modify::<AccountStatisticsObject>(to_stats_id.0, |s| s.core_balance = to_balance)?;
        Ok(OperationResult::Void)
    }
}

/// Registers a new named account plus its statistics object.
#[derive(Default)]
pub struct AccountCreateEvaluator;

impl Evaluator for AccountCreateEvaluator {
    fn do_evaluate(&mut self, ctx: &mut EvalContext<'_>, op: &Operation) -> ChainResult<()> {
        let Operation::AccountCreate(op) = op else {
            return Err(wrong_operation("account create", op));
        };
        ensure!(
            is_valid_account_name(&op.name),
            "invalid account name {:?}",
            op.name
        );
        // registrar must exist
        ctx.db.get::<AccountObject>(op.registrar.0)?;

        let names = ctx
            .db
            .index::<AccountObject>()?
            .observer::<AccountNameIndex>()
            .ok_or_else(|| ChainError::Corruption("account name index not attached".into()))?;
        ensure!(
            names.find(&op.name).is_none(),
            "account name {:?} already exists",
            op.name
        );
        Ok(())
    }

    fn do_apply(
        &mut self,
        ctx: &mut EvalContext<'_>,
        op: &Operation,
    ) -> ChainResult<OperationResult> {
        let Operation::AccountCreate(op) = op else {
            return Err(wrong_operation("account create", op));
        };
        // the account's instance is allocated next; the statistics object
        // references it, and the account references the statistics back
        let account_instance = ctx.db.index::<AccountObject>()?.next_instance();
        let stats = ctx.db.create::<AccountStatisticsObject>(|s| {
            s.owner = AccountId(account_instance);
        })?;
        let account = ctx.db.create::<AccountObject>(|a| {
            a.name = op.name.clone();
            a.statistics = stats.id();
        })?;
        Ok(OperationResult::Object(account.object_id()))
    }
}

/// Promotes an existing account to validator, assigning the next vote id.
#[derive(Default)]
pub struct ValidatorCreateEvaluator;

impl Evaluator for ValidatorCreateEvaluator {
    fn do_evaluate(&mut self, ctx: &mut EvalContext<'_>, op: &Operation) -> ChainResult<()> {
        let Operation::ValidatorCreate(op) = op else {
            return Err(wrong_operation("validator create", op));
        };
        ctx.db.get::<AccountObject>(op.validator_account.0)?;
        ensure!(
            is_valid_signing_key(&op.signing_key),
            "signing key {:?} is not a hex-encoded compressed public key",
            op.signing_key
        );
        Ok(())
    }

    fn do_apply(
        &mut self,
        ctx: &mut EvalContext<'_>,
        op: &Operation,
    ) -> ChainResult<OperationResult> {
        let Operation::ValidatorCreate(op) = op else {
            return Err(wrong_operation("validator create", op));
        };
        let vote_id = ctx.db.get::<GlobalPropertyObject>(0)?.next_available_vote_id;
        ctx.db.modify::<GlobalPropertyObject>(0, |gp| {
            gp.next_available_vote_id += 1;
        })?;
        let validator = ctx.db.create::<ValidatorObject>(|v| {
            v.validator_account = op.validator_account;
            v.url = op.url.clone();
            v.signing_key = op.signing_key.clone();
            v.vote_id = vote_id;
        })?;
        Ok(OperationResult::Object(validator.object_id()))
    }
}

/// Updates a validator's url or signing key, owner-only.
#[derive(Default)]
pub struct ValidatorUpdateEvaluator;

impl Evaluator for ValidatorUpdateEvaluator {
    fn do_evaluate(&mut self, ctx: &mut EvalContext<'_>, op: &Operation) -> ChainResult<()> {
        let Operation::ValidatorUpdate(op) = op else {
            return Err(wrong_operation("validator update", op));
        };
        let validator = ctx.db.get::<ValidatorObject>(op.validator.0)?;
        ensure!(
            validator.validator_account == op.validator_account,
            "validator {} is not owned by account {}",
            op.validator,
            op.validator_account
        );
        if let Some(key) = &op.new_signing_key {
            ensure!(
                is_valid_signing_key(key),
                "signing key {key:?} is not a hex-encoded compressed public key"
            );
        }
        Ok(())
    }

    fn do_apply(
        &mut self,
        ctx: &mut EvalContext<'_>,
        op: &Operation,
    ) -> ChainResult<OperationResult> {
        let Operation::ValidatorUpdate(op) = op else {
            return Err(wrong_operation("validator update", op));
        };
        ctx.db.modify::<ValidatorObject>(op.validator.0, |v| {
            if let Some(url) = &op.new_url {
                v.url = url.clone();
            }
            if let Some(key) = &op.new_signing_key {
                v.signing_key = key.clone();
            }
        })?;
        Ok(OperationResult::Void)
    }
}

/// Tag slot for the virtual producer-reward operation. The chain emits it as
/// a record; a user submitting one is rejected here.
#[derive(Default)]
pub struct ProducerRewardEvaluator;

impl Evaluator for ProducerRewardEvaluator {
    fn do_evaluate(&mut self, _ctx: &mut EvalContext<'_>, _op: &Operation) -> ChainResult<()> {
        Err(ChainError::Validation(
            "virtual operation may not be submitted".into(),
        ))
    }

    fn do_apply(
        &mut self,
        _ctx: &mut EvalContext<'_>,
        _op: &Operation,
    ) -> ChainResult<OperationResult> {
        Err(ChainError::Validation(
            "virtual operation may not be applied directly".into(),
        ))
    }
}
