use meridian_types::{AssetAmount, Price, Share};
use serde::{Deserialize, Serialize};

use crate::error::{ChainError, ChainResult};
use crate::objects::CHAIN_100_PERCENT;
use crate::operations::{Operation, OPERATION_COUNT};

/// Fee pricing inputs for one operation type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeParameters {
    /// Flat core-asset fee.
    pub fee: u64,
    /// Additional core-asset fee per kilobyte of packed operation size.
    pub price_per_kbyte: u32,
}

impl Default for FeeParameters {
    fn default() -> Self {
        Self {
            fee: 20,
            price_per_kbyte: 10,
        }
    }
}

/// Iteration cap for [`FeeSchedule::set_fee`]. Writing a fee into an
/// operation changes its packed size and therefore its size-dependent fee;
/// the loop re-prices until the fee stops growing or this cap is hit. The
/// cap is a deliberate, compatibility-critical approximation: adversarial
/// exchange rates may never reach a true fixed point.
pub const MAX_FEE_STABILIZATION_ITERATION: usize = 4;

/// Per-operation-type fee parameters plus a global scale, indexed by
/// operation tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    parameters: Vec<FeeParameters>,
    /// Basis-point multiplier applied to every computed fee.
    scale: u32,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            parameters: vec![FeeParameters::default(); OPERATION_COUNT],
            scale: CHAIN_100_PERCENT,
        }
    }
}

impl FeeSchedule {
    pub fn new(parameters: Vec<FeeParameters>, scale: u32) -> Self {
        Self { parameters, scale }
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    fn parameters_for(&self, op: &Operation) -> FeeParameters {
        self.parameters
            .get(op.tag() as usize)
            .copied()
            .unwrap_or_default()
    }

    /// The required fee in core asset: flat fee plus the byte fee on the
    /// operation's packed size, scaled.
    pub fn calculate_fee_core(&self, op: &Operation) -> ChainResult<Share> {
        if op.is_virtual() {
            return Ok(Share::zero());
        }
        let params = self.parameters_for(op);
        let packed_len = bincode::serialized_size(op)
            .map_err(|e| ChainError::Validation(format!("operation is not packable: {e}")))?;
        let byte_fee =
            (u64::from(params.price_per_kbyte) as u128 * packed_len as u128) / 1024;
        let base = params.fee as u128 + byte_fee;
        let scaled = base * self.scale as u128 / CHAIN_100_PERCENT as u128;
        if scaled > i64::MAX as u128 {
            return Err(ChainError::Validation(format!(
                "calculated fee {scaled} overflows the share type"
            )));
        }
        Ok(Share(scaled as i64))
    }

    /// The required fee converted into the fee-paying asset at
    /// `core_exchange_rate`, rounded against the payer.
    pub fn calculate_fee(
        &self,
        op: &Operation,
        core_exchange_rate: &Price,
    ) -> ChainResult<AssetAmount> {
        let core = AssetAmount::new(self.calculate_fee_core(op)?, meridian_types::AssetId::CORE);
        if core.amount.is_zero() {
            return Ok(core);
        }
        Ok(core_exchange_rate.multiply_and_round_up(core)?)
    }

    /// Write the required fee into `op`, re-pricing until the fee stabilizes
    /// or [`MAX_FEE_STABILIZATION_ITERATION`] passes have run. Returns the
    /// final fee, which never undershoots any intermediate pricing.
    pub fn set_fee(&self, op: &mut Operation, core_exchange_rate: &Price) -> ChainResult<AssetAmount> {
        let mut fee = self.calculate_fee(op, core_exchange_rate)?;
        let mut max_fee = fee;
        for iteration in 0..MAX_FEE_STABILIZATION_ITERATION {
            op.set_fee(max_fee);
            let repriced = self.calculate_fee(op, core_exchange_rate)?;
            if repriced == fee {
                break;
            }
            if repriced.amount > max_fee.amount {
                max_fee = repriced;
            }
            fee = repriced;
            if iteration == 0 {
                tracing::warn!(
                    tag = op.tag(),
                    "fee requires multiple stabilization iterations"
                );
            }
        }
        op.set_fee(max_fee);
        Ok(max_fee)
    }
}
