use std::fmt;
use std::ops::Neg;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Hard cap on any single amount; also bounds scaled fee computations.
pub const MAX_SHARE_SUPPLY: i64 = 1_000_000_000_000_000;

/// A signed ledger amount in an asset's smallest unit.
///
/// All arithmetic is checked; overflow is a [`TypeError`], never a wrap.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Share(pub i64);

impl Share {
    pub const fn zero() -> Self {
        Self(0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Share) -> Result<Share, TypeError> {
        self.0
            .checked_add(other.0)
            .map(Share)
            .ok_or_else(|| TypeError::AmountOutOfRange(format!("{} + {}", self.0, other.0)))
    }

    pub fn checked_sub(self, other: Share) -> Result<Share, TypeError> {
        self.0
            .checked_sub(other.0)
            .map(Share)
            .ok_or_else(|| TypeError::AmountOutOfRange(format!("{} - {}", self.0, other.0)))
    }
}

impl From<i64> for Share {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

impl Neg for Share {
    type Output = Share;
    fn neg(self) -> Share {
        Share(-self.0)
    }
}

impl fmt::Display for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifies an asset. The core asset is always id 0.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize,
)]
pub struct AssetId(pub u64);

impl AssetId {
    pub const CORE: AssetId = AssetId(0);

    pub fn is_core(&self) -> bool {
        *self == Self::CORE
    }
}

/// An amount of a specific asset.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct AssetAmount {
    pub amount: Share,
    pub asset_id: AssetId,
}

impl AssetAmount {
    pub const fn new(amount: Share, asset_id: AssetId) -> Self {
        Self { amount, asset_id }
    }

    /// An amount of the core asset.
    pub fn core(amount: i64) -> Self {
        Self::new(Share(amount), AssetId::CORE)
    }
}

/// An exchange rate between two assets, expressed as base per quote.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Price {
    pub base: AssetAmount,
    pub quote: AssetAmount,
}

impl Price {
    pub fn new(base: AssetAmount, quote: AssetAmount) -> Self {
        Self { base, quote }
    }

    /// The identity rate on the core asset: fees stay in core unchanged.
    pub fn core_unit() -> Self {
        Self::new(AssetAmount::core(1), AssetAmount::core(1))
    }

    /// Convert `amount` across this price, rounding in favor of the receiver
    /// of the converted value. Used for fee pricing so a converted fee can
    /// never undershoot the required core fee.
    pub fn multiply_and_round_up(&self, amount: AssetAmount) -> Result<AssetAmount, TypeError> {
        let (from, to) = if amount.asset_id == self.base.asset_id {
            (&self.base, &self.quote)
        } else if amount.asset_id == self.quote.asset_id {
            (&self.quote, &self.base)
        } else {
            return Err(TypeError::IncompatibleAsset(amount.asset_id.0));
        };
        if from.amount.0 <= 0 || to.amount.0 <= 0 {
            return Err(TypeError::ZeroPrice);
        }

        let numerator = amount.amount.0 as i128 * to.amount.0 as i128;
        let denominator = from.amount.0 as i128;
        let converted = (numerator + denominator - 1) / denominator;
        if converted > MAX_SHARE_SUPPLY as i128 || converted < 0 {
            return Err(TypeError::AmountOutOfRange(converted.to_string()));
        }
        Ok(AssetAmount::new(Share(converted as i64), to.asset_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_add_and_sub() {
        let a = Share(10);
        assert_eq!(a.checked_add(Share(5)).unwrap(), Share(15));
        assert_eq!(a.checked_sub(Share(15)).unwrap(), Share(-5));
    }

    #[test]
    fn overflow_is_an_error() {
        assert!(Share(i64::MAX).checked_add(Share(1)).is_err());
        assert!(Share(i64::MIN).checked_sub(Share(1)).is_err());
    }

    #[test]
    fn core_asset_is_zero() {
        assert!(AssetId::CORE.is_core());
        assert!(!AssetId(3).is_core());
        assert_eq!(AssetAmount::core(7).asset_id, AssetId::CORE);
    }

    #[test]
    fn unit_price_is_identity() {
        let rate = Price::core_unit();
        let fee = AssetAmount::core(123);
        assert_eq!(rate.multiply_and_round_up(fee).unwrap(), fee);
    }

    #[test]
    fn conversion_rounds_up() {
        // 3 base units buy 2 quote units: converting 1 base must cost a
        // full quote unit, never zero.
        let rate = Price::new(
            AssetAmount::new(Share(3), AssetId::CORE),
            AssetAmount::new(Share(2), AssetId(1)),
        );
        let converted = rate.multiply_and_round_up(AssetAmount::core(1)).unwrap();
        assert_eq!(converted, AssetAmount::new(Share(1), AssetId(1)));

        let converted = rate.multiply_and_round_up(AssetAmount::core(3)).unwrap();
        assert_eq!(converted, AssetAmount::new(Share(2), AssetId(1)));
    }

    #[test]
    fn conversion_rejects_unrelated_asset() {
        let rate = Price::core_unit();
        let err = rate
            .multiply_and_round_up(AssetAmount::new(Share(1), AssetId(9)))
            .unwrap_err();
        assert_eq!(err, TypeError::IncompatibleAsset(9));
    }

    #[test]
    fn conversion_respects_max_supply() {
        let rate = Price::new(
            AssetAmount::core(1),
            AssetAmount::new(Share(MAX_SHARE_SUPPLY), AssetId(1)),
        );
        assert!(rate.multiply_and_round_up(AssetAmount::core(2)).is_err());
    }
}
