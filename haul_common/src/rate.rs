use std::{fmt::Display, ops::Add};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::{op, Won};

/// 100% expressed in basis points.
pub const BASIS_POINTS_PER_UNIT: i64 = 10_000;

//--------------------------------------        Rate         ---------------------------------------------------------
/// A commission rate in basis points (1/100th of a percent). `Rate::from_bps(1000)` is 10%.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Rate(i64);

op!(binary Rate, Add, add);

#[derive(Debug, Clone, Error)]
#[error("Invalid commission rate: {0}")]
pub struct RateConversionError(String);

impl Rate {
    pub const fn from_bps(bps: i64) -> Self {
        Self(bps)
    }

    pub fn from_percent(percent: i64) -> Self {
        Self(percent * 100)
    }

    /// Like [`Rate::from_bps`], but rejects values outside 0..=100%.
    pub fn try_from_bps(bps: i64) -> Result<Self, RateConversionError> {
        if (0..=BASIS_POINTS_PER_UNIT).contains(&bps) {
            Ok(Self(bps))
        } else {
            Err(RateConversionError(format!("{bps} bps is outside the range 0..={BASIS_POINTS_PER_UNIT}")))
        }
    }

    pub fn bps(&self) -> i64 {
        self.0
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    /// The share of `amount` this rate represents, rounded half away from zero to the nearest minor unit.
    pub fn share_of(&self, amount: Won) -> Won {
        let scaled = i128::from(amount.value()) * i128::from(self.0);
        let divisor = i128::from(BASIS_POINTS_PER_UNIT);
        let half = divisor / 2;
        let rounded = if scaled >= 0 { (scaled + half) / divisor } else { (scaled - half) / divisor };
        Won::from(i64::try_from(rounded).unwrap_or(if rounded > 0 { i64::MAX } else { i64::MIN }))
    }
}

impl Display for Rate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, (self.0 % 100).abs())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn share_rounds_half_away_from_zero() {
        let ten_percent = Rate::from_percent(10);
        assert_eq!(ten_percent.share_of(Won::from(18_000)), Won::from(1_800));
        assert_eq!(ten_percent.share_of(Won::from(18_005)), Won::from(1_801));
        assert_eq!(ten_percent.share_of(Won::from(18_004)), Won::from(1_800));
        assert_eq!(ten_percent.share_of(Won::from(-15)), Won::from(-2));
        assert_eq!(Rate::zero().share_of(Won::from(99_999)), Won::zero());
    }

    #[test]
    fn bounds_and_display() {
        assert!(Rate::try_from_bps(-1).is_err());
        assert!(Rate::try_from_bps(10_001).is_err());
        assert_eq!(Rate::try_from_bps(1250).unwrap().to_string(), "12.50%");
        assert_eq!((Rate::from_percent(8) + Rate::from_bps(250)).bps(), 1050);
    }
}
