// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt::Display;
use std::fmt::Formatter;

use rusqlite::ToSql;
use rusqlite::types::FromSql;
use rusqlite::types::FromSqlError;
use rusqlite::types::FromSqlResult;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::ValueRef;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de::Error as _;

use crate::error::ErrorReport;
use crate::error::Fallible;

const SCALE: u32 = 1000;

/// A non-negative decimal with three fractional digits, stored as an integer
/// count of thousandths. Repeated ease adjustments stay exact.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Factor(u32);

impl Factor {
    pub const ONE: Factor = Factor(SCALE);

    pub const fn from_milli(milli: u32) -> Self {
        Self(milli)
    }

    pub const fn milli(self) -> u32 {
        self.0
    }

    /// Rounds half-up to the nearest thousandth.
    pub fn from_f64(value: f64) -> Fallible<Self> {
        if !value.is_finite() || value < 0.0 {
            return Err(ErrorReport::new(format!("invalid decimal: {value}")));
        }
        let milli = (value * f64::from(SCALE) + 0.5).floor();
        if milli > f64::from(u32::MAX) {
            return Err(ErrorReport::new(format!("decimal out of range: {value}")));
        }
        Ok(Self(milli as u32))
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / f64::from(SCALE)
    }

    pub fn saturating_add(self, other: Factor) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Factor) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    pub fn clamp(self, min: Factor, max: Factor) -> Self {
        Self(self.0.clamp(min.0, max.0))
    }
}

/// Multiplies a whole number of days by a chain of factors, rounding the
/// product half-up to a whole day.
pub fn scale_days(days: u32, factors: &[Factor]) -> u32 {
    let mut numerator: u128 = u128::from(days);
    let mut denominator: u128 = 1;
    for factor in factors {
        numerator *= u128::from(factor.0);
        denominator *= u128::from(SCALE);
    }
    let rounded = (numerator + denominator / 2) / denominator;
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

impl Display for Factor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:03}", self.0 / SCALE, self.0 % SCALE)
    }
}

impl Serialize for Factor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Factor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Factor::from_f64(value).map_err(|e| D::Error::custom(e.to_string()))
    }
}

impl ToSql for Factor {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for Factor {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let milli: i64 = FromSql::column_result(value)?;
        u32::try_from(milli)
            .map(Factor)
            .map_err(|_| FromSqlError::OutOfRange(milli))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_f64() -> Fallible<()> {
        assert_eq!(Factor::from_f64(2.5)?, Factor::from_milli(2500));
        assert_eq!(Factor::from_f64(1.3)?, Factor::from_milli(1300));
        assert_eq!(Factor::from_f64(0.0)?, Factor::from_milli(0));
        assert!(Factor::from_f64(-0.1).is_err());
        assert!(Factor::from_f64(f64::NAN).is_err());
        Ok(())
    }

    #[test]
    fn test_display() {
        assert_eq!(Factor::from_milli(2500).to_string(), "2.500");
        assert_eq!(Factor::from_milli(15).to_string(), "0.015");
    }

    #[test]
    fn test_repeated_steps_are_exact() {
        let step = Factor::from_milli(150);
        let mut ease = Factor::from_milli(2500);
        for _ in 0..1000 {
            ease = ease.saturating_add(step);
        }
        for _ in 0..1000 {
            ease = ease.saturating_sub(step);
        }
        assert_eq!(ease, Factor::from_milli(2500));
    }

    #[test]
    fn test_scale_days_rounds_half_up() {
        assert_eq!(scale_days(1, &[Factor::from_milli(2500)]), 3);
        assert_eq!(scale_days(1, &[Factor::from_milli(2499)]), 2);
        assert_eq!(scale_days(10, &[Factor::from_milli(2500), Factor::ONE]), 25);
        let factors = [Factor::from_milli(2650), Factor::ONE, Factor::from_milli(1300)];
        assert_eq!(scale_days(3, &factors), 10);
        assert_eq!(scale_days(10, &[Factor::from_milli(0)]), 0);
        assert_eq!(scale_days(7, &[]), 7);
    }

    #[test]
    fn test_serde() -> Fallible<()> {
        let json = serde_json::to_string(&Factor::from_milli(1300))?;
        assert_eq!(json, "1.3");
        let back: Factor = serde_json::from_str("1.3")?;
        assert_eq!(back, Factor::from_milli(1300));
        assert!(serde_json::from_str::<Factor>("-1.0").is_err());
        Ok(())
    }
}
