//! Calendar month keys (`"YYYY-MM"`) and per-month watch-time breakdowns.

use std::{borrow::Cow, collections::BTreeMap, fmt, str::FromStr};

use schemars::{JsonSchema, Schema, SchemaGenerator, json_schema};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PayoutError;

/// A calendar month. Orders chronologically and renders as a zero-padded
/// `"YYYY-MM"` string, which is also its serialized form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodMonth {
    year: i32,
    month: u32,
}

impl PeriodMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, PayoutError> {
        if !(1..=12).contains(&month) || !(0..=9999).contains(&year) {
            return Err(PayoutError::InvalidMonth(format!("{year}-{month}")));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for PeriodMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for PeriodMonth {
    type Err = PayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PayoutError::InvalidMonth(s.to_string());
        let bytes = s.as_bytes();
        if bytes.len() != 7 || bytes[4] != b'-' {
            return Err(invalid());
        }
        let (year, month) = (&s[..4], &s[5..]);
        if !year.bytes().chain(month.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

impl Serialize for PeriodMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PeriodMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for PeriodMonth {
    fn schema_name() -> Cow<'static, str> {
        "PeriodMonth".into()
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "type": "string",
            "pattern": "^[0-9]{4}-(0[1-9]|1[0-2])$",
        })
    }
}

/// Watch-time seconds per month, ordered chronologically.
///
/// When built from declared months the map is total: every declared month
/// appears, with `0` for months that had no statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct MonthlyBreakdown(BTreeMap<PeriodMonth, i64>);

impl MonthlyBreakdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, month: PeriodMonth, seconds: i64) {
        self.0.insert(month, seconds);
    }

    pub fn add(&mut self, month: PeriodMonth, seconds: i64) {
        *self.0.entry(month).or_insert(0) += seconds;
    }

    pub fn get(&self, month: &PeriodMonth) -> Option<i64> {
        self.0.get(month).copied()
    }

    pub fn total(&self) -> i64 {
        self.0.values().sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PeriodMonth, &i64)> {
        self.0.iter()
    }
}

impl FromIterator<(PeriodMonth, i64)> for MonthlyBreakdown {
    fn from_iter<T: IntoIterator<Item = (PeriodMonth, i64)>>(iter: T) -> Self {
        let mut breakdown = Self::new();
        for (month, seconds) in iter {
            breakdown.add(month, seconds);
        }
        breakdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let month: PeriodMonth = "2025-03".parse().unwrap();
        assert_eq!(month.year(), 2025);
        assert_eq!(month.month(), 3);
        assert_eq!(month.to_string(), "2025-03");
        assert_eq!(PeriodMonth::new(2024, 11).unwrap().to_string(), "2024-11");
    }

    #[test]
    fn test_rejects_malformed_months() {
        for raw in [
            "2025-3",
            "2025-13",
            "2025-00",
            "25-03",
            "2025/03",
            "abcd-ef",
            "2025-03-01",
            "",
        ] {
            assert!(raw.parse::<PeriodMonth>().is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn test_breakdown_serializes_as_string_keyed_object() {
        let breakdown: MonthlyBreakdown = [
            ("2025-11".parse().unwrap(), 7200),
            ("2025-10".parse().unwrap(), 3600),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_string(&breakdown).unwrap();
        assert_eq!(json, r#"{"2025-10":3600,"2025-11":7200}"#);

        let back: MonthlyBreakdown = serde_json::from_str(&json).unwrap();
        assert_eq!(back, breakdown);
        assert_eq!(back.total(), 10_800);
    }

    #[test]
    fn test_breakdown_add_accumulates() {
        let month: PeriodMonth = "2024-01".parse().unwrap();
        let mut breakdown = MonthlyBreakdown::new();
        breakdown.add(month, 10);
        breakdown.add(month, 5);
        assert_eq!(breakdown.get(&month), Some(15));
        assert_eq!(breakdown.len(), 1);
    }
}
