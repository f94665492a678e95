//! Plain data records consumed and produced by the engine.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::month::{MonthlyBreakdown, PeriodMonth};

/// External video library identifier (one library per teacher channel).
pub type LibraryId = i64;

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub id: i32,
    pub code: String,
    pub name: String,
    pub display_order: i32,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub id: i32,
    pub stage_id: i32,
    pub code: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: i32,
    pub code: String,
    pub name: String,
    /// Taught identically across every section of a stage.
    pub is_common: bool,
}

/// Binds a library to a (stage, section, subject) with its revenue terms.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct Assignment {
    pub id: i32,
    pub library_id: LibraryId,
    pub library_name: String,
    pub stage_id: i32,
    pub section_id: Option<i32>,
    pub subject_id: i32,
    pub tax_rate: f64,
    pub revenue_percentage: f64,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq, Eq)]
pub struct FinancialPeriod {
    pub id: i32,
    pub name: String,
    pub year: i32,
    /// Months whose statistics the period aggregates. Empty on legacy
    /// periods, which fall back to every month of `year`.
    #[serde(default)]
    pub months: Vec<PeriodMonth>,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct SectionRevenue {
    pub section_id: i32,
    pub total_orders: i64,
    pub total_revenue_egp: f64,
}

/// Historical statistics for one library in one calendar month.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct WatchStat {
    pub library_id: LibraryId,
    pub year: i32,
    pub month: u32,
    pub total_watch_time_seconds: i64,
    #[serde(default)]
    pub total_views: i64,
    #[serde(default)]
    pub bandwidth_gb: f64,
}

/// How a payment's watch time entered its section pool.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShareKind {
    /// Common subject: library total scaled by the section's order share.
    Common,
    /// Section-specific subject: raw library total.
    SectionSpecific,
}

impl ShareKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareKind::Common => "common",
            ShareKind::SectionSpecific => "section_specific",
        }
    }
}

impl std::str::FromStr for ShareKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "common" => Ok(ShareKind::Common),
            "section_specific" => Ok(ShareKind::SectionSpecific),
            other => Err(format!("unknown share kind '{}'", other)),
        }
    }
}

/// One computed payment, carrying every intermediate value so the figure
/// can be audited without re-running the calculation.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct TeacherPayment {
    pub assignment_id: i32,
    pub library_id: LibraryId,
    pub library_name: String,
    pub stage_id: i32,
    pub section_id: i32,
    pub subject_id: i32,
    pub share_kind: ShareKind,
    /// Library watch time over the whole period, before any allocation.
    pub raw_watch_time_seconds: i64,
    /// Watch time credited to this section (allocated for common subjects).
    pub total_watch_time_seconds: f64,
    pub section_pool_seconds: f64,
    pub watch_time_percentage: f64,
    pub monthly_watch_breakdown: MonthlyBreakdown,
    pub section_total_orders: i64,
    pub section_order_percentage: f64,
    pub section_revenue_egp: f64,
    pub base_revenue: f64,
    pub revenue_percentage_applied: f64,
    pub calculated_revenue: f64,
    pub tax_rate_applied: f64,
    pub tax_amount: f64,
    pub final_payment: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_kind_text_matches_serde() {
        for kind in [ShareKind::Common, ShareKind::SectionSpecific] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            assert_eq!(kind.as_str().parse::<ShareKind>(), Ok(kind));
        }
        assert!("shared".parse::<ShareKind>().is_err());
    }
}
