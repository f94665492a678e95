//! Per-library watch-time aggregation over a financial period.

use std::collections::{BTreeMap, HashMap};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    model::{FinancialPeriod, LibraryId, WatchStat},
    month::{MonthlyBreakdown, PeriodMonth},
};

/// Read-only lookup over historical watch statistics.
#[derive(Debug, Clone, Default)]
pub struct WatchStatIndex {
    by_month: HashMap<(LibraryId, i32, u32), i64>,
}

impl WatchStatIndex {
    pub fn new<'a>(stats: impl IntoIterator<Item = &'a WatchStat>) -> Self {
        let mut by_month = HashMap::new();
        for stat in stats {
            // (library, year, month) is unique upstream; keep the last row if not.
            by_month.insert(
                (stat.library_id, stat.year, stat.month),
                stat.total_watch_time_seconds.max(0),
            );
        }
        Self { by_month }
    }

    pub fn seconds(&self, library_id: LibraryId, year: i32, month: u32) -> Option<i64> {
        self.by_month.get(&(library_id, year, month)).copied()
    }

    /// Every month of `year` with a row for `library_id`.
    pub fn months_in_year(&self, library_id: LibraryId, year: i32) -> Vec<(u32, i64)> {
        let mut months: Vec<(u32, i64)> = self
            .by_month
            .iter()
            .filter(|((lib, y, _), _)| *lib == library_id && *y == year)
            .map(|((_, _, month), seconds)| (*month, *seconds))
            .collect();
        months.sort_unstable();
        months
    }

    pub fn len(&self) -> usize {
        self.by_month.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_month.is_empty()
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// Summed over the period's declared months.
    DeclaredMonths,
    /// Legacy period without months: every row of the period's year.
    YearFallback,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct LibraryWatchTime {
    pub library_id: LibraryId,
    pub total_seconds: i64,
    pub breakdown: MonthlyBreakdown,
    pub mode: AggregationMode,
}

/// Total watch time of one library over a period, with its monthly breakdown.
///
/// With declared months the breakdown is total: missing rows appear as `0`.
/// Periods without declared months run in the degraded
/// [`AggregationMode::YearFallback`], keyed by the months actually found.
pub fn aggregate(
    index: &WatchStatIndex,
    library_id: LibraryId,
    period: &FinancialPeriod,
) -> LibraryWatchTime {
    if period.months.is_empty() {
        let breakdown: MonthlyBreakdown = index
            .months_in_year(library_id, period.year)
            .into_iter()
            .filter_map(|(month, seconds)| {
                PeriodMonth::new(period.year, month)
                    .ok()
                    .map(|key| (key, seconds))
            })
            .collect();
        return LibraryWatchTime {
            library_id,
            total_seconds: breakdown.total(),
            breakdown,
            mode: AggregationMode::YearFallback,
        };
    }

    let mut breakdown = MonthlyBreakdown::new();
    for month in &period.months {
        let seconds = index
            .seconds(library_id, month.year(), month.month())
            .unwrap_or(0);
        breakdown.insert(*month, seconds);
    }

    LibraryWatchTime {
        library_id,
        total_seconds: breakdown.total(),
        breakdown,
        mode: AggregationMode::DeclaredMonths,
    }
}

/// Aggregates each distinct library exactly once.
pub fn aggregate_libraries(
    index: &WatchStatIndex,
    libraries: impl IntoIterator<Item = LibraryId>,
    period: &FinancialPeriod,
) -> BTreeMap<LibraryId, LibraryWatchTime> {
    if period.months.is_empty() {
        tracing::warn!(
            "Period '{}' declares no months, summing all {} statistics for library totals",
            period.name,
            period.year
        );
    }

    let mut totals = BTreeMap::new();
    for library_id in libraries {
        totals
            .entry(library_id)
            .or_insert_with(|| aggregate(index, library_id, period));
    }
    totals
}
