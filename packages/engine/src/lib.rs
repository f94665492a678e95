//! Watch-time based revenue allocation for teacher payouts.
//!
//! The engine is pure: callers hand it reference data, revenue figures and
//! historical watch statistics, and it returns the full payment breakdown
//! per assignment. Persistence lives in `watchpay-store`.
//!
//! A calculation run has two phases:
//!
//! 1. **Aggregate**: watch time per library ([`watch_time`]), order shares
//!    per section ([`shares`]), common-subject allocation and section pools
//!    ([`allocation`]).
//! 2. **Compute**: one [`payment::PaymentBreakdown`] per allocated
//!    assignment, against the immutable pools from phase 1.

pub mod allocation;
pub mod classify;
pub mod engine;
pub mod error;
pub mod matching;
pub mod model;
pub mod month;
pub mod payment;
pub mod shares;
pub mod watch_time;

pub use classify::{LibraryClassification, SubjectKind, classify};
pub use engine::{CalculationInput, CalculationOutcome, SkipReason, SkippedAssignment, calculate};
pub use error::{PayoutError, PayoutResult};
pub use matching::{AssignmentDraft, LibraryRef, MatchReport, MatchResult, match_libraries};
pub use model::*;
pub use month::{MonthlyBreakdown, PeriodMonth};
pub use payment::{PaymentBreakdown, PaymentInput};
pub use shares::order_shares;
pub use watch_time::{AggregationMode, LibraryWatchTime, WatchStatIndex};

/// Tolerance used when comparing derived money and percentage values.
pub const FLOAT_TOLERANCE: f64 = 1e-9;

#[cfg(test)]
pub(crate) fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= FLOAT_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}
