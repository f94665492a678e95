//! Orchestration of one (period, stage) calculation run.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    allocation::{
        AllocationPlan, SectionAllocations, allocate_common, allocate_section_specific,
    },
    error::{PayoutError, PayoutResult, validate_rate},
    model::{
        Assignment, FinancialPeriod, LibraryId, SectionRevenue, Subject, TeacherPayment,
        WatchStat,
    },
    payment::{self, PaymentInput},
    shares::order_shares,
    watch_time::{AggregationMode, LibraryWatchTime, WatchStatIndex, aggregate_libraries},
};

/// Snapshot of everything a calculation reads.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone)]
pub struct CalculationInput {
    pub period: FinancialPeriod,
    pub stage_id: i32,
    pub revenues: Vec<SectionRevenue>,
    pub assignments: Vec<Assignment>,
    pub subjects: Vec<Subject>,
    pub watch_stats: Vec<WatchStat>,
    #[serde(default)]
    pub excluded_library_ids: BTreeSet<LibraryId>,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    UnknownSubject { subject_id: i32 },
    /// Section-specific subject without a section.
    MissingSection,
    /// Common subject bound to no section; common libraries need one
    /// assignment per section.
    CommonWithoutSection,
    SectionWithoutRevenue { section_id: i32 },
    InvalidTerms { message: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnknownSubject { subject_id } => {
                write!(f, "subject {} not found", subject_id)
            }
            SkipReason::MissingSection => {
                write!(f, "section-specific subject has no section")
            }
            SkipReason::CommonWithoutSection => {
                write!(f, "common subject assignment has no section")
            }
            SkipReason::SectionWithoutRevenue { section_id } => {
                write!(f, "section {} has no revenue data for this period", section_id)
            }
            SkipReason::InvalidTerms { message } => write!(f, "invalid terms: {}", message),
        }
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct SkippedAssignment {
    pub assignment_id: i32,
    pub library_id: LibraryId,
    pub library_name: String,
    pub reason: SkipReason,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct CalculationOutcome {
    pub period_id: i32,
    pub stage_id: i32,
    pub payments_calculated: usize,
    pub total_payment: f64,
    pub aggregation_mode: AggregationMode,
    pub order_shares: BTreeMap<i32, f64>,
    pub section_pools: BTreeMap<i32, f64>,
    pub payments: Vec<TeacherPayment>,
    pub skipped: Vec<SkippedAssignment>,
}

fn skip(skipped: &mut Vec<SkippedAssignment>, assignment: &Assignment, reason: SkipReason) {
    tracing::warn!(
        "Skipping assignment {} ({}): {}",
        assignment.id,
        assignment.library_name,
        reason
    );
    skipped.push(SkippedAssignment {
        assignment_id: assignment.id,
        library_id: assignment.library_id,
        library_name: assignment.library_name.clone(),
        reason,
    });
}

fn check_terms(assignment: &Assignment) -> Result<(), SkipReason> {
    validate_rate("tax_rate", assignment.tax_rate)
        .and_then(|_| validate_rate("revenue_percentage", assignment.revenue_percentage))
        .map(|_| ())
        .map_err(|err| SkipReason::InvalidTerms {
            message: err.to_string(),
        })
}

/// Phase one: credit every usable assignment to its section and freeze the pools.
fn plan_allocations(
    assignments: &[&Assignment],
    subjects: &HashMap<i32, &Subject>,
    revenues: &BTreeMap<i32, &SectionRevenue>,
    shares: &BTreeMap<i32, f64>,
    watch: &BTreeMap<LibraryId, LibraryWatchTime>,
    skipped: &mut Vec<SkippedAssignment>,
) -> AllocationPlan {
    let mut sections: BTreeMap<i32, SectionAllocations> = revenues
        .keys()
        .map(|section_id| (*section_id, SectionAllocations::default()))
        .collect();

    for assignment in assignments {
        let Some(subject) = subjects.get(&assignment.subject_id) else {
            skip(
                skipped,
                assignment,
                SkipReason::UnknownSubject {
                    subject_id: assignment.subject_id,
                },
            );
            continue;
        };

        if let Err(reason) = check_terms(assignment) {
            skip(skipped, assignment, reason);
            continue;
        }

        let Some(section_id) = assignment.section_id else {
            let reason = if subject.is_common {
                SkipReason::CommonWithoutSection
            } else {
                SkipReason::MissingSection
            };
            skip(skipped, assignment, reason);
            continue;
        };

        let Some(section) = sections.get_mut(&section_id) else {
            skip(
                skipped,
                assignment,
                SkipReason::SectionWithoutRevenue { section_id },
            );
            continue;
        };

        let raw_seconds = watch
            .get(&assignment.library_id)
            .map(|w| w.total_seconds)
            .unwrap_or(0);

        let allocation = if subject.is_common {
            let share = shares.get(&section_id).copied().unwrap_or(0.0);
            allocate_common(assignment, section_id, raw_seconds, share)
        } else {
            allocate_section_specific(assignment, section_id, raw_seconds)
        };
        section.push(allocation);
    }

    AllocationPlan::new(sections)
}

/// Runs a full calculation for one (period, stage).
///
/// Fails only on missing preconditions (no revenue rows, no assignments).
/// Individual assignments that cannot be priced are reported in
/// [`CalculationOutcome::skipped`] and the rest of the run proceeds.
pub fn calculate(input: &CalculationInput) -> PayoutResult<CalculationOutcome> {
    let period = &input.period;

    if input.revenues.is_empty() {
        return Err(PayoutError::NoRevenueData {
            period_id: period.id,
            stage_id: input.stage_id,
        });
    }

    let mut assignments: Vec<&Assignment> = input
        .assignments
        .iter()
        .filter(|a| a.stage_id == input.stage_id)
        .filter(|a| !input.excluded_library_ids.contains(&a.library_id))
        .collect();
    if assignments.is_empty() {
        return Err(PayoutError::NoAssignments {
            stage_id: input.stage_id,
        });
    }
    assignments.sort_by_key(|a| a.id);

    tracing::info!(
        "Calculating payments for period '{}' stage {}: {} sections, {} assignments, {} excluded libraries",
        period.name,
        input.stage_id,
        input.revenues.len(),
        assignments.len(),
        input.excluded_library_ids.len()
    );

    let mut revenues: BTreeMap<i32, &SectionRevenue> = BTreeMap::new();
    for revenue in &input.revenues {
        if revenues.insert(revenue.section_id, revenue).is_some() {
            tracing::warn!(
                "Duplicate revenue rows for section {}, using the last one",
                revenue.section_id
            );
        }
    }

    let subjects: HashMap<i32, &Subject> = input.subjects.iter().map(|s| (s.id, s)).collect();

    let index = WatchStatIndex::new(&input.watch_stats);
    let watch = aggregate_libraries(&index, assignments.iter().map(|a| a.library_id), period);

    let order_counts: Vec<(i32, i64)> = revenues
        .values()
        .map(|r| (r.section_id, r.total_orders))
        .collect();
    let shares = order_shares(&order_counts);

    let mut skipped = Vec::new();
    let plan = plan_allocations(
        &assignments,
        &subjects,
        &revenues,
        &shares,
        &watch,
        &mut skipped,
    );

    let by_id: HashMap<i32, &Assignment> = assignments.iter().map(|a| (a.id, *a)).collect();
    let mut payments = Vec::new();

    for (section_id, allocations) in plan.sections() {
        let Some(revenue) = revenues.get(section_id) else {
            continue;
        };
        let pool = plan.pool(*section_id);
        let section_share = shares.get(section_id).copied().unwrap_or(0.0);

        for allocation in allocations.in_payment_order() {
            let Some(assignment) = by_id.get(&allocation.assignment_id) else {
                continue;
            };

            let breakdown = payment::compute(&PaymentInput {
                section_revenue_egp: revenue.total_revenue_egp,
                section_total_orders: revenue.total_orders,
                section_order_percentage: section_share,
                teacher_watch_time_seconds: allocation.allocated_seconds,
                section_pool_seconds: pool,
                revenue_percentage: assignment.revenue_percentage,
                tax_rate: assignment.tax_rate,
            });

            let monthly_watch_breakdown = watch
                .get(&assignment.library_id)
                .map(|w| w.breakdown.clone())
                .unwrap_or_default();

            payments.push(TeacherPayment {
                assignment_id: assignment.id,
                library_id: assignment.library_id,
                library_name: assignment.library_name.clone(),
                stage_id: input.stage_id,
                section_id: *section_id,
                subject_id: assignment.subject_id,
                share_kind: allocation.kind,
                raw_watch_time_seconds: allocation.raw_seconds,
                total_watch_time_seconds: allocation.allocated_seconds,
                section_pool_seconds: pool,
                watch_time_percentage: breakdown.watch_time_percentage,
                monthly_watch_breakdown,
                section_total_orders: revenue.total_orders,
                section_order_percentage: breakdown.section_order_percentage,
                section_revenue_egp: revenue.total_revenue_egp,
                base_revenue: breakdown.base_revenue,
                revenue_percentage_applied: breakdown.revenue_percentage_applied,
                calculated_revenue: breakdown.calculated_revenue,
                tax_rate_applied: breakdown.tax_rate_applied,
                tax_amount: breakdown.tax_amount,
                final_payment: breakdown.final_payment,
            });
        }
    }

    let total_payment: f64 = payments.iter().map(|p| p.final_payment).sum();
    let aggregation_mode = if period.months.is_empty() {
        AggregationMode::YearFallback
    } else {
        AggregationMode::DeclaredMonths
    };

    tracing::info!(
        "Calculated {} payments totalling {:.2} EGP ({} assignments skipped)",
        payments.len(),
        total_payment,
        skipped.len()
    );

    Ok(CalculationOutcome {
        period_id: period.id,
        stage_id: input.stage_id,
        payments_calculated: payments.len(),
        total_payment,
        aggregation_mode,
        order_shares: shares,
        section_pools: plan.pools().clone(),
        payments,
        skipped,
    })
}
