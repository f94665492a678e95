//! Read-only views over stored payments.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use watchpay::{
    Assignment, FinancialPeriod, LibraryId, Section, SectionRevenue, Stage, TeacherPayment,
};

use crate::{
    Store,
    assignments::assignments_for_stage,
    entity::{section, subject, teacher_payment},
    error::StoreResult,
    periods::find_period,
    stats::revenues_for,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPayment {
    pub id: i32,
    pub period_id: i32,
    pub calculated_at: NaiveDateTime,
    #[serde(flatten)]
    pub payment: TeacherPayment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentView {
    #[serde(flatten)]
    pub assignment: Assignment,
    pub subject_code: Option<String>,
    pub is_common: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialOverview {
    pub period: FinancialPeriod,
    pub stage: Stage,
    pub sections: Vec<Section>,
    pub revenues: Vec<SectionRevenue>,
    pub assignments: Vec<AssignmentView>,
    pub payments: Vec<StoredPayment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibrarySummary {
    pub library_id: LibraryId,
    pub library_name: String,
    pub sections: usize,
    pub total_watch_time_seconds: f64,
    pub calculated_revenue: f64,
    pub tax_amount: f64,
    pub final_payment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub period_id: i32,
    pub stage_id: i32,
    pub payments: usize,
    pub total_payment: f64,
    pub libraries: Vec<LibrarySummary>,
}

async fn stored_payments<C: ConnectionTrait>(
    db: &C,
    period_id: i32,
    stage_id: Option<i32>,
) -> StoreResult<Vec<StoredPayment>> {
    let mut query =
        teacher_payment::Entity::find().filter(teacher_payment::Column::PeriodId.eq(period_id));
    if let Some(stage_id) = stage_id {
        query = query.filter(teacher_payment::Column::StageId.eq(stage_id));
    }
    let rows = query
        .order_by_asc(teacher_payment::Column::StageId)
        .order_by_asc(teacher_payment::Column::Id)
        .all(db)
        .await?;

    rows.into_iter()
        .map(|row| {
            Ok(StoredPayment {
                id: row.id,
                period_id: row.period_id,
                calculated_at: row.calculated_at,
                payment: row.to_payment()?,
            })
        })
        .collect()
}

/// Per-library totals, ordered by final payment, highest first.
fn summarize(period_id: i32, stage_id: i32, payments: &[StoredPayment]) -> PeriodSummary {
    let mut libraries: BTreeMap<LibraryId, LibrarySummary> = BTreeMap::new();
    for stored in payments {
        let payment = &stored.payment;
        let entry = libraries
            .entry(payment.library_id)
            .or_insert_with(|| LibrarySummary {
                library_id: payment.library_id,
                library_name: payment.library_name.clone(),
                sections: 0,
                total_watch_time_seconds: 0.0,
                calculated_revenue: 0.0,
                tax_amount: 0.0,
                final_payment: 0.0,
            });
        entry.sections += 1;
        entry.total_watch_time_seconds += payment.total_watch_time_seconds;
        entry.calculated_revenue += payment.calculated_revenue;
        entry.tax_amount += payment.tax_amount;
        entry.final_payment += payment.final_payment;
    }

    let mut libraries: Vec<LibrarySummary> = libraries.into_values().collect();
    libraries.sort_by(|a, b| {
        b.final_payment
            .total_cmp(&a.final_payment)
            .then(a.library_id.cmp(&b.library_id))
    });

    PeriodSummary {
        period_id,
        stage_id,
        payments: payments.len(),
        total_payment: payments.iter().map(|p| p.payment.final_payment).sum(),
        libraries,
    }
}

impl Store {
    /// Everything needed to review a (period, stage) before or after a run.
    #[tracing::instrument(name = "financial overview", skip(self))]
    pub async fn financial_overview(
        &self,
        period_id: i32,
        stage_id: i32,
    ) -> StoreResult<FinancialOverview> {
        let period = find_period(&self.db, period_id).await?;
        let stage = self.get_stage(stage_id).await?;

        let sections: Vec<Section> = section::Entity::find()
            .filter(section::Column::StageId.eq(stage_id))
            .order_by_asc(section::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();
        let revenues = revenues_for(&self.db, period_id, stage_id).await?;

        let subjects: HashMap<i32, subject::Model> = subject::Entity::find()
            .all(&self.db)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();
        let assignments = assignments_for_stage(&self.db, Some(stage_id))
            .await?
            .into_iter()
            .map(|assignment| {
                let subject = subjects.get(&assignment.subject_id);
                AssignmentView {
                    subject_code: subject.map(|s| s.code.clone()),
                    is_common: subject.is_some_and(|s| s.is_common),
                    assignment,
                }
            })
            .collect();

        let payments = stored_payments(&self.db, period_id, Some(stage_id)).await?;

        Ok(FinancialOverview {
            period,
            stage,
            sections,
            revenues,
            assignments,
            payments,
        })
    }

    pub async fn payments_for_period(&self, period_id: i32) -> StoreResult<Vec<StoredPayment>> {
        find_period(&self.db, period_id).await?;
        stored_payments(&self.db, period_id, None).await
    }

    pub async fn period_summary(
        &self,
        period_id: i32,
        stage_id: i32,
    ) -> StoreResult<PeriodSummary> {
        find_period(&self.db, period_id).await?;
        let payments = stored_payments(&self.db, period_id, Some(stage_id)).await?;
        Ok(summarize(period_id, stage_id, &payments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchpay::{MonthlyBreakdown, ShareKind};

    fn stored(id: i32, library_id: LibraryId, final_payment: f64) -> StoredPayment {
        StoredPayment {
            id,
            period_id: 1,
            calculated_at: NaiveDateTime::default(),
            payment: TeacherPayment {
                assignment_id: id,
                library_id,
                library_name: format!("S1-AR-{library_id}"),
                stage_id: 1,
                section_id: id,
                subject_id: 1,
                share_kind: ShareKind::Common,
                raw_watch_time_seconds: 100,
                total_watch_time_seconds: 50.0,
                section_pool_seconds: 100.0,
                watch_time_percentage: 0.5,
                monthly_watch_breakdown: MonthlyBreakdown::new(),
                section_total_orders: 1,
                section_order_percentage: 0.5,
                section_revenue_egp: 2.0 * final_payment,
                base_revenue: final_payment,
                revenue_percentage_applied: 1.0,
                calculated_revenue: final_payment,
                tax_rate_applied: 0.0,
                tax_amount: 0.0,
                final_payment,
            },
        }
    }

    #[test]
    fn test_summary_groups_sections_per_library() {
        let payments = vec![stored(1, 7, 100.0), stored(2, 7, 50.0), stored(3, 9, 400.0)];
        let summary = summarize(1, 1, &payments);

        assert_eq!(summary.payments, 3);
        assert_eq!(summary.total_payment, 550.0);
        assert_eq!(summary.libraries.len(), 2);
        assert_eq!(summary.libraries[0].library_id, 9);
        assert_eq!(summary.libraries[1].sections, 2);
        assert_eq!(summary.libraries[1].final_payment, 150.0);
        assert_eq!(summary.libraries[1].total_watch_time_seconds, 100.0);
    }
}
