//! Transactional payment calculation for one (period, stage).

use std::collections::BTreeSet;

use schemars::JsonSchema;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QuerySelect, TransactionTrait};
use serde::{Deserialize, Serialize};
use watchpay::{CalculationInput, CalculationOutcome, LibraryId, Subject};

use crate::{
    Store,
    assignments::assignments_for_stage,
    entity::{stage, subject, teacher_payment},
    error::StoreResult,
    not_found, now,
    periods::find_period,
    stats::{revenues_for, watch_stats_for},
};

/// Rows per insert statement; keeps bound parameters under SQLite's limit.
const INSERT_BATCH: usize = 32;

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CalculationRequest {
    pub period_id: i32,
    pub stage_id: i32,
    #[serde(default)]
    pub excluded_library_ids: BTreeSet<LibraryId>,
}

impl Store {
    /// Recomputes and replaces every payment of a (period, stage).
    ///
    /// The snapshot read, the delete and the inserts share one transaction,
    /// so a failed run leaves the previous payment set intact. Runs for the
    /// same pair queue behind each other: in-process on a mutex, and across
    /// processes on the stage row, which is locked before anything is read.
    #[tracing::instrument(name = "calculate payments", skip(self))]
    pub async fn calculate(&self, request: CalculationRequest) -> StoreResult<CalculationOutcome> {
        let CalculationRequest {
            period_id,
            stage_id,
            excluded_library_ids,
        } = request;

        let lock = self.calculation_lock(period_id, stage_id);
        let _guard = lock.lock().await;

        let txn = self.db.begin().await?;

        // `SELECT .. FOR UPDATE`; SQLite already serializes writers.
        stage::Entity::find_by_id(stage_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| not_found!("stage {} not found", stage_id))?;
        let period = find_period(&txn, period_id).await?;

        let revenues = revenues_for(&txn, period_id, stage_id).await?;
        let assignments = assignments_for_stage(&txn, Some(stage_id)).await?;

        let subject_ids: BTreeSet<i32> = assignments.iter().map(|a| a.subject_id).collect();
        let subjects: Vec<Subject> = subject::Entity::find()
            .filter(subject::Column::Id.is_in(subject_ids))
            .all(&txn)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();

        let library_ids: Vec<LibraryId> = assignments
            .iter()
            .map(|a| a.library_id)
            .filter(|id| !excluded_library_ids.contains(id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let watch_stats = watch_stats_for(&txn, &period, &library_ids).await?;

        let input = CalculationInput {
            period,
            stage_id,
            revenues,
            assignments,
            subjects,
            watch_stats,
            excluded_library_ids,
        };
        let outcome = watchpay::calculate(&input)?;

        let removed = teacher_payment::Entity::delete_many()
            .filter(teacher_payment::Column::PeriodId.eq(period_id))
            .filter(teacher_payment::Column::StageId.eq(stage_id))
            .exec(&txn)
            .await?;

        let calculated_at = now();
        let rows = outcome
            .payments
            .iter()
            .map(|payment| {
                teacher_payment::ActiveModel::from_payment(period_id, payment, calculated_at)
            })
            .collect::<Result<Vec<_>, _>>()?;
        for batch in rows.chunks(INSERT_BATCH) {
            teacher_payment::Entity::insert_many(batch.to_vec())
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;

        tracing::info!(
            "Stored {} payments for period {} stage {} (replaced {})",
            outcome.payments_calculated,
            period_id,
            stage_id,
            removed.rows_affected
        );
        Ok(outcome)
    }
}
