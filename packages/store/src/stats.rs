//! Section revenues and historical watch statistics.

use schemars::JsonSchema;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use watchpay::{
    FinancialPeriod, LibraryId, PeriodMonth, SectionRevenue, WatchStat,
    error::validate_non_negative,
};

use crate::{
    Store, bad_request,
    entity::{financial_period, library_watch_stat, section, section_revenue},
    error::StoreResult,
    not_found, now,
};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RevenueInput {
    pub period_id: i32,
    pub stage_id: i32,
    pub section_id: i32,
    pub total_orders: i64,
    pub total_revenue_egp: f64,
}

pub(crate) async fn revenues_for<C: ConnectionTrait>(
    db: &C,
    period_id: i32,
    stage_id: i32,
) -> StoreResult<Vec<SectionRevenue>> {
    let revenues = section_revenue::Entity::find()
        .filter(section_revenue::Column::PeriodId.eq(period_id))
        .filter(section_revenue::Column::StageId.eq(stage_id))
        .order_by_asc(section_revenue::Column::SectionId)
        .all(db)
        .await?;
    Ok(revenues.into_iter().map(Into::into).collect())
}

/// Watch statistics the period can read: its declared months, or every
/// month of its year for legacy periods.
pub(crate) async fn watch_stats_for<C: ConnectionTrait>(
    db: &C,
    period: &FinancialPeriod,
    library_ids: &[LibraryId],
) -> StoreResult<Vec<WatchStat>> {
    let mut years: Vec<i32> = if period.months.is_empty() {
        vec![period.year]
    } else {
        period.months.iter().map(PeriodMonth::year).collect()
    };
    years.sort_unstable();
    years.dedup();

    let rows = library_watch_stat::Entity::find()
        .filter(library_watch_stat::Column::LibraryId.is_in(library_ids.iter().copied()))
        .filter(library_watch_stat::Column::Year.is_in(years))
        .all(db)
        .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

async fn upsert_watch_stat<C: ConnectionTrait>(db: &C, stat: &WatchStat) -> StoreResult<()> {
    PeriodMonth::new(stat.year, stat.month)?;
    if stat.total_watch_time_seconds < 0 {
        return Err(bad_request!(
            "watch time of library {} must not be negative",
            stat.library_id
        ));
    }

    let existing = library_watch_stat::Entity::find()
        .filter(library_watch_stat::Column::LibraryId.eq(stat.library_id))
        .filter(library_watch_stat::Column::Year.eq(stat.year))
        .filter(library_watch_stat::Column::Month.eq(stat.month as i32))
        .one(db)
        .await?;

    match existing {
        Some(model) => {
            let mut active: library_watch_stat::ActiveModel = model.into();
            active.total_watch_time_seconds = Set(stat.total_watch_time_seconds);
            active.total_views = Set(stat.total_views);
            active.bandwidth_gb = Set(stat.bandwidth_gb);
            active.updated_at = Set(now());
            active.update(db).await?;
        }
        None => {
            library_watch_stat::ActiveModel {
                library_id: Set(stat.library_id),
                year: Set(stat.year),
                month: Set(stat.month as i32),
                total_watch_time_seconds: Set(stat.total_watch_time_seconds),
                total_views: Set(stat.total_views),
                bandwidth_gb: Set(stat.bandwidth_gb),
                updated_at: Set(now()),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
    }
    Ok(())
}

impl Store {
    /// Creates or replaces the revenue of a (period, stage, section).
    #[tracing::instrument(name = "upsert section revenue", skip(self))]
    pub async fn upsert_section_revenue(&self, input: RevenueInput) -> StoreResult<SectionRevenue> {
        if input.total_orders < 0 {
            return Err(bad_request!("total_orders must not be negative"));
        }
        validate_non_negative("total_revenue_egp", input.total_revenue_egp)?;

        financial_period::Entity::find_by_id(input.period_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| not_found!("financial period {} not found", input.period_id))?;
        let section = section::Entity::find_by_id(input.section_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| not_found!("section {} not found", input.section_id))?;
        if section.stage_id != input.stage_id {
            return Err(bad_request!(
                "section {} does not belong to stage {}",
                input.section_id,
                input.stage_id
            ));
        }

        let existing = section_revenue::Entity::find()
            .filter(section_revenue::Column::PeriodId.eq(input.period_id))
            .filter(section_revenue::Column::StageId.eq(input.stage_id))
            .filter(section_revenue::Column::SectionId.eq(input.section_id))
            .one(&self.db)
            .await?;

        let model = match existing {
            Some(model) => {
                let mut active: section_revenue::ActiveModel = model.into();
                active.total_orders = Set(input.total_orders);
                active.total_revenue_egp = Set(input.total_revenue_egp);
                active.updated_at = Set(now());
                active.update(&self.db).await?
            }
            None => {
                section_revenue::ActiveModel {
                    period_id: Set(input.period_id),
                    stage_id: Set(input.stage_id),
                    section_id: Set(input.section_id),
                    total_orders: Set(input.total_orders),
                    total_revenue_egp: Set(input.total_revenue_egp),
                    updated_at: Set(now()),
                    ..Default::default()
                }
                .insert(&self.db)
                .await?
            }
        };

        Ok(model.into())
    }

    pub async fn list_section_revenues(
        &self,
        period_id: i32,
        stage_id: i32,
    ) -> StoreResult<Vec<SectionRevenue>> {
        revenues_for(&self.db, period_id, stage_id).await
    }

    /// Upserts a batch of monthly statistics atomically. Returns the number
    /// of rows written.
    #[tracing::instrument(
        name = "import watch stats",
        skip(self, stats),
        fields(count = stats.len())
    )]
    pub async fn import_watch_stats(&self, stats: &[WatchStat]) -> StoreResult<usize> {
        let txn = self.db.begin().await?;
        for stat in stats {
            upsert_watch_stat(&txn, stat).await?;
        }
        txn.commit().await?;

        tracing::info!("Imported {} watch statistics", stats.len());
        Ok(stats.len())
    }

    pub async fn list_watch_stats(&self, library_id: LibraryId) -> StoreResult<Vec<WatchStat>> {
        let rows = library_watch_stat::Entity::find()
            .filter(library_watch_stat::Column::LibraryId.eq(library_id))
            .order_by_asc(library_watch_stat::Column::Year)
            .order_by_asc(library_watch_stat::Column::Month)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
