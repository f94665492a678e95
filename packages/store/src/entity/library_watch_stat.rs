use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Historical statistics of one library for one calendar month, unique per
/// (library, year, month). Views and bandwidth are kept for reporting only.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "library_watch_stats")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub library_id: i64,
    pub year: i32,
    pub month: i32,
    pub total_watch_time_seconds: i64,
    pub total_views: i64,
    pub bandwidth_gb: f64,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for watchpay::WatchStat {
    fn from(model: Model) -> Self {
        Self {
            library_id: model.library_id,
            year: model.year,
            month: model.month.max(0) as u32,
            total_watch_time_seconds: model.total_watch_time_seconds,
            total_views: model.total_views,
            bandwidth_gb: model.bandwidth_gb,
        }
    }
}
