//! Persistence for watchpay: reference data, revenue figures, historical
//! watch statistics and computed payments, backed by `sea-orm`.
//!
//! Calculations read their snapshot and replace the stored payment set of a
//! (period, stage) inside a single transaction that holds a row lock on the
//! stage; runs for the same pair are additionally serialized in-process.

use std::sync::Arc;

use dashmap::DashMap;
use sea_orm::DatabaseConnection;
use tokio::sync::Mutex;

pub mod assignments;
pub mod calculation;
pub mod config;
pub mod entity;
pub mod error;
pub mod matching;
pub mod periods;
pub mod read_model;
pub mod reference;
pub mod schema;
pub mod stats;

pub use assignments::{AssignmentUpdate, NewAssignment};
pub use calculation::CalculationRequest;
pub use config::StoreConfig;
pub use error::{ErrorKind, StoreError, StoreResult};
pub use periods::{NewPeriod, PeriodRecord, PeriodUpdate};
pub use read_model::{FinancialOverview, PeriodSummary, StoredPayment};
pub use reference::{NewSection, NewStage, NewSubject, StageUpdate};
pub use stats::RevenueInput;

#[derive(Clone)]
pub struct Store {
    db: DatabaseConnection,
    calculation_locks: Arc<DashMap<(i32, i32), Arc<Mutex<()>>>>,
}

impl Store {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            calculation_locks: Arc::new(DashMap::new()),
        }
    }

    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let db = config.connect().await?;
        if config.bootstrap_schema {
            schema::bootstrap(&db).await?;
        }
        tracing::info!("Connected to database");
        Ok(Self::new(db))
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// One lock per (period, stage); other pairs proceed concurrently.
    fn calculation_lock(&self, period_id: i32, stage_id: i32) -> Arc<Mutex<()>> {
        self.calculation_locks
            .entry((period_id, stage_id))
            .or_default()
            .clone()
    }
}

pub(crate) fn now() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}
