//! Financial periods.

use schemars::JsonSchema;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use watchpay::{FinancialPeriod, PeriodMonth};

use crate::{
    Store, bad_request, conflict,
    entity::{financial_period, section_revenue, teacher_payment},
    error::StoreResult,
    not_found, now,
};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NewPeriod {
    pub name: String,
    pub year: i32,
    /// `"YYYY-MM"` keys; empty for a whole-year legacy period.
    #[serde(default)]
    pub months: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PeriodUpdate {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub months: Option<Vec<String>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PeriodRecord {
    #[serde(flatten)]
    pub period: FinancialPeriod,
    pub notes: Option<String>,
}

impl TryFrom<financial_period::Model> for PeriodRecord {
    type Error = serde_json::Error;

    fn try_from(model: financial_period::Model) -> Result<Self, Self::Error> {
        let notes = model.notes.clone();
        Ok(Self {
            period: model.try_into()?,
            notes,
        })
    }
}

/// Parses, sorts and de-duplicates month keys.
fn parse_months(months: &[String]) -> StoreResult<Vec<PeriodMonth>> {
    let mut parsed = months
        .iter()
        .map(|month| month.trim().parse::<PeriodMonth>())
        .collect::<Result<Vec<_>, _>>()?;
    parsed.sort();
    parsed.dedup();
    Ok(parsed)
}

fn months_json(months: &[PeriodMonth]) -> StoreResult<Option<serde_json::Value>> {
    if months.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_value(months)?))
}

fn validate_name(name: &str) -> StoreResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(bad_request!("period name must not be empty"));
    }
    Ok(name.to_string())
}

pub(crate) async fn find_period<C: ConnectionTrait>(
    db: &C,
    period_id: i32,
) -> StoreResult<FinancialPeriod> {
    let model = financial_period::Entity::find_by_id(period_id)
        .one(db)
        .await?
        .ok_or_else(|| not_found!("financial period {} not found", period_id))?;
    Ok(model.try_into()?)
}

impl Store {
    #[tracing::instrument(name = "create period", skip(self))]
    pub async fn create_period(&self, input: NewPeriod) -> StoreResult<PeriodRecord> {
        let name = validate_name(&input.name)?;
        let months = parse_months(&input.months)?;

        let existing = financial_period::Entity::find()
            .filter(financial_period::Column::Name.eq(&name))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(conflict!("financial period '{}' already exists", name));
        }

        let now = now();
        let model = financial_period::ActiveModel {
            name: Set(name),
            year: Set(input.year),
            months: Set(months_json(&months)?),
            notes: Set(input.notes),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        Ok(model.try_into()?)
    }

    /// Newest year first.
    pub async fn list_periods(&self) -> StoreResult<Vec<PeriodRecord>> {
        let periods = financial_period::Entity::find()
            .order_by_desc(financial_period::Column::Year)
            .order_by_desc(financial_period::Column::Id)
            .all(&self.db)
            .await?;
        periods
            .into_iter()
            .map(|model| Ok(PeriodRecord::try_from(model)?))
            .collect()
    }

    pub async fn get_period(&self, period_id: i32) -> StoreResult<FinancialPeriod> {
        find_period(&self.db, period_id).await
    }

    #[tracing::instrument(name = "update period", skip(self))]
    pub async fn update_period(
        &self,
        period_id: i32,
        update: PeriodUpdate,
    ) -> StoreResult<PeriodRecord> {
        let model = financial_period::Entity::find_by_id(period_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| not_found!("financial period {} not found", period_id))?;

        let mut active: financial_period::ActiveModel = model.into();
        if let Some(name) = update.name {
            let name = validate_name(&name)?;
            let taken = financial_period::Entity::find()
                .filter(financial_period::Column::Name.eq(&name))
                .filter(financial_period::Column::Id.ne(period_id))
                .one(&self.db)
                .await?;
            if taken.is_some() {
                return Err(conflict!("financial period '{}' already exists", name));
            }
            active.name = Set(name);
        }
        if let Some(year) = update.year {
            active.year = Set(year);
        }
        if let Some(months) = update.months {
            active.months = Set(months_json(&parse_months(&months)?)?);
        }
        if let Some(notes) = update.notes {
            active.notes = Set(Some(notes));
        }
        active.updated_at = Set(now());

        let model = active.update(&self.db).await?;
        Ok(model.try_into()?)
    }

    /// Removes the period with its section revenues and payments.
    #[tracing::instrument(name = "delete period", skip(self))]
    pub async fn delete_period(&self, period_id: i32) -> StoreResult<()> {
        let txn = self.db.begin().await?;

        let deleted = financial_period::Entity::delete_by_id(period_id)
            .exec(&txn)
            .await?;
        if deleted.rows_affected == 0 {
            return Err(not_found!("financial period {} not found", period_id));
        }
        section_revenue::Entity::delete_many()
            .filter(section_revenue::Column::PeriodId.eq(period_id))
            .exec(&txn)
            .await?;
        teacher_payment::Entity::delete_many()
            .filter(teacher_payment::Column::PeriodId.eq(period_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_months_sorts_and_dedupes() {
        let months = parse_months(&[
            "2025-12".to_string(),
            " 2025-10 ".to_string(),
            "2025-12".to_string(),
        ])
        .unwrap();
        let keys: Vec<String> = months.iter().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["2025-10", "2025-12"]);
    }

    #[test]
    fn test_parse_months_rejects_bad_keys() {
        let err = parse_months(&["2025-13".to_string()]).unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
        assert!(parse_months(&["Oct 2025".to_string()]).is_err());
    }

    #[test]
    fn test_empty_months_store_null() {
        assert_eq!(months_json(&[]).unwrap(), None);
        assert_eq!(
            months_json(&["2025-10".parse().unwrap()]).unwrap(),
            Some(serde_json::json!(["2025-10"]))
        );
    }
}
