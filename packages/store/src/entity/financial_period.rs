use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use watchpay::PeriodMonth;

/// A named accounting window. `months` holds a JSON array of `"YYYY-MM"`
/// keys; legacy periods leave it null and aggregate their whole `year`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "financial_periods")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique, column_type = "Text")]
    pub name: String,
    pub year: i32,
    #[sea_orm(column_type = "Json", nullable)]
    pub months: Option<Json>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::section_revenue::Entity")]
    SectionRevenue,
    #[sea_orm(has_many = "super::teacher_payment::Entity")]
    TeacherPayment,
}

impl Related<super::section_revenue::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SectionRevenue.def()
    }
}

impl Related<super::teacher_payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TeacherPayment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn period_months(&self) -> Result<Vec<PeriodMonth>, serde_json::Error> {
        match &self.months {
            Some(months) if !months.is_null() => serde_json::from_value(months.clone()),
            _ => Ok(Vec::new()),
        }
    }
}

impl TryFrom<Model> for watchpay::FinancialPeriod {
    type Error = serde_json::Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let months = model.period_months()?;
        Ok(Self {
            id: model.id,
            name: model.name,
            year: model.year,
            months,
        })
    }
}
