use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Orders and revenue of one section in one period; unique per
/// (period, stage, section).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "section_revenues")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub period_id: i32,
    pub stage_id: i32,
    pub section_id: i32,
    pub total_orders: i64,
    pub total_revenue_egp: f64,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::financial_period::Entity",
        from = "Column::PeriodId",
        to = "super::financial_period::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    FinancialPeriod,
    #[sea_orm(
        belongs_to = "super::section::Entity",
        from = "Column::SectionId",
        to = "super::section::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Section,
}

impl Related<super::financial_period::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FinancialPeriod.def()
    }
}

impl Related<super::section::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Section.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for watchpay::SectionRevenue {
    fn from(model: Model) -> Self {
        Self {
            section_id: model.section_id,
            total_orders: model.total_orders,
            total_revenue_egp: model.total_revenue_egp,
        }
    }
}
