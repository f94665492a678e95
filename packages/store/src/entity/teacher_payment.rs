use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use watchpay::{MonthlyBreakdown, ShareKind, TeacherPayment};

/// One computed payment with every intermediate figure of the calculation.
/// Rows for a (period, stage) are replaced as a whole on every run.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "teacher_payments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub period_id: i32,
    pub stage_id: i32,
    pub section_id: i32,
    pub assignment_id: i32,
    pub library_id: i64,
    #[sea_orm(column_type = "Text")]
    pub library_name: String,
    pub subject_id: i32,
    #[sea_orm(column_type = "Text")]
    pub share_kind: String,
    pub raw_watch_time_seconds: i64,
    pub total_watch_time_seconds: f64,
    pub section_pool_seconds: f64,
    pub watch_time_percentage: f64,
    /// `{"YYYY-MM": seconds}`
    #[sea_orm(column_type = "Json")]
    pub monthly_watch_breakdown: Json,
    pub section_total_orders: i64,
    pub section_order_percentage: f64,
    pub section_revenue_egp: f64,
    pub base_revenue: f64,
    pub revenue_percentage_applied: f64,
    pub calculated_revenue: f64,
    pub tax_rate_applied: f64,
    pub tax_amount: f64,
    pub final_payment: f64,
    pub calculated_at: DateTime,
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
}

impl Related<super::financial_period::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FinancialPeriod.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn to_payment(&self) -> Result<TeacherPayment, serde_json::Error> {
        let monthly_watch_breakdown: MonthlyBreakdown =
            serde_json::from_value(self.monthly_watch_breakdown.clone())?;
        let share_kind: ShareKind = self
            .share_kind
            .parse()
            .map_err(<serde_json::Error as serde::de::Error>::custom)?;

        Ok(TeacherPayment {
            assignment_id: self.assignment_id,
            library_id: self.library_id,
            library_name: self.library_name.clone(),
            stage_id: self.stage_id,
            section_id: self.section_id,
            subject_id: self.subject_id,
            share_kind,
            raw_watch_time_seconds: self.raw_watch_time_seconds,
            total_watch_time_seconds: self.total_watch_time_seconds,
            section_pool_seconds: self.section_pool_seconds,
            watch_time_percentage: self.watch_time_percentage,
            monthly_watch_breakdown,
            section_total_orders: self.section_total_orders,
            section_order_percentage: self.section_order_percentage,
            section_revenue_egp: self.section_revenue_egp,
            base_revenue: self.base_revenue,
            revenue_percentage_applied: self.revenue_percentage_applied,
            calculated_revenue: self.calculated_revenue,
            tax_rate_applied: self.tax_rate_applied,
            tax_amount: self.tax_amount,
            final_payment: self.final_payment,
        })
    }
}

impl ActiveModel {
    pub fn from_payment(
        period_id: i32,
        payment: &TeacherPayment,
        calculated_at: DateTime,
    ) -> Result<Self, serde_json::Error> {
        use sea_orm::ActiveValue::{NotSet, Set};

        Ok(Self {
            id: NotSet,
            period_id: Set(period_id),
            stage_id: Set(payment.stage_id),
            section_id: Set(payment.section_id),
            assignment_id: Set(payment.assignment_id),
            library_id: Set(payment.library_id),
            library_name: Set(payment.library_name.clone()),
            subject_id: Set(payment.subject_id),
            share_kind: Set(payment.share_kind.as_str().to_string()),
            raw_watch_time_seconds: Set(payment.raw_watch_time_seconds),
            total_watch_time_seconds: Set(payment.total_watch_time_seconds),
            section_pool_seconds: Set(payment.section_pool_seconds),
            watch_time_percentage: Set(payment.watch_time_percentage),
            monthly_watch_breakdown: Set(serde_json::to_value(&payment.monthly_watch_breakdown)?),
            section_total_orders: Set(payment.section_total_orders),
            section_order_percentage: Set(payment.section_order_percentage),
            section_revenue_egp: Set(payment.section_revenue_egp),
            base_revenue: Set(payment.base_revenue),
            revenue_percentage_applied: Set(payment.revenue_percentage_applied),
            calculated_revenue: Set(payment.calculated_revenue),
            tax_rate_applied: Set(payment.tax_rate_applied),
            tax_amount: Set(payment.tax_amount),
            final_payment: Set(payment.final_payment),
            calculated_at: Set(calculated_at),
        })
    }
}
