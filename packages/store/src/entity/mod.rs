//! `SeaORM` entities for the payout schema.

pub mod financial_period;
pub mod library_watch_stat;
pub mod section;
pub mod section_revenue;
pub mod stage;
pub mod subject;
pub mod teacher_assignment;
pub mod teacher_payment;
