#![allow(dead_code)]

use watchpay::{Section, Stage, Subject, WatchStat};
use watchpay_store::{
    NewAssignment, NewPeriod, NewSection, NewStage, NewSubject, RevenueInput, Store, StoreConfig,
};

pub async fn store() -> Store {
    Store::connect(&StoreConfig::in_memory())
        .await
        .expect("in-memory store")
}

pub struct Fixture {
    pub store: Store,
    pub stage: Stage,
    pub gen_section: Section,
    pub lang_section: Section,
    pub arabic: Subject,
    pub math: Subject,
    pub period_id: i32,
}

pub fn stat(library_id: i64, year: i32, month: u32, seconds: i64) -> WatchStat {
    WatchStat {
        library_id,
        year,
        month,
        total_watch_time_seconds: seconds,
        total_views: 0,
        bandwidth_gb: 0.0,
    }
}

/// Stage S1 with GEN and LANG sections, Arabic (common) and Math, a
/// two-month period, 30/70 order split and 100k/200k EGP revenue.
pub async fn fixture() -> Fixture {
    let store = store().await;

    let stage = store
        .create_stage(NewStage {
            code: "S1".into(),
            name: "Senior 1".into(),
            display_order: 1,
        })
        .await
        .unwrap();
    let gen_section = store
        .create_section(NewSection {
            stage_id: stage.id,
            code: "GEN".into(),
            name: "General".into(),
        })
        .await
        .unwrap();
    let lang_section = store
        .create_section(NewSection {
            stage_id: stage.id,
            code: "LANG".into(),
            name: "Language".into(),
        })
        .await
        .unwrap();
    let arabic = store
        .create_subject(NewSubject {
            code: "AR".into(),
            name: "Arabic".into(),
            is_common: true,
        })
        .await
        .unwrap();
    let math = store
        .create_subject(NewSubject {
            code: "MATH".into(),
            name: "Mathematics".into(),
            is_common: false,
        })
        .await
        .unwrap();

    let period = store
        .create_period(NewPeriod {
            name: "Q4 2025".into(),
            year: 2025,
            months: vec!["2025-10".into(), "2025-11".into()],
            notes: None,
        })
        .await
        .unwrap();

    for (section, orders, revenue) in [
        (&gen_section, 30, 100_000.0),
        (&lang_section, 70, 200_000.0),
    ] {
        store
            .upsert_section_revenue(RevenueInput {
                period_id: period.period.id,
                stage_id: stage.id,
                section_id: section.id,
                total_orders: orders,
                total_revenue_egp: revenue,
            })
            .await
            .unwrap();
    }

    Fixture {
        store,
        stage,
        gen_section,
        lang_section,
        arabic,
        math,
        period_id: period.period.id,
    }
}

impl Fixture {
    pub async fn assign(
        &self,
        library_id: i64,
        subject: &Subject,
        section_id: Option<i32>,
        tax_rate: f64,
        revenue_percentage: f64,
    ) -> watchpay::Assignment {
        self.store
            .create_assignment(NewAssignment {
                library_id,
                library_name: format!("S1-{}-{}", subject.code, library_id),
                stage_id: self.stage.id,
                section_id,
                subject_id: subject.id,
                tax_rate,
                revenue_percentage,
            })
            .await
            .unwrap()
    }
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}
