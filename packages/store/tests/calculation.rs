mod common;

use std::collections::BTreeSet;

use common::{approx_eq, fixture, stat};
use sea_orm::{ActiveModelTrait, EntityTrait};
use watchpay::{AggregationMode, ShareKind};
use watchpay_store::{
    AssignmentUpdate, CalculationRequest, ErrorKind, NewPeriod, NewStage, RevenueInput,
    entity::teacher_payment,
};

async fn seeded() -> common::Fixture {
    let fx = fixture().await;
    let gen_id = fx.gen_section.id;
    let lang_id = fx.lang_section.id;

    let arabic = fx.arabic.clone();
    let math = fx.math.clone();
    fx.assign(500, &arabic, Some(gen_id), 0.1, 1.0).await;
    fx.assign(500, &arabic, Some(lang_id), 0.1, 1.0).await;
    fx.assign(600, &math, Some(gen_id), 0.0, 1.0).await;
    fx.assign(700, &math, Some(lang_id), 0.0, 1.0).await;

    fx.store
        .import_watch_stats(&[
            stat(500, 2025, 10, 6000),
            stat(500, 2025, 11, 4000),
            stat(600, 2025, 10, 3000),
            stat(700, 2025, 11, 1000),
            stat(700, 2025, 12, 5000),
        ])
        .await
        .unwrap();
    fx
}

fn request(fx: &common::Fixture) -> CalculationRequest {
    CalculationRequest {
        period_id: fx.period_id,
        stage_id: fx.stage.id,
        excluded_library_ids: BTreeSet::new(),
    }
}

#[tokio::test]
async fn test_calculation_is_persisted() {
    let fx = seeded().await;
    let outcome = fx.store.calculate(request(&fx)).await.unwrap();

    assert_eq!(outcome.payments_calculated, 4);
    assert!(outcome.skipped.is_empty());
    assert!(approx_eq(outcome.total_payment, 277_500.0));
    assert!(approx_eq(outcome.section_pools[&fx.gen_section.id], 6000.0));
    assert!(approx_eq(outcome.section_pools[&fx.lang_section.id], 8000.0));

    let stored = fx.store.payments_for_period(fx.period_id).await.unwrap();
    assert_eq!(stored.len(), 4);

    let arabic_lang = stored
        .iter()
        .find(|p| p.payment.library_id == 500 && p.payment.section_id == fx.lang_section.id)
        .unwrap();
    assert_eq!(arabic_lang.payment.share_kind, ShareKind::Common);
    assert_eq!(arabic_lang.payment.raw_watch_time_seconds, 10_000);
    assert!(approx_eq(arabic_lang.payment.total_watch_time_seconds, 7000.0));
    assert!(approx_eq(arabic_lang.payment.watch_time_percentage, 0.875));
    assert!(approx_eq(arabic_lang.payment.section_order_percentage, 0.7));
    assert!(approx_eq(arabic_lang.payment.final_payment, 157_500.0));
    assert_eq!(
        arabic_lang
            .payment
            .monthly_watch_breakdown
            .get(&"2025-11".parse().unwrap()),
        Some(4000)
    );

    let summary = fx
        .store
        .period_summary(fx.period_id, fx.stage.id)
        .await
        .unwrap();
    assert_eq!(summary.libraries[0].library_id, 500);
    assert_eq!(summary.libraries[0].sections, 2);
    assert!(approx_eq(summary.libraries[0].final_payment, 202_500.0));
}

#[tokio::test]
async fn test_recalculation_replaces_payment_set() {
    let fx = seeded().await;
    fx.store.calculate(request(&fx)).await.unwrap();

    let assignments = fx.store.list_assignments(Some(fx.stage.id)).await.unwrap();
    let math_gen = assignments.iter().find(|a| a.library_id == 600).unwrap();
    fx.store
        .update_assignment(
            math_gen.id,
            AssignmentUpdate {
                tax_rate: Some(0.2),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let outcome = fx.store.calculate(request(&fx)).await.unwrap();
    assert_eq!(outcome.payments_calculated, 4);

    let stored = fx.store.payments_for_period(fx.period_id).await.unwrap();
    assert_eq!(stored.len(), 4);
    let math = stored.iter().find(|p| p.payment.library_id == 600).unwrap();
    assert!(approx_eq(math.payment.tax_amount, 10_000.0));
    assert!(approx_eq(math.payment.final_payment, 40_000.0));
}

#[tokio::test]
async fn test_excluded_library_is_left_out_of_pool() {
    let fx = seeded().await;
    let outcome = fx
        .store
        .calculate(CalculationRequest {
            excluded_library_ids: BTreeSet::from([700]),
            ..request(&fx)
        })
        .await
        .unwrap();

    assert_eq!(outcome.payments_calculated, 3);
    assert!(approx_eq(outcome.section_pools[&fx.lang_section.id], 7000.0));
    let arabic_lang = outcome
        .payments
        .iter()
        .find(|p| p.library_id == 500 && p.section_id == fx.lang_section.id)
        .unwrap();
    assert!(approx_eq(arabic_lang.final_payment, 180_000.0));
}

#[tokio::test]
async fn test_failed_run_keeps_previous_payments() {
    let fx = seeded().await;
    fx.store.calculate(request(&fx)).await.unwrap();

    let missing_period = fx
        .store
        .calculate(CalculationRequest {
            period_id: 9999,
            ..request(&fx)
        })
        .await
        .unwrap_err();
    assert_eq!(missing_period.kind(), ErrorKind::NotFound);

    let empty_stage = fx
        .store
        .create_stage(NewStage {
            code: "S2".into(),
            name: "Senior 2".into(),
            display_order: 2,
        })
        .await
        .unwrap();
    let no_revenue = fx
        .store
        .calculate(CalculationRequest {
            stage_id: empty_stage.id,
            ..request(&fx)
        })
        .await
        .unwrap_err();
    assert_eq!(no_revenue.kind(), ErrorKind::NotFound);
    assert!(no_revenue.message().contains("no revenue data"));

    let stored = fx.store.payments_for_period(fx.period_id).await.unwrap();
    assert_eq!(stored.len(), 4);
}

#[tokio::test]
async fn test_concurrent_runs_for_same_pair_do_not_interleave() {
    let fx = seeded().await;
    let (first, second) = tokio::join!(
        fx.store.calculate(request(&fx)),
        fx.store.calculate(request(&fx))
    );
    let first = first.unwrap();
    let second = second.unwrap();

    assert_eq!(
        serde_json::to_value(&first.payments).unwrap(),
        serde_json::to_value(&second.payments).unwrap()
    );
    let stored = fx.store.payments_for_period(fx.period_id).await.unwrap();
    assert_eq!(stored.len(), 4);
}

#[tokio::test]
async fn test_overview_lists_assignments_with_subject_flags() {
    let fx = seeded().await;
    fx.store.calculate(request(&fx)).await.unwrap();

    let overview = fx
        .store
        .financial_overview(fx.period_id, fx.stage.id)
        .await
        .unwrap();
    assert_eq!(overview.stage.code, "S1");
    assert_eq!(overview.sections.len(), 2);
    assert_eq!(overview.revenues.len(), 2);
    assert_eq!(overview.assignments.len(), 4);
    assert_eq!(
        overview
            .assignments
            .iter()
            .filter(|a| a.is_common)
            .count(),
        2
    );
    assert_eq!(overview.payments.len(), 4);
}

#[tokio::test]
async fn test_payment_set_rejects_second_row_per_assignment() {
    let fx = seeded().await;
    let outcome = fx.store.calculate(request(&fx)).await.unwrap();

    let duplicate = teacher_payment::ActiveModel::from_payment(
        fx.period_id,
        &outcome.payments[0],
        chrono::Utc::now().naive_utc(),
    )
    .unwrap();
    assert!(duplicate.insert(fx.store.db()).await.is_err());

    let rows = teacher_payment::Entity::find()
        .all(fx.store.db())
        .await
        .unwrap();
    assert_eq!(rows.len(), 4);
}

async fn period_with_revenue(
    fx: &common::Fixture,
    name: &str,
    year: i32,
    months: &[&str],
) -> i32 {
    let period = fx
        .store
        .create_period(NewPeriod {
            name: name.into(),
            year,
            months: months.iter().map(|m| m.to_string()).collect(),
            notes: None,
        })
        .await
        .unwrap();
    for (section_id, orders) in [(fx.gen_section.id, 50), (fx.lang_section.id, 50)] {
        fx.store
            .upsert_section_revenue(RevenueInput {
                period_id: period.period.id,
                stage_id: fx.stage.id,
                section_id,
                total_orders: orders,
                total_revenue_egp: 10_000.0,
            })
            .await
            .unwrap();
    }
    period.period.id
}

#[tokio::test]
async fn test_legacy_period_sums_whole_year() {
    let fx = fixture().await;
    let math = fx.math.clone();
    fx.assign(800, &math, Some(fx.gen_section.id), 0.0, 1.0).await;
    fx.store
        .import_watch_stats(&[
            stat(800, 2024, 1, 100),
            stat(800, 2024, 6, 200),
            stat(800, 2024, 12, 300),
            stat(800, 2025, 1, 5000),
        ])
        .await
        .unwrap();
    let period_id = period_with_revenue(&fx, "FY 2024", 2024, &[]).await;

    let outcome = fx
        .store
        .calculate(CalculationRequest {
            period_id,
            ..request(&fx)
        })
        .await
        .unwrap();

    assert_eq!(outcome.aggregation_mode, AggregationMode::YearFallback);
    assert_eq!(outcome.payments.len(), 1);
    assert_eq!(outcome.payments[0].raw_watch_time_seconds, 600);
    assert!(approx_eq(outcome.section_pools[&fx.gen_section.id], 600.0));
}

#[tokio::test]
async fn test_period_spanning_two_years_reads_both() {
    let fx = fixture().await;
    let math = fx.math.clone();
    fx.assign(900, &math, Some(fx.lang_section.id), 0.0, 1.0).await;
    fx.store
        .import_watch_stats(&[
            stat(900, 2024, 11, 7000),
            stat(900, 2024, 12, 1200),
            stat(900, 2025, 1, 800),
            stat(900, 2025, 2, 9000),
        ])
        .await
        .unwrap();
    let period_id = period_with_revenue(&fx, "Winter", 2025, &["2024-12", "2025-01"]).await;

    let outcome = fx
        .store
        .calculate(CalculationRequest {
            period_id,
            ..request(&fx)
        })
        .await
        .unwrap();

    assert_eq!(outcome.aggregation_mode, AggregationMode::DeclaredMonths);
    let payment = &outcome.payments[0];
    assert_eq!(payment.raw_watch_time_seconds, 2000);
    assert_eq!(
        payment
            .monthly_watch_breakdown
            .get(&"2024-12".parse().unwrap()),
        Some(1200)
    );
    assert_eq!(
        payment
            .monthly_watch_breakdown
            .get(&"2025-01".parse().unwrap()),
        Some(800)
    );
}
