use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Everything needed to price one teacher's share of one section.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct PaymentInput {
    pub section_revenue_egp: f64,
    pub section_total_orders: i64,
    /// The section's order share, carried through for the audit trail.
    pub section_order_percentage: f64,
    pub teacher_watch_time_seconds: f64,
    pub section_pool_seconds: f64,
    pub revenue_percentage: f64,
    pub tax_rate: f64,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct PaymentBreakdown {
    pub watch_time_percentage: f64,
    pub section_order_percentage: f64,
    pub base_revenue: f64,
    pub revenue_percentage_applied: f64,
    pub calculated_revenue: f64,
    pub tax_rate_applied: f64,
    pub tax_amount: f64,
    pub final_payment: f64,
}

impl PaymentBreakdown {
    /// Tax and final payment are always derived from the calculated revenue.
    pub fn from_calculated(calculated_revenue: f64, tax_rate: f64) -> (f64, f64) {
        let tax_amount = calculated_revenue * tax_rate;
        (tax_amount, calculated_revenue - tax_amount)
    }
}

/// Prices a teacher's share of a section's revenue.
///
/// The order is fixed: watch share of the pool, base revenue, revenue
/// percentage, tax, final payment. An empty pool yields a 0% share.
pub fn compute(input: &PaymentInput) -> PaymentBreakdown {
    let watch_time_percentage = if input.section_pool_seconds > 0.0 {
        (input.teacher_watch_time_seconds / input.section_pool_seconds).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let base_revenue = input.section_revenue_egp * watch_time_percentage;
    let calculated_revenue = base_revenue * input.revenue_percentage;
    let (tax_amount, final_payment) =
        PaymentBreakdown::from_calculated(calculated_revenue, input.tax_rate);

    PaymentBreakdown {
        watch_time_percentage,
        section_order_percentage: input.section_order_percentage,
        base_revenue,
        revenue_percentage_applied: input.revenue_percentage,
        calculated_revenue,
        tax_rate_applied: input.tax_rate,
        tax_amount,
        final_payment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approx_eq;

    fn input(watch: f64, pool: f64, revenue_percentage: f64, tax_rate: f64) -> PaymentInput {
        PaymentInput {
            section_revenue_egp: 100_000.0,
            section_total_orders: 10,
            section_order_percentage: 1.0,
            teacher_watch_time_seconds: watch,
            section_pool_seconds: pool,
            revenue_percentage,
            tax_rate,
        }
    }

    #[test]
    fn test_two_teachers_split_by_watch_time() {
        let a = compute(&input(3000.0, 4000.0, 0.95, 0.1));
        let b = compute(&input(1000.0, 4000.0, 0.95, 0.1));

        assert!(approx_eq(a.watch_time_percentage, 0.75));
        assert!(approx_eq(a.base_revenue, 75_000.0));
        assert!(approx_eq(a.final_payment, 100_000.0 * 0.75 * 0.95 * 0.9));
        assert!(approx_eq(b.final_payment, 100_000.0 * 0.25 * 0.95 * 0.9));
    }

    #[test]
    fn test_empty_pool_pays_nothing() {
        let breakdown = compute(&input(0.0, 0.0, 1.0, 0.0));
        assert_eq!(breakdown.watch_time_percentage, 0.0);
        assert_eq!(breakdown.final_payment, 0.0);
    }

    #[test]
    fn test_tax_and_final_are_consistent() {
        let breakdown = compute(&input(1234.0, 5678.0, 0.8, 0.14));
        assert!(approx_eq(
            breakdown.tax_amount,
            breakdown.calculated_revenue * breakdown.tax_rate_applied
        ));
        assert!(approx_eq(
            breakdown.final_payment,
            breakdown.calculated_revenue - breakdown.tax_amount
        ));
        assert!(approx_eq(
            breakdown.final_payment,
            breakdown.base_revenue * 0.8 * (1.0 - 0.14)
        ));
    }

    #[test]
    fn test_percentage_is_bounded() {
        let breakdown = compute(&input(5000.0, 4000.0, 1.0, 0.0));
        assert_eq!(breakdown.watch_time_percentage, 1.0);
    }
}
