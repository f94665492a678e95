use std::collections::BTreeMap;

/// Fraction of total paid orders that belongs to each section.
///
/// Fractions sum to `1.0` over the input. When no section has any orders
/// every section gets `1/n`, so a calculation can still proceed while
/// order data is missing. Negative counts are treated as zero.
pub fn order_shares(sections: &[(i32, i64)]) -> BTreeMap<i32, f64> {
    let total: i64 = sections.iter().map(|(_, orders)| (*orders).max(0)).sum();
    let n = sections.len();

    if total == 0 {
        if n > 0 {
            tracing::warn!("No orders recorded across {} sections, splitting equally", n);
        }
        let equal = if n == 0 { 0.0 } else { 1.0 / n as f64 };
        return sections.iter().map(|(id, _)| (*id, equal)).collect();
    }

    sections
        .iter()
        .map(|(id, orders)| (*id, (*orders).max(0) as f64 / total as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approx_eq;

    #[test]
    fn test_proportional_shares() {
        let shares = order_shares(&[(1, 30), (2, 70)]);
        assert!(approx_eq(shares[&1], 0.3));
        assert!(approx_eq(shares[&2], 0.7));
    }

    #[test]
    fn test_zero_orders_split_equally() {
        let shares = order_shares(&[(1, 0), (2, 0), (3, 0)]);
        for share in shares.values() {
            assert!(approx_eq(*share, 1.0 / 3.0));
        }
    }

    #[test]
    fn test_shares_sum_to_one() {
        let inputs = [
            vec![(1, 1), (2, 2), (3, 3), (4, 5)],
            vec![(10, 999_999), (11, 1)],
            vec![(7, 42)],
            vec![(1, 0), (2, 0)],
        ];
        for input in inputs {
            let sum: f64 = order_shares(&input).values().sum();
            assert!(approx_eq(sum, 1.0), "{input:?} summed to {sum}");
        }
    }

    #[test]
    fn test_section_without_orders_gets_nothing_when_others_have_orders() {
        let shares = order_shares(&[(1, 0), (2, 10)]);
        assert_eq!(shares[&1], 0.0);
        assert_eq!(shares[&2], 1.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(order_shares(&[]).is_empty());
    }
}
