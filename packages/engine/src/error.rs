use thiserror::Error;

/// Failures that abort a calculation or reject input before any mutation.
///
/// Arithmetic edge cases (empty pools, zero orders) are never errors; they
/// are absorbed by the policies in [`crate::shares`] and [`crate::payment`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayoutError {
    #[error("no revenue data found for period {period_id} and stage {stage_id}")]
    NoRevenueData { period_id: i32, stage_id: i32 },

    #[error("no teacher assignments found for stage {stage_id}")]
    NoAssignments { stage_id: i32 },

    #[error("invalid month '{0}', expected YYYY-MM")]
    InvalidMonth(String),

    #[error("{field} must be between 0 and 1, got {value}")]
    InvalidRate { field: &'static str, value: f64 },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },
}

pub type PayoutResult<T> = Result<T, PayoutError>;

/// Ensures a rate such as `tax_rate` or `revenue_percentage` lies in `[0, 1]`.
pub fn validate_rate(field: &'static str, value: f64) -> PayoutResult<f64> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(PayoutError::InvalidRate { field, value })
    }
}

pub fn validate_non_negative(field: &'static str, value: f64) -> PayoutResult<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(PayoutError::Negative { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rate_bounds() {
        assert_eq!(validate_rate("tax_rate", 0.0), Ok(0.0));
        assert_eq!(validate_rate("tax_rate", 1.0), Ok(1.0));
        assert!(validate_rate("tax_rate", 1.01).is_err());
        assert!(validate_rate("tax_rate", -0.1).is_err());
        assert!(validate_rate("tax_rate", f64::NAN).is_err());
    }

    #[test]
    fn test_error_messages() {
        let err = PayoutError::NoAssignments { stage_id: 4 };
        assert_eq!(err.to_string(), "no teacher assignments found for stage 4");

        let err = validate_rate("revenue_percentage", 2.0).unwrap_err();
        assert_eq!(err.to_string(), "revenue_percentage must be between 0 and 1, got 2");
    }
}
