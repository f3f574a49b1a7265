use time::OffsetDateTime;

use crate::result::CheckError;

/// Check an evaluation timestamp against a transaction's time window.
///
/// Valid iff `lower_bound <= evaluation_timestamp < upper_bound`: the lower
/// bound (when present) is inclusive, the upper bound exclusive. The caller
/// supplies `evaluation_timestamp`; this function never reads the clock.
pub fn validate_time_window(
    evaluation_timestamp: OffsetDateTime,
    lower_bound: Option<OffsetDateTime>,
    upper_bound: OffsetDateTime,
) -> Result<(), CheckError> {
    let after_lower = lower_bound.map_or(true, |lb| evaluation_timestamp >= lb);
    if after_lower && evaluation_timestamp < upper_bound {
        Ok(())
    } else {
        Err(CheckError::TimeWindowOutOfBounds {
            evaluation_timestamp,
            lower_bound,
            upper_bound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const LOWER: OffsetDateTime = datetime!(2025-01-01 00:00:00 UTC);
    const UPPER: OffsetDateTime = datetime!(2025-01-01 00:00:10 UTC);

    #[test]
    fn inside_window_is_valid() {
        let now = datetime!(2025-01-01 00:00:05 UTC);
        assert!(validate_time_window(now, Some(LOWER), UPPER).is_ok());
    }

    #[test]
    fn lower_bound_is_inclusive() {
        assert!(validate_time_window(LOWER, Some(LOWER), UPPER).is_ok());
    }

    #[test]
    fn upper_bound_is_exclusive() {
        let err = validate_time_window(UPPER, Some(LOWER), UPPER).unwrap_err();
        assert_eq!(
            err,
            CheckError::TimeWindowOutOfBounds {
                evaluation_timestamp: UPPER,
                lower_bound: Some(LOWER),
                upper_bound: UPPER,
            }
        );
    }

    #[test]
    fn before_lower_bound_is_out_of_bounds() {
        let now = datetime!(2024-12-31 23:59:59 UTC);
        assert!(matches!(
            validate_time_window(now, Some(LOWER), UPPER),
            Err(CheckError::TimeWindowOutOfBounds { .. })
        ));
    }

    #[test]
    fn missing_lower_bound_only_checks_upper() {
        let long_ago = datetime!(1970-01-01 00:00:00 UTC);
        assert!(validate_time_window(long_ago, None, UPPER).is_ok());
        assert!(validate_time_window(UPPER, None, UPPER).is_err());
    }
}
