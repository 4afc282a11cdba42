use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// Decimal places kept when an estimate is stored or compared
pub const RECORD_SCALE: u32 = 2;

/// Exclusive upper bound of a stored record, the range of `NUMERIC(10, 2)`
pub fn max_record_value() -> Decimal {
    Decimal::new(100_000_000, 0)
}

/// Estimated one-rep max (Epley): `weight * (1 + reps / 30)`.
///
/// `reps` must be at least 1; inputs are validated before they get here.
pub fn estimate(weight: f64, reps: u32) -> f64 {
    weight * (1.0 + f64::from(reps) / 30.0)
}

/// Estimate for a stored set. A missing weight counts as zero.
pub fn estimate_set(weight: Option<i32>, reps: i32) -> Decimal {
    let weight = f64::from(weight.unwrap_or(0));
    let reps = u32::try_from(reps).unwrap_or(0);
    to_record_value(estimate(weight, reps))
}

/// Round an estimate to the precision of the `best_value` column so cached
/// and freshly computed values compare exactly.
pub fn to_record_value(estimate: f64) -> Decimal {
    Decimal::from_f64(estimate)
        .unwrap_or(Decimal::ZERO)
        .round_dp(RECORD_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 0.02
    }

    #[test]
    fn single_rep_estimates() {
        assert!(close(estimate(200.0, 1), 206.67));
        assert!(close(estimate(100.0, 1), 103.33));
        assert!(close(estimate(250.0, 1), 258.33));
    }

    #[test]
    fn thirty_reps_doubles_the_weight() {
        assert_eq!(estimate(100.0, 30), 200.0);
    }

    #[test]
    fn set_values_are_rounded_to_column_scale() {
        assert_eq!(estimate_set(Some(200), 1), Decimal::from_str("206.67").unwrap());
        assert_eq!(estimate_set(Some(100), 1), Decimal::from_str("103.33").unwrap());
        assert_eq!(estimate_set(Some(250), 1), Decimal::from_str("258.33").unwrap());
    }

    #[test]
    fn estimates_past_the_column_range_reach_the_bound() {
        assert!(estimate_set(Some(100_000_000), 1) >= max_record_value());
        assert!(estimate_set(Some(50_000_000), 30) >= max_record_value());
        assert!(estimate_set(Some(96_000_000), 1) < max_record_value());
    }

    #[test]
    fn missing_weight_estimates_as_zero() {
        assert_eq!(estimate_set(None, 12), Decimal::ZERO);
    }
}
