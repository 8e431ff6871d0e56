/// Rounds hour amounts to two decimals, the precision stored on
/// attendance and overtime rows.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Whether an hour amount vanishes at two-decimal precision.
pub fn is_zero2(value: f64) -> bool {
    value.abs() < 0.005
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(-0.125), -0.13);
        assert_eq!(round2(1.004), 1.0);
    }

    #[test]
    fn zero_check_matches_rounding_threshold() {
        assert!(is_zero2(0.004));
        assert!(is_zero2(-0.0049));
        assert!(!is_zero2(0.005));
        assert!(!is_zero2(-0.01));
    }
}
