//! Small numeric helpers shared across crates.

/// Round to `dp` decimal places (half away from zero).
pub fn round_dp(value: f64, dp: i32) -> f64 {
    let factor = 10f64.powi(dp);
    (value * factor).round() / factor
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Percentage of `part` in `whole`, 0 when `whole` is 0.
pub fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding() {
        assert_eq!(round_dp(1.23456, 2), 1.23);
        assert_eq!(round_dp(0.505050, 2), 0.51);
        assert_eq!(round_dp(-4.45, 1), -4.5);
    }

    #[test]
    fn mean_and_pct() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), Some(2.0));
        assert_eq!(pct(15, 20), 75.0);
        assert_eq!(pct(1, 0), 0.0);
    }
}
