//! Simplified DCF over a per-share earnings stream.
//!
//! Five years of earnings grow at the sector rate and are discounted at a flat
//! 10%; year-5 earnings are then capitalised at the same rate as a terminal
//! value. There is no bound on the growth rate: above ~90% the terminal term
//! dominates the sum, which is accepted rather than rejected.

pub const DISCOUNT_RATE: f64 = 0.10;
pub const PROJECTION_YEARS: i32 = 5;

/// Untruncated present value of the projected stream plus terminal value.
pub fn present_value(eps: f64, growth_rate_percent: f64) -> f64 {
    let mut projected = eps;
    let mut total = 0.0;

    for year in 1..=PROJECTION_YEARS {
        projected *= 1.0 + growth_rate_percent / 100.0;
        total += projected / (1.0 + DISCOUNT_RATE).powf(year as f64);
    }

    let terminal = projected / DISCOUNT_RATE;
    total + terminal / (1.0 + DISCOUNT_RATE).powf(PROJECTION_YEARS as f64)
}

/// DCF value truncated to whole currency units.
///
/// A non-positive `eps` still produces a (non-positive) number; callers treat
/// anything `<= 0` as unusable. Non-finite sums collapse to 0 for the same reason.
pub fn estimate(eps: f64, growth_rate_percent: f64) -> i64 {
    let value = present_value(eps, growth_rate_percent);
    if !value.is_finite() {
        tracing::warn!("DCF overflowed for eps={} growth={}%", eps, growth_rate_percent);
        return 0;
    }
    tracing::debug!("DCF eps={} growth={}% -> {:.2}", eps, growth_rate_percent, value);
    value as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_growth_matches_hand_computation() {
        let by_hand: f64 = (1..=5).map(|i| 1000.0 / 1.1_f64.powi(i)).sum::<f64>()
            + 1000.0 / 0.10 / 1.1_f64.powi(5);
        assert_relative_eq!(present_value(1000.0, 0.0), by_hand, epsilon = 1e-6);
        assert_relative_eq!(by_hand, 10_000.0, epsilon = 1e-6);
        // the float sum lands a hair under 10,000 and truncates down
        assert_eq!(estimate(1000.0, 0.0), 9999);
    }

    #[test]
    fn test_memory_sector_growth() {
        assert_eq!(estimate(4950.0, 3.5), 57197);
    }

    #[test]
    fn test_strictly_increasing_in_eps() {
        let mut previous = estimate(100.0, 5.0);
        for eps in (200..=5000).step_by(100) {
            let value = estimate(eps as f64, 5.0);
            assert!(value > previous, "eps {} gave {} <= {}", eps, value, previous);
            previous = value;
        }
    }

    #[test]
    fn test_strictly_increasing_in_growth() {
        let mut previous = estimate(1000.0, 0.0);
        for step in 1..=60 {
            let growth = step as f64 * 0.5;
            let value = estimate(1000.0, growth);
            assert!(value > previous, "growth {} gave {} <= {}", growth, value, previous);
            previous = value;
        }
    }

    #[test]
    fn test_loss_making_eps_is_negative() {
        assert_eq!(estimate(-500.0, 4.5), -6017);
        assert_eq!(estimate(0.0, 12.5), 0);
    }

    #[test]
    fn test_extreme_growth_is_not_rejected() {
        let value = estimate(1000.0, 95.0);
        let terminal_share = (1000.0 * 1.95_f64.powi(5) / DISCOUNT_RATE / 1.1_f64.powi(5)) / value as f64;
        assert!(terminal_share > 0.8);
    }

    #[test]
    fn test_overflow_collapses_to_zero() {
        assert_eq!(estimate(f64::MAX, 500.0), 0);
    }
}
