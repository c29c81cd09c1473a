use valuation_core::Verdict;

/// Upside above which a stock is called undervalued (percent, exclusive)
pub const UNDERVALUED_ABOVE: f64 = 15.0;
/// Upside below which a stock is called overvalued (percent, exclusive)
pub const OVERVALUED_BELOW: f64 = -15.0;

/// Combine DCF and relative values into one fair value.
///
/// A value only counts when positive. With both present the sector weights
/// apply; with one present it is used as-is; with none the result is `None`.
pub fn blend(
    dcf_value: i64,
    multiple_value: Option<i64>,
    dcf_weight: f64,
    multiple_weight: f64,
) -> Option<f64> {
    let dcf = (dcf_value > 0).then_some(dcf_value as f64);
    let multiple = multiple_value.filter(|v| *v > 0).map(|v| v as f64);

    match (dcf, multiple) {
        (Some(d), Some(m)) => Some(d * dcf_weight + m * multiple_weight),
        (Some(d), None) => Some(d),
        (None, Some(m)) => Some(m),
        (None, None) => None,
    }
}

/// Percentage gap between fair value and price; `None` without a positive price.
pub fn upside_percent(fair_value: f64, current_price: i64) -> Option<f64> {
    if current_price <= 0 {
        return None;
    }
    let price = current_price as f64;
    Some((fair_value - price) / price * 100.0)
}

pub fn classify(upside_percent: f64) -> Verdict {
    if upside_percent > UNDERVALUED_ABOVE {
        Verdict::Undervalued
    } else if upside_percent < OVERVALUED_BELOW {
        Verdict::Overvalued
    } else {
        Verdict::FairlyValued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_source_ignores_weights() {
        assert_eq!(blend(100, None, 0.6, 0.4), Some(100.0));
        assert_eq!(blend(100, Some(0), 0.6, 0.4), Some(100.0));
        assert_eq!(blend(-20, Some(250), 0.6, 0.4), Some(250.0));
    }

    #[test]
    fn test_both_sources_weighted() {
        let fair = blend(57_197, Some(72_013), 0.4, 0.6).unwrap();
        assert_relative_eq!(fair, 66_086.6, epsilon = 1e-6);
    }

    #[test]
    fn test_neither_source_usable() {
        assert_eq!(blend(0, None, 0.5, 0.5), None);
        assert_eq!(blend(-6017, Some(0), 0.4, 0.6), None);
    }

    #[test]
    fn test_threshold_boundaries_are_strict() {
        assert_eq!(upside_percent(115.0, 100), Some(15.0));
        assert_eq!(classify(15.0), Verdict::FairlyValued);
        assert_eq!(upside_percent(85.0, 100), Some(-15.0));
        assert_eq!(classify(-15.0), Verdict::FairlyValued);
        assert_eq!(classify(15.01), Verdict::Undervalued);
        assert_eq!(classify(-15.01), Verdict::Overvalued);
    }

    #[test]
    fn test_upside_requires_positive_price() {
        assert_eq!(upside_percent(1000.0, 0), None);
        assert_eq!(upside_percent(1000.0, -5), None);
    }
}
