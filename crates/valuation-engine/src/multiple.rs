use std::collections::BTreeMap;
use valuation_core::{CoreMetric, SectorProfile};

/// One multiple-based candidate that went into the relative valuation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultipleComponent {
    pub metric: CoreMetric,
    pub target: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultipleEstimate {
    /// Mean of the candidates, truncated; `None` when no core metric qualified
    pub value: Option<i64>,
    pub explanation: String,
    pub components: Vec<MultipleComponent>,
}

/// Per-share cash-flow proxy backed out of the current price.
///
/// There is no real EBITDA-per-share figure in the data, so the price is
/// divided by the company's own EV/EBITDA ratio. The cash-flow multiple
/// therefore tracks the price scaled by (sector midpoint / company ratio).
pub fn cash_flow_per_share(current_price: i64, cash_flow_multiple: f64) -> i64 {
    if cash_flow_multiple > 0.0 && cash_flow_multiple.is_finite() {
        (current_price as f64 / cash_flow_multiple) as i64
    } else {
        0
    }
}

/// Blend the sector's core multiples into one relative value.
///
/// `overrides` replaces the sector midpoint for a metric when it carries a
/// nonzero target.
pub fn estimate(
    eps: f64,
    bps: f64,
    cash_flow_per_share: f64,
    profile: &SectorProfile,
    overrides: &BTreeMap<CoreMetric, f64>,
) -> MultipleEstimate {
    let mut components = Vec::new();

    for metric in CoreMetric::ALL {
        if !profile.is_core(metric) {
            continue;
        }
        let base = match metric {
            CoreMetric::EarningsMultiple => eps,
            CoreMetric::BookMultiple => bps,
            CoreMetric::CashFlowMultiple => cash_flow_per_share,
        };
        if base.is_nan() || base <= 0.0 {
            tracing::debug!("Skipping {}: base {} is not positive", metric, base);
            continue;
        }
        let Some(target) = target_multiple(metric, profile, overrides) else {
            tracing::debug!("Skipping {}: no target multiple", metric);
            continue;
        };
        components.push(MultipleComponent {
            metric,
            target,
            value: base * target,
        });
    }

    if components.is_empty() {
        let missing = profile
            .core_metrics
            .iter()
            .map(|m| m.label())
            .collect::<Vec<_>>()
            .join(", ");
        return MultipleEstimate {
            value: None,
            explanation: format!("insufficient data: no usable {}", missing),
            components,
        };
    }

    let mean = components.iter().map(|c| c.value).sum::<f64>() / components.len() as f64;
    let explanation = components
        .iter()
        .map(|c| format!("{}(×{})", c.metric.label(), format_multiple(c.target)))
        .collect::<Vec<_>>()
        .join(", ");

    MultipleEstimate {
        value: Some(mean as i64),
        explanation,
        components,
    }
}

fn target_multiple(
    metric: CoreMetric,
    profile: &SectorProfile,
    overrides: &BTreeMap<CoreMetric, f64>,
) -> Option<f64> {
    overrides
        .get(&metric)
        .copied()
        .filter(|t| *t != 0.0 && t.is_finite())
        .or_else(|| profile.default_target(metric))
}

/// At most two decimals with trailing zeros dropped ("27.5", "20", "1.45")
pub fn format_multiple(multiple: f64) -> String {
    let fixed = format!("{:.2}", multiple);
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}
