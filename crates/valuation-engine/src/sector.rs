use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use valuation_core::{CoreMetric, IndustryCategory, MultipleRange, SectorProfile, ValuationError};

const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Immutable mapping from industry category to its valuation parameters.
///
/// Always contains an `Other` profile, which `lookup` falls back to for any
/// category the table does not carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<IndustryCategory, SectorProfile>",
    into = "BTreeMap<IndustryCategory, SectorProfile>"
)]
pub struct SectorTable {
    profiles: BTreeMap<IndustryCategory, SectorProfile>,
    fallback: SectorProfile,
}

impl SectorTable {
    /// Build a table from explicit profiles, checking every profile invariant.
    pub fn new(profiles: BTreeMap<IndustryCategory, SectorProfile>) -> Result<Self, ValuationError> {
        for (category, profile) in &profiles {
            validate_profile(*category, profile)?;
        }
        let fallback = profiles
            .get(&IndustryCategory::Other)
            .cloned()
            .ok_or_else(|| ValuationError::InvalidConfig("sector table has no 'other' profile".to_string()))?;

        Ok(Self { profiles, fallback })
    }

    pub fn from_json(json: &str) -> Result<Self, ValuationError> {
        serde_json::from_str(json).map_err(|e| ValuationError::InvalidConfig(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ValuationError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ValuationError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        let table = Self::from_json(&json)?;
        tracing::info!("Loaded {} sector profiles from {}", table.profiles.len(), path.display());
        Ok(table)
    }

    /// Profile for `industry`, or the `Other` profile when the table has none.
    pub fn lookup(&self, industry: IndustryCategory) -> &SectorProfile {
        self.profiles.get(&industry).unwrap_or(&self.fallback)
    }

    pub fn categories(&self) -> impl Iterator<Item = IndustryCategory> + '_ {
        self.profiles.keys().copied()
    }

    /// The built-in semiconductor sector table (2024/25 consensus bands).
    pub fn embedded() -> Self {
        use CoreMetric::*;

        let other = profile(&[EarningsMultiple], (10.0, 15.0), (1.0, 1.5), (5.0, 8.0), 3.0, 0.5, 0.5);
        let profiles: BTreeMap<IndustryCategory, SectorProfile> = [
            (IndustryCategory::FablessIp, profile(&[EarningsMultiple], (20.0, 35.0), (2.5, 5.0), (15.0, 25.0), 12.5, 0.6, 0.4)),
            (IndustryCategory::Foundry, profile(&[CashFlowMultiple], (10.0, 20.0), (1.0, 2.5), (6.0, 10.0), 8.0, 0.55, 0.45)),
            (IndustryCategory::MemoryIdm, profile(&[BookMultiple, CashFlowMultiple], (8.0, 15.0), (1.1, 1.8), (3.5, 6.0), 3.5, 0.4, 0.6)),
            (IndustryCategory::Equipment, profile(&[EarningsMultiple], (15.0, 25.0), (2.0, 4.0), (10.0, 18.0), 9.0, 0.55, 0.45)),
            (IndustryCategory::Materials, profile(&[EarningsMultiple], (12.0, 20.0), (1.5, 3.5), (8.0, 15.0), 6.0, 0.5, 0.5)),
            (IndustryCategory::Osat, profile(&[EarningsMultiple, BookMultiple], (10.0, 18.0), (1.2, 2.2), (6.0, 12.0), 4.5, 0.4, 0.6)),
            (IndustryCategory::Inspection, profile(&[EarningsMultiple], (20.0, 35.0), (3.0, 6.0), (15.0, 25.0), 10.0, 0.6, 0.4)),
            (IndustryCategory::ModulesParts, profile(&[EarningsMultiple], (8.0, 14.0), (1.0, 2.0), (5.0, 10.0), 4.0, 0.45, 0.55)),
            (IndustryCategory::Other, other.clone()),
        ]
        .into_iter()
        .collect();

        Self { profiles, fallback: other }
    }
}

impl Default for SectorTable {
    fn default() -> Self {
        Self::embedded()
    }
}

impl TryFrom<BTreeMap<IndustryCategory, SectorProfile>> for SectorTable {
    type Error = ValuationError;

    fn try_from(profiles: BTreeMap<IndustryCategory, SectorProfile>) -> Result<Self, Self::Error> {
        Self::new(profiles)
    }
}

impl From<SectorTable> for BTreeMap<IndustryCategory, SectorProfile> {
    fn from(table: SectorTable) -> Self {
        table.profiles
    }
}

fn profile(
    core: &[CoreMetric],
    per: (f64, f64),
    pbr: (f64, f64),
    ev_ebitda: (f64, f64),
    growth_rate: f64,
    dcf_weight: f64,
    multiple_weight: f64,
) -> SectorProfile {
    let multiple_ranges = [
        (CoreMetric::EarningsMultiple, MultipleRange::new(per.0, per.1)),
        (CoreMetric::BookMultiple, MultipleRange::new(pbr.0, pbr.1)),
        (CoreMetric::CashFlowMultiple, MultipleRange::new(ev_ebitda.0, ev_ebitda.1)),
    ]
    .into_iter()
    .collect();

    SectorProfile {
        core_metrics: core.to_vec(),
        multiple_ranges,
        growth_rate,
        dcf_weight,
        multiple_weight,
    }
}

fn validate_profile(category: IndustryCategory, profile: &SectorProfile) -> Result<(), ValuationError> {
    let invalid = |msg: String| Err(ValuationError::InvalidConfig(format!("{}: {}", category.key(), msg)));

    if profile.core_metrics.is_empty() {
        return invalid("no core metrics".to_string());
    }
    for metric in &profile.core_metrics {
        if !profile.multiple_ranges.contains_key(metric) {
            return invalid(format!("core metric {} has no multiple range", metric));
        }
    }
    for (metric, range) in &profile.multiple_ranges {
        if !(range.low.is_finite() && range.high.is_finite()) || range.low <= 0.0 || range.low > range.high {
            return invalid(format!("bad {} range {}..{}", metric, range.low, range.high));
        }
    }
    if !profile.growth_rate.is_finite() {
        return invalid("growth rate is not finite".to_string());
    }
    if profile.dcf_weight < 0.0 || profile.multiple_weight < 0.0 {
        return invalid("negative blend weight".to_string());
    }
    if (profile.dcf_weight + profile.multiple_weight - 1.0).abs() > WEIGHT_TOLERANCE {
        return invalid(format!(
            "blend weights {} + {} do not sum to 1",
            profile.dcf_weight, profile.multiple_weight
        ));
    }
    Ok(())
}
