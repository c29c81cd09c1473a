use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Valuation multiple families a sector can treat as authoritative
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CoreMetric {
    /// Price / earnings
    #[serde(rename = "per", alias = "PER")]
    EarningsMultiple,
    /// Price / book value
    #[serde(rename = "pbr", alias = "PBR")]
    BookMultiple,
    /// EV / EBITDA
    #[serde(rename = "ev_ebitda", alias = "EV_EBITDA")]
    CashFlowMultiple,
}

impl CoreMetric {
    /// Evaluation order used by the relative-multiple estimator
    pub const ALL: [CoreMetric; 3] = [
        CoreMetric::EarningsMultiple,
        CoreMetric::BookMultiple,
        CoreMetric::CashFlowMultiple,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CoreMetric::EarningsMultiple => "PER",
            CoreMetric::BookMultiple => "PBR",
            CoreMetric::CashFlowMultiple => "EV/EBITDA",
        }
    }
}

impl fmt::Display for CoreMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Industry buckets used to pick a sector profile.
///
/// Deserializes from the snake-case key or the Korean label used by the
/// consensus spreadsheets. Anything unrecognised lands in `Other`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndustryCategory {
    #[serde(alias = "설계(팹리스/IP)")]
    FablessIp,
    #[serde(alias = "파운드리")]
    Foundry,
    #[serde(alias = "메모리/IDM")]
    MemoryIdm,
    #[serde(alias = "장비")]
    Equipment,
    #[serde(alias = "소재/케미칼")]
    Materials,
    #[serde(alias = "후공정(OSAT)")]
    Osat,
    #[serde(alias = "검사/계측")]
    Inspection,
    #[serde(alias = "모듈/부품")]
    ModulesParts,
    #[default]
    #[serde(other)]
    Other,
}

impl IndustryCategory {
    pub const ALL: [IndustryCategory; 9] = [
        IndustryCategory::FablessIp,
        IndustryCategory::Foundry,
        IndustryCategory::MemoryIdm,
        IndustryCategory::Equipment,
        IndustryCategory::Materials,
        IndustryCategory::Osat,
        IndustryCategory::Inspection,
        IndustryCategory::ModulesParts,
        IndustryCategory::Other,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            IndustryCategory::FablessIp => "fabless_ip",
            IndustryCategory::Foundry => "foundry",
            IndustryCategory::MemoryIdm => "memory_idm",
            IndustryCategory::Equipment => "equipment",
            IndustryCategory::Materials => "materials",
            IndustryCategory::Osat => "osat",
            IndustryCategory::Inspection => "inspection",
            IndustryCategory::ModulesParts => "modules_parts",
            IndustryCategory::Other => "other",
        }
    }

    /// Korean display label, as used in the consensus data
    pub fn label(&self) -> &'static str {
        match self {
            IndustryCategory::FablessIp => "설계(팹리스/IP)",
            IndustryCategory::Foundry => "파운드리",
            IndustryCategory::MemoryIdm => "메모리/IDM",
            IndustryCategory::Equipment => "장비",
            IndustryCategory::Materials => "소재/케미칼",
            IndustryCategory::Osat => "후공정(OSAT)",
            IndustryCategory::Inspection => "검사/계측",
            IndustryCategory::ModulesParts => "모듈/부품",
            IndustryCategory::Other => "기타",
        }
    }
}

impl FromStr for IndustryCategory {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(IndustryCategory::ALL
            .into_iter()
            .find(|c| c.key().eq_ignore_ascii_case(s) || c.label() == s)
            .unwrap_or(IndustryCategory::Other))
    }
}

impl fmt::Display for IndustryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inclusive (low, high) band of multiples considered normal for a sector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MultipleRange {
    pub low: f64,
    pub high: f64,
}

impl MultipleRange {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Default target multiple for the sector
    pub fn midpoint(&self) -> f64 {
        (self.low + self.high) / 2.0
    }
}

/// Valuation parameters for one industry category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorProfile {
    /// Multiples that count toward the relative valuation
    pub core_metrics: Vec<CoreMetric>,
    pub multiple_ranges: BTreeMap<CoreMetric, MultipleRange>,
    /// Constant annual earnings growth assumed by the DCF, in percent
    pub growth_rate: f64,
    pub dcf_weight: f64,
    pub multiple_weight: f64,
}

impl SectorProfile {
    pub fn is_core(&self, metric: CoreMetric) -> bool {
        self.core_metrics.contains(&metric)
    }

    /// Midpoint of the sector range for `metric`, if the profile carries one
    pub fn default_target(&self, metric: CoreMetric) -> Option<f64> {
        self.multiple_ranges.get(&metric).map(MultipleRange::midpoint)
    }
}

/// Consensus fundamentals for one covered company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyFundamentals {
    /// Six-digit KRX code
    pub ticker: String,
    pub name: String,
    #[serde(default)]
    pub industry: IndustryCategory,
    /// Forecast EPS; negative for a loss-making forecast
    pub earnings_per_share: f64,
    pub book_value_per_share: f64,
    /// EV/EBITDA-like ratio, usable only when > 0
    pub cash_flow_multiple_target: f64,
    /// Display label such as "2025F"
    #[serde(default)]
    pub as_of_period: String,
    /// Company-specific target multiples that replace the sector midpoint
    #[serde(default)]
    pub target_overrides: BTreeMap<CoreMetric, f64>,
}

/// Latest traded (or closing) price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketQuote {
    /// Whole currency units (KRW)
    pub price: i64,
    pub as_of_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Undervalued,
    Overvalued,
    FairlyValued,
    NotAssessable,
}

impl Verdict {
    pub fn to_label(&self) -> &'static str {
        match self {
            Verdict::Undervalued => "Undervalued",
            Verdict::Overvalued => "Overvalued",
            Verdict::FairlyValued => "Fairly Valued",
            Verdict::NotAssessable => "Not Assessable",
        }
    }
}

/// Current market multiple for one metric, shown next to the verdict
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketMultiple {
    pub metric: CoreMetric,
    /// `None` when the denominator is not positive
    pub value: Option<f64>,
    pub is_core: bool,
}

/// Everything the engine derives for one company and one quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    pub ticker: String,
    pub name: String,
    pub industry: IndustryCategory,
    pub as_of_period: String,
    pub current_price: i64,
    pub quote_date: NaiveDate,
    pub earnings_per_share: f64,
    pub book_value_per_share: f64,
    pub dcf_value: i64,
    pub multiple_value: Option<i64>,
    /// Which multiples produced `multiple_value`, e.g. "PBR(×1.45), EV/EBITDA(×4.75)"
    pub explanation: String,
    /// Price / EV-EBITDA proxy fed to the cash-flow multiple
    pub cash_flow_per_share: i64,
    pub growth_rate: f64,
    pub dcf_weight: f64,
    pub multiple_weight: f64,
    pub fair_value: Option<f64>,
    pub upside_percent: Option<f64>,
    pub verdict: Verdict,
    pub market_multiples: Vec<MarketMultiple>,
}
