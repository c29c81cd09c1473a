use std::sync::Arc;
use std::time::Duration;
use valuation_core::{
    CompanyFundamentals, CoreMetric, FundamentalsSource, MarketMultiple, MarketQuote, PriceSource,
    ValuationError, ValuationResult, Verdict,
};

pub mod blend;
pub mod dcf;
pub mod multiple;
pub mod sector;

pub use multiple::MultipleEstimate;
pub use sector::SectorTable;


const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs one company through DCF + relative multiples and compares the blend
/// with the live price.
pub struct ValuationEngine {
    fundamentals: Arc<dyn FundamentalsSource>,
    prices: Arc<dyn PriceSource>,
    sectors: Arc<SectorTable>,
    fetch_timeout: Duration,
    quote_timeout: Option<Duration>,
}

impl ValuationEngine {
    pub fn new(
        fundamentals: Arc<dyn FundamentalsSource>,
        prices: Arc<dyn PriceSource>,
        sectors: Arc<SectorTable>,
    ) -> Self {
        Self {
            fundamentals,
            prices,
            sectors,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            quote_timeout: None,
        }
    }

    /// Bound each collaborator call; a timeout counts as that source failing
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Separate bound for the price lookup, for sources that pace or retry
    /// their own requests. Falls back to the fetch timeout when unset.
    pub fn with_quote_timeout(mut self, timeout: Duration) -> Self {
        self.quote_timeout = Some(timeout);
        self
    }

    pub fn sectors(&self) -> &SectorTable {
        &self.sectors
    }

    /// Fetch fundamentals and a quote for `ticker`, then value the company.
    ///
    /// Errors are limited to the cases where there is nothing to compare:
    /// an unknown company, a failed fundamentals source, or no usable quote.
    /// Numeric dead ends come back as `Ok` with `Verdict::NotAssessable`.
    pub async fn evaluate(&self, ticker: &str) -> Result<ValuationResult, ValuationError> {
        let ticker = ticker.trim();

        let fundamentals = match tokio::time::timeout(self.fetch_timeout, self.fundamentals.fundamentals(ticker)).await {
            Ok(Ok(f)) => f,
            Ok(Err(e @ (ValuationError::UnknownTicker(_) | ValuationError::SourceUnavailable(_)))) => return Err(e),
            Ok(Err(e)) => {
                tracing::warn!("{}: fundamentals lookup via {} failed: {}", ticker, self.fundamentals.source_name(), e);
                return Err(ValuationError::SourceUnavailable(e.to_string()));
            }
            Err(_) => {
                return Err(ValuationError::SourceUnavailable(format!(
                    "{} timed out after {:?}",
                    self.fundamentals.source_name(),
                    self.fetch_timeout
                )));
            }
        };

        let quote_timeout = self.quote_timeout.unwrap_or(self.fetch_timeout);
        let quote = match tokio::time::timeout(quote_timeout, self.prices.latest_quote(&fundamentals.ticker)).await {
            Ok(Ok(q)) if q.price > 0 => q,
            Ok(Ok(q)) => {
                return Err(ValuationError::NoQuote(format!(
                    "{} returned non-positive price {} for {}",
                    self.prices.source_name(),
                    q.price,
                    fundamentals.ticker
                )));
            }
            Ok(Err(ValuationError::NoQuote(msg))) => return Err(ValuationError::NoQuote(msg)),
            Ok(Err(e)) => {
                tracing::warn!("{}: price lookup via {} failed: {}", fundamentals.ticker, self.prices.source_name(), e);
                return Err(ValuationError::NoQuote(e.to_string()));
            }
            Err(_) => {
                return Err(ValuationError::NoQuote(format!(
                    "{} timed out after {:?}",
                    self.prices.source_name(),
                    quote_timeout
                )));
            }
        };

        let result = value_company(&fundamentals, &quote, &self.sectors);
        tracing::info!(
            "{} ({}): price {} fair {:?} upside {:?} -> {:?}",
            result.name,
            result.ticker,
            result.current_price,
            result.fair_value,
            result.upside_percent,
            result.verdict
        );
        Ok(result)
    }
}

/// Pure valuation of one fundamentals snapshot against one quote.
pub fn value_company(
    fundamentals: &CompanyFundamentals,
    quote: &MarketQuote,
    sectors: &SectorTable,
) -> ValuationResult {
    let profile = sectors.lookup(fundamentals.industry);
    let eps = fundamentals.earnings_per_share;
    let bps = fundamentals.book_value_per_share;

    let cash_flow_per_share = multiple::cash_flow_per_share(quote.price, fundamentals.cash_flow_multiple_target);
    let relative = multiple::estimate(
        eps,
        bps,
        cash_flow_per_share as f64,
        profile,
        &fundamentals.target_overrides,
    );
    let dcf_value = dcf::estimate(eps, profile.growth_rate);

    let fair_value = blend::blend(dcf_value, relative.value, profile.dcf_weight, profile.multiple_weight);
    let upside_percent = fair_value.and_then(|fv| blend::upside_percent(fv, quote.price));
    let verdict = upside_percent.map_or(Verdict::NotAssessable, blend::classify);

    let market_multiples = CoreMetric::ALL
        .into_iter()
        .map(|metric| {
            let denominator = match metric {
                CoreMetric::EarningsMultiple => eps,
                CoreMetric::BookMultiple => bps,
                CoreMetric::CashFlowMultiple => cash_flow_per_share as f64,
            };
            MarketMultiple {
                metric,
                value: (denominator > 0.0).then(|| quote.price as f64 / denominator),
                is_core: profile.is_core(metric),
            }
        })
        .collect();

    ValuationResult {
        ticker: fundamentals.ticker.clone(),
        name: fundamentals.name.clone(),
        industry: fundamentals.industry,
        as_of_period: fundamentals.as_of_period.clone(),
        current_price: quote.price,
        quote_date: quote.as_of_date,
        earnings_per_share: eps,
        book_value_per_share: bps,
        dcf_value,
        multiple_value: relative.value,
        explanation: relative.explanation,
        cash_flow_per_share,
        growth_rate: profile.growth_rate,
        dcf_weight: profile.dcf_weight,
        multiple_weight: profile.multiple_weight,
        fair_value,
        upside_percent,
        verdict,
        market_multiples,
    }
}
