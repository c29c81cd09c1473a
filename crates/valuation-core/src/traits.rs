use async_trait::async_trait;
use crate::{CompanyFundamentals, MarketQuote, ValuationError};

/// Anything that can hand out consensus fundamentals for a company.
///
/// Implementations look a company up by KRX code or by display name; a miss is
/// reported as `ValuationError::UnknownTicker` so callers can fall through to
/// another source.
#[async_trait]
pub trait FundamentalsSource: Send + Sync {
    async fn fundamentals(&self, ticker: &str) -> Result<CompanyFundamentals, ValuationError>;

    /// Source name for logging
    fn source_name(&self) -> &str;
}

/// Trait for live (or most recent close) price lookups
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn latest_quote(&self, ticker: &str) -> Result<MarketQuote, ValuationError>;

    /// Source name for logging
    fn source_name(&self) -> &str;
}
