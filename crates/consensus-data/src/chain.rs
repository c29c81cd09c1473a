use async_trait::async_trait;
use std::sync::Arc;
use valuation_core::{CompanyFundamentals, FundamentalsSource, ValuationError};

/// Tries each source in order and returns the first hit.
///
/// A miss (`UnknownTicker`) or a failing source falls through to the next
/// one. When every source misses, the last real failure is returned, or
/// `UnknownTicker` if all of them simply did not know the company.
pub struct ChainedSource {
    sources: Vec<Arc<dyn FundamentalsSource>>,
}

impl ChainedSource {
    pub fn new(sources: Vec<Arc<dyn FundamentalsSource>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl FundamentalsSource for ChainedSource {
    async fn fundamentals(&self, ticker: &str) -> Result<CompanyFundamentals, ValuationError> {
        let mut last_failure = None;

        for source in &self.sources {
            match source.fundamentals(ticker).await {
                Ok(found) => {
                    tracing::debug!("{}: found via {}", ticker, source.source_name());
                    return Ok(found);
                }
                Err(ValuationError::UnknownTicker(_)) => continue,
                Err(e) => {
                    tracing::warn!("{}: {} failed, trying next source: {}", ticker, source.source_name(), e);
                    last_failure = Some(e);
                }
            }
        }

        Err(last_failure.unwrap_or_else(|| ValuationError::UnknownTicker(ticker.trim().to_string())))
    }

    fn source_name(&self) -> &str {
        "chain"
    }
}
