use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValuationError {
    #[error("Unknown ticker: {0}")]
    UnknownTicker(String),

    #[error("No market quote available: {0}")]
    NoQuote(String),

    #[error("Fundamentals source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("API error: {0}")]
    Api(String),
}
