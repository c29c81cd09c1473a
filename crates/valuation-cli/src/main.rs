//! semi-value: fair-value check for Korean semiconductor stocks.
//!
//! Blends a five-year DCF with sector-relative multiples and compares the
//! result against the latest closing price.
//!
//! Usage:
//!   cargo run -p valuation-cli -- 삼성전자
//!   cargo run -p valuation-cli -- 005930 --price 60000 --json
//!   cargo run -p valuation-cli -- --list --csv consensus.csv

mod config;
mod render;

use config::{AppConfig, CliArgs, FundamentalsMode};
use consensus_data::{ChainedSource, ConsensusTable};
use quote_client::{FixedQuotes, QuoteClient};
use std::collections::HashSet;
use std::sync::Arc;
use valuation_core::{CompanyFundamentals, FundamentalsSource, PriceSource, ValuationError};
use valuation_engine::{SectorTable, ValuationEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "valuation_cli=info,valuation_engine=info,quote_client=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match CliArgs::parse(&args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("error: {}", e);
            print_usage();
            std::process::exit(2);
        }
    };
    if cli.company.is_none() && !cli.list {
        print_usage();
        std::process::exit(2);
    }

    let mut config = AppConfig::from_env()?;
    config.apply_args(&cli);
    config.validate(&cli)?;

    let tables = load_tables(&config)?;

    if cli.list {
        print!("{}", render::render_company_list(&covered_companies(&tables)));
        return Ok(());
    }
    let Some(company) = cli.company.as_deref() else {
        return Ok(());
    };

    let sectors = match &config.sector_profiles_path {
        Some(path) => SectorTable::from_path(path)?,
        None => SectorTable::embedded(),
    };

    let fundamentals: Arc<dyn FundamentalsSource> = match tables.as_slice() {
        [only] => Arc::new(only.clone()),
        many => Arc::new(ChainedSource::new(
            many.iter()
                .map(|t| Arc::new(t.clone()) as Arc<dyn FundamentalsSource>)
                .collect(),
        )),
    };

    tracing::info!("semi-value: {} via {}", company, fundamentals.source_name());
    let engine = build_engine(&config, fundamentals, sectors, cli.price)?;

    match engine.evaluate(company).await {
        Ok(result) if cli.json => println!("{}", serde_json::to_string_pretty(&result)?),
        Ok(result) => print!("{}", render::render_text(&result)),
        Err(ValuationError::UnknownTicker(name)) => {
            eprintln!("Unknown company: {}", name);
            let names: Vec<String> = covered_companies(&tables)
                .iter()
                .map(|c| c.name.clone())
                .collect();
            eprintln!("Supported companies: {}", names.join(", "));
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// Quote client as the binary runs it. 429 pauses scale with the request timeout.
fn build_quote_client(api_key: &str, config: &AppConfig) -> QuoteClient {
    QuoteClient::new(api_key.to_string())
        .with_base_url(config.quote_base_url.clone())
        .with_timeout(config.fetch_timeout)
        .with_retry_wait(config.fetch_timeout / 4)
}

/// Engine over a manual price or the live quote client. The live lookup is
/// bounded by the client's own worst case so its retries and pacing can finish.
fn build_engine(
    config: &AppConfig,
    fundamentals: Arc<dyn FundamentalsSource>,
    sectors: SectorTable,
    manual_price: Option<i64>,
) -> anyhow::Result<ValuationEngine> {
    let engine = match (manual_price, &config.quote_api_key) {
        (Some(price), _) => {
            let prices: Arc<dyn PriceSource> = Arc::new(FixedQuotes::single(price));
            ValuationEngine::new(fundamentals, prices, Arc::new(sectors))
        }
        (None, Some(api_key)) => {
            let client = build_quote_client(api_key, config);
            let quote_budget = client.worst_case_latency();
            tracing::debug!("quote lookups bounded at {:?}", quote_budget);
            let prices: Arc<dyn PriceSource> = Arc::new(client);
            ValuationEngine::new(fundamentals, prices, Arc::new(sectors)).with_quote_timeout(quote_budget)
        }
        (None, None) => anyhow::bail!("QUOTE_API_KEY must be set unless --price is given"),
    };
    Ok(engine.with_fetch_timeout(config.fetch_timeout))
}

/// Tables in lookup order: the spreadsheet (if any) ahead of the built-in consensus.
fn load_tables(config: &AppConfig) -> anyhow::Result<Vec<ConsensusTable>> {
    let imported = match &config.fundamentals_csv {
        Some(path) if config.fundamentals_mode != FundamentalsMode::Static => {
            Some(ConsensusTable::from_csv_path(path)?)
        }
        _ => None,
    };

    let tables = match (config.fundamentals_mode, imported) {
        (FundamentalsMode::Csv, Some(csv)) => vec![csv],
        (FundamentalsMode::Chain, Some(csv)) => vec![csv, ConsensusTable::embedded()],
        _ => vec![ConsensusTable::embedded()],
    };
    Ok(tables)
}

/// First occurrence of each ticker across the tables
fn covered_companies(tables: &[ConsensusTable]) -> Vec<CompanyFundamentals> {
    let mut seen = HashSet::new();
    tables
        .iter()
        .flat_map(|t| t.companies())
        .filter(|c| seen.insert(c.ticker.clone()))
        .cloned()
        .collect()
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  semi-value <company>              Value a company by name or KRX code");
    eprintln!("  semi-value --list                 List supported companies");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --price N        Use N won as the current price instead of fetching a quote");
    eprintln!("  --json           Print the result as JSON");
    eprintln!("  --csv PATH       Consensus spreadsheet (CSV) searched before the built-in table");
    eprintln!("  --sectors PATH   Sector profile JSON replacing the built-in table");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUOTE_API_KEY, QUOTE_BASE_URL, QUOTE_RATE_LIMIT, FETCH_TIMEOUT_SECS,");
    eprintln!("  FUNDAMENTALS_SOURCE (static|csv|chain), FUNDAMENTALS_CSV, SECTOR_PROFILES_PATH");
    eprintln!("  QUOTE_BASE_URL must serve KRX closes; api.polygon.io itself does not list KRX codes.");
}
