use anyhow::{bail, Context};
use std::path::PathBuf;
use std::time::Duration;

/// Polygon's own host speaks the endpoint shape but carries no KRX listings;
/// live quotes need QUOTE_BASE_URL pointed at a KRX-serving gateway.
const DEFAULT_QUOTE_BASE_URL: &str = "https://api.polygon.io";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Which fundamentals tables back the lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundamentalsMode {
    /// Built-in consensus table only
    Static,
    /// Imported spreadsheet only
    Csv,
    /// Spreadsheet first, built-in table for anything it lacks
    Chain,
}

impl std::str::FromStr for FundamentalsMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "static" | "" => Ok(Self::Static),
            "csv" => Ok(Self::Csv),
            "chain" => Ok(Self::Chain),
            other => bail!("FUNDAMENTALS_SOURCE must be static, csv or chain (got '{}')", other),
        }
    }
}

/// Settings from the environment (and `.env`), refined by command-line flags.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub quote_api_key: Option<String>,
    pub quote_base_url: String,
    pub fetch_timeout: Duration,
    pub fundamentals_mode: FundamentalsMode,
    pub fundamentals_csv: Option<PathBuf>,
    pub sector_profiles_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let fetch_timeout = match non_empty("FETCH_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .parse()
                    .with_context(|| format!("FETCH_TIMEOUT_SECS must be whole seconds (got '{}')", raw))?;
                if secs == 0 {
                    bail!("FETCH_TIMEOUT_SECS must be positive");
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        };

        let fundamentals_mode = match non_empty("FUNDAMENTALS_SOURCE") {
            Some(raw) => raw.parse()?,
            None => FundamentalsMode::Static,
        };

        Ok(Self {
            quote_api_key: non_empty("QUOTE_API_KEY"),
            quote_base_url: non_empty("QUOTE_BASE_URL").unwrap_or_else(|| DEFAULT_QUOTE_BASE_URL.to_string()),
            fetch_timeout,
            fundamentals_mode,
            fundamentals_csv: non_empty("FUNDAMENTALS_CSV").map(PathBuf::from),
            sector_profiles_path: non_empty("SECTOR_PROFILES_PATH").map(PathBuf::from),
        })
    }

    /// Flags win over the environment. `--csv` alone layers the file over the built-in table.
    pub fn apply_args(&mut self, args: &CliArgs) {
        if let Some(csv) = &args.csv {
            self.fundamentals_csv = Some(csv.clone());
            if self.fundamentals_mode == FundamentalsMode::Static {
                self.fundamentals_mode = FundamentalsMode::Chain;
            }
        }
        if let Some(sectors) = &args.sectors {
            self.sector_profiles_path = Some(sectors.clone());
        }
    }

    pub fn validate(&self, args: &CliArgs) -> anyhow::Result<()> {
        if self.fundamentals_mode != FundamentalsMode::Static && self.fundamentals_csv.is_none() {
            bail!("FUNDAMENTALS_CSV (or --csv) is required when FUNDAMENTALS_SOURCE is csv or chain");
        }
        if !args.list && args.price.is_none() && self.quote_api_key.is_none() {
            bail!("QUOTE_API_KEY must be set unless --price is given");
        }
        Ok(())
    }
}

/// Parsed command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliArgs {
    pub company: Option<String>,
    pub price: Option<i64>,
    pub json: bool,
    pub list: bool,
    pub csv: Option<PathBuf>,
    pub sectors: Option<PathBuf>,
}

impl CliArgs {
    pub fn parse(args: &[String]) -> anyhow::Result<Self> {
        let mut parsed = Self::default();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--json" => parsed.json = true,
                "--list" => parsed.list = true,
                "--price" => {
                    let raw = iter.next().context("--price needs a value")?;
                    let price: i64 = raw
                        .replace(',', "")
                        .parse()
                        .with_context(|| format!("--price must be a whole number of won (got '{}')", raw))?;
                    if price <= 0 {
                        bail!("--price must be positive");
                    }
                    parsed.price = Some(price);
                }
                "--csv" => parsed.csv = Some(PathBuf::from(iter.next().context("--csv needs a path")?)),
                "--sectors" => parsed.sectors = Some(PathBuf::from(iter.next().context("--sectors needs a path")?)),
                flag if flag.starts_with("--") => bail!("unknown option {}", flag),
                company => {
                    if parsed.company.is_some() {
                        bail!("only one company can be valued at a time");
                    }
                    parsed.company = Some(company.to_string());
                }
            }
        }

        Ok(parsed)
    }
}
