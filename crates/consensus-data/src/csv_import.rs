use std::collections::BTreeMap;
use std::path::Path;
use valuation_core::{CompanyFundamentals, IndustryCategory, ValuationError};

use crate::ConsensusTable;

/// Parse a consensus spreadsheet exported as CSV.
///
/// Expected columns: name, code, industry, eps, bps, ev_ebitda, as_of (optional).
/// Rows without a name or code are skipped. Empty numeric cells read as 0,
/// which the engine treats as "not usable"; anything else non-numeric is an
/// import error carrying the 1-based data row.
pub fn parse_csv(csv_data: &str) -> Result<Vec<CompanyFundamentals>, ValuationError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(csv_data.as_bytes());

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let row_no = idx + 1;
        let record = result.map_err(|e| ValuationError::Import(format!("row {}: {}", row_no, e)))?;

        let name = record.get(0).unwrap_or("").to_string();
        let code = normalize_code(record.get(1).unwrap_or(""));
        if name.is_empty() || code.is_empty() {
            continue;
        }

        let industry: IndustryCategory = record.get(2).unwrap_or("").parse().unwrap_or_default();
        let eps = parse_number(record.get(3), "eps", row_no)?;
        let bps = parse_number(record.get(4), "bps", row_no)?;
        let ev_ebitda = parse_number(record.get(5), "ev_ebitda", row_no)?;
        let as_of_period = record.get(6).unwrap_or("").to_string();

        rows.push(CompanyFundamentals {
            ticker: code,
            name,
            industry,
            earnings_per_share: eps,
            book_value_per_share: bps,
            cash_flow_multiple_target: ev_ebitda,
            as_of_period,
            target_overrides: BTreeMap::new(),
        });
    }

    Ok(rows)
}

impl ConsensusTable {
    /// Load a CSV spreadsheet export as a fundamentals source.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, ValuationError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| ValuationError::Import(format!("{}: {}", path.display(), e)))?;
        let companies = parse_csv(&data)?;
        tracing::info!("Imported {} companies from {}", companies.len(), path.display());
        Ok(Self::new(format!("csv:{}", path.display()), companies))
    }
}

/// Spreadsheets drop leading zeros from KRX codes ("5930" for "005930").
fn normalize_code(raw: &str) -> String {
    let raw = raw.trim();
    if !raw.is_empty() && raw.len() < 6 && raw.chars().all(|c| c.is_ascii_digit()) {
        format!("{:0>6}", raw)
    } else {
        raw.to_string()
    }
}

fn parse_number(cell: Option<&str>, column: &str, row_no: usize) -> Result<f64, ValuationError> {
    let cleaned: String = cell.unwrap_or("").chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Ok(0.0);
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ValuationError::Import(format!("row {}: bad {} value '{}'", row_no, column, cleaned)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use valuation_core::FundamentalsSource;

    const SAMPLE: &str = "\
name,code,industry,eps,bps,ev_ebitda,as_of
삼성전자,5930,메모리/IDM,4950,\"57,951\",4.75,2025F
,000000,장비,1,1,1
네패스,033640,후공정(OSAT),-500,11000,9.0
새회사,123456,우주항공,100,1000,
";

    #[test]
    fn test_parse_sample() {
        let rows = parse_csv(SAMPLE).unwrap();
        assert_eq!(rows.len(), 3);

        let samsung = &rows[0];
        assert_eq!(samsung.ticker, "005930");
        assert_eq!(samsung.industry, IndustryCategory::MemoryIdm);
        assert_eq!(samsung.book_value_per_share, 57951.0);
        assert_eq!(samsung.as_of_period, "2025F");

        assert_eq!(rows[1].earnings_per_share, -500.0);
        assert_eq!(rows[1].as_of_period, "");

        let unknown_sector = &rows[2];
        assert_eq!(unknown_sector.industry, IndustryCategory::Other);
        assert_eq!(unknown_sector.cash_flow_multiple_target, 0.0);
    }

    #[test]
    fn test_bad_number_reports_row() {
        let data = "name,code,industry,eps,bps,ev_ebitda\n테스트,000001,장비,n/a,100,5\n";
        let err = parse_csv(data).unwrap_err();
        assert_eq!(err, ValuationError::Import("row 1: bad eps value 'n/a'".to_string()));
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("660"), "000660");
        assert_eq!(normalize_code("005930"), "005930");
        assert_eq!(normalize_code("A005930"), "A005930");
        assert_eq!(normalize_code(""), "");
    }

    #[tokio::test]
    async fn test_from_csv_path_acts_as_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let table = ConsensusTable::from_csv_path(file.path()).unwrap();
        assert!(table.source_name().starts_with("csv:"));
        let nepes = table.fundamentals("033640").await.unwrap();
        assert_eq!(nepes.name, "네패스");
    }

    #[test]
    fn test_missing_file_is_import_error() {
        let err = ConsensusTable::from_csv_path("/nonexistent/consensus.csv").unwrap_err();
        assert!(matches!(err, ValuationError::Import(_)));
    }
}
