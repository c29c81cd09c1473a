use async_trait::async_trait;
use std::collections::BTreeMap;
use valuation_core::{CompanyFundamentals, FundamentalsSource, IndustryCategory, ValuationError};

use IndustryCategory::*;

const EMBEDDED_PERIOD: &str = "2025F";

/// (name, KRX code, industry, EPS, BPS, EV/EBITDA) from 2024/25 broker consensus
const CONSENSUS: &[(&str, &str, IndustryCategory, f64, f64, f64)] = &[
    // Memory / IDM
    ("삼성전자", "005930", MemoryIdm, 4950.0, 57951.0, 4.75),
    ("SK하이닉스", "000660", MemoryIdm, 27182.0, 107256.0, 3.2),
    // Fabless / IP
    ("LX세미콘", "108320", FablessIp, 8500.0, 52000.0, 5.2),
    ("텔레칩스", "054450", FablessIp, 1200.0, 11000.0, 8.5),
    ("어보브반도체", "102120", FablessIp, 450.0, 7800.0, 12.0),
    ("제주반도체", "080220", FablessIp, 350.0, 4500.0, 15.0),
    ("칩스앤미디어", "094360", FablessIp, 400.0, 3500.0, 25.0),
    ("가온칩스", "393360", FablessIp, 1500.0, 12000.0, 30.0),
    // Foundry
    ("DB하이텍", "000990", Foundry, 3800.0, 38000.0, 4.5),
    // Equipment
    ("한미반도체", "042700", Equipment, 4200.0, 16000.0, 22.0),
    ("HPSP", "403870", Equipment, 2800.0, 12000.0, 18.0),
    ("주성엔지니어링", "036930", Equipment, 2500.0, 14000.0, 8.5),
    ("이오테크닉스", "039030", Equipment, 5500.0, 42000.0, 11.0),
    ("원익IPS", "240810", Equipment, 1800.0, 21000.0, 9.5),
    ("피에스케이", "319660", Equipment, 3100.0, 23000.0, 6.5),
    ("테스", "095610", Equipment, 1200.0, 18000.0, 7.0),
    ("유진테크", "084370", Equipment, 2100.0, 19000.0, 8.0),
    // Materials / chemicals
    ("솔브레인", "357780", Materials, 21000.0, 150000.0, 6.0),
    ("동진쎄미켐", "005290", Materials, 3200.0, 25000.0, 5.5),
    ("한솔케미칼", "014680", Materials, 11000.0, 75000.0, 7.5),
    ("SKC", "011790", Materials, 2500.0, 55000.0, 8.0),
    // Back-end (OSAT)
    ("하나마이크론", "067310", Osat, 1200.0, 13000.0, 6.5),
    ("SFA반도체", "036540", Osat, 250.0, 4200.0, 7.0),
    ("두산테스나", "131970", Osat, 3500.0, 28000.0, 5.5),
    ("네패스", "033640", Osat, -500.0, 11000.0, 9.0),
    // Inspection / metrology
    ("리노공업", "058470", Inspection, 10500.0, 51000.0, 14.5),
    ("고영", "098460", Inspection, 650.0, 6500.0, 12.0),
    ("파크시스템스", "140860", Inspection, 5500.0, 28000.0, 22.0),
    ("티에스이", "131290", Inspection, 4200.0, 32000.0, 5.5),
    ("디아이", "003160", Inspection, 1500.0, 8500.0, 10.0),
    // Modules / components
    ("LG이노텍", "011070", ModulesParts, 28000.0, 180000.0, 3.5),
    ("삼성전기", "009150", ModulesParts, 9500.0, 110000.0, 5.5),
    ("심텍", "222800", ModulesParts, 1500.0, 19000.0, 4.5),
    ("ISC", "095340", ModulesParts, 2800.0, 18000.0, 15.0),
    ("월덱스", "101160", ModulesParts, 2200.0, 14000.0, 6.5),
    ("티씨케이", "064760", ModulesParts, 6500.0, 45000.0, 9.0),
];

/// In-memory fundamentals keyed by KRX code, searchable by name
#[derive(Debug, Clone)]
pub struct ConsensusTable {
    name: String,
    companies: Vec<CompanyFundamentals>,
}

impl ConsensusTable {
    pub fn new(name: impl Into<String>, companies: Vec<CompanyFundamentals>) -> Self {
        Self {
            name: name.into(),
            companies,
        }
    }

    pub fn embedded() -> Self {
        let companies = CONSENSUS
            .iter()
            .map(|&(name, code, industry, eps, bps, ev_ebitda)| CompanyFundamentals {
                ticker: code.to_string(),
                name: name.to_string(),
                industry,
                earnings_per_share: eps,
                book_value_per_share: bps,
                cash_flow_multiple_target: ev_ebitda,
                as_of_period: EMBEDDED_PERIOD.to_string(),
                target_overrides: BTreeMap::new(),
            })
            .collect();
        Self::new("consensus-table", companies)
    }

    /// Match on exact KRX code first, then on company name (case-insensitive).
    pub fn find(&self, query: &str) -> Option<&CompanyFundamentals> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        self.companies
            .iter()
            .find(|c| c.ticker == query)
            .or_else(|| {
                let lowered = query.to_lowercase();
                self.companies.iter().find(|c| c.name.to_lowercase() == lowered)
            })
    }

    pub fn companies(&self) -> &[CompanyFundamentals] {
        &self.companies
    }

    pub fn len(&self) -> usize {
        self.companies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }
}

impl Default for ConsensusTable {
    fn default() -> Self {
        Self::embedded()
    }
}

#[async_trait]
impl FundamentalsSource for ConsensusTable {
    async fn fundamentals(&self, ticker: &str) -> Result<CompanyFundamentals, ValuationError> {
        self.find(ticker)
            .cloned()
            .ok_or_else(|| ValuationError::UnknownTicker(ticker.trim().to_string()))
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_covers_every_sector_but_other() {
        let table = ConsensusTable::embedded();
        assert_eq!(table.len(), 36);
        for industry in IndustryCategory::ALL {
            let covered = table.companies().iter().any(|c| c.industry == industry);
            assert_eq!(covered, industry != IndustryCategory::Other, "{:?}", industry);
        }
    }

    #[test]
    fn test_codes_are_unique_six_digit() {
        let table = ConsensusTable::embedded();
        let mut codes: Vec<&str> = table.companies().iter().map(|c| c.ticker.as_str()).collect();
        assert!(codes.iter().all(|c| c.len() == 6 && c.chars().all(|ch| ch.is_ascii_digit())));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 36);
    }

    #[test]
    fn test_find_by_code_or_name() {
        let table = ConsensusTable::embedded();
        assert_eq!(table.find("005930").unwrap().name, "삼성전자");
        assert_eq!(table.find(" 삼성전자 ").unwrap().ticker, "005930");
        assert_eq!(table.find("sk하이닉스").unwrap().ticker, "000660");
        assert_eq!(table.find("hpsp").unwrap().industry, IndustryCategory::Equipment);
        assert!(table.find("").is_none());
        assert!(table.find("애플").is_none());
    }

    #[tokio::test]
    async fn test_unknown_company_is_unknown_ticker() {
        let table = ConsensusTable::embedded();
        let err = table.fundamentals(" 애플 ").await.unwrap_err();
        assert_eq!(err, ValuationError::UnknownTicker("애플".to_string()));
    }

    #[tokio::test]
    async fn test_loss_maker_keeps_negative_eps() {
        let table = ConsensusTable::embedded();
        let nepes = table.fundamentals("네패스").await.unwrap();
        assert_eq!(nepes.earnings_per_share, -500.0);
        assert_eq!(nepes.as_of_period, "2025F");
    }
}
