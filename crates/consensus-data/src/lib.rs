//! Fundamentals sources: the embedded 2024/25 consensus table, spreadsheet
//! (CSV) imports, and a fallback chain over several sources.

pub mod chain;
pub mod csv_import;
pub mod table;

pub use chain::ChainedSource;
pub use csv_import::parse_csv;
pub use table::ConsensusTable;
