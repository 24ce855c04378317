// ==========================================
// Beneficiary reconciliation - importer traits
// ==========================================
// Interfaces of the import pipeline stages (no implementations).
// ==========================================

use crate::domain::{BeneficiaryRecord, ExclusionEntry, ImportReport, RawRow, SourceFile};
use crate::importer::error::ImportResult;
use crate::report::ReportPublisher;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ==========================================
// Pipeline input / output
// ==========================================

/// One import request: the three uploaded rolls of a city
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    pub city_id: String,
    pub cash_transfer_path: PathBuf,
    pub school_path: PathBuf,
    pub nursery_path: PathBuf,
    /// Date ages are computed against (normally today)
    pub reference_date: NaiveDate,
}

/// What a finished run leaves behind
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub report: ImportReport,
    pub exclusions: Vec<ExclusionEntry>,
    pub exclusion_report_path: PathBuf,
}

/// File contents before schema validation.
///
/// `rows` carries the 1-based sheet line number (header = line 1).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSheet {
    pub headers: Vec<String>,
    pub rows: Vec<(usize, HashMap<String, String>)>,
}

// ==========================================
// BeneficiaryImporter Trait
// ==========================================
// Implemented by BeneficiaryImporterImpl
#[async_trait]
pub trait BeneficiaryImporter: Send + Sync {
    /// Run the whole reconciliation for one city.
    ///
    /// # Stages
    /// 1. Read + normalize the three rolls (Lendo arquivos)
    /// 2. Deduplicate + age filter (Filtrando dados)
    /// 3. Cross reference (Cruzando dados)
    /// 4. Aggregate + persist family groups (Salvando)
    ///
    /// Progress goes to `publisher`; a stage error is published as
    /// `Falhou` before being returned.
    async fn run_import(
        &self,
        request: ImportRequest,
        publisher: &dyn ReportPublisher,
    ) -> ImportResult<ImportOutcome>;
}

// ==========================================
// FileParser Trait
// ==========================================
// Implemented by CsvParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// Parse a file into header + raw rows (HashMap<header, value>).
    ///
    /// Fully blank rows are skipped; line numbers are kept.
    fn parse_to_raw_records(&self, file_path: &Path) -> ImportResult<ParsedSheet>;
}

// ==========================================
// FieldMapper Trait
// ==========================================
// Implemented by FieldMapperImpl
pub trait FieldMapper: Send + Sync {
    /// Fail when a required column of `source` is absent from `headers`.
    fn validate_headers(&self, source: SourceFile, headers: &[String]) -> ImportResult<()>;

    /// Map one raw row to its tagged variant. Never fails: missing
    /// cells become None and are judged by the normalizer.
    fn map_row(
        &self,
        source: SourceFile,
        row_number: usize,
        row: &HashMap<String, String>,
    ) -> RawRow;
}

// ==========================================
// DataCleaner Trait
// ==========================================
// Implemented by DataCleanerImpl
pub trait DataCleaner: Send + Sync {
    /// Trim and collapse inner whitespace; optionally uppercase.
    fn clean_text(&self, value: &str, uppercase: bool) -> String;

    /// Blank or null-like values become None
    fn normalize_null(&self, value: Option<String>) -> Option<String>;

    /// Keep ASCII digits only (`"123.456.789-01"` → `"12345678901"`)
    fn digits_only(&self, value: &str) -> String;

    /// Matching key for names: accents removed, uppercase, punctuation
    /// replaced by spaces, whitespace collapsed.
    fn fold_name(&self, value: &str) -> String;

    /// Parse a birthdate in any accepted format.
    ///
    /// # Returns
    /// - Err(i18n key): unparseable, or later than `today`
    fn parse_birth_date(&self, value: &str, today: NaiveDate) -> Result<NaiveDate, &'static str>;
}

// ==========================================
// Deduplicator Trait
// ==========================================
// Implemented by DeduplicatorImpl
pub trait Deduplicator: Send + Sync {
    /// Keep the first occurrence of each NIS in file order.
    ///
    /// # Returns
    /// - (kept records, one exclusion per dropped row)
    fn deduplicate(
        &self,
        records: Vec<BeneficiaryRecord>,
    ) -> (Vec<BeneficiaryRecord>, Vec<ExclusionEntry>);
}
