// ==========================================
// Beneficiary reconciliation - importer layer
// ==========================================
// Reads the three rolls (CSV / XLSX), normalizes and deduplicates rows,
// and drives the whole reconciliation run.
// ==========================================

pub mod beneficiary_importer_impl;
pub mod data_cleaner;
pub mod deduplicator;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod importer_trait;
pub mod record_normalizer;

pub use beneficiary_importer_impl::{stage_percentage, BeneficiaryImporterImpl};
pub use data_cleaner::{fold_text, DataCleaner as DataCleanerImpl};
pub use deduplicator::Deduplicator as DeduplicatorImpl;
pub use error::{ImportError, ImportResult};
pub use field_mapper::FieldMapper as FieldMapperImpl;
pub use file_parser::{CsvParser, ExcelParser, UniversalFileParser};
pub use record_normalizer::RecordNormalizer;

pub use importer_trait::{
    BeneficiaryImporter, DataCleaner, Deduplicator, FieldMapper, FileParser, ImportOutcome,
    ImportRequest, ParsedSheet,
};
