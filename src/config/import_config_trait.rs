// ==========================================
// Beneficiary reconciliation - import config reader
// ==========================================
// Read-only configuration needed by the import pipeline.
// No writes, no business logic.
// ==========================================

use crate::importer::error::ImportResult;
use async_trait::async_trait;
use std::path::PathBuf;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// Implemented by ConfigManager (config_kv table, scope 'global')
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// Program age ceiling in years (inclusive boundary)
    ///
    /// # Default
    /// - 18
    async fn get_age_ceiling_years(&self) -> ImportResult<u32>;

    /// Age ceiling of the "fourteen or less" sub-cohort
    ///
    /// # Default
    /// - 14
    async fn get_fourteen_or_less_years(&self) -> ImportResult<u32>;

    /// How many rows are processed between two progress snapshots
    ///
    /// # Default
    /// - 500
    async fn get_progress_publish_every_rows(&self) -> ImportResult<usize>;

    /// Root directory of the per-city exclusion CSV files
    ///
    /// # Default
    /// - `<data_dir>/beneficiary-reconciliation/reports`
    async fn get_exclusion_report_dir(&self) -> ImportResult<PathBuf>;
}
