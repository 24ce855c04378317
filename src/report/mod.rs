// ==========================================
// Beneficiary reconciliation - report layer
// ==========================================
// Live progress snapshot + downloadable exclusion CSV
// ==========================================

pub mod exclusion_export;
pub mod publisher;

pub use exclusion_export::{ExclusionReportWriter, EXCLUSION_FILE_NAME};
pub use publisher::{InMemoryReportPublisher, ReportPublisher};
