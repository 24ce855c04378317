// ==========================================
// Beneficiary reconciliation - core library
// ==========================================
// Cross-references the Bolsa Família roll against the Sislame (school)
// and nursery rolls of a city, grants verified dependents to their
// families and reports every exclusion with a reason.
// Stack: Rust + SQLite (rusqlite) + tokio
// ==========================================

// Localized messages (locales/*.yml)
rust_i18n::i18n!("locales", fallback = "pt-BR");

// ==========================================
// Modules
// ==========================================

// Domain layer - entities and value types
pub mod domain;

// Repository layer - data access
pub mod repository;

// Engine layer - filtering, matching, grouping
pub mod engine;

// Importer layer - file reading and the reconciliation run
pub mod importer;

// Configuration layer
pub mod config;

// Progress snapshot + exclusion CSV
pub mod report;

// Database setup (connection PRAGMAs, schema)
pub mod db;

// Logging
pub mod logging;

// Localization
pub mod i18n;

// API layer - service facade
pub mod api;

// ==========================================
// Re-exports
// ==========================================

// Domain types
pub use domain::types::{EnrollmentSource, ImportStatus, MatchedVia, Role, SourceFile};

// Domain entities
pub use domain::{
    BeneficiaryRecord, Dependent, EnrollmentRecord, ExclusionEntry, ExclusionKind, Family,
    FamilyWithDependents, FunnelStep, ImportReport,
};

// Engines
pub use engine::{AgeFilter, CrossReferenceMatcher, EnrollmentIndex, FamilyAggregator};

// Importer
pub use importer::{BeneficiaryImporter, BeneficiaryImporterImpl, ImportOutcome, ImportRequest};

// Report
pub use report::{ExclusionReportWriter, InMemoryReportPublisher, ReportPublisher};

// API
pub use api::{ApiError, ApiResult, ImportApi};

// ==========================================
// Constants
// ==========================================

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "Cruzamento de Beneficiários";
