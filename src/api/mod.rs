// ==========================================
// Beneficiary reconciliation - API layer
// ==========================================
// Service facade over the importer, the report publishers and the
// family repository.
// ==========================================

pub mod error;
pub mod import_api;

pub use error::{ApiError, ApiResult};
pub use import_api::ImportApi;
