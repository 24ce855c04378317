// ==========================================
// Beneficiary reconciliation - repository layer
// ==========================================
// Data access behind traits; no business rules.
// All queries are parameterized.
// ==========================================

pub mod error;
pub mod family_repo;
pub mod family_repo_impl;

pub use error::{RepositoryError, RepositoryResult};
pub use family_repo::FamilyRepository;
pub use family_repo_impl::FamilyRepositoryImpl;
