// ==========================================
// Beneficiary reconciliation - family repository trait
// ==========================================
// Data access only: no matching or grant rules beyond the storage
// guards (one active NIS per city, one responsible per family).
// ==========================================

use crate::domain::{Dependent, Family, FamilyGroup, FamilyWithDependents, GrantOwner, GroupOutcome};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use std::collections::HashMap;

// ==========================================
// FamilyRepository Trait
// ==========================================
// Implemented by FamilyRepositoryImpl (rusqlite)
#[async_trait]
pub trait FamilyRepository: Send + Sync {
    // ===== writes (one transaction per call) =====

    /// Upsert one family group.
    ///
    /// # Rules
    /// - family looked up by (city_id, code); created with its
    ///   responsible when absent, otherwise left untouched
    /// - dependent already active in this family → `already_present`
    /// - dependent active in another family → `granted_elsewhere`
    /// - otherwise inserted
    ///
    /// # Returns
    /// - Err: the whole group is rolled back
    async fn upsert_family_group(&self, group: &FamilyGroup) -> RepositoryResult<GroupOutcome>;

    /// Soft-delete a dependent (sets deactivated_at)
    ///
    /// # Returns
    /// - Err(NotFound): unknown id or already inactive
    async fn deactivate_dependent(&self, dependent_id: &str) -> RepositoryResult<()>;

    // ===== reads =====

    /// Active NIS of a city → owning family, oldest grant first
    async fn list_active_grants(&self, city_id: &str)
        -> RepositoryResult<HashMap<String, GrantOwner>>;

    async fn find_family_by_code(&self, city_id: &str, code: &str)
        -> RepositoryResult<Option<Family>>;

    /// Dependents of a family, active and inactive, responsible first
    async fn list_dependents(&self, family_id: &str) -> RepositoryResult<Vec<Dependent>>;

    /// Families of a city ordered by code, each with its dependents
    async fn list_families(&self, city_id: &str) -> RepositoryResult<Vec<FamilyWithDependents>>;

    async fn count_families(&self, city_id: &str) -> RepositoryResult<usize>;
}
