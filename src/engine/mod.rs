// ==========================================
// Beneficiary reconciliation - engine layer
// ==========================================
// Pure rules: age filter, cross reference, family grouping.
// Storage is reached only through the FamilyRepository trait.
// ==========================================

pub mod age_filter;
pub mod aggregator;
pub mod matcher;

pub use age_filter::AgeFilter;
pub use aggregator::{AggregationTally, FamilyAggregator, GroupWrite, UNKNOWN_GUARDIAN_NAME};
pub use matcher::{CrossReference, CrossReferenceMatcher, EnrollmentIndex, MatchResult};
