// ==========================================
// Beneficiary reconciliation - domain layer
// ==========================================
// Entities, records and value types. No storage access, no engine logic.
// ==========================================

pub mod beneficiary;
pub mod family;
pub mod report;
pub mod types;

pub use beneficiary::{
    BeneficiaryRecord, CashTransferRow, EnrollmentRecord, EnrollmentRow, NormalizedRecord, RawRow,
};
pub use family::{
    age_in_years, Dependent, Family, FamilyGroup, FamilyWithDependents, GrantOwner, GroupOutcome,
    NewDependent,
};
pub use report::{ratio_percent, ExclusionEntry, ExclusionKind, FunnelStep, ImportReport};
pub use types::{EnrollmentSource, ImportStatus, MatchedVia, Role, SourceFile};
