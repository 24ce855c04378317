// ==========================================
// Beneficiary reconciliation - Family / Dependent
// ==========================================
// Persisted entities plus the write request the aggregator sends to
// storage. Families are scoped by city; (city_id, code) is unique.
// ==========================================

use crate::domain::types::EnrollmentSource;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Age under which a dependent counts as a minor
pub const ADULTHOOD_AGE_YEARS: u32 = 18;

// ==========================================
// Family - one household
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Family {
    pub family_id: String,     // UUID
    pub city_id: String,       // tenant
    pub code: String,          // program family code (natural key inside a city)
    pub guardian_nis: String,  // NIS of the responsible
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// Dependent - one person attached to a family
// ==========================================
// Never hard-deleted: deactivation sets deactivated_at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependent {
    pub dependent_id: String,
    pub family_id: String,
    pub city_id: String,
    pub nis: String,
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub is_responsible: bool,
    pub school_name: Option<String>,
    pub enrollment_source: Option<EnrollmentSource>,

    // employment, only meaningful for adults
    pub occupation: Option<String>,
    pub monthly_income: Option<f64>,

    pub created_at: DateTime<Utc>,
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl Dependent {
    pub fn is_active(&self) -> bool {
        self.deactivated_at.is_none()
    }

    /// Unknown birthdates are treated as adults.
    pub fn is_minor(&self, today: NaiveDate) -> bool {
        match self.birth_date {
            Some(birth) => age_in_years(birth, today) < ADULTHOOD_AGE_YEARS,
            None => false,
        }
    }

    /// Employment fields only carry meaning when the dependent is an adult.
    pub fn employment(&self, today: NaiveDate) -> Option<(Option<&str>, Option<f64>)> {
        if self.is_minor(today) {
            None
        } else {
            Some((self.occupation.as_deref(), self.monthly_income))
        }
    }
}

/// Whole years between `birth` and `today` (floor).
pub fn age_in_years(birth: NaiveDate, today: NaiveDate) -> u32 {
    if today < birth {
        return 0;
    }
    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

// ==========================================
// FamilyWithDependents - read model for listings
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyWithDependents {
    pub family: Family,
    pub dependents: Vec<Dependent>,
}

impl FamilyWithDependents {
    pub fn responsible(&self) -> Option<&Dependent> {
        self.dependents.iter().find(|d| d.is_responsible && d.is_active())
    }
}

// ==========================================
// GrantOwner - who already holds a NIS
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantOwner {
    pub family_id: String,
    pub family_code: String,
    pub granted_at: DateTime<Utc>,
}

// ==========================================
// Write request: one family group, one transaction
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDependent {
    pub nis: String,
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub school_name: Option<String>,
    pub enrollment_source: Option<EnrollmentSource>,
    pub source_row: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyGroup {
    pub city_id: String,
    pub code: String,
    pub guardian_nis: String,
    pub responsible: NewDependent,
    pub dependents: Vec<NewDependent>,
}

/// Result of upserting one family group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupOutcome {
    pub family_id: String,
    pub family_created: bool,
    pub inserted: Vec<String>,        // NIS newly linked
    pub already_present: Vec<String>, // NIS already in this family
    pub granted_elsewhere: Vec<(String, String)>, // (NIS, owner family code)
}

impl GroupOutcome {
    /// Dependents linked to this family after the write
    pub fn linked_count(&self) -> usize {
        self.inserted.len() + self.already_present.len()
    }
}
