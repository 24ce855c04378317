// ==========================================
// Beneficiary reconciliation - domain types
// ==========================================
// Source files, roles, match tiers and the import status machine
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// SourceFile - which roll a row came from
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceFile {
    CashTransfer, // Bolsa Família roll
    School,       // Sislame roll
    Nursery,      // nursery/daycare roll
}

impl SourceFile {
    /// Label used in the exclusion report
    pub fn label(&self) -> &'static str {
        match self {
            SourceFile::CashTransfer => "BOLSA FAMILIA",
            SourceFile::School => "SISLAME",
            SourceFile::Nursery => "CRECHE",
        }
    }
}

impl fmt::Display for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ==========================================
// Role - position of a person inside the cash-transfer household
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Responsible,
    Dependent,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Responsible => write!(f, "responsible"),
            Role::Dependent => write!(f, "dependent"),
        }
    }
}

// ==========================================
// EnrollmentSource - school or nursery enrollment
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentSource {
    School,
    Nursery,
}

impl EnrollmentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentSource::School => "SCHOOL",
            EnrollmentSource::Nursery => "NURSERY",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "SCHOOL" => Some(EnrollmentSource::School),
            "NURSERY" => Some(EnrollmentSource::Nursery),
            _ => None,
        }
    }

    pub fn source_file(&self) -> SourceFile {
        match self {
            EnrollmentSource::School => SourceFile::School,
            EnrollmentSource::Nursery => SourceFile::Nursery,
        }
    }
}

// ==========================================
// MatchedVia - which matching tier resolved a dependent
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchedVia {
    Nis,
    Name,
    None,
}

impl fmt::Display for MatchedVia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchedVia::Nis => write!(f, "nis"),
            MatchedVia::Name => write!(f, "name"),
            MatchedVia::None => write!(f, "none"),
        }
    }
}

// ==========================================
// ImportStatus - report status machine
// ==========================================
// Em espera → Lendo arquivos → Filtrando dados → Cruzando dados → Salvando → Finalizado
// Any running stage may jump to Falhou.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImportStatus {
    #[default]
    #[serde(rename = "Em espera")]
    Waiting,
    #[serde(rename = "Lendo arquivos")]
    ReadingFiles,
    #[serde(rename = "Filtrando dados")]
    Filtering,
    #[serde(rename = "Cruzando dados")]
    CrossReferencing,
    #[serde(rename = "Salvando")]
    Saving,
    #[serde(rename = "Finalizado")]
    Finished,
    #[serde(rename = "Falhou")]
    Failed,
}

impl ImportStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ImportStatus::Waiting => "Em espera",
            ImportStatus::ReadingFiles => "Lendo arquivos",
            ImportStatus::Filtering => "Filtrando dados",
            ImportStatus::CrossReferencing => "Cruzando dados",
            ImportStatus::Saving => "Salvando",
            ImportStatus::Finished => "Finalizado",
            ImportStatus::Failed => "Falhou",
        }
    }

    /// Position in the forward order. Failed sits outside the order.
    fn rank(&self) -> u8 {
        match self {
            ImportStatus::Waiting => 0,
            ImportStatus::ReadingFiles => 1,
            ImportStatus::Filtering => 2,
            ImportStatus::CrossReferencing => 3,
            ImportStatus::Saving => 4,
            ImportStatus::Finished => 5,
            ImportStatus::Failed => u8::MAX,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportStatus::Finished | ImportStatus::Failed)
    }

    /// Whether a published snapshot may move from `self` to `next`.
    ///
    /// Staying on the same stage is allowed (progress updates).
    pub fn can_transition_to(&self, next: ImportStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            ImportStatus::Failed => true,
            _ => next.rank() >= self.rank(),
        }
    }

    /// Percentage band owned by the stage, as (start, end).
    pub fn percentage_band(&self) -> (f64, f64) {
        match self {
            ImportStatus::Waiting => (0.0, 0.0),
            ImportStatus::ReadingFiles => (0.0, 20.0),
            ImportStatus::Filtering => (20.0, 40.0),
            ImportStatus::CrossReferencing => (40.0, 70.0),
            ImportStatus::Saving => (70.0, 100.0),
            ImportStatus::Finished => (100.0, 100.0),
            ImportStatus::Failed => (0.0, 100.0),
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_forward_only() {
        assert!(ImportStatus::Waiting.can_transition_to(ImportStatus::ReadingFiles));
        assert!(ImportStatus::ReadingFiles.can_transition_to(ImportStatus::ReadingFiles));
        assert!(ImportStatus::Filtering.can_transition_to(ImportStatus::Saving));
        assert!(!ImportStatus::Saving.can_transition_to(ImportStatus::Filtering));
        assert!(!ImportStatus::CrossReferencing.can_transition_to(ImportStatus::Waiting));
    }

    #[test]
    fn test_status_failed_from_any_running_stage() {
        for status in [
            ImportStatus::Waiting,
            ImportStatus::ReadingFiles,
            ImportStatus::Filtering,
            ImportStatus::CrossReferencing,
            ImportStatus::Saving,
        ] {
            assert!(status.can_transition_to(ImportStatus::Failed));
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        assert!(!ImportStatus::Finished.can_transition_to(ImportStatus::Failed));
        assert!(!ImportStatus::Failed.can_transition_to(ImportStatus::Finished));
        assert!(!ImportStatus::Failed.can_transition_to(ImportStatus::Failed));
    }

    #[test]
    fn test_status_serializes_portuguese_label() {
        let json = serde_json::to_string(&ImportStatus::CrossReferencing).unwrap();
        assert_eq!(json, "\"Cruzando dados\"");
        let back: ImportStatus = serde_json::from_str("\"Falhou\"").unwrap();
        assert_eq!(back, ImportStatus::Failed);
    }

    #[test]
    fn test_bands_are_contiguous() {
        let order = [
            ImportStatus::ReadingFiles,
            ImportStatus::Filtering,
            ImportStatus::CrossReferencing,
            ImportStatus::Saving,
        ];
        for pair in order.windows(2) {
            assert_eq!(pair[0].percentage_band().1, pair[1].percentage_band().0);
        }
    }
}
