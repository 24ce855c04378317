// ==========================================
// Beneficiary reconciliation - import records
// ==========================================
// Raw rows (post schema validation) and the canonical records
// produced by the normalizer. Lifetime: a single import run.
// ==========================================

use crate::domain::types::{EnrollmentSource, Role, SourceFile};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// RawRow - schema-validated row, still untyped text
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawRow {
    CashTransfer(CashTransferRow),
    School(EnrollmentRow),
    Nursery(EnrollmentRow),
}

impl RawRow {
    pub fn source(&self) -> SourceFile {
        match self {
            RawRow::CashTransfer(_) => SourceFile::CashTransfer,
            RawRow::School(_) => SourceFile::School,
            RawRow::Nursery(_) => SourceFile::Nursery,
        }
    }

    pub fn row_number(&self) -> usize {
        match self {
            RawRow::CashTransfer(row) => row.row_number,
            RawRow::School(row) | RawRow::Nursery(row) => row.row_number,
        }
    }
}

/// Cash-transfer roll row (Bolsa Família export)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CashTransferRow {
    pub row_number: usize,
    pub nis: Option<String>,           // NIS
    pub name: Option<String>,          // NOME
    pub birth_date: Option<String>,    // DATA DE NASCIMENTO
    pub kinship: Option<String>,       // PARENTESCO
    pub guardian_nis: Option<String>,  // NIS RESPONSAVEL
    pub guardian_name: Option<String>, // NOME RESPONSAVEL
    pub family_code: Option<String>,   // CODIGO FAMILIAR
}

/// School (Sislame) or nursery roll row
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnrollmentRow {
    pub row_number: usize,
    pub student_name: Option<String>,
    pub birth_date: Option<String>,
    pub school_name: Option<String>,
    pub nis: Option<String>,
    pub guardian_name: Option<String>,
}

// ==========================================
// BeneficiaryRecord - canonical cash-transfer person
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeneficiaryRecord {
    pub nis: String,                   // digits only
    pub name: String,                  // display name, original case
    pub normalized_name: String,       // folded name used for matching
    pub birth_date: NaiveDate,
    pub guardian_nis: Option<String>,  // digits only; None for responsible rows
    pub guardian_name: Option<String>,
    pub family_code: Option<String>,
    pub role: Role,
    pub source_row: usize,
}

impl BeneficiaryRecord {
    /// NIS of the household head this record belongs to
    pub fn guardian_key(&self) -> &str {
        match self.role {
            Role::Responsible => &self.nis,
            Role::Dependent => self.guardian_nis.as_deref().unwrap_or(&self.nis),
        }
    }

    /// Program family code, falling back to the guardian NIS
    pub fn family_code(&self) -> String {
        self.family_code
            .clone()
            .unwrap_or_else(|| self.guardian_key().to_string())
    }
}

// ==========================================
// EnrollmentRecord - school/nursery lookup entry
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub source: EnrollmentSource,
    pub student_name: String,
    pub normalized_name: String,
    pub birth_date: NaiveDate,
    pub school_name: String,
    pub guardian_name: Option<String>,
    pub nis: Option<String>,
    pub source_row: usize,
}

// ==========================================
// NormalizedRecord - normalizer output
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedRecord {
    Beneficiary(BeneficiaryRecord),
    Enrollment(EnrollmentRecord),
}
