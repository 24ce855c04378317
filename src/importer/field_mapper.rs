// ==========================================
// Beneficiary reconciliation - field mapper
// ==========================================
// Source header → RawRow field. Header lookup folds case, accents and
// surrounding whitespace; renamed columns are never accepted.
// ==========================================

use crate::domain::{CashTransferRow, EnrollmentRow, RawRow, SourceFile};
use crate::importer::data_cleaner::fold_text;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::FieldMapper as FieldMapperTrait;
use std::collections::HashMap;

// ==========================================
// Canonical headers (folded form)
// ==========================================
pub mod columns {
    pub const NIS: &str = "NIS";
    pub const NAME: &str = "NOME";
    pub const BIRTH_DATE: &str = "DATA DE NASCIMENTO";
    pub const KINSHIP: &str = "PARENTESCO";
    pub const GUARDIAN_NIS: &str = "NIS RESPONSAVEL";
    pub const GUARDIAN_NAME: &str = "NOME RESPONSAVEL";
    pub const FAMILY_CODE: &str = "CODIGO FAMILIAR";

    pub const STUDENT_NAME: &str = "NOME DO ALUNO";
    pub const SCHOOL: &str = "ESCOLA";
    pub const CHILD_NAME: &str = "NOME DA CRIANCA";
    pub const NURSERY: &str = "CRECHE";
    pub const ENROLLMENT_GUARDIAN_NAME: &str = "NOME DO RESPONSAVEL";
}

/// Columns a file must carry to be usable at all
pub fn required_columns(source: SourceFile) -> &'static [&'static str] {
    match source {
        SourceFile::CashTransfer => &[columns::NIS, columns::NAME, columns::BIRTH_DATE],
        SourceFile::School => &[columns::STUDENT_NAME, columns::BIRTH_DATE, columns::SCHOOL],
        SourceFile::Nursery => &[columns::CHILD_NAME, columns::BIRTH_DATE, columns::NURSERY],
    }
}

pub struct FieldMapper;

impl FieldMapperTrait for FieldMapper {
    fn validate_headers(&self, source: SourceFile, headers: &[String]) -> ImportResult<()> {
        let present: Vec<String> = headers.iter().map(|h| fold_text(h)).collect();

        for column in required_columns(source) {
            if !present.iter().any(|h| h == column) {
                return Err(ImportError::MissingColumn {
                    source_file: source,
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    fn map_row(
        &self,
        source: SourceFile,
        row_number: usize,
        row: &HashMap<String, String>,
    ) -> RawRow {
        let folded = Self::fold_keys(row);
        let get = |column: &str| Self::get_string(&folded, column);

        match source {
            SourceFile::CashTransfer => RawRow::CashTransfer(CashTransferRow {
                row_number,
                nis: get(columns::NIS),
                name: get(columns::NAME),
                birth_date: get(columns::BIRTH_DATE),
                kinship: get(columns::KINSHIP),
                guardian_nis: get(columns::GUARDIAN_NIS),
                guardian_name: get(columns::GUARDIAN_NAME),
                family_code: get(columns::FAMILY_CODE),
            }),
            SourceFile::School => RawRow::School(EnrollmentRow {
                row_number,
                student_name: get(columns::STUDENT_NAME),
                birth_date: get(columns::BIRTH_DATE),
                school_name: get(columns::SCHOOL),
                nis: get(columns::NIS),
                guardian_name: get(columns::ENROLLMENT_GUARDIAN_NAME),
            }),
            SourceFile::Nursery => RawRow::Nursery(EnrollmentRow {
                row_number,
                student_name: get(columns::CHILD_NAME),
                birth_date: get(columns::BIRTH_DATE),
                school_name: get(columns::NURSERY),
                nis: get(columns::NIS),
                guardian_name: get(columns::ENROLLMENT_GUARDIAN_NAME),
            }),
        }
    }
}

impl FieldMapper {
    /// Re-key a row by folded header
    fn fold_keys(row: &HashMap<String, String>) -> HashMap<String, &str> {
        row.iter()
            .map(|(header, value)| (fold_text(header), value.as_str()))
            .collect()
    }

    /// Trimmed value; empty cells become None
    fn get_string(row: &HashMap<String, &str>, column: &str) -> Option<String> {
        row.get(column).and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_validate_headers_is_case_and_accent_insensitive() {
        let mapper = FieldMapper;
        let result = mapper.validate_headers(
            SourceFile::Nursery,
            &headers(&[" Nome da Criança ", "Data de Nascimento", "creche"]),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_headers_reports_missing_column() {
        let mapper = FieldMapper;
        let result = mapper.validate_headers(
            SourceFile::School,
            &headers(&["NOME DO ALUNO", "NASCIMENTO", "ESCOLA"]),
        );
        match result {
            Err(ImportError::MissingColumn {
                source_file,
                column,
            }) => {
                assert_eq!(source_file, SourceFile::School);
                assert_eq!(column, "DATA DE NASCIMENTO");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_map_cash_transfer_row() {
        let mut row = HashMap::new();
        row.insert("nis".to_string(), " 123.456.789-01 ".to_string());
        row.insert("Nome".to_string(), "Ana Souza".to_string());
        row.insert("Data de Nascimento".to_string(), "01/02/2015".to_string());
        row.insert("NIS Responsável".to_string(), "98765432100".to_string());
        row.insert("Código Familiar".to_string(), "".to_string());

        let mapper = FieldMapper;
        let mapped = mapper.map_row(SourceFile::CashTransfer, 5, &row);

        match mapped {
            RawRow::CashTransfer(r) => {
                assert_eq!(r.row_number, 5);
                assert_eq!(r.nis.as_deref(), Some("123.456.789-01"));
                assert_eq!(r.name.as_deref(), Some("Ana Souza"));
                assert_eq!(r.guardian_nis.as_deref(), Some("98765432100"));
                assert_eq!(r.family_code, None);
                assert_eq!(r.kinship, None);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_map_nursery_row_uses_nursery_columns() {
        let mut row = HashMap::new();
        row.insert("NOME DA CRIANCA".to_string(), "Bia".to_string());
        row.insert("CRECHE".to_string(), "Creche Sol".to_string());

        let mapper = FieldMapper;
        match mapper.map_row(SourceFile::Nursery, 2, &row) {
            RawRow::Nursery(r) => {
                assert_eq!(r.student_name.as_deref(), Some("Bia"));
                assert_eq!(r.school_name.as_deref(), Some("Creche Sol"));
                assert_eq!(r.birth_date, None);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
