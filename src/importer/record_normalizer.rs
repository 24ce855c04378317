// ==========================================
// Beneficiary reconciliation - record normalizer
// ==========================================
// RawRow → canonical record, or a WrongRow exclusion with a localized
// reason. No storage side effects.
// ==========================================

use crate::domain::{
    BeneficiaryRecord, CashTransferRow, EnrollmentRecord, EnrollmentRow, EnrollmentSource,
    ExclusionEntry, ExclusionKind, NormalizedRecord, RawRow, Role, SourceFile,
};
use crate::i18n::t_with_args;
use crate::importer::field_mapper::columns;
use crate::importer::importer_trait::DataCleaner;
use chrono::NaiveDate;

/// PARENTESCO values (folded) meaning "head of household"
const RESPONSIBLE_MARKERS: [&str; 4] = ["1", "RESPONSAVEL", "RESPONSAVEL FAMILIAR", "RF"];

pub struct RecordNormalizer {
    cleaner: Box<dyn DataCleaner>,
}

/// Rejection under construction: (i18n key, args)
type Rejection = (&'static str, Vec<(&'static str, String)>);

impl RecordNormalizer {
    pub fn new(cleaner: Box<dyn DataCleaner>) -> Self {
        Self { cleaner }
    }

    /// Normalize one row. `today` bounds birthdates from above.
    pub fn normalize(
        &self,
        raw: RawRow,
        today: NaiveDate,
    ) -> Result<NormalizedRecord, ExclusionEntry> {
        match raw {
            RawRow::CashTransfer(row) => self
                .normalize_cash_transfer(&row, today)
                .map(NormalizedRecord::Beneficiary)
                .map_err(|rejection| {
                    self.wrong_row(SourceFile::CashTransfer, row.row_number, &row.nis, &row.name, rejection)
                }),
            RawRow::School(row) => self
                .normalize_enrollment(EnrollmentSource::School, &row, today)
                .map(NormalizedRecord::Enrollment)
                .map_err(|rejection| {
                    self.wrong_row(SourceFile::School, row.row_number, &row.nis, &row.student_name, rejection)
                }),
            RawRow::Nursery(row) => self
                .normalize_enrollment(EnrollmentSource::Nursery, &row, today)
                .map(NormalizedRecord::Enrollment)
                .map_err(|rejection| {
                    self.wrong_row(SourceFile::Nursery, row.row_number, &row.nis, &row.student_name, rejection)
                }),
        }
    }

    /// Whether a PARENTESCO value marks the household head
    pub fn is_responsible(&self, kinship: Option<&str>) -> bool {
        match kinship {
            Some(value) => {
                let folded = self.cleaner.fold_name(value);
                RESPONSIBLE_MARKERS.contains(&folded.as_str())
            }
            None => false,
        }
    }

    fn normalize_cash_transfer(
        &self,
        row: &CashTransferRow,
        today: NaiveDate,
    ) -> Result<BeneficiaryRecord, Rejection> {
        let nis = self.required_nis(&row.nis, columns::NIS)?;
        let name = self.required_text(&row.name, columns::NAME)?;
        let birth_date = self.required_birth_date(&row.birth_date, today)?;

        let role = if self.is_responsible(row.kinship.as_deref()) {
            Role::Responsible
        } else {
            Role::Dependent
        };

        let guardian_nis = match role {
            Role::Responsible => None,
            Role::Dependent => Some(self.required_nis(&row.guardian_nis, columns::GUARDIAN_NIS)?),
        };

        let guardian_name = self
            .cleaner
            .normalize_null(row.guardian_name.clone())
            .map(|v| self.cleaner.clean_text(&v, false));
        let family_code = self
            .cleaner
            .normalize_null(row.family_code.clone())
            .map(|v| self.cleaner.clean_text(&v, true));

        Ok(BeneficiaryRecord {
            nis,
            normalized_name: self.cleaner.fold_name(&name),
            name,
            birth_date,
            guardian_nis,
            guardian_name,
            family_code,
            role,
            source_row: row.row_number,
        })
    }

    fn normalize_enrollment(
        &self,
        source: EnrollmentSource,
        row: &EnrollmentRow,
        today: NaiveDate,
    ) -> Result<EnrollmentRecord, Rejection> {
        let (name_column, school_column) = match source {
            EnrollmentSource::School => (columns::STUDENT_NAME, columns::SCHOOL),
            EnrollmentSource::Nursery => (columns::CHILD_NAME, columns::NURSERY),
        };

        let student_name = self.required_text(&row.student_name, name_column)?;
        let birth_date = self.required_birth_date(&row.birth_date, today)?;
        let school_name = self.required_text(&row.school_name, school_column)?;

        // optional NIS: junk collapses to None instead of rejecting the row
        let nis = self
            .cleaner
            .normalize_null(row.nis.clone())
            .map(|v| self.cleaner.digits_only(&v))
            .filter(|v| !v.is_empty());

        let guardian_name = self
            .cleaner
            .normalize_null(row.guardian_name.clone())
            .map(|v| self.cleaner.clean_text(&v, false));

        Ok(EnrollmentRecord {
            source,
            normalized_name: self.cleaner.fold_name(&student_name),
            student_name,
            birth_date,
            school_name,
            guardian_name,
            nis,
            source_row: row.row_number,
        })
    }

    // ===== field helpers =====

    fn required_text(&self, value: &Option<String>, column: &'static str) -> Result<String, Rejection> {
        self.cleaner
            .normalize_null(value.clone())
            .map(|v| self.cleaner.clean_text(&v, false))
            .ok_or_else(|| ("row.missing_field", vec![("field", column.to_string())]))
    }

    fn required_nis(&self, value: &Option<String>, column: &'static str) -> Result<String, Rejection> {
        let raw = self
            .cleaner
            .normalize_null(value.clone())
            .ok_or_else(|| ("row.missing_field", vec![("field", column.to_string())]))?;

        let digits = self.cleaner.digits_only(&raw);
        if digits.is_empty() {
            return Err((
                "row.invalid_nis",
                vec![("field", column.to_string()), ("value", raw)],
            ));
        }
        Ok(digits)
    }

    fn required_birth_date(
        &self,
        value: &Option<String>,
        today: NaiveDate,
    ) -> Result<NaiveDate, Rejection> {
        let raw = self
            .cleaner
            .normalize_null(value.clone())
            .ok_or_else(|| ("row.missing_field", vec![("field", columns::BIRTH_DATE.to_string())]))?;

        self.cleaner
            .parse_birth_date(&raw, today)
            .map_err(|key| (key, vec![("value", raw)]))
    }

    fn wrong_row(
        &self,
        source: SourceFile,
        row_number: usize,
        nis: &Option<String>,
        name: &Option<String>,
        (key, args): Rejection,
    ) -> ExclusionEntry {
        let args: Vec<(&str, &str)> = args.iter().map(|(k, v)| (*k, v.as_str())).collect();
        ExclusionEntry {
            source,
            row_number,
            nis: nis
                .as_deref()
                .map(|v| self.cleaner.digits_only(v))
                .filter(|v| !v.is_empty()),
            name: self.cleaner.normalize_null(name.clone()),
            kind: ExclusionKind::WrongRow,
            reason: t_with_args(key, &args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::data_cleaner::DataCleaner as DataCleanerImpl;

    fn normalizer() -> RecordNormalizer {
        RecordNormalizer::new(Box::new(DataCleanerImpl))
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn cash_row(kinship: Option<&str>, guardian: Option<&str>) -> CashTransferRow {
        CashTransferRow {
            row_number: 3,
            nis: Some("123.456.789-01".to_string()),
            name: Some("  Ana   Souza ".to_string()),
            birth_date: Some("01/02/2015".to_string()),
            kinship: kinship.map(str::to_string),
            guardian_nis: guardian.map(str::to_string),
            guardian_name: Some("Maria Souza".to_string()),
            family_code: None,
        }
    }

    #[test]
    fn test_dependent_row_normalized() {
        let record = normalizer()
            .normalize(
                RawRow::CashTransfer(cash_row(Some("FILHO"), Some("987.654.321-00"))),
                today(),
            )
            .unwrap();

        match record {
            NormalizedRecord::Beneficiary(b) => {
                assert_eq!(b.nis, "12345678901");
                assert_eq!(b.name, "Ana Souza");
                assert_eq!(b.normalized_name, "ANA SOUZA");
                assert_eq!(b.role, Role::Dependent);
                assert_eq!(b.guardian_nis.as_deref(), Some("98765432100"));
                assert_eq!(b.birth_date, NaiveDate::from_ymd_opt(2015, 2, 1).unwrap());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_responsible_markers() {
        let n = normalizer();
        assert!(n.is_responsible(Some("1")));
        assert!(n.is_responsible(Some("Responsável Familiar")));
        assert!(n.is_responsible(Some(" rf ")));
        assert!(!n.is_responsible(Some("FILHA")));
        assert!(!n.is_responsible(None));
    }

    #[test]
    fn test_responsible_row_needs_no_guardian_nis() {
        let record = normalizer()
            .normalize(RawRow::CashTransfer(cash_row(Some("1"), None)), today())
            .unwrap();
        match record {
            NormalizedRecord::Beneficiary(b) => {
                assert_eq!(b.role, Role::Responsible);
                assert_eq!(b.guardian_key(), "12345678901");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_dependent_without_guardian_is_wrong_row() {
        let rejected = normalizer()
            .normalize(RawRow::CashTransfer(cash_row(None, None)), today())
            .unwrap_err();
        assert_eq!(rejected.kind, ExclusionKind::WrongRow);
        assert_eq!(rejected.source, SourceFile::CashTransfer);
        assert_eq!(rejected.row_number, 3);
        assert_eq!(rejected.nis.as_deref(), Some("12345678901"));
        assert!(rejected.reason.contains("NIS RESPONSAVEL"));
    }

    #[test]
    fn test_bad_birth_date_is_wrong_row() {
        let mut row = cash_row(Some("1"), None);
        row.birth_date = Some("32/13/2015".to_string());
        let rejected = normalizer()
            .normalize(RawRow::CashTransfer(row), today())
            .unwrap_err();
        assert_eq!(rejected.kind, ExclusionKind::WrongRow);
        assert!(rejected.reason.contains("32/13/2015"));
    }

    #[test]
    fn test_enrollment_optional_nis() {
        let row = EnrollmentRow {
            row_number: 2,
            student_name: Some("João da Silva".to_string()),
            birth_date: Some("2016-03-10".to_string()),
            school_name: Some("EMEF Centro".to_string()),
            nis: Some("não informado".to_string()),
            guardian_name: None,
        };
        match normalizer().normalize(RawRow::School(row), today()).unwrap() {
            NormalizedRecord::Enrollment(e) => {
                assert_eq!(e.source, EnrollmentSource::School);
                assert_eq!(e.normalized_name, "JOAO DA SILVA");
                assert_eq!(e.nis, None);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_enrollment_missing_school_is_wrong_row() {
        let row = EnrollmentRow {
            row_number: 9,
            student_name: Some("Bia".to_string()),
            birth_date: Some("2021-03-10".to_string()),
            ..Default::default()
        };
        let rejected = normalizer()
            .normalize(RawRow::Nursery(row), today())
            .unwrap_err();
        assert_eq!(rejected.source, SourceFile::Nursery);
        assert!(rejected.reason.contains("CRECHE"));
    }
}
