// ==========================================
// Beneficiary reconciliation - age filter
// ==========================================
// Pure logic: no state beyond the cutoff, no I/O.
// A record is kept iff birth_date >= reference_date - ceiling years.
// ==========================================

use crate::domain::{BeneficiaryRecord, EnrollmentRecord, ExclusionEntry, ExclusionKind, Role, SourceFile};
use crate::i18n::t_with_args;
use chrono::{Months, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeFilter {
    ceiling_years: u32,
    cutoff: NaiveDate,
}

impl AgeFilter {
    pub fn new(ceiling_years: u32, reference_date: NaiveDate) -> Self {
        Self {
            ceiling_years,
            cutoff: Self::cutoff_date(reference_date, ceiling_years),
        }
    }

    /// Oldest birthdate still inside the ceiling.
    ///
    /// Feb 29 references land on Feb 28 in non-leap target years.
    pub fn cutoff_date(reference_date: NaiveDate, years: u32) -> NaiveDate {
        reference_date
            .checked_sub_months(Months::new(years.saturating_mul(12)))
            .unwrap_or(NaiveDate::MIN)
    }

    pub fn cutoff(&self) -> NaiveDate {
        self.cutoff
    }

    pub fn ceiling_years(&self) -> u32 {
        self.ceiling_years
    }

    /// Boundary inclusive: born exactly `ceiling_years` ago is kept
    pub fn is_within(&self, birth_date: NaiveDate) -> bool {
        birth_date >= self.cutoff
    }

    /// Drop cash-transfer dependents above the ceiling.
    /// Responsible rows are never age filtered.
    pub fn filter_beneficiaries(
        &self,
        records: Vec<BeneficiaryRecord>,
    ) -> (Vec<BeneficiaryRecord>, Vec<ExclusionEntry>) {
        let mut kept = Vec::with_capacity(records.len());
        let mut excluded = Vec::new();

        for record in records {
            if record.role == Role::Responsible || self.is_within(record.birth_date) {
                kept.push(record);
            } else {
                excluded.push(self.exclusion(
                    SourceFile::CashTransfer,
                    record.source_row,
                    Some(record.nis.clone()),
                    &record.name,
                    record.birth_date,
                ));
            }
        }

        (kept, excluded)
    }

    /// Drop school/nursery records above the ceiling
    pub fn filter_enrollments(
        &self,
        records: Vec<EnrollmentRecord>,
    ) -> (Vec<EnrollmentRecord>, Vec<ExclusionEntry>) {
        let mut kept = Vec::with_capacity(records.len());
        let mut excluded = Vec::new();

        for record in records {
            if self.is_within(record.birth_date) {
                kept.push(record);
            } else {
                excluded.push(self.exclusion(
                    record.source.source_file(),
                    record.source_row,
                    record.nis.clone(),
                    &record.student_name,
                    record.birth_date,
                ));
            }
        }

        (kept, excluded)
    }

    fn exclusion(
        &self,
        source: SourceFile,
        row_number: usize,
        nis: Option<String>,
        name: &str,
        birth_date: NaiveDate,
    ) -> ExclusionEntry {
        let birth = birth_date.format("%d/%m/%Y").to_string();
        let ceiling = self.ceiling_years.to_string();
        ExclusionEntry {
            source,
            row_number,
            nis,
            name: Some(name.to_string()),
            kind: ExclusionKind::AboveAge,
            reason: t_with_args(
                ExclusionKind::AboveAge.message_key(),
                &[("birth_date", birth.as_str()), ("ceiling", ceiling.as_str())],
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EnrollmentSource;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dependent(nis: &str, birth: NaiveDate, role: Role) -> BeneficiaryRecord {
        BeneficiaryRecord {
            nis: nis.to_string(),
            name: "Fulano".to_string(),
            normalized_name: "FULANO".to_string(),
            birth_date: birth,
            guardian_nis: Some("900".to_string()),
            guardian_name: None,
            family_code: None,
            role,
            source_row: 2,
        }
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let filter = AgeFilter::new(18, date(2024, 6, 15));
        assert_eq!(filter.cutoff(), date(2006, 6, 15));
        assert!(filter.is_within(date(2006, 6, 15)));
        assert!(!filter.is_within(date(2006, 6, 14)));
        assert!(filter.is_within(date(2020, 1, 1)));
    }

    #[test]
    fn test_leap_day_reference() {
        assert_eq!(AgeFilter::cutoff_date(date(2024, 2, 29), 18), date(2006, 2, 28));
        assert_eq!(AgeFilter::cutoff_date(date(2024, 2, 29), 4), date(2020, 2, 29));
    }

    #[test]
    fn test_responsibles_are_not_filtered() {
        let filter = AgeFilter::new(18, date(2024, 6, 15));
        let (kept, excluded) = filter.filter_beneficiaries(vec![
            dependent("1", date(1980, 1, 1), Role::Responsible),
            dependent("2", date(2000, 1, 1), Role::Dependent),
            dependent("3", date(2010, 1, 1), Role::Dependent),
        ]);

        assert_eq!(kept.iter().map(|r| r.nis.as_str()).collect::<Vec<_>>(), vec!["1", "3"]);
        assert_eq!(excluded.len(), 1);
        assert_eq!(excluded[0].kind, ExclusionKind::AboveAge);
        assert_eq!(excluded[0].nis.as_deref(), Some("2"));
    }

    #[test]
    fn test_enrollments_tagged_by_source() {
        let filter = AgeFilter::new(18, date(2024, 6, 15));
        let record = EnrollmentRecord {
            source: EnrollmentSource::Nursery,
            student_name: "Bia".to_string(),
            normalized_name: "BIA".to_string(),
            birth_date: date(2000, 1, 1),
            school_name: "Creche Sol".to_string(),
            guardian_name: None,
            nis: None,
            source_row: 4,
        };
        let (kept, excluded) = filter.filter_enrollments(vec![record]);
        assert!(kept.is_empty());
        assert_eq!(excluded[0].source, SourceFile::Nursery);
        assert_eq!(excluded[0].row_number, 4);
    }
}
