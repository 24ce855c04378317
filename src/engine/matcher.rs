// ==========================================
// Beneficiary reconciliation - cross-reference matcher
// ==========================================
// Tiers: exact NIS → unique (normalized name, birthdate) → none.
// NIS matches already owned by another family are not grantable.
// Pure logic: grants come in as a snapshot, nothing is written.
// ==========================================

use crate::domain::{
    BeneficiaryRecord, EnrollmentRecord, EnrollmentSource, ExclusionEntry, ExclusionKind,
    GrantOwner, MatchedVia, SourceFile,
};
use crate::i18n::t_with_args;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

// ==========================================
// MatchResult
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub dependent: BeneficiaryRecord,
    pub matched_via: MatchedVia,
    pub target: Option<EnrollmentRecord>,
    /// index position of `target`
    pub target_position: Option<usize>,
    /// several name candidates; treated as not found
    pub ambiguous: bool,
}

impl MatchResult {
    /// Only NIS matches may be granted
    pub fn is_grantable(&self) -> bool {
        self.matched_via == MatchedVia::Nis
    }
}

// ==========================================
// EnrollmentIndex - school + nursery lookup table
// ==========================================
#[derive(Debug, Default)]
pub struct EnrollmentIndex {
    records: Vec<EnrollmentRecord>,
    by_nis: HashMap<String, usize>,
    by_name: HashMap<(String, NaiveDate), Vec<usize>>,
}

impl EnrollmentIndex {
    /// School records are indexed before nursery records, so NIS ties
    /// resolve to the school roll (then file order).
    pub fn build(school: Vec<EnrollmentRecord>, nursery: Vec<EnrollmentRecord>) -> Self {
        let mut index = Self::default();
        for record in school.into_iter().chain(nursery) {
            let position = index.records.len();
            if let Some(nis) = &record.nis {
                index.by_nis.entry(nis.clone()).or_insert(position);
            }
            index
                .by_name
                .entry((record.normalized_name.clone(), record.birth_date))
                .or_default()
                .push(position);
            index.records.push(record);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn lookup_nis(&self, nis: &str) -> Option<usize> {
        self.by_nis.get(nis).copied()
    }

    pub fn lookup_name(&self, normalized_name: &str, birth_date: NaiveDate) -> &[usize] {
        self.by_name
            .get(&(normalized_name.to_string(), birth_date))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn get(&self, position: usize) -> Option<&EnrollmentRecord> {
        self.records.get(position)
    }
}

// ==========================================
// CrossReference - matcher output
// ==========================================
#[derive(Debug, Default)]
pub struct CrossReference {
    pub grantable: Vec<MatchResult>,
    pub found_only_by_name: Vec<MatchResult>,
    /// includes ambiguous results
    pub not_found: Vec<MatchResult>,
    pub granted_another_parent: Vec<(MatchResult, GrantOwner)>,
    pub school_without_parent: Vec<EnrollmentRecord>,
    pub nursery_without_parent: Vec<EnrollmentRecord>,
}

impl CrossReference {
    pub fn ambiguous_count(&self) -> usize {
        self.not_found.iter().filter(|m| m.ambiguous).count()
    }

    /// One exclusion per dependent or enrollment left out of the grant
    pub fn exclusions(&self) -> Vec<ExclusionEntry> {
        let mut entries = Vec::new();

        for result in &self.found_only_by_name {
            let school = result
                .target
                .as_ref()
                .map(|t| t.school_name.as_str())
                .unwrap_or("");
            entries.push(dependent_exclusion(
                &result.dependent,
                ExclusionKind::FoundOnlyByName,
                &[("school", school)],
            ));
        }

        for result in &self.not_found {
            let kind = if result.ambiguous {
                ExclusionKind::Ambiguous
            } else {
                ExclusionKind::NotFound
            };
            entries.push(dependent_exclusion(&result.dependent, kind, &[]));
        }

        for (result, owner) in &self.granted_another_parent {
            entries.push(dependent_exclusion(
                &result.dependent,
                ExclusionKind::GrantedAnotherParent,
                &[("family_code", owner.family_code.as_str())],
            ));
        }

        for record in self
            .school_without_parent
            .iter()
            .chain(self.nursery_without_parent.iter())
        {
            entries.push(ExclusionEntry {
                source: record.source.source_file(),
                row_number: record.source_row,
                nis: record.nis.clone(),
                name: Some(record.student_name.clone()),
                kind: ExclusionKind::WithoutParent,
                reason: t_with_args(
                    ExclusionKind::WithoutParent.message_key(),
                    &[("school", record.school_name.as_str())],
                ),
            });
        }

        entries
    }
}

fn dependent_exclusion(
    dependent: &BeneficiaryRecord,
    kind: ExclusionKind,
    args: &[(&str, &str)],
) -> ExclusionEntry {
    ExclusionEntry {
        source: SourceFile::CashTransfer,
        row_number: dependent.source_row,
        nis: Some(dependent.nis.clone()),
        name: Some(dependent.name.clone()),
        kind,
        reason: t_with_args(kind.message_key(), args),
    }
}

// ==========================================
// CrossReferenceMatcher
// ==========================================
pub struct CrossReferenceMatcher;

impl CrossReferenceMatcher {
    /// Resolve one dependent against the index
    pub fn match_dependent(index: &EnrollmentIndex, dependent: BeneficiaryRecord) -> MatchResult {
        if let Some(position) = index.lookup_nis(&dependent.nis) {
            return MatchResult {
                target: index.get(position).cloned(),
                target_position: Some(position),
                dependent,
                matched_via: MatchedVia::Nis,
                ambiguous: false,
            };
        }

        let candidates = index.lookup_name(&dependent.normalized_name, dependent.birth_date);
        match candidates {
            [single] => MatchResult {
                target: index.get(*single).cloned(),
                target_position: Some(*single),
                dependent,
                matched_via: MatchedVia::Name,
                ambiguous: false,
            },
            _ => MatchResult {
                ambiguous: candidates.len() > 1,
                target: None,
                target_position: None,
                dependent,
                matched_via: MatchedVia::None,
            },
        }
    }

    /// Match every dependent, split the results by cohort and collect
    /// enrollments no dependent matched.
    ///
    /// `grants`: NIS already owned by a family (first grant wins).
    /// `on_progress(done, total)` is called after each dependent.
    pub fn reconcile<F>(
        dependents: Vec<BeneficiaryRecord>,
        index: &EnrollmentIndex,
        grants: &HashMap<String, GrantOwner>,
        mut on_progress: F,
    ) -> CrossReference
    where
        F: FnMut(usize, usize),
    {
        let total = dependents.len();
        let mut result = CrossReference::default();
        let mut matched_positions: HashSet<usize> = HashSet::new();

        for (done, dependent) in dependents.into_iter().enumerate() {
            let matched = Self::match_dependent(index, dependent);
            if let Some(position) = matched.target_position {
                matched_positions.insert(position);
            }
            match matched.matched_via {
                MatchedVia::Nis => {
                    let owner = grants.get(&matched.dependent.nis).and_then(|owner| {
                        if owner.family_code != matched.dependent.family_code() {
                            Some(owner.clone())
                        } else {
                            None
                        }
                    });
                    match owner {
                        Some(owner) => result.granted_another_parent.push((matched, owner)),
                        None => result.grantable.push(matched),
                    }
                }
                MatchedVia::Name => result.found_only_by_name.push(matched),
                MatchedVia::None => result.not_found.push(matched),
            }

            on_progress(done + 1, total);
        }

        for position in 0..index.len() {
            if matched_positions.contains(&position) {
                continue;
            }
            if let Some(record) = index.get(position) {
                match record.source {
                    EnrollmentSource::School => result.school_without_parent.push(record.clone()),
                    EnrollmentSource::Nursery => result.nursery_without_parent.push(record.clone()),
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dependent(nis: &str, name: &str, birth: NaiveDate, code: &str) -> BeneficiaryRecord {
        BeneficiaryRecord {
            nis: nis.to_string(),
            name: name.to_string(),
            normalized_name: name.to_uppercase(),
            birth_date: birth,
            guardian_nis: Some("900".to_string()),
            guardian_name: None,
            family_code: Some(code.to_string()),
            role: Role::Dependent,
            source_row: 2,
        }
    }

    fn enrollment(
        source: EnrollmentSource,
        nis: Option<&str>,
        name: &str,
        birth: NaiveDate,
        row: usize,
    ) -> EnrollmentRecord {
        EnrollmentRecord {
            source,
            student_name: name.to_string(),
            normalized_name: name.to_uppercase(),
            birth_date: birth,
            school_name: format!("Escola {}", row),
            guardian_name: None,
            nis: nis.map(str::to_string),
            source_row: row,
        }
    }

    #[test]
    fn test_nis_match_wins_over_name() {
        let index = EnrollmentIndex::build(
            vec![enrollment(EnrollmentSource::School, Some("1"), "Outro Nome", date(2014, 1, 1), 2)],
            vec![],
        );
        let result =
            CrossReferenceMatcher::match_dependent(&index, dependent("1", "Ana", date(2015, 5, 5), "F"));
        assert_eq!(result.matched_via, MatchedVia::Nis);
        assert!(result.is_grantable());
    }

    #[test]
    fn test_unique_name_match_is_not_grantable() {
        let index = EnrollmentIndex::build(
            vec![enrollment(EnrollmentSource::School, None, "Ana", date(2015, 5, 5), 2)],
            vec![],
        );
        let result =
            CrossReferenceMatcher::match_dependent(&index, dependent("1", "Ana", date(2015, 5, 5), "F"));
        assert_eq!(result.matched_via, MatchedVia::Name);
        assert!(!result.is_grantable());
        assert_eq!(result.target.map(|t| t.source_row), Some(2));
    }

    #[test]
    fn test_several_name_candidates_are_ambiguous() {
        let index = EnrollmentIndex::build(
            vec![enrollment(EnrollmentSource::School, None, "Ana", date(2015, 5, 5), 2)],
            vec![enrollment(EnrollmentSource::Nursery, None, "Ana", date(2015, 5, 5), 3)],
        );
        let result =
            CrossReferenceMatcher::match_dependent(&index, dependent("1", "Ana", date(2015, 5, 5), "F"));
        assert_eq!(result.matched_via, MatchedVia::None);
        assert!(result.ambiguous);
    }

    #[test]
    fn test_match_reports_consumed_position() {
        let index = EnrollmentIndex::build(
            vec![
                enrollment(EnrollmentSource::School, Some("1"), "Ana", date(2015, 5, 5), 2),
                enrollment(EnrollmentSource::School, None, "Bia", date(2016, 1, 1), 3),
                enrollment(EnrollmentSource::School, None, "Caio", date(2014, 1, 1), 4),
            ],
            vec![enrollment(EnrollmentSource::Nursery, None, "Caio", date(2014, 1, 1), 2)],
        );

        let by_nis =
            CrossReferenceMatcher::match_dependent(&index, dependent("1", "Outra", date(2015, 5, 5), "F"));
        assert_eq!(by_nis.target_position, Some(0));

        let by_name =
            CrossReferenceMatcher::match_dependent(&index, dependent("9", "Bia", date(2016, 1, 1), "F"));
        assert_eq!(by_name.target_position, Some(1));

        let ambiguous =
            CrossReferenceMatcher::match_dependent(&index, dependent("8", "Caio", date(2014, 1, 1), "F"));
        assert!(ambiguous.ambiguous);
        assert_eq!(ambiguous.target_position, None);

        // ambiguous candidates stay unmatched
        let result = CrossReferenceMatcher::reconcile(
            vec![dependent("8", "Caio", date(2014, 1, 1), "F")],
            &index,
            &HashMap::new(),
            |_, _| {},
        );
        assert_eq!(result.school_without_parent.len(), 3);
        assert_eq!(result.nursery_without_parent.len(), 1);
    }

    #[test]
    fn test_nis_tie_resolves_to_school() {
        let index = EnrollmentIndex::build(
            vec![enrollment(EnrollmentSource::School, Some("1"), "Ana", date(2015, 5, 5), 7)],
            vec![enrollment(EnrollmentSource::Nursery, Some("1"), "Ana", date(2015, 5, 5), 2)],
        );
        let position = index.lookup_nis("1").unwrap();
        assert_eq!(index.get(position).map(|r| r.source), Some(EnrollmentSource::School));
    }

    #[test]
    fn test_reconcile_cohorts() {
        let index = EnrollmentIndex::build(
            vec![
                enrollment(EnrollmentSource::School, Some("1"), "Ana", date(2015, 1, 1), 2),
                enrollment(EnrollmentSource::School, None, "Bia", date(2016, 1, 1), 3),
                enrollment(EnrollmentSource::School, Some("4"), "Davi", date(2013, 1, 1), 4),
                enrollment(EnrollmentSource::School, None, "Sem Pai", date(2012, 1, 1), 5),
            ],
            vec![enrollment(EnrollmentSource::Nursery, None, "Bebe", date(2022, 1, 1), 2)],
        );

        let mut grants = HashMap::new();
        grants.insert(
            "4".to_string(),
            GrantOwner {
                family_id: "f-old".to_string(),
                family_code: "OUTRA".to_string(),
                granted_at: Utc::now(),
            },
        );
        grants.insert(
            "1".to_string(),
            GrantOwner {
                family_id: "f-same".to_string(),
                family_code: "F".to_string(),
                granted_at: Utc::now(),
            },
        );

        let dependents = vec![
            dependent("1", "Ana", date(2015, 1, 1), "F"),
            dependent("2", "Bia", date(2016, 1, 1), "F"),
            dependent("3", "Caio", date(2014, 1, 1), "F"),
            dependent("4", "Davi", date(2013, 1, 1), "F"),
        ];

        let mut ticks = Vec::new();
        let result = CrossReferenceMatcher::reconcile(dependents, &index, &grants, |done, total| {
            ticks.push((done, total))
        });

        assert_eq!(result.grantable.len(), 1);
        assert_eq!(result.grantable[0].dependent.nis, "1");
        assert_eq!(result.found_only_by_name.len(), 1);
        assert_eq!(result.not_found.len(), 1);
        assert_eq!(result.ambiguous_count(), 0);
        assert_eq!(result.granted_another_parent.len(), 1);
        assert_eq!(result.granted_another_parent[0].1.family_code, "OUTRA");
        assert_eq!(
            result.school_without_parent.iter().map(|r| r.source_row).collect::<Vec<_>>(),
            vec![5]
        );
        assert_eq!(result.nursery_without_parent.len(), 1);
        assert_eq!(ticks.last(), Some(&(4, 4)));

        let kinds: Vec<ExclusionKind> = result.exclusions().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ExclusionKind::FoundOnlyByName,
                ExclusionKind::NotFound,
                ExclusionKind::GrantedAnotherParent,
                ExclusionKind::WithoutParent,
                ExclusionKind::WithoutParent,
            ]
        );
    }
}
