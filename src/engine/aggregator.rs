// ==========================================
// Beneficiary reconciliation - family/dependent aggregator
// ==========================================
// Groups NIS-matched dependents by guardian NIS and writes one family
// group per storage transaction. Groups never share a family, so no
// two writes target the same household.
// ==========================================

use crate::domain::{
    BeneficiaryRecord, ExclusionEntry, ExclusionKind, FamilyGroup, GroupOutcome, NewDependent,
    SourceFile,
};
use crate::engine::age_filter::AgeFilter;
use crate::engine::matcher::MatchResult;
use crate::i18n::t_with_args;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::FamilyRepository;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Display name stored when the roll carries no guardian name
pub const UNKNOWN_GUARDIAN_NAME: &str = "NÃO INFORMADO";

// ==========================================
// GroupWrite - result of persisting one group
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum GroupWrite {
    Committed(GroupOutcome),
    /// non-fatal storage rejection; nothing of the group was written
    RolledBack { reason: String },
}

// ==========================================
// AggregationTally - Salvando stage counters
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationTally {
    pub dependents_count: usize,
    pub granted_family_count: usize,
    pub wrong_family_count: usize,
    pub fourteen_or_less_granted_count: usize,
    /// detected at write time (grant landed between snapshot and write)
    pub granted_another_parent_count: usize,
    pub exclusions: Vec<ExclusionEntry>,
}

impl AggregationTally {
    /// Fold one group write into the counters
    pub fn record(&mut self, group: &FamilyGroup, write: GroupWrite, fourteen_or_less: &AgeFilter) {
        match write {
            GroupWrite::Committed(outcome) => {
                let linked: HashSet<&str> = outcome
                    .inserted
                    .iter()
                    .chain(outcome.already_present.iter())
                    .map(String::as_str)
                    .collect();

                self.dependents_count += linked.len();
                if !linked.is_empty() {
                    self.granted_family_count += 1;
                }

                self.fourteen_or_less_granted_count += group
                    .dependents
                    .iter()
                    .filter(|d| linked.contains(d.nis.as_str()))
                    .filter(|d| d.birth_date.map(|b| fourteen_or_less.is_within(b)).unwrap_or(false))
                    .count();

                for (nis, owner_code) in &outcome.granted_elsewhere {
                    self.granted_another_parent_count += 1;
                    if let Some(dependent) = group.dependents.iter().find(|d| &d.nis == nis) {
                        self.exclusions.push(group_exclusion(
                            dependent,
                            ExclusionKind::GrantedAnotherParent,
                            &[("family_code", owner_code.as_str())],
                        ));
                    }
                }
            }
            GroupWrite::RolledBack { reason } => {
                self.wrong_family_count += 1;
                for dependent in &group.dependents {
                    self.exclusions.push(group_exclusion(
                        dependent,
                        ExclusionKind::FamilyRollback,
                        &[("family_code", group.code.as_str()), ("error", reason.as_str())],
                    ));
                }
            }
        }
    }
}

fn group_exclusion(
    dependent: &NewDependent,
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
// FamilyAggregator
// ==========================================
pub struct FamilyAggregator;

impl FamilyAggregator {
    /// Group grantable matches by guardian NIS, in first-appearance order.
    ///
    /// `responsibles`: responsible rows of the roll keyed by NIS. When a
    /// guardian has none, the responsible is built from the dependents'
    /// guardian columns.
    pub fn build_groups(
        city_id: &str,
        grantable: &[MatchResult],
        responsibles: &HashMap<String, BeneficiaryRecord>,
    ) -> Vec<FamilyGroup> {
        let mut order: Vec<String> = Vec::new();
        let mut by_guardian: HashMap<String, Vec<&MatchResult>> = HashMap::new();

        for result in grantable.iter().filter(|r| r.is_grantable()) {
            let key = result.dependent.guardian_key().to_string();
            if !by_guardian.contains_key(&key) {
                order.push(key.clone());
            }
            by_guardian.entry(key).or_default().push(result);
        }

        let mut groups = Vec::with_capacity(order.len());
        for guardian_nis in order {
            let members = match by_guardian.remove(&guardian_nis) {
                Some(members) if !members.is_empty() => members,
                _ => continue,
            };
            let first = &members[0].dependent;

            let responsible = match responsibles.get(&guardian_nis) {
                Some(record) => NewDependent {
                    nis: record.nis.clone(),
                    name: record.name.clone(),
                    birth_date: Some(record.birth_date),
                    school_name: None,
                    enrollment_source: None,
                    source_row: record.source_row,
                },
                None => NewDependent {
                    nis: guardian_nis.clone(),
                    name: members
                        .iter()
                        .find_map(|m| m.dependent.guardian_name.clone())
                        .unwrap_or_else(|| UNKNOWN_GUARDIAN_NAME.to_string()),
                    birth_date: None,
                    school_name: None,
                    enrollment_source: None,
                    source_row: first.source_row,
                },
            };

            let dependents = members
                .iter()
                .map(|m| NewDependent {
                    nis: m.dependent.nis.clone(),
                    name: m.dependent.name.clone(),
                    birth_date: Some(m.dependent.birth_date),
                    school_name: m.target.as_ref().map(|t| t.school_name.clone()),
                    enrollment_source: m.target.as_ref().map(|t| t.source),
                    source_row: m.dependent.source_row,
                })
                .collect();

            groups.push(FamilyGroup {
                city_id: city_id.to_string(),
                code: first.family_code(),
                guardian_nis,
                responsible,
                dependents,
            });
        }

        groups
    }

    /// Write one group.
    ///
    /// # Returns
    /// - Ok(RolledBack): the group was rejected, the run goes on
    /// - Err(Storage): storage unusable, the run must abort
    pub async fn persist_group<R>(repo: &R, group: &FamilyGroup) -> ImportResult<GroupWrite>
    where
        R: FamilyRepository + ?Sized,
    {
        match repo.upsert_family_group(group).await {
            Ok(outcome) => Ok(GroupWrite::Committed(outcome)),
            Err(e) if e.is_fatal() => Err(ImportError::Storage(e)),
            Err(e) => {
                warn!(
                    family_code = %group.code,
                    guardian_nis = %group.guardian_nis,
                    error = %e,
                    "family group rolled back"
                );
                Ok(GroupWrite::RolledBack {
                    reason: e.to_string(),
                })
            }
        }
    }
}
