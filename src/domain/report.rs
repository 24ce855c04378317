// ==========================================
// Beneficiary reconciliation - import report
// ==========================================
// ImportReport: the counters snapshot polled by the admin UI.
// ExclusionEntry: one line of the downloadable exclusion CSV.
// ==========================================

use crate::domain::types::{ImportStatus, SourceFile};
use serde::{Deserialize, Serialize};

// ==========================================
// ImportReport
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    // ===== source sizes =====
    pub original_family_count: usize,
    pub original_sislame_count: usize,
    pub original_nursery_count: usize,
    pub wrong_row_count: usize,

    // ===== filtering =====
    pub duplicated_count: usize,
    pub above_age_family_count: usize,
    pub above_age_sislame_count: usize,
    pub above_age_nursery_count: usize,
    pub filtered_family_count: usize,
    pub fourteen_or_less_filtered_count: usize,

    // ===== cross reference =====
    pub not_found_family_count: usize,
    pub ambiguous_count: usize,
    pub found_only_name_family_count: usize,
    pub sislame_without_parent_count: usize,
    pub nursery_without_parent_count: usize,
    pub granted_another_parent_count: usize,

    // ===== saving =====
    pub dependents_count: usize,
    pub granted_family_count: usize,
    pub wrong_family_count: usize,
    pub fourteen_or_less_granted_count: usize,

    // ===== progress =====
    pub status: ImportStatus,
    pub percentage: f64,
    pub in_progress: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One step of the filtering funnel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelStep {
    pub label: &'static str,
    pub count: usize,
    /// Share of the immediate upstream step, 0..=100
    pub percentage: f64,
}

impl ImportReport {
    /// Cash-transfer funnel with percentages relative to the previous step.
    pub fn funnel(&self) -> Vec<FunnelStep> {
        let after_dedup = self
            .original_family_count
            .saturating_sub(self.duplicated_count);
        let after_age = after_dedup.saturating_sub(self.above_age_family_count);
        let matched_by_nis = self
            .filtered_family_count
            .saturating_sub(self.not_found_family_count)
            .saturating_sub(self.found_only_name_family_count);

        let steps = [
            ("Bolsa Família", self.original_family_count),
            ("Sem duplicados", after_dedup),
            ("Dentro da idade", after_age),
            ("Dependentes filtrados", self.filtered_family_count),
            ("Encontrados por NIS", matched_by_nis),
            ("Dependentes concedidos", self.dependents_count),
        ];

        let mut funnel = Vec::with_capacity(steps.len());
        let mut upstream = self.original_family_count;
        for (label, count) in steps {
            funnel.push(FunnelStep {
                label,
                count,
                percentage: ratio_percent(count, upstream),
            });
            upstream = count;
        }
        funnel
    }

    /// Each derived count must not exceed its upstream count.
    pub fn is_consistent(&self) -> bool {
        let after_dedup = match self.original_family_count.checked_sub(self.duplicated_count) {
            Some(v) => v,
            None => return false,
        };
        let after_age = match after_dedup.checked_sub(self.above_age_family_count) {
            Some(v) => v,
            None => return false,
        };
        let cross_referenced = self.not_found_family_count
            + self.found_only_name_family_count
            + self.granted_another_parent_count
            + self.dependents_count;

        self.filtered_family_count <= after_age
            && cross_referenced <= self.filtered_family_count
            && self.ambiguous_count <= self.not_found_family_count
            && self.above_age_sislame_count <= self.original_sislame_count
            && self.above_age_nursery_count <= self.original_nursery_count
            && self.sislame_without_parent_count
                <= self.original_sislame_count - self.above_age_sislame_count
            && self.nursery_without_parent_count
                <= self.original_nursery_count - self.above_age_nursery_count
            && self.fourteen_or_less_filtered_count <= self.filtered_family_count
            && self.fourteen_or_less_granted_count <= self.dependents_count
            && self.fourteen_or_less_granted_count <= self.fourteen_or_less_filtered_count
            && self.granted_family_count <= self.dependents_count
    }
}

/// `count / total` as a percentage rounded to two decimals; 0 when total is 0.
pub fn ratio_percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = count as f64 * 100.0 / total as f64;
    (raw * 100.0).round() / 100.0
}

// ==========================================
// Exclusions
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExclusionKind {
    WrongRow,             // malformed row
    Duplicated,           // same (NIS, role) seen earlier
    RoleConflict,         // NIS seen earlier under the other role
    AboveAge,             // older than the ceiling
    NotFound,             // no school/nursery match
    Ambiguous,            // name+birthdate matched several enrollments
    FoundOnlyByName,      // needs manual confirmation
    GrantedAnotherParent, // NIS owned by another family
    WithoutParent,        // enrollment with no cash-transfer dependent
    FamilyRollback,       // family group write rolled back
}

impl ExclusionKind {
    /// i18n key of the reason template
    pub fn message_key(&self) -> &'static str {
        match self {
            ExclusionKind::WrongRow => "exclusion.wrong_row",
            ExclusionKind::Duplicated => "exclusion.duplicated",
            ExclusionKind::RoleConflict => "exclusion.role_conflict",
            ExclusionKind::AboveAge => "exclusion.above_age",
            ExclusionKind::NotFound => "exclusion.not_found",
            ExclusionKind::Ambiguous => "exclusion.ambiguous",
            ExclusionKind::FoundOnlyByName => "exclusion.found_only_name",
            ExclusionKind::GrantedAnotherParent => "exclusion.granted_another_parent",
            ExclusionKind::WithoutParent => "exclusion.without_parent",
            ExclusionKind::FamilyRollback => "exclusion.family_rollback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionEntry {
    pub source: SourceFile,
    pub row_number: usize,
    pub nis: Option<String>,
    pub name: Option<String>,
    pub kind: ExclusionKind,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ImportReport {
        ImportReport {
            original_family_count: 100,
            original_sislame_count: 80,
            duplicated_count: 10,
            above_age_family_count: 5,
            filtered_family_count: 85,
            not_found_family_count: 10,
            found_only_name_family_count: 5,
            dependents_count: 70,
            granted_family_count: 40,
            sislame_without_parent_count: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_ratio_percent() {
        assert_eq!(ratio_percent(1, 3), 33.33);
        assert_eq!(ratio_percent(5, 0), 0.0);
        assert_eq!(ratio_percent(85, 85), 100.0);
    }

    #[test]
    fn test_funnel_counts_and_percentages() {
        let funnel = sample().funnel();
        let counts: Vec<usize> = funnel.iter().map(|s| s.count).collect();
        assert_eq!(counts, vec![100, 90, 85, 85, 70, 70]);
        assert_eq!(funnel[0].percentage, 100.0);
        assert_eq!(funnel[1].percentage, 90.0);
        assert_eq!(funnel[4].percentage, 82.35);
    }

    #[test]
    fn test_consistency_detects_growth() {
        let report = sample();
        assert!(report.is_consistent());

        let mut grown = report.clone();
        grown.filtered_family_count = 86;
        assert!(!grown.is_consistent());

        let mut overflow = report;
        overflow.duplicated_count = 101;
        assert!(!overflow.is_consistent());
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["originalFamilyCount"], 100);
        assert_eq!(json["foundOnlyNameFamilyCount"], 5);
        assert_eq!(json["status"], "Em espera");
        assert_eq!(json["inProgress"], false);
        assert!(json.get("message").is_none());
    }
}
