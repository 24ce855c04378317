// ==========================================
// Beneficiary reconciliation - deduplicator
// ==========================================
// Cash-transfer roll only. First occurrence of a NIS (file order) wins;
// later rows with the same NIS are dropped whatever their role.
// ==========================================

use crate::domain::{BeneficiaryRecord, ExclusionEntry, ExclusionKind, Role, SourceFile};
use crate::i18n::t_with_args;
use crate::importer::importer_trait::Deduplicator as DeduplicatorTrait;
use std::collections::HashMap;

pub struct Deduplicator;

impl DeduplicatorTrait for Deduplicator {
    fn deduplicate(
        &self,
        records: Vec<BeneficiaryRecord>,
    ) -> (Vec<BeneficiaryRecord>, Vec<ExclusionEntry>) {
        let mut first_occurrence: HashMap<String, (usize, Role)> = HashMap::new();
        let mut kept = Vec::with_capacity(records.len());
        let mut dropped = Vec::new();

        for record in records {
            match first_occurrence.get(&record.nis) {
                Some(&(first_row, first_role)) => {
                    let first_row = first_row.to_string();
                    let (kind, reason) = if first_role == record.role {
                        (
                            ExclusionKind::Duplicated,
                            t_with_args(
                                "exclusion.duplicated",
                                &[("nis", record.nis.as_str()), ("first_row", first_row.as_str())],
                            ),
                        )
                    } else {
                        (
                            ExclusionKind::RoleConflict,
                            t_with_args(
                                "exclusion.role_conflict",
                                &[("nis", record.nis.as_str()), ("first_row", first_row.as_str())],
                            ),
                        )
                    };

                    dropped.push(ExclusionEntry {
                        source: SourceFile::CashTransfer,
                        row_number: record.source_row,
                        nis: Some(record.nis.clone()),
                        name: Some(record.name.clone()),
                        kind,
                        reason,
                    });
                }
                None => {
                    first_occurrence.insert(record.nis.clone(), (record.source_row, record.role));
                    kept.push(record);
                }
            }
        }

        (kept, dropped)
    }
}
