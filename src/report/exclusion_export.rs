// ==========================================
// Beneficiary reconciliation - exclusion CSV export
// ==========================================
// One row per excluded/rejected record:
// ARQUIVO;LINHA;NIS;NOME;TIPO;MOTIVO
// Path: <reports_dir>/<city_id>/exclusoes.csv
// ==========================================

use crate::domain::ExclusionEntry;
use crate::importer::error::{ImportError, ImportResult};
use csv::WriterBuilder;
use std::path::{Path, PathBuf};
use tracing::info;

pub const EXCLUSION_FILE_NAME: &str = "exclusoes.csv";

const HEADER: [&str; 6] = ["ARQUIVO", "LINHA", "NIS", "NOME", "TIPO", "MOTIVO"];

pub struct ExclusionReportWriter {
    root: PathBuf,
}

impl ExclusionReportWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// City ids are used verbatim as one path segment, so only
    /// `[A-Za-z0-9_-]` is accepted. Distinct ids never share a directory.
    pub fn check_city_id(city_id: &str) -> ImportResult<()> {
        let valid = !city_id.is_empty()
            && city_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(())
        } else {
            Err(ImportError::InvalidCityId(city_id.to_string()))
        }
    }

    pub fn path_for(&self, city_id: &str) -> ImportResult<PathBuf> {
        Self::check_city_id(city_id)?;
        Ok(self.root.join(city_id).join(EXCLUSION_FILE_NAME))
    }

    /// Write the report, replacing the previous run's file.
    pub fn write(&self, city_id: &str, entries: &[ExclusionEntry]) -> ImportResult<PathBuf> {
        let path = self.path_for(city_id)?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| ImportError::ReportExportError(format!("{}: {}", dir.display(), e)))?;
        }

        // write next to the target, then swap
        let tmp_path = path.with_extension("csv.tmp");
        Self::write_file(&tmp_path, entries)?;
        std::fs::rename(&tmp_path, &path)
            .map_err(|e| ImportError::ReportExportError(format!("{}: {}", path.display(), e)))?;

        info!(city_id = %city_id, rows = entries.len(), path = %path.display(), "exclusion report written");
        Ok(path)
    }

    fn write_file(path: &Path, entries: &[ExclusionEntry]) -> ImportResult<()> {
        let to_export_err = |e: csv::Error| ImportError::ReportExportError(e.to_string());

        let mut writer = WriterBuilder::new()
            .delimiter(b';')
            .from_path(path)
            .map_err(to_export_err)?;

        writer.write_record(HEADER).map_err(to_export_err)?;
        for entry in entries {
            let kind = serde_json::to_value(entry.kind)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            writer
                .write_record([
                    entry.source.label(),
                    &entry.row_number.to_string(),
                    entry.nis.as_deref().unwrap_or(""),
                    entry.name.as_deref().unwrap_or(""),
                    &kind,
                    &entry.reason,
                ])
                .map_err(to_export_err)?;
        }

        writer
            .flush()
            .map_err(|e| ImportError::ReportExportError(e.to_string()))?;
        Ok(())
    }
}
