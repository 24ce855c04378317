// ==========================================
// Beneficiary reconciliation - importer error types
// ==========================================
// Stage-level (fatal) errors. Row-level problems are ExclusionEntry
// values, never errors.
// ==========================================

use crate::domain::types::{ImportStatus, SourceFile};
use crate::i18n::{t, t_with_args};
use crate::repository::error::RepositoryError;
use std::path::Path;
use thiserror::Error;

/// Importer error type
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== file errors =====
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("unsupported file format: {0} (only .csv/.xlsx/.xls)")]
    UnsupportedFormat(String),

    #[error("file read failed: {0}")]
    FileReadError(String),

    #[error("Excel parse failed: {0}")]
    ExcelParseError(String),

    #[error("CSV parse failed: {0}")]
    CsvParseError(String),

    // ===== schema errors =====
    #[error("{source_file}: required column missing: {column}")]
    MissingColumn {
        source_file: SourceFile,
        column: String,
    },

    // ===== run control =====
    #[error("invalid city id: {0:?} (letters, digits, '-' and '_' only)")]
    InvalidCityId(String),

    #[error("an import is already in progress for city {0}")]
    ImportInProgress(String),

    #[error("invalid status transition: from={from} to={to}")]
    InvalidStatusTransition {
        from: ImportStatus,
        to: ImportStatus,
    },

    #[error("background task failed: {0}")]
    TaskJoinError(String),

    // ===== storage =====
    #[error("storage unavailable: {0}")]
    Storage(#[from] RepositoryError),

    // ===== configuration =====
    #[error("config read failed (key: {key}): {message}")]
    ConfigReadError { key: String, message: String },

    #[error("config value invalid (key: {key}, value: {value}): {message}")]
    ConfigValueError {
        key: String,
        value: String,
        message: String,
    },

    // ===== report export =====
    #[error("exclusion report export failed: {0}")]
    ReportExportError(String),

    // ===== generic =====
    #[error("internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ImportError {
    fn from(err: tokio::task::JoinError) -> Self {
        ImportError::TaskJoinError(err.to_string())
    }
}

impl ImportError {
    /// Locale key of the sentence shown in the report `message`
    pub fn message_key(&self) -> &'static str {
        match self {
            ImportError::FileNotFound(_) => "import.file_not_found",
            ImportError::UnsupportedFormat(_) => "import.unsupported_format",
            ImportError::FileReadError(_)
            | ImportError::ExcelParseError(_)
            | ImportError::CsvParseError(_) => "import.unreadable_file",
            ImportError::MissingColumn { .. } => "import.missing_column",
            ImportError::InvalidCityId(_) => "import.invalid_city_id",
            ImportError::ImportInProgress(_) => "import.in_progress",
            ImportError::ConfigReadError { .. } | ImportError::ConfigValueError { .. } => {
                "import.config_invalid"
            }
            ImportError::ReportExportError(_) => "import.report_export_failed",
            ImportError::Storage(_) => "import.storage_unavailable",
            ImportError::InvalidStatusTransition { .. }
            | ImportError::TaskJoinError(_)
            | ImportError::InternalError(_)
            | ImportError::Other(_) => "import.internal",
        }
    }

    /// Localized failure sentence for the admin UI.
    /// Carries no raw error text and no server-side directory.
    pub fn user_message(&self) -> String {
        let key = self.message_key();
        let reason = match self {
            ImportError::FileNotFound(path) => {
                let file = Path::new(path)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                t_with_args(key, &[("file", file.as_str())])
            }
            ImportError::UnsupportedFormat(extension) => {
                t_with_args(key, &[("extension", extension.as_str())])
            }
            ImportError::MissingColumn {
                source_file,
                column,
            } => t_with_args(key, &[("roll", source_file.label()), ("column", column.as_str())]),
            ImportError::ConfigReadError { key: config_key, .. }
            | ImportError::ConfigValueError { key: config_key, .. } => {
                t_with_args(key, &[("key", config_key.as_str())])
            }
            _ => t(key),
        };
        t_with_args("import.failed", &[("reason", reason.as_str())])
    }
}

/// Result alias
pub type ImportResult<T> = Result<T, ImportError>;
