// ==========================================
// Beneficiary reconciliation - progress/report publisher
// ==========================================
// Single writer (the import job), many readers (polling).
// Readers take a read lock and clone; they never wait on a stage.
// ==========================================

use crate::domain::{ImportReport, ImportStatus};
use crate::importer::error::{ImportError, ImportResult};
use std::sync::RwLock;
use tracing::debug;

// ==========================================
// ReportPublisher Trait
// ==========================================
pub trait ReportPublisher: Send + Sync {
    /// Replace the snapshot.
    ///
    /// # Errors
    /// - InvalidStatusTransition: backward move or write after a terminal state
    fn publish(&self, snapshot: ImportReport) -> ImportResult<()>;

    /// Current snapshot (clone)
    fn read(&self) -> ImportReport;
}

// ==========================================
// InMemoryReportPublisher - RwLock-guarded snapshot
// ==========================================
#[derive(Debug)]
pub struct InMemoryReportPublisher {
    city_id: String,
    state: RwLock<ImportReport>,
}

impl InMemoryReportPublisher {
    pub fn new(city_id: impl Into<String>) -> Self {
        Self {
            city_id: city_id.into(),
            state: RwLock::new(ImportReport::default()),
        }
    }

    pub fn city_id(&self) -> &str {
        &self.city_id
    }

    /// Claim the publisher for a new run.
    ///
    /// # Errors
    /// - ImportInProgress: a run of this city has not reached a terminal state
    pub fn try_begin(&self) -> ImportResult<()> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.in_progress {
            return Err(ImportError::ImportInProgress(self.city_id.clone()));
        }
        *state = ImportReport {
            status: ImportStatus::Waiting,
            in_progress: true,
            ..Default::default()
        };
        debug!(city_id = %self.city_id, "import run claimed");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.state.read().map(|s| s.in_progress).unwrap_or_else(|e| e.into_inner().in_progress)
    }
}

impl ReportPublisher for InMemoryReportPublisher {
    fn publish(&self, mut snapshot: ImportReport) -> ImportResult<()> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

        if !state.status.can_transition_to(snapshot.status) {
            return Err(ImportError::InvalidStatusTransition {
                from: state.status,
                to: snapshot.status,
            });
        }

        // percentage never goes back within a run
        snapshot.percentage = snapshot.percentage.clamp(0.0, 100.0).max(state.percentage);
        snapshot.in_progress = !snapshot.status.is_terminal();

        *state = snapshot;
        Ok(())
    }

    fn read(&self) -> ImportReport {
        match self.state.read() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
