// ==========================================
// Beneficiary reconciliation - import API
// ==========================================
// Service facade for the admin UI:
// - start/run an import (one in flight per city)
// - poll the progress snapshot
// - locate the exclusion CSV
// - browse and maintain granted families
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportConfigReader};
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::domain::{FamilyWithDependents, FunnelStep, ImportReport, ImportStatus};
use crate::importer::{
    BeneficiaryImporter, BeneficiaryImporterImpl, ImportError, ImportOutcome, ImportRequest,
};
use crate::report::{ExclusionReportWriter, InMemoryReportPublisher, ReportPublisher};
use crate::repository::{FamilyRepository, FamilyRepositoryImpl};
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Import API
pub struct ImportApi {
    family_repo: FamilyRepositoryImpl,
    config: ConfigManager,
    importer: Arc<dyn BeneficiaryImporter>,
    publishers: Mutex<HashMap<String, Arc<InMemoryReportPublisher>>>,
}

impl ImportApi {
    /// Open (and migrate) the database at `db_path`.
    /// Also switches messages to the default locale.
    pub fn new(db_path: &str) -> ApiResult<Self> {
        crate::i18n::init_default_locale();
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// Build the API and the stock importer over a shared connection
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ApiResult<Self> {
        let importer = BeneficiaryImporterImpl::with_default_components(
            FamilyRepositoryImpl::from_connection(Arc::clone(&conn))?,
            ConfigManager::from_connection(Arc::clone(&conn))?,
        );
        Self::with_importer(conn, Arc::new(importer))
    }

    /// Build the API around a caller-supplied importer
    pub fn with_importer(
        conn: Arc<Mutex<Connection>>,
        importer: Arc<dyn BeneficiaryImporter>,
    ) -> ApiResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| ApiError::DatabaseConnectionError(format!("lock poisoned: {}", e)))?;
            ensure_schema(&guard).map_err(|e| ApiError::DatabaseError(e.to_string()))?;
        }

        Ok(Self {
            family_repo: FamilyRepositoryImpl::from_connection(Arc::clone(&conn))?,
            config: ConfigManager::from_connection(conn)?,
            importer,
            publishers: Mutex::new(HashMap::new()),
        })
    }

    fn validate_request(request: &ImportRequest) -> ApiResult<()> {
        ExclusionReportWriter::check_city_id(&request.city_id)?;
        Ok(())
    }

    fn publisher_for(&self, city_id: &str) -> ApiResult<Arc<InMemoryReportPublisher>> {
        let mut publishers = self
            .publishers
            .lock()
            .map_err(|e| ApiError::InternalError(format!("publisher map poisoned: {}", e)))?;
        let publisher = publishers
            .entry(city_id.to_string())
            .or_insert_with(|| Arc::new(InMemoryReportPublisher::new(city_id)));
        Ok(Arc::clone(publisher))
    }

    /// Close a run that ended without a terminal snapshot
    fn fail_if_running(publisher: &InMemoryReportPublisher, cause: &ImportError) {
        if !publisher.is_running() {
            return;
        }
        let mut snapshot = publisher.read();
        snapshot.status = ImportStatus::Failed;
        snapshot.message = Some(cause.user_message());
        if let Err(e) = publisher.publish(snapshot) {
            warn!(city_id = %publisher.city_id(), error = %e, "failure snapshot not published");
        }
    }

    /// Start an import in the background.
    ///
    /// # Errors
    /// - ImportInProgress: the city already has a run in flight
    ///
    /// The returned handle resolves when the run reaches a terminal state.
    pub fn start_import(&self, request: ImportRequest) -> ApiResult<JoinHandle<()>> {
        Self::validate_request(&request)?;
        let publisher = self.publisher_for(&request.city_id)?;
        publisher.try_begin()?;

        let city_id = request.city_id.clone();
        let importer = Arc::clone(&self.importer);
        let job_publisher = Arc::clone(&publisher);
        let job = tokio::spawn(async move {
            importer.run_import(request, job_publisher.as_ref()).await
        });

        info!(city_id = %city_id, "background import scheduled");

        Ok(tokio::spawn(async move {
            match job.await {
                Ok(Ok(outcome)) => {
                    info!(
                        city_id = %city_id,
                        dependents = outcome.report.dependents_count,
                        "background import finished"
                    );
                }
                Ok(Err(e)) => {
                    warn!(city_id = %city_id, error = %e, "background import failed");
                    Self::fail_if_running(&publisher, &e);
                }
                Err(join_err) => {
                    error!(city_id = %city_id, error = %join_err, "background import aborted");
                    Self::fail_if_running(&publisher, &ImportError::from(join_err));
                }
            }
        }))
    }

    /// Run an import and wait for it
    pub async fn run_import(&self, request: ImportRequest) -> ApiResult<ImportOutcome> {
        Self::validate_request(&request)?;
        let publisher = self.publisher_for(&request.city_id)?;
        publisher.try_begin()?;

        match self.importer.run_import(request, publisher.as_ref()).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                Self::fail_if_running(&publisher, &e);
                Err(ApiError::from(e))
            }
        }
    }

    /// Latest snapshot of a city (`Em espera` when none ran yet)
    pub fn get_import_report(&self, city_id: &str) -> ApiResult<ImportReport> {
        let publishers = self
            .publishers
            .lock()
            .map_err(|e| ApiError::InternalError(format!("publisher map poisoned: {}", e)))?;
        Ok(publishers
            .get(city_id)
            .map(|p| p.read())
            .unwrap_or_default())
    }

    /// Funnel view of the latest snapshot
    pub fn get_import_funnel(&self, city_id: &str) -> ApiResult<Vec<FunnelStep>> {
        Ok(self.get_import_report(city_id)?.funnel())
    }

    /// Exclusion CSV of the city's last finished run, if any
    pub async fn exclusion_report_path(&self, city_id: &str) -> ApiResult<Option<PathBuf>> {
        let dir = self.config.get_exclusion_report_dir().await?;
        let path = ExclusionReportWriter::new(dir).path_for(city_id)?;
        Ok(path.exists().then_some(path))
    }

    pub async fn list_families(&self, city_id: &str) -> ApiResult<Vec<FamilyWithDependents>> {
        Ok(self.family_repo.list_families(city_id).await?)
    }

    pub async fn count_families(&self, city_id: &str) -> ApiResult<usize> {
        Ok(self.family_repo.count_families(city_id).await?)
    }

    /// Soft-delete a dependent; its NIS becomes grantable again
    pub async fn deactivate_dependent(&self, dependent_id: &str) -> ApiResult<()> {
        if dependent_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("dependent_id must not be blank".to_string()));
        }
        self.family_repo.deactivate_dependent(dependent_id).await?;
        info!(dependent_id = %dependent_id, "dependent deactivated");
        Ok(())
    }
}
