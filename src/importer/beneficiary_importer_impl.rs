// ==========================================
// Beneficiary reconciliation - import pipeline
// ==========================================
// Flow: parse → map → normalize → dedup → age filter → cross reference
//       → aggregate → persist → exclusion report
// Every stage boundary publishes a snapshot; a stage error publishes
// `Falhou` and aborts the run. Committed family groups stay committed.
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::{
    BeneficiaryRecord, EnrollmentRecord, ExclusionEntry, ImportReport, ImportStatus,
    NormalizedRecord, Role, SourceFile,
};
use crate::engine::aggregator::{AggregationTally, FamilyAggregator};
use crate::engine::age_filter::AgeFilter;
use crate::engine::matcher::{CrossReferenceMatcher, EnrollmentIndex};
use crate::importer::data_cleaner::DataCleaner as DataCleanerImpl;
use crate::importer::deduplicator::Deduplicator as DeduplicatorImpl;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::FieldMapper as FieldMapperImpl;
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::importer_trait::{
    BeneficiaryImporter, DataCleaner, Deduplicator, FieldMapper, FileParser, ImportOutcome,
    ImportRequest, ParsedSheet,
};
use crate::importer::record_normalizer::RecordNormalizer;
use crate::report::{ExclusionReportWriter, ReportPublisher};
use crate::repository::FamilyRepository;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Percentage inside a stage band: `start + done/total × width`
pub fn stage_percentage(status: ImportStatus, done: usize, total: usize) -> f64 {
    let (start, end) = status.percentage_band();
    if total == 0 {
        return end;
    }
    let raw = start + (done.min(total) as f64 / total as f64) * (end - start);
    (raw * 100.0).round() / 100.0
}

/// Normalized contents of the three rolls
#[derive(Debug, Default)]
struct NormalizedRolls {
    beneficiaries: Vec<BeneficiaryRecord>,
    school: Vec<EnrollmentRecord>,
    nursery: Vec<EnrollmentRecord>,
    rejected: Vec<ExclusionEntry>,
}

/// Run settings read once per import
#[derive(Debug, Clone)]
struct RunSettings {
    age_filter: AgeFilter,
    fourteen_or_less: AgeFilter,
    publish_every_rows: usize,
    report_dir: PathBuf,
}

// ==========================================
// BeneficiaryImporterImpl
// ==========================================
pub struct BeneficiaryImporterImpl<R, C>
where
    R: FamilyRepository,
    C: ImportConfigReader,
{
    family_repo: R,
    config: C,

    // stage components
    file_parser: Arc<dyn FileParser>,
    field_mapper: Box<dyn FieldMapper>,
    normalizer: RecordNormalizer,
    deduplicator: Box<dyn Deduplicator>,
}

impl<R, C> BeneficiaryImporterImpl<R, C>
where
    R: FamilyRepository,
    C: ImportConfigReader,
{
    pub fn new(
        family_repo: R,
        config: C,
        file_parser: Box<dyn FileParser>,
        field_mapper: Box<dyn FieldMapper>,
        data_cleaner: Box<dyn DataCleaner>,
        deduplicator: Box<dyn Deduplicator>,
    ) -> Self {
        Self {
            family_repo,
            config,
            file_parser: Arc::from(file_parser),
            field_mapper,
            normalizer: RecordNormalizer::new(data_cleaner),
            deduplicator,
        }
    }

    /// Importer wired with the stock CSV/XLSX components
    pub fn with_default_components(family_repo: R, config: C) -> Self {
        Self::new(
            family_repo,
            config,
            Box::new(UniversalFileParser),
            Box::new(FieldMapperImpl),
            Box::new(DataCleanerImpl),
            Box::new(DeduplicatorImpl),
        )
    }

    pub fn family_repo(&self) -> &R {
        &self.family_repo
    }

    async fn load_settings(&self, request: &ImportRequest) -> ImportResult<RunSettings> {
        let ceiling = self.config.get_age_ceiling_years().await?;
        let fourteen = self.config.get_fourteen_or_less_years().await?;
        Ok(RunSettings {
            age_filter: AgeFilter::new(ceiling, request.reference_date),
            fourteen_or_less: AgeFilter::new(fourteen, request.reference_date),
            publish_every_rows: self.config.get_progress_publish_every_rows().await?.max(1),
            report_dir: self.config.get_exclusion_report_dir().await?,
        })
    }

    fn publish_stage(
        &self,
        publisher: &dyn ReportPublisher,
        report: &mut ImportReport,
        status: ImportStatus,
        done: usize,
        total: usize,
    ) -> ImportResult<()> {
        report.status = status;
        report.percentage = stage_percentage(status, done, total);
        publisher.publish(report.clone())
    }

    // ===== Lendo arquivos =====

    /// Parse the three files concurrently on blocking threads
    async fn parse_files(&self, request: &ImportRequest) -> ImportResult<Vec<(SourceFile, ParsedSheet)>> {
        let jobs = [
            (SourceFile::CashTransfer, request.cash_transfer_path.clone()),
            (SourceFile::School, request.school_path.clone()),
            (SourceFile::Nursery, request.nursery_path.clone()),
        ]
        .into_iter()
        .map(|(source, path)| {
            let parser = Arc::clone(&self.file_parser);
            async move {
                let sheet = tokio::task::spawn_blocking(move || parser.parse_to_raw_records(&path))
                    .await??;
                Ok::<_, ImportError>((source, sheet))
            }
        });

        futures::future::try_join_all(jobs).await
    }

    async fn read_rolls(
        &self,
        request: &ImportRequest,
        settings: &RunSettings,
        publisher: &dyn ReportPublisher,
        report: &mut ImportReport,
    ) -> ImportResult<NormalizedRolls> {
        self.publish_stage(publisher, report, ImportStatus::ReadingFiles, 0, 1)?;

        let sheets = self.parse_files(request).await?;
        for (source, sheet) in &sheets {
            self.field_mapper.validate_headers(*source, &sheet.headers)?;
            info!(source = %source, rows = sheet.rows.len(), "file parsed");
        }

        let total: usize = sheets.iter().map(|(_, s)| s.rows.len()).sum();
        let mut done = 0usize;
        let mut rolls = NormalizedRolls::default();

        for (source, sheet) in sheets {
            for (row_number, row) in &sheet.rows {
                let raw = self.field_mapper.map_row(source, *row_number, row);
                match self.normalizer.normalize(raw, request.reference_date) {
                    Ok(NormalizedRecord::Beneficiary(record)) => rolls.beneficiaries.push(record),
                    Ok(NormalizedRecord::Enrollment(record)) => match source {
                        SourceFile::Nursery => rolls.nursery.push(record),
                        _ => rolls.school.push(record),
                    },
                    Err(rejection) => {
                        debug!(
                            source = %source,
                            row = rejection.row_number,
                            reason = %rejection.reason,
                            "row rejected"
                        );
                        rolls.rejected.push(rejection);
                    }
                }

                done += 1;
                if done % settings.publish_every_rows == 0 {
                    self.publish_stage(publisher, report, ImportStatus::ReadingFiles, done, total)?;
                }
            }
        }

        report.original_family_count = rolls.beneficiaries.len();
        report.original_sislame_count = rolls.school.len();
        report.original_nursery_count = rolls.nursery.len();
        report.wrong_row_count = rolls.rejected.len();
        self.publish_stage(publisher, report, ImportStatus::ReadingFiles, total, total)?;

        info!(
            cash_transfer = report.original_family_count,
            school = report.original_sislame_count,
            nursery = report.original_nursery_count,
            wrong_rows = report.wrong_row_count,
            "rolls normalized"
        );
        Ok(rolls)
    }

    // ===== full run =====

    async fn execute(
        &self,
        request: &ImportRequest,
        publisher: &dyn ReportPublisher,
        report: &mut ImportReport,
    ) -> ImportResult<(Vec<ExclusionEntry>, PathBuf)> {
        ExclusionReportWriter::check_city_id(&request.city_id)?;
        let settings = self.load_settings(request).await?;
        debug!(
            ceiling = settings.age_filter.ceiling_years(),
            cutoff = %settings.age_filter.cutoff(),
            publish_every_rows = settings.publish_every_rows,
            "run settings loaded"
        );

        // ----- Lendo arquivos -----
        let rolls = self.read_rolls(request, &settings, publisher, report).await?;
        let mut exclusions = rolls.rejected;

        // ----- Filtrando dados -----
        self.publish_stage(publisher, report, ImportStatus::Filtering, 0, 4)?;

        let (unique, duplicated) = self.deduplicator.deduplicate(rolls.beneficiaries);
        report.duplicated_count = duplicated.len();
        exclusions.extend(duplicated);
        self.publish_stage(publisher, report, ImportStatus::Filtering, 1, 4)?;

        let (beneficiaries, above_age) = settings.age_filter.filter_beneficiaries(unique);
        report.above_age_family_count = above_age.len();
        exclusions.extend(above_age);

        let (school, above_age_school) = settings.age_filter.filter_enrollments(rolls.school);
        report.above_age_sislame_count = above_age_school.len();
        exclusions.extend(above_age_school);
        self.publish_stage(publisher, report, ImportStatus::Filtering, 2, 4)?;

        let (nursery, above_age_nursery) = settings.age_filter.filter_enrollments(rolls.nursery);
        report.above_age_nursery_count = above_age_nursery.len();
        exclusions.extend(above_age_nursery);

        let (responsible_rows, dependents): (Vec<_>, Vec<_>) = beneficiaries
            .into_iter()
            .partition(|r| r.role == Role::Responsible);
        let responsibles: HashMap<String, BeneficiaryRecord> = responsible_rows
            .into_iter()
            .map(|r| (r.nis.clone(), r))
            .collect();

        report.filtered_family_count = dependents.len();
        report.fourteen_or_less_filtered_count = dependents
            .iter()
            .filter(|d| settings.fourteen_or_less.is_within(d.birth_date))
            .count();
        self.publish_stage(publisher, report, ImportStatus::Filtering, 4, 4)?;

        info!(
            duplicated = report.duplicated_count,
            above_age = report.above_age_family_count,
            above_age_school = report.above_age_sislame_count,
            above_age_nursery = report.above_age_nursery_count,
            filtered = report.filtered_family_count,
            "filtering finished"
        );

        // ----- Cruzando dados -----
        self.publish_stage(publisher, report, ImportStatus::CrossReferencing, 0, 1)?;

        let grants = self.family_repo.list_active_grants(&request.city_id).await?;
        let index = EnrollmentIndex::build(school, nursery);

        let every = settings.publish_every_rows;
        let mut progress_error: Option<ImportError> = None;
        let cross = {
            let snapshot_base = report.clone();
            CrossReferenceMatcher::reconcile(dependents, &index, &grants, |done, total| {
                if progress_error.is_some() || done % every != 0 {
                    return;
                }
                let mut snapshot = snapshot_base.clone();
                snapshot.status = ImportStatus::CrossReferencing;
                snapshot.percentage = stage_percentage(ImportStatus::CrossReferencing, done, total);
                if let Err(e) = publisher.publish(snapshot) {
                    progress_error = Some(e);
                }
            })
        };
        if let Some(e) = progress_error {
            return Err(e);
        }

        report.not_found_family_count = cross.not_found.len();
        report.ambiguous_count = cross.ambiguous_count();
        report.found_only_name_family_count = cross.found_only_by_name.len();
        report.granted_another_parent_count = cross.granted_another_parent.len();
        report.sislame_without_parent_count = cross.school_without_parent.len();
        report.nursery_without_parent_count = cross.nursery_without_parent.len();
        exclusions.extend(cross.exclusions());
        self.publish_stage(publisher, report, ImportStatus::CrossReferencing, 1, 1)?;

        info!(
            matched_by_nis = cross.grantable.len(),
            not_found = report.not_found_family_count,
            ambiguous = report.ambiguous_count,
            found_only_name = report.found_only_name_family_count,
            granted_another_parent = report.granted_another_parent_count,
            school_without_parent = report.sislame_without_parent_count,
            nursery_without_parent = report.nursery_without_parent_count,
            "cross reference finished"
        );

        // ----- Salvando -----
        let groups = FamilyAggregator::build_groups(&request.city_id, &cross.grantable, &responsibles);
        self.publish_stage(publisher, report, ImportStatus::Saving, 0, groups.len())?;

        let mut tally = AggregationTally::default();
        for (done, group) in groups.iter().enumerate() {
            let write = FamilyAggregator::persist_group(&self.family_repo, group).await?;
            tally.record(group, write, &settings.fourteen_or_less);

            if (done + 1) % every == 0 {
                report.dependents_count = tally.dependents_count;
                report.granted_family_count = tally.granted_family_count;
                self.publish_stage(publisher, report, ImportStatus::Saving, done + 1, groups.len())?;
            }
        }

        report.dependents_count = tally.dependents_count;
        report.granted_family_count = tally.granted_family_count;
        report.wrong_family_count = tally.wrong_family_count;
        report.fourteen_or_less_granted_count = tally.fourteen_or_less_granted_count;
        report.granted_another_parent_count += tally.granted_another_parent_count;
        exclusions.extend(tally.exclusions);

        info!(
            families = groups.len(),
            dependents = report.dependents_count,
            granted_families = report.granted_family_count,
            rolled_back = report.wrong_family_count,
            "family groups saved"
        );

        let writer = ExclusionReportWriter::new(settings.report_dir);
        let report_path = writer.write(&request.city_id, &exclusions)?;

        if !report.is_consistent() {
            warn!(report = ?report, "report counters out of funnel order");
        }

        Ok((exclusions, report_path))
    }
}

#[async_trait]
impl<R, C> BeneficiaryImporter for BeneficiaryImporterImpl<R, C>
where
    R: FamilyRepository,
    C: ImportConfigReader,
{
    #[instrument(skip(self, request, publisher), fields(city_id = %request.city_id))]
    async fn run_import(
        &self,
        request: ImportRequest,
        publisher: &dyn ReportPublisher,
    ) -> ImportResult<ImportOutcome> {
        info!(
            cash_transfer = %request.cash_transfer_path.display(),
            school = %request.school_path.display(),
            nursery = %request.nursery_path.display(),
            reference_date = %request.reference_date,
            "import started"
        );

        let mut report = ImportReport {
            in_progress: true,
            ..Default::default()
        };

        match self.execute(&request, publisher, &mut report).await {
            Ok((exclusions, exclusion_report_path)) => {
                report.status = ImportStatus::Finished;
                report.percentage = 100.0;
                publisher.publish(report.clone())?;
                report.in_progress = false;

                info!(
                    dependents = report.dependents_count,
                    exclusions = exclusions.len(),
                    "import finished"
                );
                Ok(ImportOutcome {
                    report,
                    exclusions,
                    exclusion_report_path,
                })
            }
            Err(e) => {
                error!(error = %e, status = %report.status, "import failed");
                report.status = ImportStatus::Failed;
                report.message = Some(e.user_message());
                if let Err(publish_err) = publisher.publish(report) {
                    warn!(error = %publish_err, "failure snapshot not published");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_percentage_inside_band() {
        assert_eq!(stage_percentage(ImportStatus::ReadingFiles, 0, 10), 0.0);
        assert_eq!(stage_percentage(ImportStatus::ReadingFiles, 5, 10), 10.0);
        assert_eq!(stage_percentage(ImportStatus::CrossReferencing, 1, 3), 50.0);
        assert_eq!(stage_percentage(ImportStatus::Saving, 10, 10), 100.0);
    }

    #[test]
    fn test_stage_percentage_empty_stage_is_complete() {
        assert_eq!(stage_percentage(ImportStatus::Filtering, 0, 0), 40.0);
        assert_eq!(stage_percentage(ImportStatus::Saving, 3, 2), 100.0);
    }
}
