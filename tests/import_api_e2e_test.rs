// ==========================================
// ImportApi end-to-end tests
// ==========================================
// Background run, polling, exclusion download, family maintenance
// ==========================================

mod test_helpers;

use beneficiary_reconciliation::api::{ApiError, ImportApi};
use beneficiary_reconciliation::config::config_keys;
use beneficiary_reconciliation::domain::ImportStatus;
use beneficiary_reconciliation::logging;
use tempfile::TempDir;
use test_helpers::{born_years_ago, CashRow, EnrollmentFixture, RollFiles};

fn small_rolls() -> RollFiles {
    let birth = born_years_ago(8, 0);
    RollFiles::write(
        &[
            CashRow::dependent("10000000001", "Ana Lima", birth, "90000000001"),
            CashRow::dependent("10000000002", "Bia Lima", birth, "90000000001"),
            CashRow::dependent("10000000003", "Caio Reis", birth, "90000000002"),
        ],
        &[
            EnrollmentFixture::new("Ana Lima", birth, "EMEF Centro", "10000000001"),
            EnrollmentFixture::new("Bia Lima", birth, "EMEF Centro", "10000000002"),
        ],
        &[EnrollmentFixture::new("Davi Reis", born_years_ago(2, 0), "Creche Sol", "")],
    )
}

fn setup() -> (tempfile::NamedTempFile, String, TempDir) {
    logging::init_test();
    let (db_file, db_path) = test_helpers::create_test_db().expect("test db");
    let reports = TempDir::new().unwrap();
    test_helpers::set_config(
        &db_path,
        config_keys::EXCLUSION_REPORT_DIR,
        reports.path().to_str().unwrap(),
    );
    (db_file, db_path, reports)
}

#[tokio::test]
async fn test_background_import_and_polling() {
    let (_db, db_path, reports) = setup();
    let api = ImportApi::new(&db_path).unwrap();
    let rolls = small_rolls();

    assert_eq!(api.exclusion_report_path("c1").await.unwrap(), None);

    let handle = api.start_import(rolls.request("c1")).unwrap();
    handle.await.unwrap();

    let report = api.get_import_report("c1").unwrap();
    assert_eq!(report.status, ImportStatus::Finished);
    assert_eq!(report.percentage, 100.0);
    assert!(!report.in_progress);
    assert_eq!(report.dependents_count, 2);
    assert_eq!(report.granted_family_count, 1);
    assert_eq!(report.not_found_family_count, 1);
    assert_eq!(report.nursery_without_parent_count, 1);

    let funnel = api.get_import_funnel("c1").unwrap();
    assert_eq!(funnel.first().map(|s| s.count), Some(3));
    assert_eq!(funnel.last().map(|s| s.count), Some(2));

    let path = api.exclusion_report_path("c1").await.unwrap().unwrap();
    assert!(path.starts_with(reports.path()));
    let content = std::fs::read_to_string(path).unwrap();
    // header + not found + nursery without parent
    assert_eq!(content.lines().count(), 3);
}

#[tokio::test]
async fn test_run_import_then_list_and_deactivate() {
    let (_db, db_path, _reports) = setup();
    let api = ImportApi::new(&db_path).unwrap();
    let rolls = small_rolls();

    let outcome = api.run_import(rolls.request("c1")).await.unwrap();
    assert_eq!(outcome.report.dependents_count, 2);

    let families = api.list_families("c1").await.unwrap();
    assert_eq!(families.len(), 1);
    let family = &families[0];
    assert_eq!(family.family.code, "90000000001");
    assert_eq!(family.dependents.len(), 3);

    let responsible = family.responsible().unwrap();
    assert_eq!(responsible.nis, "90000000001");

    let ana = family
        .dependents
        .iter()
        .find(|d| d.nis == "10000000001")
        .unwrap();
    assert_eq!(ana.school_name.as_deref(), Some("EMEF Centro"));

    api.deactivate_dependent(&ana.dependent_id).await.unwrap();
    assert!(matches!(
        api.deactivate_dependent(&ana.dependent_id).await,
        Err(ApiError::NotFound(_))
    ));

    // cities are isolated
    assert_eq!(api.count_families("c2").await.unwrap(), 0);
}

#[tokio::test]
async fn test_rerun_after_failure_is_allowed() {
    let (_db, db_path, _reports) = setup();
    let api = ImportApi::new(&db_path).unwrap();
    let rolls = small_rolls();

    let mut broken = rolls.request("c1");
    broken.cash_transfer_path = rolls.dir.path().join("faltando.csv");
    assert!(matches!(
        api.run_import(broken).await,
        Err(ApiError::ImportFailed(_))
    ));

    let failed = api.get_import_report("c1").unwrap();
    assert_eq!(failed.status, ImportStatus::Failed);
    assert!(failed.message.is_some());

    let outcome = api.run_import(rolls.request("c1")).await.unwrap();
    assert_eq!(outcome.report.status, ImportStatus::Finished);
    assert_eq!(api.get_import_report("c1").unwrap().message, None);
}
