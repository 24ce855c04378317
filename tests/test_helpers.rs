// ==========================================
// Test helpers
// ==========================================
// Temporary database, config seeding and roll fixture writers
// ==========================================

#![allow(dead_code)]

use beneficiary_reconciliation::config::ConfigManager;
use beneficiary_reconciliation::db::{ensure_schema, open_sqlite_connection};
use beneficiary_reconciliation::importer::ImportRequest;
use chrono::{Duration, Months, NaiveDate};
use std::error::Error;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};

/// Reference date every fixture age is computed against
pub fn reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

/// Birth date `years` before the reference date, minus `extra_days`
pub fn born_years_ago(years: u32, extra_days: i64) -> NaiveDate {
    reference_date()
        .checked_sub_months(Months::new(years * 12))
        .unwrap()
        - Duration::days(extra_days)
}

/// Create a temporary database with the schema applied
///
/// # Returns
/// - NamedTempFile: keep alive for the duration of the test
/// - String: database path
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    ensure_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// Write a global config value
pub fn set_config(db_path: &str, key: &str, value: &str) {
    let config = ConfigManager::new(db_path).expect("config manager");
    config
        .set_global_config_value(key, value)
        .expect("config write");
}

// ==========================================
// Roll fixtures
// ==========================================

#[derive(Debug, Clone)]
pub struct CashRow {
    pub nis: String,
    pub name: String,
    pub birth_date: NaiveDate,
    pub kinship: String,
    pub guardian_nis: String,
    pub guardian_name: String,
    pub family_code: String,
}

impl CashRow {
    pub fn dependent(nis: &str, name: &str, birth_date: NaiveDate, guardian_nis: &str) -> Self {
        Self {
            nis: nis.to_string(),
            name: name.to_string(),
            birth_date,
            kinship: "FILHO(A)".to_string(),
            guardian_nis: guardian_nis.to_string(),
            guardian_name: format!("Responsável {}", guardian_nis),
            family_code: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnrollmentFixture {
    pub name: String,
    pub birth_date: NaiveDate,
    pub school: String,
    pub nis: String,
}

impl EnrollmentFixture {
    pub fn new(name: &str, birth_date: NaiveDate, school: &str, nis: &str) -> Self {
        Self {
            name: name.to_string(),
            birth_date,
            school: school.to_string(),
            nis: nis.to_string(),
        }
    }
}

fn br_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Bolsa Família roll, semicolon separated
pub fn write_cash_transfer_csv(dir: &Path, rows: &[CashRow]) -> PathBuf {
    let path = dir.join("bolsa_familia.csv");
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_path(&path)
        .unwrap();
    writer
        .write_record([
            "NIS",
            "Nome",
            "Data de Nascimento",
            "Parentesco",
            "NIS Responsável",
            "Nome Responsável",
            "Código Familiar",
        ])
        .unwrap();
    for row in rows {
        writer
            .write_record([
                row.nis.as_str(),
                row.name.as_str(),
                &br_date(row.birth_date),
                row.kinship.as_str(),
                row.guardian_nis.as_str(),
                row.guardian_name.as_str(),
                row.family_code.as_str(),
            ])
            .unwrap();
    }
    writer.flush().unwrap();
    path
}

/// Sislame roll, comma separated
pub fn write_school_csv(dir: &Path, rows: &[EnrollmentFixture]) -> PathBuf {
    write_enrollment_csv(
        &dir.join("sislame.csv"),
        ["NOME DO ALUNO", "DATA DE NASCIMENTO", "ESCOLA", "NIS"],
        rows,
    )
}

/// Nursery roll, comma separated
pub fn write_nursery_csv(dir: &Path, rows: &[EnrollmentFixture]) -> PathBuf {
    write_enrollment_csv(
        &dir.join("creche.csv"),
        ["NOME DA CRIANÇA", "DATA DE NASCIMENTO", "CRECHE", "NIS"],
        rows,
    )
}

fn write_enrollment_csv(path: &Path, header: [&str; 4], rows: &[EnrollmentFixture]) -> PathBuf {
    let mut writer = csv::Writer::from_path(path).unwrap();
    writer.write_record(header).unwrap();
    for row in rows {
        writer
            .write_record([
                row.name.as_str(),
                &br_date(row.birth_date),
                row.school.as_str(),
                row.nis.as_str(),
            ])
            .unwrap();
    }
    writer.flush().unwrap();
    path.to_path_buf()
}

/// Workspace holding the three rolls of one run
pub struct RollFiles {
    pub dir: TempDir,
    pub cash_transfer: PathBuf,
    pub school: PathBuf,
    pub nursery: PathBuf,
}

impl RollFiles {
    pub fn write(cash: &[CashRow], school: &[EnrollmentFixture], nursery: &[EnrollmentFixture]) -> Self {
        let dir = TempDir::new().unwrap();
        let cash_transfer = write_cash_transfer_csv(dir.path(), cash);
        let school = write_school_csv(dir.path(), school);
        let nursery = write_nursery_csv(dir.path(), nursery);
        Self {
            dir,
            cash_transfer,
            school,
            nursery,
        }
    }

    pub fn request(&self, city_id: &str) -> ImportRequest {
        ImportRequest {
            city_id: city_id.to_string(),
            cash_transfer_path: self.cash_transfer.clone(),
            school_path: self.school.clone(),
            nursery_path: self.nursery.clone(),
            reference_date: reference_date(),
        }
    }
}
