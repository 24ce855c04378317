// ==========================================
// Beneficiary reconciliation - family repository (rusqlite)
// ==========================================
// Tables: families, dependents (see db::ensure_schema)
// ==========================================

use crate::db::{ensure_schema, open_sqlite_connection};
use crate::domain::{
    Dependent, EnrollmentSource, Family, FamilyGroup, FamilyWithDependents, GrantOwner,
    GroupOutcome, NewDependent,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::family_repo::FamilyRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

const DEPENDENT_COLUMNS: &str = "dependent_id, family_id, city_id, nis, name, birth_date, \
     is_responsible, school_name, enrollment_source, occupation, monthly_income, \
     created_at, deactivated_at";

const FAMILY_COLUMNS: &str = "family_id, city_id, code, guardian_nis, created_at, updated_at";

// ==========================================
// FamilyRepositoryImpl
// ==========================================
pub struct FamilyRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl FamilyRepositoryImpl {
    /// Open the database at `db_path` and make sure the tables exist
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Share an existing connection
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn.lock()?;
            ensure_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    // ===== row mapping =====

    fn map_family(row: &Row) -> rusqlite::Result<Family> {
        Ok(Family {
            family_id: row.get(0)?,
            city_id: row.get(1)?,
            code: row.get(2)?,
            guardian_nis: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn map_dependent(row: &Row) -> rusqlite::Result<Dependent> {
        let source: Option<String> = row.get(8)?;
        Ok(Dependent {
            dependent_id: row.get(0)?,
            family_id: row.get(1)?,
            city_id: row.get(2)?,
            nis: row.get(3)?,
            name: row.get(4)?,
            birth_date: row.get(5)?,
            is_responsible: row.get::<_, i64>(6)? != 0,
            school_name: row.get(7)?,
            enrollment_source: source.as_deref().and_then(EnrollmentSource::from_str),
            occupation: row.get(9)?,
            monthly_income: row.get(10)?,
            created_at: row.get(11)?,
            deactivated_at: row.get(12)?,
        })
    }

    // ===== transaction helpers =====

    fn find_family_id_tx(tx: &Transaction, city_id: &str, code: &str) -> RepositoryResult<Option<String>> {
        Ok(tx
            .query_row(
                "SELECT family_id FROM families WHERE city_id = ?1 AND code = ?2",
                params![city_id, code],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// (family_id, family code) currently holding an active NIS
    fn find_active_owner_tx(
        tx: &Transaction,
        city_id: &str,
        nis: &str,
    ) -> RepositoryResult<Option<(String, String)>> {
        Ok(tx
            .query_row(
                r#"
                SELECT f.family_id, f.code
                FROM dependents d
                JOIN families f ON f.family_id = d.family_id
                WHERE d.city_id = ?1 AND d.nis = ?2 AND d.deactivated_at IS NULL
                "#,
                params![city_id, nis],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?)
    }

    fn insert_family_tx(
        tx: &Transaction,
        group: &FamilyGroup,
        now: DateTime<Utc>,
    ) -> RepositoryResult<String> {
        let family_id = Uuid::new_v4().to_string();
        tx.execute(
            r#"
            INSERT INTO families (family_id, city_id, code, guardian_nis, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
            params![family_id, group.city_id, group.code, group.guardian_nis, now],
        )?;
        Ok(family_id)
    }

    fn insert_dependent_tx(
        tx: &Transaction,
        family_id: &str,
        city_id: &str,
        dependent: &NewDependent,
        is_responsible: bool,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO dependents (
                dependent_id, family_id, city_id, nis, name, birth_date,
                is_responsible, school_name, enrollment_source, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                Uuid::new_v4().to_string(),
                family_id,
                city_id,
                dependent.nis,
                dependent.name,
                dependent.birth_date,
                is_responsible as i64,
                dependent.school_name,
                dependent.enrollment_source.map(|s| s.as_str()),
                now,
            ],
        )?;
        Ok(())
    }

    fn upsert_family_group_tx(tx: &Transaction, group: &FamilyGroup) -> RepositoryResult<GroupOutcome> {
        let now = Utc::now();

        let (family_id, family_created) = match Self::find_family_id_tx(tx, &group.city_id, &group.code)? {
            Some(id) => {
                tx.execute(
                    "UPDATE families SET updated_at = ?1 WHERE family_id = ?2",
                    params![now, id],
                )?;
                (id, false)
            }
            None => {
                if let Some((_, owner_code)) =
                    Self::find_active_owner_tx(tx, &group.city_id, &group.responsible.nis)?
                {
                    return Err(RepositoryError::BusinessRuleViolation(format!(
                        "responsible NIS {} is active in family {}",
                        group.responsible.nis, owner_code
                    )));
                }
                let id = Self::insert_family_tx(tx, group, now)?;
                Self::insert_dependent_tx(tx, &id, &group.city_id, &group.responsible, true, now)?;
                (id, true)
            }
        };

        let mut outcome = GroupOutcome {
            family_id: family_id.clone(),
            family_created,
            ..Default::default()
        };

        for dependent in &group.dependents {
            match Self::find_active_owner_tx(tx, &group.city_id, &dependent.nis)? {
                Some((owner_id, _)) if owner_id == family_id => {
                    outcome.already_present.push(dependent.nis.clone());
                }
                Some((_, owner_code)) => {
                    outcome
                        .granted_elsewhere
                        .push((dependent.nis.clone(), owner_code));
                }
                None => {
                    Self::insert_dependent_tx(tx, &family_id, &group.city_id, dependent, false, now)?;
                    outcome.inserted.push(dependent.nis.clone());
                }
            }
        }

        Ok(outcome)
    }
}

#[async_trait]
impl FamilyRepository for FamilyRepositoryImpl {
    async fn upsert_family_group(&self, group: &FamilyGroup) -> RepositoryResult<GroupOutcome> {
        let conn = self.conn.lock()?;
        let tx = conn.unchecked_transaction()?;

        // dropping tx without commit rolls the group back
        let outcome = Self::upsert_family_group_tx(&tx, group)?;

        tx.commit()?;
        debug!(
            family_id = %outcome.family_id,
            created = outcome.family_created,
            inserted = outcome.inserted.len(),
            already_present = outcome.already_present.len(),
            granted_elsewhere = outcome.granted_elsewhere.len(),
            "family group committed"
        );
        Ok(outcome)
    }

    async fn deactivate_dependent(&self, dependent_id: &str) -> RepositoryResult<()> {
        let conn = self.conn.lock()?;
        let affected = conn.execute(
            "UPDATE dependents SET deactivated_at = ?1 WHERE dependent_id = ?2 AND deactivated_at IS NULL",
            params![Utc::now(), dependent_id],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Dependent".to_string(),
                id: dependent_id.to_string(),
            });
        }
        Ok(())
    }

    async fn list_active_grants(
        &self,
        city_id: &str,
    ) -> RepositoryResult<HashMap<String, GrantOwner>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT d.nis, f.family_id, f.code, d.created_at
            FROM dependents d
            JOIN families f ON f.family_id = d.family_id
            WHERE d.city_id = ?1 AND d.deactivated_at IS NULL
            ORDER BY d.created_at ASC, d.rowid ASC
            "#,
        )?;

        let rows = stmt.query_map(params![city_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                GrantOwner {
                    family_id: row.get(1)?,
                    family_code: row.get(2)?,
                    granted_at: row.get(3)?,
                },
            ))
        })?;

        let mut grants = HashMap::new();
        for row in rows {
            let (nis, owner) = row?;
            // first grant wins
            grants.entry(nis).or_insert(owner);
        }
        Ok(grants)
    }

    async fn find_family_by_code(
        &self,
        city_id: &str,
        code: &str,
    ) -> RepositoryResult<Option<Family>> {
        let conn = self.conn.lock()?;
        let sql = format!(
            "SELECT {} FROM families WHERE city_id = ?1 AND code = ?2",
            FAMILY_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![city_id, code], Self::map_family)
            .optional()?)
    }

    async fn list_dependents(&self, family_id: &str) -> RepositoryResult<Vec<Dependent>> {
        let conn = self.conn.lock()?;
        let sql = format!(
            "SELECT {} FROM dependents WHERE family_id = ?1 \
             ORDER BY is_responsible DESC, created_at ASC, rowid ASC",
            DEPENDENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let dependents = stmt
            .query_map(params![family_id], Self::map_dependent)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(dependents)
    }

    async fn list_families(&self, city_id: &str) -> RepositoryResult<Vec<FamilyWithDependents>> {
        let families = {
            let conn = self.conn.lock()?;
            let sql = format!(
                "SELECT {} FROM families WHERE city_id = ?1 ORDER BY code ASC",
                FAMILY_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let families = stmt
                .query_map(params![city_id], Self::map_family)?
                .collect::<Result<Vec<_>, _>>()?;
            families
        };

        let mut result = Vec::with_capacity(families.len());
        for family in families {
            let dependents = self.list_dependents(&family.family_id).await?;
            result.push(FamilyWithDependents { family, dependents });
        }
        Ok(result)
    }

    async fn count_families(&self, city_id: &str) -> RepositoryResult<usize> {
        let conn = self.conn.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM families WHERE city_id = ?1",
            params![city_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
