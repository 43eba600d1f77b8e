//! SQLite-backed `UnitStore`.
//!
//! One `units` table holds every variant; the indexed columns (kind, name,
//! version, status) serve the contract's lookups and the `doc` column carries
//! the full serialized record. All access goes through a single connection
//! behind a mutex, which makes the read-mutate-write sequence inside
//! compare-and-set atomic; the version guard in the UPDATE statement is the
//! backstop should that ever change.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use edusync_core::errors::{Result, SyncError};
use edusync_core::model::LearningUnit;
use edusync_core_types::{UnitId, UnitKind, UnitStatus};
use rusqlite::{Connection, OptionalExtension};

use crate::contract::{UnitMutation, UnitStore};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS units (
    id      TEXT PRIMARY KEY,
    kind    TEXT NOT NULL,
    name    TEXT NOT NULL,
    version INTEGER NOT NULL,
    status  TEXT NOT NULL,
    doc     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_units_kind_status ON units(kind, status);
CREATE INDEX IF NOT EXISTS idx_units_kind_name ON units(kind, name);
";

fn from_sqlite(err: rusqlite::Error) -> SyncError {
    SyncError::Persistence {
        reason: err.to_string(),
    }
}

fn status_str(status: UnitStatus) -> &'static str {
    match status {
        UnitStatus::Active => "active",
        UnitStatus::Inactive => "inactive",
    }
}

/// Durable per-service store on an embedded SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (creating if needed) a store at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(from_sqlite)?;
        conn.execute_batch(SCHEMA).map_err(from_sqlite)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a throwaway in-memory database (tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(from_sqlite)?;
        conn.execute_batch(SCHEMA).map_err(from_sqlite)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            // A poisoned lock means a panic mid-statement; the connection
            // itself is still usable.
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn load(conn: &Connection, id: &UnitId) -> Result<Option<LearningUnit>> {
        let doc: Option<String> = conn
            .query_row(
                "SELECT doc FROM units WHERE id = ?1",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(from_sqlite)?;
        doc.map(|doc| serde_json::from_str(&doc).map_err(SyncError::from))
            .transpose()
    }

    fn save(conn: &Connection, unit: &LearningUnit, guard_version: u64) -> Result<()> {
        let doc = serde_json::to_string(unit)?;
        let changed = conn
            .execute(
                "UPDATE units
                 SET name = ?2, version = ?3, status = ?4, doc = ?5
                 WHERE id = ?1 AND version = ?6",
                rusqlite::params![
                    unit.id.as_str(),
                    unit.name,
                    unit.version,
                    status_str(unit.status),
                    doc,
                    guard_version,
                ],
            )
            .map_err(from_sqlite)?;
        if changed != 1 {
            return Err(SyncError::StoreConflict {
                unit_id: unit.id.clone(),
                expected_version: guard_version,
            });
        }
        Ok(())
    }

    fn load_all(conn: &Connection, kind: UnitKind, active_only: bool) -> Result<Vec<LearningUnit>> {
        let sql = if active_only {
            "SELECT doc FROM units WHERE kind = ?1 AND status = 'active' ORDER BY id"
        } else {
            "SELECT doc FROM units WHERE kind = ?1 ORDER BY id"
        };
        let mut stmt = conn.prepare(sql).map_err(from_sqlite)?;
        let rows = stmt
            .query_map([kind.as_str()], |row| row.get::<_, String>(0))
            .map_err(from_sqlite)?;
        let mut units = Vec::new();
        for doc in rows {
            let doc = doc.map_err(from_sqlite)?;
            units.push(serde_json::from_str(&doc)?);
        }
        Ok(units)
    }
}

#[async_trait]
impl UnitStore for SqliteStore {
    async fn insert(&self, unit: LearningUnit) -> Result<()> {
        let conn = self.conn();
        let doc = serde_json::to_string(&unit)?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO units (id, kind, name, version, status, doc)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    unit.id.as_str(),
                    unit.kind().as_str(),
                    unit.name,
                    unit.version,
                    status_str(unit.status),
                    doc,
                ],
            )
            .map_err(from_sqlite)?;
        if inserted != 1 {
            return Err(SyncError::DuplicateUnit {
                unit_id: unit.id.clone(),
            });
        }
        Ok(())
    }

    async fn get_by_id(&self, id: &UnitId) -> Result<Option<LearningUnit>> {
        Self::load(&self.conn(), id)
    }

    async fn get_by_id_and_version(
        &self,
        id: &UnitId,
        version: u64,
    ) -> Result<Option<LearningUnit>> {
        Ok(Self::load(&self.conn(), id)?.filter(|unit| unit.version == version))
    }

    async fn compare_and_set(
        &self,
        id: &UnitId,
        expected_version: u64,
        mutate: UnitMutation<'_>,
    ) -> Result<LearningUnit> {
        let conn = self.conn();
        let mut unit = Self::load(&conn, id)?.ok_or_else(|| SyncError::UnitNotFound {
            unit_id: id.clone(),
        })?;
        if unit.version != expected_version {
            return Err(SyncError::StoreConflict {
                unit_id: id.clone(),
                expected_version,
            });
        }
        mutate(&mut unit)?;
        unit.version = expected_version + 1;
        unit.updated_at = Utc::now();
        Self::save(&conn, &unit, expected_version)?;
        Ok(unit)
    }

    async fn soft_delete(&self, id: &UnitId, expected_version: u64) -> Result<LearningUnit> {
        let conn = self.conn();
        let mut unit = Self::load(&conn, id)?.ok_or_else(|| SyncError::UnitNotFound {
            unit_id: id.clone(),
        })?;
        if unit.version != expected_version {
            return Err(SyncError::StoreConflict {
                unit_id: id.clone(),
                expected_version,
            });
        }
        unit.status = UnitStatus::Inactive;
        unit.version = expected_version + 1;
        unit.updated_at = Utc::now();
        Self::save(&conn, &unit, expected_version)?;
        Ok(unit)
    }

    async fn find_by_name(&self, kind: UnitKind, name: &str) -> Result<Option<LearningUnit>> {
        let conn = self.conn();
        let doc: Option<String> = conn
            .query_row(
                "SELECT doc FROM units
                 WHERE kind = ?1 AND name = ?2 AND status = 'active'",
                rusqlite::params![kind.as_str(), name],
                |row| row.get(0),
            )
            .optional()
            .map_err(from_sqlite)?;
        doc.map(|doc| serde_json::from_str(&doc).map_err(SyncError::from))
            .transpose()
    }

    async fn find_owners_referencing(
        &self,
        owner_kind: UnitKind,
        member: &UnitId,
    ) -> Result<Vec<LearningUnit>> {
        // Relationship sets live in the JSON doc; scan the (indexed) active
        // slice of the owner kind and filter in memory.
        let conn = self.conn();
        let owners = Self::load_all(&conn, owner_kind, true)?;
        Ok(owners
            .into_iter()
            .filter(|unit| {
                unit.owner_links()
                    .map(|links| {
                        links.skill_ids.contains(member) || links.language_ids.contains(member)
                    })
                    .unwrap_or(false)
            })
            .collect())
    }

    async fn list(&self, kind: UnitKind) -> Result<Vec<LearningUnit>> {
        Self::load_all(&self.conn(), kind, true)
    }
}
