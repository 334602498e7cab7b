//! Opening the local database and bringing its schema up to date.

use std::path::Path;

use tokio_rusqlite::{Connection, params, rusqlite};

use crate::Error;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// One schema step. Versions are strictly increasing.
struct SchemaStep {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA: &[SchemaStep] = &[
    SchemaStep { version: 1, name: "cache_entries", sql: include_str!("../../migrations/001_cache_entries.sql") },
    SchemaStep { version: 2, name: "page_records", sql: include_str!("../../migrations/002_page_records.sql") },
];

/// Local database handle.
///
/// Every `call` on the inner connection runs on tokio-rusqlite's single
/// background thread, so each call is atomic with respect to the others.
/// Single-statement upserts and the cache's check-then-evict rely on that.
#[derive(Clone, Debug)]
pub struct LocalDb {
    pub(crate) conn: Connection,
}

impl LocalDb {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        let applied = conn
            .call(|conn| -> Result<Vec<i64>, Error> {
                conn.execute_batch(PRAGMAS)?;
                upgrade(conn)
            })
            .await
            .map_err(Error::from)?;

        for version in &applied {
            tracing::info!(version, "schema step applied");
        }
        tracing::debug!(schema_version = schema_version(&conn).await?, "local database ready");
        Ok(Self { conn })
    }
}

/// Apply every step newer than the recorded version, each in its own
/// transaction. Returns the versions applied.
fn upgrade(conn: &mut rusqlite::Connection) -> Result<Vec<i64>, Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL DEFAULT '',
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    let current: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

    let known = SCHEMA.last().map_or(0, |step| step.version);
    if current > known {
        return Err(Error::MigrationFailed(format!(
            "database is at schema version {current}, this build knows up to {known}"
        )));
    }

    let mut applied = Vec::new();
    for step in SCHEMA.iter().filter(|step| step.version > current) {
        let tx = conn.transaction()?;
        tx.execute_batch(step.sql)
            .map_err(|e| Error::MigrationFailed(format!("{} ({}): {e}", step.name, step.version)))?;
        tx.execute(
            "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![step.version, step.name, chrono::Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        applied.push(step.version);
    }
    Ok(applied)
}

async fn schema_version(conn: &Connection) -> Result<i64, Error> {
    conn.call(|conn| -> Result<i64, Error> {
        Ok(conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?)
    })
    .await
    .map_err(Error::from)
}
