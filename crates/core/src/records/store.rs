//! Page record persistence.
//!
//! `RecordStore` is the seam the sync engine talks to; `LocalDb` implements
//! it over the `page_records` table. Each method is a single serialized
//! database call, so every write is atomic on its own.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_rusqlite::{params, rusqlite};

use super::page::{PageRecord, format_timestamp, parse_timestamp};
use crate::{Error, LocalDb};

/// Storage operations on page records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every record, ordered by `external_id`.
    async fn find_all(&self) -> Result<Vec<PageRecord>, Error>;

    async fn find(&self, external_id: &str) -> Result<Option<PageRecord>, Error>;

    /// Insert or replace a record.
    ///
    /// `last_synced_at` and `last_checked_at` never move backwards, and a
    /// `None` mapping id does not clear a stored one.
    async fn upsert(&self, record: &PageRecord) -> Result<(), Error>;

    /// Upsert a batch inside one transaction. Returns the number written.
    async fn upsert_many(&self, records: &[PageRecord]) -> Result<usize, Error>;

    /// Advance both sync and check timestamps without touching content.
    async fn mark_synced(&self, external_id: &str, at: DateTime<Utc>) -> Result<bool, Error>;

    /// Advance only the check timestamp.
    async fn mark_checked(&self, external_id: &str, at: DateTime<Utc>) -> Result<bool, Error>;

    /// Set `secondary_mapping_id` on a record of `container_id`, leaving every
    /// other column as stored. Returns whether a row matched.
    async fn set_mapping_id(&self, external_id: &str, container_id: &str, mapping_id: &str) -> Result<bool, Error>;

    /// Returns whether a row was removed.
    async fn delete(&self, external_id: &str) -> Result<bool, Error>;

    async fn count(&self) -> Result<u64, Error>;

    async fn count_synced_since(&self, since: DateTime<Utc>) -> Result<u64, Error>;

    async fn count_by_kind(&self) -> Result<BTreeMap<String, u64>, Error>;
}

const SELECT_COLUMNS: &str = "SELECT
    external_id, container_id, record_kind, title, content, content_length,
    owner_id, secondary_mapping_id, url, last_synced_at, last_checked_at,
    source_created_at, source_modified_at
FROM page_records";

const UPSERT_SQL: &str = "INSERT INTO page_records (
    external_id, container_id, record_kind, title, content, content_length,
    owner_id, secondary_mapping_id, url, last_synced_at, last_checked_at,
    source_created_at, source_modified_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
ON CONFLICT(external_id) DO UPDATE SET
    container_id = excluded.container_id,
    record_kind = excluded.record_kind,
    title = excluded.title,
    content = excluded.content,
    content_length = excluded.content_length,
    owner_id = excluded.owner_id,
    secondary_mapping_id = COALESCE(excluded.secondary_mapping_id, page_records.secondary_mapping_id),
    url = COALESCE(excluded.url, page_records.url),
    last_synced_at = CASE
        WHEN page_records.last_synced_at IS NULL THEN excluded.last_synced_at
        WHEN excluded.last_synced_at IS NULL THEN page_records.last_synced_at
        ELSE MAX(page_records.last_synced_at, excluded.last_synced_at)
    END,
    last_checked_at = CASE
        WHEN page_records.last_checked_at IS NULL THEN excluded.last_checked_at
        WHEN excluded.last_checked_at IS NULL THEN page_records.last_checked_at
        ELSE MAX(page_records.last_checked_at, excluded.last_checked_at)
    END,
    source_created_at = COALESCE(excluded.source_created_at, page_records.source_created_at),
    source_modified_at = COALESCE(excluded.source_modified_at, page_records.source_modified_at)";

fn ts(at: Option<DateTime<Utc>>) -> Option<String> {
    at.map(format_timestamp)
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<PageRecord> {
    let read_ts = |idx: usize| -> rusqlite::Result<Option<DateTime<Utc>>> {
        Ok(row.get::<_, Option<String>>(idx)?.as_deref().and_then(parse_timestamp))
    };

    Ok(PageRecord {
        external_id: row.get(0)?,
        container_id: row.get(1)?,
        record_kind: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        content_length: row.get::<_, i64>(5)?.max(0) as usize,
        owner_id: row.get(6)?,
        secondary_mapping_id: row.get(7)?,
        url: row.get(8)?,
        last_synced_at: read_ts(9)?,
        last_checked_at: read_ts(10)?,
        source_created_at: read_ts(11)?,
        source_modified_at: read_ts(12)?,
    })
}

fn upsert_one(conn: &rusqlite::Connection, record: &PageRecord) -> Result<(), Error> {
    if record.external_id.trim().is_empty() {
        return Err(Error::InvalidRecord("external_id must not be empty".into()));
    }
    conn.execute(
        UPSERT_SQL,
        params![
            &record.external_id,
            &record.container_id,
            &record.record_kind,
            &record.title,
            &record.content,
            i64::try_from(record.content_length).unwrap_or(i64::MAX),
            &record.owner_id,
            &record.secondary_mapping_id,
            &record.url,
            ts(record.last_synced_at),
            ts(record.last_checked_at),
            ts(record.source_created_at),
            ts(record.source_modified_at),
        ],
    )?;
    Ok(())
}

#[async_trait]
impl RecordStore for LocalDb {
    async fn find_all(&self) -> Result<Vec<PageRecord>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<PageRecord>, Error> {
                let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY external_id"))?;
                let records = stmt
                    .query_map([], row_to_record)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await
            .map_err(Error::from)
    }

    async fn find(&self, external_id: &str) -> Result<Option<PageRecord>, Error> {
        let external_id = external_id.to_string();
        self.conn
            .call(move |conn| -> Result<Option<PageRecord>, Error> {
                let result = conn.query_row(
                    &format!("{SELECT_COLUMNS} WHERE external_id = ?1"),
                    params![external_id],
                    row_to_record,
                );
                match result {
                    Ok(record) => Ok(Some(record)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn upsert(&self, record: &PageRecord) -> Result<(), Error> {
        let record = record.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> { upsert_one(conn, &record) })
            .await
            .map_err(Error::from)
    }

    async fn upsert_many(&self, records: &[PageRecord]) -> Result<usize, Error> {
        let records = records.to_vec();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                for record in &records {
                    upsert_one(&tx, record)?;
                }
                tx.commit()?;
                Ok(records.len())
            })
            .await
            .map_err(Error::from)
    }

    async fn mark_synced(&self, external_id: &str, at: DateTime<Utc>) -> Result<bool, Error> {
        let external_id = external_id.to_string();
        let at = format_timestamp(at);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let updated = conn.execute(
                    "UPDATE page_records SET
                        last_synced_at = CASE
                            WHEN last_synced_at IS NULL OR last_synced_at < ?2 THEN ?2
                            ELSE last_synced_at
                        END,
                        last_checked_at = CASE
                            WHEN last_checked_at IS NULL OR last_checked_at < ?2 THEN ?2
                            ELSE last_checked_at
                        END
                     WHERE external_id = ?1",
                    params![external_id, at],
                )?;
                Ok(updated > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn mark_checked(&self, external_id: &str, at: DateTime<Utc>) -> Result<bool, Error> {
        let external_id = external_id.to_string();
        let at = format_timestamp(at);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let updated = conn.execute(
                    "UPDATE page_records SET last_checked_at = ?2
                     WHERE external_id = ?1 AND (last_checked_at IS NULL OR last_checked_at < ?2)",
                    params![external_id, at],
                )?;
                Ok(updated > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn set_mapping_id(&self, external_id: &str, container_id: &str, mapping_id: &str) -> Result<bool, Error> {
        let (external_id, container_id, mapping_id) =
            (external_id.to_string(), container_id.to_string(), mapping_id.to_string());
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let updated = conn.execute(
                    "UPDATE page_records SET secondary_mapping_id = ?3
                     WHERE external_id = ?1 AND container_id = ?2",
                    params![external_id, container_id, mapping_id],
                )?;
                Ok(updated > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, external_id: &str) -> Result<bool, Error> {
        let external_id = external_id.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM page_records WHERE external_id = ?1", params![external_id])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn count(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM page_records", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    async fn count_synced_since(&self, since: DateTime<Utc>) -> Result<u64, Error> {
        let since = format_timestamp(since);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM page_records WHERE last_synced_at >= ?1",
                    params![since],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    async fn count_by_kind(&self) -> Result<BTreeMap<String, u64>, Error> {
        self.conn
            .call(|conn| -> Result<BTreeMap<String, u64>, Error> {
                let mut stmt = conn.prepare("SELECT record_kind, COUNT(*) FROM page_records GROUP BY record_kind")?;
                let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
                let mut counts = BTreeMap::new();
                for row in rows {
                    let (kind, count) = row?;
                    counts.insert(kind, count as u64);
                }
                Ok(counts)
            })
            .await
            .map_err(Error::from)
    }
}
