//! `SyncService`: the outbound surface over the engine and its caches.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pagesync_client::Database;
use pagesync_core::cache::compute_cache_key;
use pagesync_core::records::is_valid_external_id;
use pagesync_core::RecordStore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::context::EngineContext;
use crate::engine::{ReconciliationEngine, SyncSummary};
use crate::error::SyncError;
use crate::scheduler::Scheduler;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySchema {
    pub id: String,
    pub kind: String,
    /// Option names for select, multi_select and status properties.
    #[serde(default)]
    pub options: Vec<String>,
}

/// Normalized container schema, cached under the container id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub container_id: String,
    pub title_property: Option<String>,
    pub properties: BTreeMap<String, PropertySchema>,
    pub fetched_at: DateTime<Utc>,
}

impl Schema {
    pub fn from_database(container_id: &str, database: &Database, fetched_at: DateTime<Utc>) -> Self {
        let properties = database
            .properties
            .iter()
            .map(|(name, property)| {
                let schema = PropertySchema {
                    id: property.id.clone(),
                    kind: property.kind.clone(),
                    options: property.options().into_iter().map(|o| o.name).collect(),
                };
                (name.clone(), schema)
            })
            .collect();
        Self {
            container_id: container_id.to_string(),
            title_property: database.title_property().map(str::to_string),
            properties,
            fetched_at,
        }
    }

    /// Property by name, ignoring ASCII case.
    pub fn property(&self, name: &str) -> Option<(&str, &PropertySchema)> {
        self.properties
            .get_key_value(name)
            .or_else(|| self.properties.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)))
            .map(|(k, v)| (k.as_str(), v))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingHandle {
    pub container_id: String,
    pub mapping_key: String,
    pub handle_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    /// Whether the scheduler loop is alive.
    pub running: bool,
    pub pass_in_progress: bool,
    pub total_records: u64,
    pub recently_synced_count: u64,
    pub interval_seconds: u64,
    pub kind_distribution: BTreeMap<String, u64>,
    pub last_summary: Option<SyncSummary>,
}

fn require(field: &str, value: &str) -> Result<(), SyncError> {
    if value.trim().is_empty() {
        return Err(SyncError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}

pub struct SyncService {
    ctx: Arc<EngineContext>,
    engine: Arc<ReconciliationEngine>,
    scheduler: Arc<Scheduler>,
    shutdown: CancellationToken,
    /// Serializes mapping creation so a key is created at most once.
    mapping_lock: Mutex<()>,
}

impl SyncService {
    pub fn new(ctx: Arc<EngineContext>, shutdown: CancellationToken) -> Self {
        let engine = Arc::new(ReconciliationEngine::new(Arc::clone(&ctx)));
        let scheduler = Arc::new(Scheduler::new(Arc::clone(&engine)));
        Self { ctx, engine, scheduler, shutdown, mapping_lock: Mutex::new(()) }
    }

    pub fn scheduler(&self) -> Arc<Scheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn engine(&self) -> &Arc<ReconciliationEngine> {
        &self.engine
    }

    /// Container schema, served from the schema cache when present.
    pub async fn get_schema(&self, container_id: &str) -> Result<Schema, SyncError> {
        require("container_id", container_id)?;
        if let Some(schema) = self.ctx.caches.schema.get_json::<Schema>(container_id).await {
            tracing::debug!(container_id, "schema cache hit");
            return Ok(schema);
        }

        let database = self.ctx.api.retrieve_database(container_id).await?;
        let schema = Schema::from_database(container_id, &database, Utc::now());
        self.ctx.caches.schema.put_json(container_id, &schema).await;
        tracing::debug!(container_id, properties = schema.properties.len(), "schema fetched");
        Ok(schema)
    }

    /// Drop the cached schema so the next read goes remote. Returns whether
    /// an entry was removed.
    pub async fn invalidate_schema(&self, container_id: &str) -> Result<bool, SyncError> {
        require("container_id", container_id)?;
        Ok(self.ctx.caches.schema.invalidate(container_id).await)
    }

    /// Add `option` to a select, multi-select or status property if missing.
    ///
    /// Returns `true` when the remote schema was changed. Property names match
    /// case-insensitively; option names match exactly.
    pub async fn ensure_select_option(
        &self, container_id: &str, property: &str, option: &str,
    ) -> Result<bool, SyncError> {
        require("property", property)?;
        require("option", option)?;
        let schema = self.get_schema(container_id).await?;

        let Some((name, prop)) = schema.property(property) else {
            return Err(SyncError::InvalidInput(format!("property '{property}' not found in {container_id}")));
        };
        if !matches!(prop.kind.as_str(), "select" | "multi_select" | "status") {
            tracing::info!(container_id, property = name, kind = %prop.kind, "property has no options; skipped");
            return Ok(false);
        }
        if prop.options.iter().any(|existing| existing == option) {
            return Ok(false);
        }

        let mut options: Vec<serde_json::Value> = prop.options.iter().map(|o| json!({ "name": o })).collect();
        options.push(json!({ "name": option, "color": "default" }));
        let payload = json!({ name: { prop.kind.as_str(): { "options": options } } });

        self.ctx.api.update_database_properties(container_id, payload).await?;
        self.ctx.caches.schema.invalidate(container_id).await;
        tracing::info!(container_id, property = name, option, "select option added");
        Ok(true)
    }

    /// Mapping handle for `(container_id, mapping_key)`, created on first use.
    ///
    /// When `mapping_key` names a stored record of that container, the handle
    /// is recorded as its `secondary_mapping_id`.
    pub async fn get_or_create_mapping(&self, container_id: &str, mapping_key: &str) -> Result<MappingHandle, SyncError> {
        require("container_id", container_id)?;
        require("mapping_key", mapping_key)?;
        let key = compute_cache_key(container_id, mapping_key);
        let cache = &self.ctx.caches.mapping;

        if let Some(handle) = cache.get_json::<MappingHandle>(&key).await {
            return Ok(handle);
        }

        let _creating = self.mapping_lock.lock().await;
        if let Some(handle) = cache.get_json::<MappingHandle>(&key).await {
            return Ok(handle);
        }

        let handle_id = self.ctx.mappings.create_mapping(container_id, mapping_key).await?;
        let handle = MappingHandle {
            container_id: container_id.to_string(),
            mapping_key: mapping_key.to_string(),
            handle_id,
            created_at: Utc::now(),
        };
        cache.put_json(&key, &handle).await;
        tracing::info!(container_id, mapping_key, handle_id = %handle.handle_id, "mapping created");

        if self.ctx.store.set_mapping_id(mapping_key, container_id, &handle.handle_id).await? {
            tracing::debug!(container_id, mapping_key, "mapping recorded on page record");
        }
        Ok(handle)
    }

    pub async fn get_content(&self, external_id: &str, use_cache: bool) -> Result<String, SyncError> {
        if !is_valid_external_id(external_id) {
            return Err(SyncError::InvalidInput(format!("'{external_id}' is not a page id")));
        }
        Ok(self.ctx.differ().get_content(external_id, use_cache).await?)
    }

    /// Drop expired entries from every cache namespace.
    pub async fn purge_caches(&self) -> Result<u64, SyncError> {
        let removed = self.ctx.caches.purge_expired().await?;
        tracing::info!(removed, "expired cache entries purged");
        Ok(removed)
    }

    /// Run a pass now. Fails with `AlreadyRunning` if one is in flight.
    pub async fn trigger_manual_sync(&self) -> Result<SyncSummary, SyncError> {
        tracing::info!("manual sync requested");
        self.engine.run_pass(&self.shutdown.child_token()).await
    }

    pub async fn get_sync_status(&self) -> Result<SyncStatus, SyncError> {
        let settings = &self.ctx.settings;
        let recent_window = chrono::Duration::from_std(settings.recent_window).unwrap_or(chrono::Duration::MAX);
        let since = Utc::now().checked_sub_signed(recent_window).unwrap_or(DateTime::<Utc>::MIN_UTC);

        Ok(SyncStatus {
            running: self.scheduler.is_running(),
            pass_in_progress: self.engine.is_pass_in_progress(),
            total_records: self.ctx.store.count().await?,
            recently_synced_count: self.ctx.store.count_synced_since(since).await?,
            interval_seconds: settings.sync_interval.as_secs(),
            kind_distribution: self.ctx.store.count_by_kind().await?,
            last_summary: self.engine.last_summary(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, harness, pid, test_settings};
    use pagesync_core::LocalDb;
    use pagesync_client::DatabaseProperty;
    use pagesync_core::PageRecord;
    use std::sync::atomic::Ordering;

    fn property(id: &str, kind: &str, config: serde_json::Value) -> DatabaseProperty {
        let mut map = BTreeMap::new();
        map.insert(kind.to_string(), config);
        DatabaseProperty { id: id.into(), name: String::new(), kind: kind.into(), config: map }
    }

    fn tasks_db() -> Database {
        let mut properties = BTreeMap::new();
        properties.insert("Task name".to_string(), property("title", "title", json!({})));
        properties.insert(
            "Status".to_string(),
            property("st", "select", json!({ "options": [{ "name": "Todo", "color": "red" }, { "name": "Done" }] })),
        );
        properties.insert("Due".to_string(), property("du", "date", json!({})));
        Database { id: "db-tasks".into(), title: Vec::new(), properties }
    }

    fn service(h: &Harness) -> SyncService {
        SyncService::new(h.ctx.clone(), CancellationToken::new())
    }

    #[tokio::test]
    async fn test_schema_is_cached_until_invalidated() {
        let h = harness().await;
        h.api.set_schema(tasks_db());
        let svc = service(&h);

        let schema = svc.get_schema("db-tasks").await.unwrap();
        assert_eq!(schema.title_property.as_deref(), Some("Task name"));
        assert_eq!(schema.properties["Status"].options, vec!["Todo".to_string(), "Done".to_string()]);

        svc.get_schema("db-tasks").await.unwrap();
        assert_eq!(h.api.schema_calls(), 1);

        assert!(svc.invalidate_schema("db-tasks").await.unwrap());
        svc.get_schema("db-tasks").await.unwrap();
        assert_eq!(h.api.schema_calls(), 2);
    }

    #[tokio::test]
    async fn test_ensure_select_option_adds_and_invalidates() {
        let h = harness().await;
        h.api.set_schema(tasks_db());
        let svc = service(&h);

        assert!(svc.ensure_select_option("db-tasks", "status", "Blocked").await.unwrap());
        let updates = h.api.updates.lock().unwrap().clone();
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0].1,
            json!({ "Status": { "select": { "options": [
                { "name": "Todo" }, { "name": "Done" }, { "name": "Blocked", "color": "default" }
            ]}}})
        );

        // The write dropped the cached schema.
        let calls = h.api.schema_calls();
        svc.get_schema("db-tasks").await.unwrap();
        assert_eq!(h.api.schema_calls(), calls + 1);
    }

    #[tokio::test]
    async fn test_ensure_select_option_noop_cases() {
        let h = harness().await;
        h.api.set_schema(tasks_db());
        let svc = service(&h);

        assert!(!svc.ensure_select_option("db-tasks", "Status", "Done").await.unwrap());
        assert!(!svc.ensure_select_option("db-tasks", "Due", "Tomorrow").await.unwrap());
        assert!(matches!(
            svc.ensure_select_option("db-tasks", "Missing", "x").await,
            Err(SyncError::InvalidInput(_))
        ));
        assert!(h.api.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mapping_created_once_and_recorded() {
        let h = harness().await;
        h.db.upsert(&PageRecord::new(pid(1), "db-tasks", "task")).await.unwrap();
        let svc = service(&h);

        let first = svc.get_or_create_mapping("db-tasks", &pid(1)).await.unwrap();
        let second = svc.get_or_create_mapping("db-tasks", &pid(1)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.handle_id, "handle-1");
        assert_eq!(h.mappings.created.load(Ordering::SeqCst), 1);

        let record = h.db.find(&pid(1)).await.unwrap().unwrap();
        assert_eq!(record.secondary_mapping_id.as_deref(), Some("handle-1"));

        let other = svc.get_or_create_mapping("db-other", &pid(1)).await.unwrap();
        assert_eq!(other.handle_id, "handle-2");
    }

    /// Lets a content write land between the mapping store calls.
    struct InterleavedWriteStore {
        inner: LocalDb,
        write: std::sync::Mutex<Option<PageRecord>>,
    }

    impl InterleavedWriteStore {
        async fn land_write(&self) {
            let pending = self.write.lock().unwrap().take();
            if let Some(record) = pending {
                self.inner.upsert(&record).await.unwrap();
            }
        }
    }

    #[async_trait::async_trait]
    impl RecordStore for InterleavedWriteStore {
        async fn find_all(&self) -> Result<Vec<PageRecord>, pagesync_core::Error> {
            self.inner.find_all().await
        }
        async fn find(&self, external_id: &str) -> Result<Option<PageRecord>, pagesync_core::Error> {
            let found = self.inner.find(external_id).await;
            self.land_write().await;
            found
        }
        async fn upsert(&self, record: &PageRecord) -> Result<(), pagesync_core::Error> {
            self.inner.upsert(record).await
        }
        async fn upsert_many(&self, records: &[PageRecord]) -> Result<usize, pagesync_core::Error> {
            self.inner.upsert_many(records).await
        }
        async fn mark_synced(&self, external_id: &str, at: DateTime<Utc>) -> Result<bool, pagesync_core::Error> {
            self.inner.mark_synced(external_id, at).await
        }
        async fn mark_checked(&self, external_id: &str, at: DateTime<Utc>) -> Result<bool, pagesync_core::Error> {
            self.inner.mark_checked(external_id, at).await
        }
        async fn set_mapping_id(
            &self, external_id: &str, container_id: &str, mapping_id: &str,
        ) -> Result<bool, pagesync_core::Error> {
            self.land_write().await;
            self.inner.set_mapping_id(external_id, container_id, mapping_id).await
        }
        async fn delete(&self, external_id: &str) -> Result<bool, pagesync_core::Error> {
            self.inner.delete(external_id).await
        }
        async fn count(&self) -> Result<u64, pagesync_core::Error> {
            self.inner.count().await
        }
        async fn count_synced_since(&self, since: DateTime<Utc>) -> Result<u64, pagesync_core::Error> {
            self.inner.count_synced_since(since).await
        }
        async fn count_by_kind(&self) -> Result<BTreeMap<String, u64>, pagesync_core::Error> {
            self.inner.count_by_kind().await
        }
    }

    #[tokio::test]
    async fn test_mapping_does_not_overwrite_concurrent_content_write() {
        let h = harness().await;
        let id = pid(4);
        let mut old = PageRecord::new(&id, "db-tasks", "task").with_content("OLD");
        old.last_synced_at = Some(Utc::now() - chrono::Duration::hours(5));
        h.db.upsert(&old).await.unwrap();

        let mut newer = old.clone();
        newer.set_content("NEW CONTENT".to_string());
        newer.last_synced_at = Some(Utc::now());
        let store = Arc::new(InterleavedWriteStore { inner: h.db.clone(), write: std::sync::Mutex::new(Some(newer)) });

        let ctx = Arc::new(EngineContext::new(
            h.api.clone(),
            store,
            h.ctx.caches.clone(),
            h.notifier.clone(),
            h.mappings.clone(),
            test_settings(),
        ));
        let svc = SyncService::new(ctx, CancellationToken::new());
        let handle = svc.get_or_create_mapping("db-tasks", &id).await.unwrap();

        let record = h.db.find(&id).await.unwrap().unwrap();
        assert_eq!(record.content, "NEW CONTENT");
        assert_eq!(record.secondary_mapping_id.as_deref(), Some(handle.handle_id.as_str()));
    }

    #[tokio::test]
    async fn test_concurrent_mapping_requests_create_once() {
        let h = harness().await;
        let svc = Arc::new(service(&h));

        let mut tasks = Vec::new();
        for _ in 0..5 {
            let svc = Arc::clone(&svc);
            tasks.push(tokio::spawn(async move { svc.get_or_create_mapping("db", "topic").await.unwrap() }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap().handle_id, "handle-1");
        }
        assert_eq!(h.mappings.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_content_validates_and_caches() {
        let h = harness().await;
        h.api.set_content(&pid(3), "hello");
        let svc = service(&h);

        assert!(matches!(svc.get_content("nope", true).await, Err(SyncError::InvalidInput(_))));
        assert_eq!(svc.get_content(&pid(3), true).await.unwrap(), "hello");
        assert_eq!(svc.get_content(&pid(3), true).await.unwrap(), "hello");
        assert_eq!(h.api.block_calls(&pid(3)), 1);

        svc.get_content(&pid(3), false).await.unwrap();
        assert_eq!(h.api.block_calls(&pid(3)), 2);
    }

    #[tokio::test]
    async fn test_status_reports_counts() {
        let h = harness().await;
        let mut synced = PageRecord::new(pid(1), "db", "task");
        synced.last_synced_at = Some(Utc::now());
        h.db.upsert(&synced).await.unwrap();
        h.db.upsert(&PageRecord::new(pid(2), "db", "meeting")).await.unwrap();
        let svc = service(&h);

        let status = svc.get_sync_status().await.unwrap();
        assert!(!status.running);
        assert!(!status.pass_in_progress);
        assert_eq!(status.total_records, 2);
        assert_eq!(status.recently_synced_count, 1);
        assert_eq!(status.kind_distribution.get("meeting"), Some(&1));
        assert!(status.last_summary.is_none());

        h.api.put_page(&pid(1), "db", "T");
        h.api.put_page(&pid(2), "db", "M");
        h.api.set_content(&pid(2), "m");
        let summary = svc.trigger_manual_sync().await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(svc.get_sync_status().await.unwrap().last_summary, Some(summary));
    }
}
