//! Test doubles shared by the engine tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pagesync_client::{ApiError, Block, ContentApi, Database, Page, Paginated, PartialUser, PropertyValue};
use pagesync_core::{AppConfig, Caches, LocalDb, SourceConfig};

use crate::batch::BatchConfig;
use crate::context::EngineContext;
use crate::error::SyncError;
use crate::notify::{DeletionNotice, MappingProvider, NotificationSink};
use crate::settings::SyncSettings;

/// A valid 32-hex external id derived from `n`.
pub fn pid(n: u32) -> String {
    format!("{n:032x}")
}

/// Scripted in-memory content API.
#[derive(Default)]
pub struct FakeApi {
    pages: Mutex<HashMap<String, Result<Page, ApiError>>>,
    content: Mutex<HashMap<String, Result<String, ApiError>>>,
    databases: Mutex<HashMap<String, Result<Vec<Page>, ApiError>>>,
    schemas: Mutex<HashMap<String, Database>>,
    pub updates: Mutex<Vec<(String, serde_json::Value)>>,
    page_calls: Mutex<HashMap<String, usize>>,
    block_calls: Mutex<HashMap<String, usize>>,
    schema_calls: AtomicUsize,
    /// Page size used when paginating query and block results.
    pub page_size: usize,
    /// Artificial latency of every probe, for concurrency tests.
    pub probe_delay: Duration,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Self {
        Self { page_size: 2, ..Default::default() }
    }

    pub fn put_page(&self, id: &str, container_id: &str, title: &str) {
        let mut page = Page::new(id);
        page.properties.insert("Name".into(), PropertyValue::title(title));
        page.created_by = Some(PartialUser { id: format!("owner-{container_id}") });
        page.created_time = Some("2024-05-01T09:00:00.000Z".into());
        page.last_edited_time = Some("2024-05-02T09:00:00.000Z".into());
        page.url = Some(format!("https://www.notion.so/{id}"));
        self.pages.lock().unwrap().insert(id.to_string(), Ok(page));
    }

    pub fn archive_page(&self, id: &str) {
        let mut pages = self.pages.lock().unwrap();
        let mut page = match pages.remove(id) {
            Some(Ok(page)) => page,
            _ => Page::new(id),
        };
        page.archived = true;
        pages.insert(id.to_string(), Ok(page));
    }

    pub fn fail_page(&self, id: &str, err: ApiError) {
        self.pages.lock().unwrap().insert(id.to_string(), Err(err));
    }

    pub fn set_content(&self, id: &str, text: &str) {
        self.content.lock().unwrap().insert(id.to_string(), Ok(text.to_string()));
    }

    pub fn fail_content(&self, id: &str, err: ApiError) {
        self.content.lock().unwrap().insert(id.to_string(), Err(err));
    }

    pub fn add_database_page(&self, database_id: &str, page: Page) {
        let mut dbs = self.databases.lock().unwrap();
        let entry = dbs.entry(database_id.to_string()).or_insert_with(|| Ok(Vec::new()));
        if let Ok(pages) = entry {
            pages.push(page.clone());
        }
        drop(dbs);
        self.pages.lock().unwrap().insert(page.id.clone(), Ok(page));
    }

    pub fn fail_database(&self, database_id: &str, err: ApiError) {
        self.databases.lock().unwrap().insert(database_id.to_string(), Err(err));
    }

    pub fn set_schema(&self, database: Database) {
        self.schemas.lock().unwrap().insert(database.id.clone(), database);
    }

    pub fn page_calls(&self, id: &str) -> usize {
        self.page_calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn block_calls(&self, id: &str) -> usize {
        self.block_calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn schema_calls(&self) -> usize {
        self.schema_calls.load(Ordering::SeqCst)
    }

    fn page_size(&self) -> usize {
        self.page_size.max(1)
    }

    fn paginate<T: Clone>(&self, all: &[T], cursor: Option<&str>) -> Paginated<T> {
        let start: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = (start + self.page_size()).min(all.len());
        let results = all.get(start..end).map(<[T]>::to_vec).unwrap_or_default();
        if end < all.len() {
            Paginated { results, has_more: true, next_cursor: Some(end.to_string()) }
        } else {
            Paginated::last(results)
        }
    }
}

#[async_trait]
impl ContentApi for FakeApi {
    async fn retrieve_page(&self, page_id: &str) -> Result<Page, ApiError> {
        *self.page_calls.lock().unwrap().entry(page_id.to_string()).or_default() += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.probe_delay.is_zero() {
            tokio::time::sleep(self.probe_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.pages
            .lock()
            .unwrap()
            .get(page_id)
            .cloned()
            .unwrap_or_else(|| Err(ApiError::NotFound(page_id.to_string())))
    }

    async fn list_block_children(&self, block_id: &str, cursor: Option<&str>) -> Result<Paginated<Block>, ApiError> {
        *self.block_calls.lock().unwrap().entry(block_id.to_string()).or_default() += 1;

        let text = self
            .content
            .lock()
            .unwrap()
            .get(block_id)
            .cloned()
            .unwrap_or_else(|| Err(ApiError::NotFound(block_id.to_string())))?;
        let blocks: Vec<Block> = text
            .split('\n')
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(i, line)| Block::paragraph(format!("{block_id}-{i}"), line))
            .collect();
        Ok(self.paginate(&blocks, cursor))
    }

    async fn query_database(&self, database_id: &str, cursor: Option<&str>) -> Result<Paginated<Page>, ApiError> {
        let pages = self
            .databases
            .lock()
            .unwrap()
            .get(database_id)
            .cloned()
            .unwrap_or_else(|| Err(ApiError::NotFound(database_id.to_string())))?;
        Ok(self.paginate(&pages, cursor))
    }

    async fn retrieve_database(&self, database_id: &str) -> Result<Database, ApiError> {
        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        self.schemas
            .lock()
            .unwrap()
            .get(database_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(database_id.to_string()))
    }

    async fn update_database_properties(
        &self, database_id: &str, properties: serde_json::Value,
    ) -> Result<Database, ApiError> {
        self.updates.lock().unwrap().push((database_id.to_string(), properties));
        self.retrieve_database(database_id).await
    }
}

/// Records every notice; can be told to reject one id.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<DeletionNotice>>,
    fail_id: Option<String>,
}

impl RecordingNotifier {
    pub fn failing_on(id: &str) -> Self {
        Self { fail_id: Some(id.to_string()), ..Default::default() }
    }

    pub fn ids(&self) -> Vec<String> {
        self.notices.lock().unwrap().iter().map(|n| n.external_id.clone()).collect()
    }

    pub fn notices(&self) -> Vec<DeletionNotice> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify_deletion(&self, notice: &DeletionNotice) -> Result<(), SyncError> {
        if self.fail_id.as_deref() == Some(notice.external_id.as_str()) {
            return Err(SyncError::Notify("sink unavailable".into()));
        }
        self.notices.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

/// Hands out `handle-1`, `handle-2`, ...
#[derive(Default)]
pub struct CountingMappings {
    pub created: AtomicUsize,
    pub fail: bool,
}

#[async_trait]
impl MappingProvider for CountingMappings {
    async fn create_mapping(&self, _container_id: &str, _mapping_key: &str) -> Result<String, SyncError> {
        if self.fail {
            return Err(SyncError::Mapping("provider down".into()));
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("handle-{n}"))
    }
}

/// Settings with no pauses and small batches.
pub fn test_settings() -> SyncSettings {
    let config = AppConfig { sources: Vec::new(), ..Default::default() };
    SyncSettings {
        batch: BatchConfig { pause: Duration::ZERO, item_timeout: Duration::from_secs(5), ..BatchConfig::from_config(&config) },
        sync_interval: Duration::from_millis(50),
        error_cooldown: Duration::from_millis(50),
        ..SyncSettings::from_config(&config)
    }
}

pub struct Harness {
    pub ctx: Arc<EngineContext>,
    pub db: LocalDb,
    pub api: Arc<FakeApi>,
    pub notifier: Arc<RecordingNotifier>,
    pub mappings: Arc<CountingMappings>,
}

pub async fn harness_with(api: FakeApi, sources: Vec<SourceConfig>) -> Harness {
    let db = LocalDb::open_in_memory().await.unwrap();
    let api = Arc::new(api);
    let notifier = Arc::new(RecordingNotifier::default());
    let mappings = Arc::new(CountingMappings::default());
    let settings = SyncSettings { sources, ..test_settings() };
    let ctx = Arc::new(EngineContext::new(
        api.clone(),
        Arc::new(db.clone()),
        Caches::new(&db, &AppConfig::default()),
        notifier.clone(),
        mappings.clone(),
        settings,
    ));
    Harness { ctx, db, api, notifier, mappings }
}

pub async fn harness() -> Harness {
    harness_with(FakeApi::new(), Vec::new()).await
}
