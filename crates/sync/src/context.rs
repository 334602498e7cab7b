//! Shared handles passed explicitly to every engine component.

use std::sync::Arc;

use pagesync_client::ContentApi;
use pagesync_core::{Caches, RecordStore};

use crate::differ::ContentDiffer;
use crate::notify::{MappingProvider, NotificationSink};
use crate::prober::ExistenceProber;
use crate::settings::SyncSettings;

/// Everything the engine touches, wired once at startup.
#[derive(Clone)]
pub struct EngineContext {
    pub api: Arc<dyn ContentApi>,
    pub store: Arc<dyn RecordStore>,
    pub caches: Caches,
    pub notifier: Arc<dyn NotificationSink>,
    pub mappings: Arc<dyn MappingProvider>,
    pub settings: SyncSettings,
}

impl EngineContext {
    pub fn new(
        api: Arc<dyn ContentApi>, store: Arc<dyn RecordStore>, caches: Caches, notifier: Arc<dyn NotificationSink>,
        mappings: Arc<dyn MappingProvider>, settings: SyncSettings,
    ) -> Self {
        Self { api, store, caches, notifier, mappings, settings }
    }

    pub fn prober(&self) -> ExistenceProber {
        ExistenceProber::new(Arc::clone(&self.api))
    }

    pub fn differ(&self) -> ContentDiffer {
        ContentDiffer::new(Arc::clone(&self.api), self.caches.content.clone())
    }
}
