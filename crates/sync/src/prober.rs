//! Existence prober.
//!
//! Only a definitive answer from the remote counts as deletion. Anything
//! ambiguous is reported as `Unknown` and treated as still existing, so a
//! flaky network can never delete local data.

use std::sync::Arc;

use pagesync_client::ContentApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    Exists,
    /// Archived, trashed, not found, or no longer shared with us.
    Gone,
    /// The probe failed for another reason.
    Unknown,
}

#[derive(Clone)]
pub struct ExistenceProber {
    api: Arc<dyn ContentApi>,
}

impl ExistenceProber {
    pub fn new(api: Arc<dyn ContentApi>) -> Self {
        Self { api }
    }

    pub async fn probe(&self, external_id: &str) -> Existence {
        match self.api.retrieve_page(external_id).await {
            Ok(page) if page.is_removed() => {
                tracing::debug!(external_id, archived = page.archived, in_trash = page.in_trash, "page removed");
                Existence::Gone
            }
            Ok(_) => Existence::Exists,
            Err(e) if e.is_gone() => {
                tracing::debug!(external_id, error = %e, "page not reachable");
                Existence::Gone
            }
            Err(e) => {
                tracing::warn!(external_id, error = %e, "existence probe inconclusive; assuming present");
                Existence::Unknown
            }
        }
    }

    /// `false` only when the remote definitively says the record is gone.
    pub async fn exists(&self, external_id: &str) -> bool {
        self.probe(external_id).await != Existence::Gone
    }
}
