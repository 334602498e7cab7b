//! The content API seam.
//!
//! Everything above the HTTP layer talks to `dyn ContentApi`, so the sync
//! engine can run against the real client, the retrying decorator, or a
//! scripted fake in tests.

use std::sync::Arc;

use async_trait::async_trait;

use crate::notion::{ApiError, Block, Database, Page, Paginated};

/// Operations the engine needs from the remote content source.
#[async_trait]
pub trait ContentApi: Send + Sync {
    async fn retrieve_page(&self, page_id: &str) -> Result<Page, ApiError>;

    /// One page of a block's children, starting at `cursor`.
    async fn list_block_children(&self, block_id: &str, cursor: Option<&str>) -> Result<Paginated<Block>, ApiError>;

    /// One page of a database query, starting at `cursor`.
    async fn query_database(&self, database_id: &str, cursor: Option<&str>) -> Result<Paginated<Page>, ApiError>;

    async fn retrieve_database(&self, database_id: &str) -> Result<Database, ApiError>;

    /// Patch property definitions of a database. `properties` is sent as-is.
    async fn update_database_properties(
        &self, database_id: &str, properties: serde_json::Value,
    ) -> Result<Database, ApiError>;
}

#[async_trait]
impl<A: ContentApi + ?Sized> ContentApi for Arc<A> {
    async fn retrieve_page(&self, page_id: &str) -> Result<Page, ApiError> {
        (**self).retrieve_page(page_id).await
    }

    async fn list_block_children(&self, block_id: &str, cursor: Option<&str>) -> Result<Paginated<Block>, ApiError> {
        (**self).list_block_children(block_id, cursor).await
    }

    async fn query_database(&self, database_id: &str, cursor: Option<&str>) -> Result<Paginated<Page>, ApiError> {
        (**self).query_database(database_id, cursor).await
    }

    async fn retrieve_database(&self, database_id: &str) -> Result<Database, ApiError> {
        (**self).retrieve_database(database_id).await
    }

    async fn update_database_properties(
        &self, database_id: &str, properties: serde_json::Value,
    ) -> Result<Database, ApiError> {
        (**self).update_database_properties(database_id, properties).await
    }
}
