//! Content API request bodies.

use serde::Serialize;

/// Largest page size the API accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Body of `POST /databases/{id}/query`.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<&'a str>,
    pub page_size: u32,
}

impl<'a> DatabaseQuery<'a> {
    pub fn starting_at(cursor: Option<&'a str>) -> Self {
        Self { start_cursor: cursor, page_size: MAX_PAGE_SIZE }
    }
}

/// Body of `PATCH /databases/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateDatabase {
    pub properties: serde_json::Value,
}
