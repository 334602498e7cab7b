//! Client code for pagesync.
//!
//! This crate provides the content API abstraction, the rate-limited Notion
//! HTTP client, error classification, the retrying decorator, pagination
//! helpers, and the outbound webhook client used for deletion notices.

pub mod api;
pub mod notion;
pub mod pager;
pub mod retry;
pub mod webhook;

pub use api::ContentApi;
pub use notion::{
    ApiError, Block, Database, DatabaseProperty, ErrorClass, NotionClient, NotionConfig, Page, Paginated, PartialUser,
    PropertyValue, SelectOption,
};
pub use pager::{fetch_page_text, query_all_pages};
pub use retry::{RetryPolicy, Retrying};
pub use webhook::{Embed, EmbedField, WebhookClient, WebhookMessage};
