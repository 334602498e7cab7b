//! Locally materialized page records.

pub mod page;
pub mod store;

pub use page::{PageRecord, format_timestamp, is_valid_external_id, parse_timestamp};
pub use store::RecordStore;
