//! SQLite-backed local database.
//!
//! One database file holds both the TTL cache namespaces and the
//! materialized page records. Access goes through tokio-rusqlite.

pub mod connection;

pub use connection::LocalDb;
