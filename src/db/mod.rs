//! Database module: clip storage on SQLite.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database
//! - `sqlite.rs`: connection and queries

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::StoredClip;
pub use schema::SQLITE_INIT;
pub use sqlite::{ClipStorage, SqlitePool};
