//! Storage layer
//!
//! Handles Automerge document persistence and SQLite projection.
//!
//! ## Architecture
//!
//! - **Automerge**: Source of truth, stored as binary file
//! - **SQLite**: Read-optimized projection for fast queries
//!
//! When the Automerge document changes, the SQLite database is rebuilt
//! to reflect the new state.

pub mod error;
pub mod persistence;
pub mod projection;
pub mod schema;

pub use error::{StorageError, StorageResult};
pub use persistence::{read_shared_document, write_shared_document, AutomergePersistence};
pub use projection::SqliteProjection;
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
