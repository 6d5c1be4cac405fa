//! aisle core library
//!
//! This crate provides the core functionality for aisle, a local-first
//! shopping list: items you buy, the store locations where they are found,
//! and the route order you walk through the store.
//!
//! # Architecture
//!
//! - **Automerge**: source of truth for data, enables CRDT-based sync
//! - **SQLite**: read projection for counts, sorted lists and lookups
//!
//! Every committed change to the document is saved and re-projected.
//!
//! # Quick Start
//!
//! ```text
//! let mut list = ShoppingList::open(Config::load()?)?;
//!
//! let dairy = list.add_location("Dairy", None)?;
//! let milk = list.add_item("Milk", Some(dairy.id))?;
//! list.purchase_item(milk.id)?;
//!
//! for section in list.sections(DisplayType::ByLocation)? {
//!     println!("{}", section.title);
//! }
//! ```
//!
//! # Modules
//!
//! - `list`: Shopping list facade (main entry point)
//! - `store`: Document plus projection, with transactions
//! - `models`: Items, locations and colors
//! - `document`: Automerge document handling
//! - `storage`: Automerge persistence and SQLite projection
//! - `archive`: JSON archive import/export format
//! - `reconcile`: Unknown Location resolution and archive merging
//! - `sections`: Grouping items for display
//! - `config`: Application configuration

pub mod archive;
pub mod config;
pub mod document;
pub mod error;
pub mod list;
pub mod models;
pub mod query;
pub mod reconcile;
pub mod sections;
pub mod storage;
pub mod store;

pub use archive::{ArchiveError, ItemRecord, LocationRecord};
pub use config::{Config, ConfigError};
pub use document::{DocumentError, ShoppingDocument};
pub use error::{Error, ErrorKind, Rejection, Result};
pub use list::{ListEvent, ShoppingList, SyncReport};
pub use models::{Color, Item, Location, UNKNOWN_LOCATION_NAME, UNKNOWN_POSITION};
pub use query::{ItemFilter, ItemSort};
pub use reconcile::{ImportSummary, SentinelOutcome};
pub use sections::{DisplayType, ItemSection};
pub use storage::{AutomergePersistence, SqliteProjection, StorageError};
pub use store::Store;
