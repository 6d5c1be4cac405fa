//! Unified storage interface
//!
//! The `Store` manages the shopping document and coordinates between:
//! - Automerge (source of truth)
//! - SQLite (read-optimized queries)
//!
//! Every mutation goes through [`Store::transact`]: the closure runs against
//! a staged copy of the document, and only if it succeeds are the changes
//! merged back, saved and projected. A failed closure leaves both the
//! in-memory document and the files on disk untouched.
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = Store::open(Config::load()?)?;
//!
//! let dairy = Location::new("Dairy", 0);
//! store.insert_location(&dairy)?;
//! store.insert_item(&Item::new("Milk", dairy.id))?;
//!
//! // Queries use SQLite
//! let on_list = store.count_items(ItemFilter::OnList)?;
//! ```

use uuid::Uuid;

use crate::config::Config;
use crate::document::ShoppingDocument;
use crate::error::{Error, Rejection, Result};
use crate::models::{Item, Location};
use crate::query::{ItemFilter, ItemSort};
use crate::storage::{AutomergePersistence, SqliteProjection};

/// Unified storage interface for aisle
///
/// Manages the Automerge document and keeps SQLite in sync.
pub struct Store {
    /// The shopping document
    doc: ShoppingDocument,
    /// Automerge persistence handler
    persistence: AutomergePersistence,
    /// SQLite projection for queries
    projection: SqliteProjection,
    /// Configuration
    config: Config,
}

impl Store {
    /// Open the store, creating a new document if none exists
    ///
    /// The SQLite projection is rebuilt on every open so it can never lag
    /// behind the document.
    pub fn open(config: Config) -> Result<Self> {
        let persistence = AutomergePersistence::new(config.clone());
        let mut projection = SqliteProjection::open(&config)?;

        let doc = persistence.load_or_create()?;
        projection.project_full(&doc)?;

        Ok(Self {
            doc,
            persistence,
            projection,
            config,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // ==================== Item Operations ====================

    /// Commit a new item
    ///
    /// The item needs a name and an existing owning location.
    pub fn insert_item(&mut self, item: &Item) -> Result<()> {
        self.transact(|doc| {
            check_item(doc, item)?;
            doc.add_item(item)?;
            Ok(())
        })
    }

    /// Update an existing item
    pub fn update_item(&mut self, item: &Item) -> Result<()> {
        self.transact(|doc| {
            require_item(doc, item.id)?;
            check_item(doc, item)?;
            doc.update_item(item)?;
            Ok(())
        })
    }

    /// Delete an item
    pub fn delete_item(&mut self, id: Uuid) -> Result<()> {
        self.transact(|doc| {
            require_item(doc, id)?;
            doc.delete_item(id)?;
            Ok(())
        })
    }

    /// Point lookup; `None` or an unknown id yields `Ok(None)`
    pub fn fetch_item(&self, id: Option<Uuid>) -> Result<Option<Item>> {
        match id {
            Some(id) => Ok(self.projection.get_item(id)?),
            None => Ok(None),
        }
    }

    /// Count items matching a filter
    pub fn count_items(&self, filter: ItemFilter) -> Result<usize> {
        Ok(self.projection.count_items(filter)?)
    }

    /// Items matching a filter, in the requested order
    pub fn items(&self, filter: ItemFilter, sort: ItemSort) -> Result<Vec<Item>> {
        Ok(self.projection.items(filter, sort)?)
    }

    /// Items owned by a location, name-sorted
    pub fn items_at(&self, location_id: Uuid) -> Result<Vec<Item>> {
        Ok(self.projection.items_at(location_id)?)
    }

    // ==================== Location Operations ====================

    /// Commit a new location
    pub fn insert_location(&mut self, location: &Location) -> Result<()> {
        self.transact(|doc| {
            check_name(&location.name)?;
            doc.add_location(location)?;
            Ok(())
        })
    }

    /// Update an existing location
    pub fn update_location(&mut self, location: &Location) -> Result<()> {
        self.transact(|doc| {
            require_location(doc, location.id)?;
            check_name(&location.name)?;
            doc.update_location(location)?;
            Ok(())
        })
    }

    /// Delete a location that no longer owns any items
    ///
    /// Reassigning the items first is the caller's job; the store refuses
    /// rather than cascade or orphan them.
    pub fn delete_location(&mut self, id: Uuid) -> Result<()> {
        self.transact(|doc| {
            require_location(doc, id)?;
            if !doc.items_at(id)?.is_empty() {
                return Err(Rejection::LocationInUse(id).into());
            }
            doc.delete_location(id)?;
            Ok(())
        })
    }

    /// Point lookup; `None` or an unknown id yields `Ok(None)`
    pub fn fetch_location(&self, id: Option<Uuid>) -> Result<Option<Location>> {
        match id {
            Some(id) => Ok(self.projection.get_location(id)?),
            None => Ok(None),
        }
    }

    /// Count all locations
    pub fn count_locations(&self) -> Result<usize> {
        Ok(self.projection.count_locations()?)
    }

    /// All locations in route order
    pub fn locations(&self) -> Result<Vec<Location>> {
        Ok(self.projection.locations()?)
    }

    /// Highest position held by a user-defined location
    pub fn last_user_position(&self) -> Result<Option<i32>> {
        Ok(self.projection.last_user_position()?)
    }

    // ==================== Advanced ====================

    /// Get access to the underlying Automerge document
    pub fn document(&self) -> &ShoppingDocument {
        &self.doc
    }

    /// Run a batch of changes as one unit
    ///
    /// `f` works on a staged copy of the document. On `Ok` the copy is
    /// merged back, saved and projected; on `Err` it is discarded. A batch
    /// that changed nothing skips the save.
    pub fn transact<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut ShoppingDocument) -> Result<T>,
    {
        let before = self.doc.heads();
        let mut staged = self.doc.stage();
        let out = f(&mut staged)?;

        self.doc.merge(&mut staged)?;
        if self.doc.heads() != before {
            self.save_and_project()?;
        }
        Ok(out)
    }

    /// Merge a peer replica's document, then save and project
    pub fn merge_document(&mut self, peer: &mut ShoppingDocument) -> Result<()> {
        self.doc.merge(peer)?;
        self.save_and_project()?;
        tracing::info!("merged peer document");
        Ok(())
    }

    /// Save the document and update SQLite projection
    pub fn save_and_project(&mut self) -> Result<()> {
        self.persistence.save(&mut self.doc)?;
        self.projection.project_full(&self.doc)?;
        tracing::debug!("committed document");
        Ok(())
    }

    /// Mutable access for saving a copy elsewhere (e.g. a shared sync file)
    pub(crate) fn document_mut(&mut self) -> &mut ShoppingDocument {
        &mut self.doc
    }
}

// ==================== Checks shared with transact closures ====================

/// Reject blank names
pub(crate) fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Rejection::EmptyName.into());
    }
    Ok(())
}

/// An item may only be committed with a name, a positive quantity and an
/// existing location
pub(crate) fn check_item(doc: &ShoppingDocument, item: &Item) -> Result<()> {
    if !item.can_be_saved() {
        return Err(Rejection::EmptyName.into());
    }
    if item.quantity == 0 {
        return Err(Rejection::InvalidQuantity.into());
    }
    require_location(doc, item.location_id)?;
    Ok(())
}

pub(crate) fn require_item(doc: &ShoppingDocument, id: Uuid) -> Result<Item> {
    doc.get_item(id)?.ok_or(Error::ItemNotFound(id))
}

pub(crate) fn require_location(doc: &ShoppingDocument, id: Uuid) -> Result<Location> {
    doc.get_location(id)?.ok_or(Error::LocationNotFound(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn test_store(temp_dir: &TempDir) -> Store {
        Store::open(Config::with_data_dir(temp_dir.path())).unwrap()
    }

    fn store_with_dairy(temp_dir: &TempDir) -> (Store, Location) {
        let mut store = test_store(temp_dir);
        let dairy = Location::new("Dairy", 0);
        store.insert_location(&dairy).unwrap();
        (store, dairy)
    }

    #[test]
    fn test_open_creates_new_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);

        assert_eq!(store.count_items(ItemFilter::All).unwrap(), 0);
        assert_eq!(store.count_locations().unwrap(), 0);
        assert!(temp_dir.path().join("shopping.automerge").exists());
        assert!(temp_dir.path().join("shopping.db").exists());
    }

    #[test]
    fn test_insert_and_fetch_item() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, dairy) = store_with_dairy(&temp_dir);

        let item = Item::new("Milk", dairy.id);
        store.insert_item(&item).unwrap();

        assert_eq!(store.fetch_item(Some(item.id)).unwrap(), Some(item.clone()));
        assert_eq!(store.items_at(dairy.id).unwrap(), vec![item]);
        assert_eq!(store.count_items(ItemFilter::OnList).unwrap(), 1);
    }

    #[test]
    fn test_fetch_tolerates_absent_ids() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);

        assert!(store.fetch_item(None).unwrap().is_none());
        assert!(store.fetch_location(None).unwrap().is_none());
        assert!(store.fetch_item(Some(Uuid::new_v4())).unwrap().is_none());
        assert!(store.fetch_location(Some(Uuid::new_v4())).unwrap().is_none());
    }

    #[test]
    fn test_insert_item_requires_name() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, dairy) = store_with_dairy(&temp_dir);

        let err = store.insert_item(&Item::new("  ", dairy.id)).unwrap_err();
        assert!(matches!(err, Error::Rejected(Rejection::EmptyName)));
        assert_eq!(store.count_items(ItemFilter::All).unwrap(), 0);
    }

    #[test]
    fn test_quantity_must_be_positive() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, dairy) = store_with_dairy(&temp_dir);

        let mut milk = Item::new("Milk", dairy.id);
        milk.quantity = 0;
        let err = store.insert_item(&milk).unwrap_err();
        assert!(matches!(err, Error::Rejected(Rejection::InvalidQuantity)));
        assert_eq!(store.count_items(ItemFilter::All).unwrap(), 0);

        milk.quantity = 1;
        store.insert_item(&milk).unwrap();
        milk.quantity = 0;
        let err = store.update_item(&milk).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Rejected);
        let stored = store.fetch_item(Some(milk.id)).unwrap().unwrap();
        assert_eq!(stored.quantity, 1);
    }

    #[test]
    fn test_insert_item_requires_existing_location() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = test_store(&temp_dir);

        let err = store
            .insert_item(&Item::new("Milk", Uuid::new_v4()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_update_item() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, dairy) = store_with_dairy(&temp_dir);

        let mut item = Item::new("Milk", dairy.id);
        store.insert_item(&item).unwrap();

        item.quantity = 2;
        item.name = "Oat Milk".to_string();
        store.update_item(&item).unwrap();

        let fetched = store.fetch_item(Some(item.id)).unwrap().unwrap();
        assert_eq!(fetched.quantity, 2);
        assert_eq!(fetched.name, "Oat Milk");
    }

    #[test]
    fn test_update_missing_item_fails() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, dairy) = store_with_dairy(&temp_dir);

        let err = store.update_item(&Item::new("Ghost", dairy.id)).unwrap_err();
        assert!(matches!(err, Error::ItemNotFound(_)));
    }

    #[test]
    fn test_delete_item() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, dairy) = store_with_dairy(&temp_dir);

        let item = Item::new("Milk", dairy.id);
        store.insert_item(&item).unwrap();
        store.delete_item(item.id).unwrap();

        assert!(store.fetch_item(Some(item.id)).unwrap().is_none());
        assert!(matches!(
            store.delete_item(item.id),
            Err(Error::ItemNotFound(_))
        ));
    }

    #[test]
    fn test_delete_location_in_use_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, dairy) = store_with_dairy(&temp_dir);
        store.insert_item(&Item::new("Milk", dairy.id)).unwrap();

        let err = store.delete_location(dairy.id).unwrap_err();
        assert!(matches!(err, Error::Rejected(Rejection::LocationInUse(id)) if id == dairy.id));
        assert_eq!(store.count_locations().unwrap(), 1);
    }

    #[test]
    fn test_delete_empty_location() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, dairy) = store_with_dairy(&temp_dir);

        store.delete_location(dairy.id).unwrap();
        assert_eq!(store.count_locations().unwrap(), 0);
    }

    #[test]
    fn test_locations_and_last_user_position() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, dairy) = store_with_dairy(&temp_dir);
        let unknown = Location::unknown();
        let bakery = Location::new("Bakery", 3);
        store.insert_location(&unknown).unwrap();
        store.insert_location(&bakery).unwrap();

        let ids: Vec<_> = store.locations().unwrap().iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![dairy.id, bakery.id, unknown.id]);
        assert_eq!(store.last_user_position().unwrap(), Some(3));
    }

    #[test]
    fn test_transact_discards_failed_batch() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, dairy) = store_with_dairy(&temp_dir);

        let result: Result<()> = store.transact(|doc| {
            doc.add_item(&Item::new("Milk", dairy.id))?;
            Err(Rejection::InvalidReorder.into())
        });
        assert!(result.is_err());
        assert!(store.document().get_all_items().unwrap().is_empty());

        // Nothing reached disk either
        drop(store);
        let reopened = test_store(&temp_dir);
        assert_eq!(reopened.count_items(ItemFilter::All).unwrap(), 0);
    }

    #[test]
    fn test_persistence_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let item = {
            let (mut store, dairy) = store_with_dairy(&temp_dir);
            let item = Item::new("Butter", dairy.id);
            store.insert_item(&item).unwrap();
            item
        };

        let store = test_store(&temp_dir);
        assert_eq!(store.fetch_item(Some(item.id)).unwrap(), Some(item));
    }

    #[test]
    fn test_merge_document_from_peer() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = test_store(&temp_dir);

        let mut peer = ShoppingDocument::new();
        let deli = Location::new("Deli", 0);
        peer.add_location(&deli).unwrap();

        store.merge_document(&mut peer).unwrap();
        assert_eq!(store.fetch_location(Some(deli.id)).unwrap(), Some(deli));
    }
}
