//! Shopping list facade
//!
//! [`ShoppingList`] is the surface the CLI (or any other front end) talks
//! to. It wraps a [`Store`] and adds the bookkeeping the store itself does
//! not: purchases stamp their date, deleting a location moves its items to
//! the Unknown Location, reordering keeps positions dense, and every change
//! that affects what is on the list is announced on an event channel.
//!
//! ## Events
//!
//! ```ignore
//! let mut list = ShoppingList::open(config)?;
//! let mut events = list.take_events().unwrap();
//!
//! list.purchase_item(milk.id)?;
//! assert_eq!(events.try_recv()?, ListEvent::OnListCountChanged);
//! let remaining = list.on_list_count()?;
//! ```
//!
//! Events carry no payload; subscribers re-query what they display.

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::archive::{self, LocationRecord};
use crate::config::Config;
use crate::document::ShoppingDocument;
use crate::error::{Rejection, Result};
use crate::models::{Color, Item, Location};
use crate::query::{ItemFilter, ItemSort};
use crate::reconcile::{self, ImportSummary, SentinelOutcome};
use crate::sections::{self, DisplayType, ItemSection};
use crate::storage::{read_shared_document, write_shared_document};
use crate::store::{check_name, require_item, require_location, Store};

/// Change notifications emitted by [`ShoppingList`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEvent {
    /// The number of items on the list may have changed
    OnListCountChanged,
    /// Locations were added, removed, renamed or reordered
    LocationsChanged,
}

/// Result of [`ShoppingList::sync_with_file`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    /// Whether the shared file had to be created
    pub created_shared: bool,
    /// Duplicate Unknown Locations folded in after merging
    pub sentinels_removed: usize,
    /// Items moved onto the surviving Unknown Location
    pub items_moved: usize,
}

/// The shopping list: items, locations and the rules that bind them
pub struct ShoppingList {
    store: Store,
    event_tx: mpsc::UnboundedSender<ListEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<ListEvent>>,
}

impl ShoppingList {
    /// Open the list stored under `config.data_dir`
    pub fn open(config: Config) -> Result<Self> {
        Ok(Self::with_store(Store::open(config)?))
    }

    /// Wrap an already opened store
    pub fn with_store(store: Store) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            store,
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Take the event receiver (can only be called once)
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<ListEvent>> {
        self.event_rx.take()
    }

    /// The underlying store, for read-only queries
    pub fn store(&self) -> &Store {
        &self.store
    }

    // ==================== Unknown Location ====================

    /// The Unknown Location, created or deduplicated as needed
    pub fn unknown_location(&mut self) -> Result<Location> {
        let outcome = self.store.transact(reconcile::resolve_unknown_locations)?;
        self.announce_resolution(&outcome);
        Ok(outcome.sentinel)
    }

    // ==================== Items ====================

    /// Create an item on the list
    ///
    /// Without a location the item goes to the Unknown Location.
    pub fn add_item(&mut self, name: &str, location_id: Option<Uuid>) -> Result<Item> {
        self.add_item_with_quantity(name, location_id, 1)
    }

    /// Like [`add_item`](Self::add_item), with a starting quantity
    ///
    /// The item is written in a single commit.
    pub fn add_item_with_quantity(
        &mut self,
        name: &str,
        location_id: Option<Uuid>,
        quantity: u32,
    ) -> Result<Item> {
        check_name(name)?;
        if quantity == 0 {
            return Err(Rejection::InvalidQuantity.into());
        }
        let location_id = match location_id {
            Some(id) => id,
            None => self.unknown_location()?.id,
        };

        let mut item = Item::new(name.trim(), location_id);
        item.quantity = quantity;
        self.store.insert_item(&item)?;
        self.emit(ListEvent::OnListCountChanged);
        Ok(item)
    }

    /// Save edits to an item
    pub fn update_item(&mut self, item: &Item) -> Result<()> {
        self.store.update_item(item)?;
        self.emit(ListEvent::OnListCountChanged);
        Ok(())
    }

    /// Delete an item
    pub fn delete_item(&mut self, id: Uuid) -> Result<()> {
        self.store.delete_item(id)?;
        self.emit(ListEvent::OnListCountChanged);
        Ok(())
    }

    /// Look up an item
    pub fn item(&self, id: Uuid) -> Result<Option<Item>> {
        self.store.fetch_item(Some(id))
    }

    /// Items matching a filter, in the requested order
    pub fn items(&self, filter: ItemFilter, sort: ItemSort) -> Result<Vec<Item>> {
        self.store.items(filter, sort)
    }

    /// Take an item off the list and record the purchase
    pub fn purchase_item(&mut self, id: Uuid) -> Result<Item> {
        let item = self.edit_item(id, Item::mark_as_purchased)?;
        self.emit(ListEvent::OnListCountChanged);
        Ok(item)
    }

    /// Put an item back on the list; its purchase date is kept
    pub fn move_to_list(&mut self, id: Uuid) -> Result<Item> {
        let item = self.edit_item(id, Item::move_to_list)?;
        self.emit(ListEvent::OnListCountChanged);
        Ok(item)
    }

    /// Record whether an item was found in the store
    pub fn set_available(&mut self, id: Uuid, available: bool) -> Result<Item> {
        self.edit_item(id, |item| item.is_available = available)
    }

    /// Purchase everything on the list; returns how many items changed
    pub fn mark_all_purchased(&mut self) -> Result<usize> {
        let count = self.edit_on_list(Item::mark_as_purchased)?;
        self.emit(ListEvent::OnListCountChanged);
        Ok(count)
    }

    /// Mark everything on the list as available again
    pub fn mark_all_available(&mut self) -> Result<usize> {
        let count = self.edit_on_list(|item| item.is_available = true)?;
        self.emit(ListEvent::OnListCountChanged);
        Ok(count)
    }

    /// Move an item to another location
    pub fn reassign_location(&mut self, item_id: Uuid, location_id: Uuid) -> Result<Item> {
        let item = self.store.transact(|doc| {
            let mut item = require_item(doc, item_id)?;
            require_location(doc, location_id)?;
            doc.set_item_location(item_id, location_id)?;
            item.location_id = location_id;
            Ok(item)
        })?;
        self.emit(ListEvent::LocationsChanged);
        Ok(item)
    }

    /// Number of items on the list
    pub fn on_list_count(&self) -> Result<usize> {
        self.store.count_items(ItemFilter::OnList)
    }

    // ==================== Locations ====================

    /// Create a location at the end of the route
    pub fn add_location(&mut self, name: &str, color: Option<Color>) -> Result<Location> {
        check_name(name)?;
        let location = self.store.transact(|doc| {
            let mut location = Location::new(name.trim(), reconcile::next_position(doc)?);
            if let Some(color) = color {
                location.set_color(color);
            }
            doc.add_location(&location)?;
            Ok(location)
        })?;
        self.emit(ListEvent::LocationsChanged);
        Ok(location)
    }

    /// Save a location's name and color
    ///
    /// The stored position is kept; use [`reorder_locations`](Self::reorder_locations)
    /// to move a location along the route.
    pub fn update_location(&mut self, location: &Location) -> Result<Location> {
        check_name(&location.name)?;
        let updated = self.store.transact(|doc| {
            let mut stored = require_location(doc, location.id)?;
            stored.name = location.name.trim().to_string();
            stored.color = location.color;
            doc.update_location(&stored)?;
            Ok(stored)
        })?;
        self.emit(ListEvent::LocationsChanged);
        Ok(updated)
    }

    /// Delete a location, moving its items to the Unknown Location
    ///
    /// Returns how many items moved. The Unknown Location itself cannot be
    /// deleted.
    pub fn delete_location(&mut self, id: Uuid) -> Result<usize> {
        let moved = self.store.transact(|doc| {
            let location = require_location(doc, id)?;
            if location.is_unknown() {
                return Err(Rejection::SentinelDeletion.into());
            }

            let sentinel = reconcile::resolve_unknown_locations(doc)?.sentinel;
            let items = doc.items_at(id)?;
            for item in &items {
                doc.set_item_location(item.id, sentinel.id)?;
            }
            doc.delete_location(id)?;
            Ok(items.len())
        })?;

        tracing::info!(location = %id, moved, "deleted location");
        self.emit(ListEvent::LocationsChanged);
        Ok(moved)
    }

    /// Look up a location
    pub fn location(&self, id: Uuid) -> Result<Option<Location>> {
        self.store.fetch_location(Some(id))
    }

    /// All locations in route order, the Unknown Location last
    pub fn locations(&self) -> Result<Vec<Location>> {
        self.store.locations()
    }

    /// Items owned by a location, name-sorted
    pub fn items_at(&self, location_id: Uuid) -> Result<Vec<Item>> {
        self.store.items_at(location_id)
    }

    /// Rewrite the route order
    ///
    /// `order` must name every location except the Unknown Location exactly
    /// once. Positions become 0..N-1 in that order.
    pub fn reorder_locations(&mut self, order: &[Uuid]) -> Result<()> {
        self.store.transact(|doc| {
            let expected: HashSet<Uuid> = doc
                .get_all_locations()?
                .into_iter()
                .filter(|l| !l.is_unknown())
                .map(|l| l.id)
                .collect();
            let given: HashSet<Uuid> = order.iter().copied().collect();
            if given.len() != order.len() || given != expected {
                return Err(Rejection::InvalidReorder.into());
            }

            for (position, id) in order.iter().enumerate() {
                let position =
                    i32::try_from(position).map_err(|_| Rejection::InvalidReorder)?;
                doc.set_location_position(*id, position)?;
            }
            Ok(())
        })?;
        self.emit(ListEvent::LocationsChanged);
        Ok(())
    }

    // ==================== Views ====================

    /// The active list broken into sections
    pub fn sections(&self, display: DisplayType) -> Result<Vec<ItemSection>> {
        let locations = self.store.locations()?;
        let on_list = self.store.items(ItemFilter::OnList, ItemSort::Name)?;
        Ok(sections::list_sections(display, &locations, on_list))
    }

    /// Every item, optionally narrowed by a name search
    pub fn history(&self, display: DisplayType, search: Option<&str>) -> Result<Vec<ItemSection>> {
        let locations = self.store.locations()?;
        let items = self.store.items(ItemFilter::All, ItemSort::Name)?;
        Ok(sections::history_sections(display, &locations, items, search))
    }

    /// The list by location as plain text, ready to share
    pub fn share_text(&self) -> Result<String> {
        Ok(sections::share_text(&self.sections(DisplayType::ByLocation)?))
    }

    // ==================== Archive ====================

    /// Snapshot the whole list as archive records
    pub fn archive_records(&self) -> Result<Vec<LocationRecord>> {
        let locations = self.store.locations()?;
        let items = self.store.items(ItemFilter::All, ItemSort::Name)?;
        Ok(archive::encode(&locations, &items))
    }

    /// Write the whole list to a JSON archive; returns the location count
    pub async fn export_archive(&self, path: &Path) -> Result<usize> {
        let records = self.archive_records()?;
        archive::write_archive(path, &records).await?;
        tracing::info!(path = %path.display(), locations = records.len(), "exported archive");
        Ok(records.len())
    }

    /// Merge a JSON archive file into the list
    ///
    /// The file is decoded and validated before anything changes, and the
    /// merge is applied as one unit. Events follow after the configured
    /// settle delay.
    pub async fn import_archive(&mut self, path: &Path) -> Result<ImportSummary> {
        let records = archive::read_archive(path).await?;
        let summary = self.merge_records(&records)?;

        let delay = self.store.config().settle_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.announce_import();
        Ok(summary)
    }

    /// Merge archive bytes into the list
    pub fn import_bytes(&mut self, bytes: &[u8]) -> Result<ImportSummary> {
        let records = archive::decode(bytes)?;
        let summary = self.merge_records(&records)?;
        self.announce_import();
        Ok(summary)
    }

    fn merge_records(&mut self, records: &[LocationRecord]) -> Result<ImportSummary> {
        self.store
            .transact(|doc| reconcile::import_records(doc, records))
    }

    fn announce_import(&self) {
        self.emit(ListEvent::LocationsChanged);
        self.emit(ListEvent::OnListCountChanged);
    }

    // ==================== Sync ====================

    /// Take in changes from another replica
    ///
    /// Duplicate Unknown Locations the merge brings in are resolved
    /// straight away.
    pub fn merge_remote(&mut self, peer: &mut ShoppingDocument) -> Result<SentinelOutcome> {
        self.store.merge_document(peer)?;
        let outcome = self.store.transact(reconcile::resolve_unknown_locations)?;

        self.emit(ListEvent::LocationsChanged);
        self.emit(ListEvent::OnListCountChanged);
        Ok(outcome)
    }

    /// Two-way sync through a shared document file
    ///
    /// Merges the file into the local list (if it exists), resolves, then
    /// writes the merged document back so the other side picks up our
    /// changes on its next sync.
    pub async fn sync_with_file(&mut self, path: &Path) -> Result<SyncReport> {
        let shared = read_shared_document(path).await?;
        let created_shared = shared.is_none();

        let outcome = match shared {
            Some(mut peer) => self.merge_remote(&mut peer)?,
            None => {
                let outcome = self.store.transact(reconcile::resolve_unknown_locations)?;
                self.announce_resolution(&outcome);
                outcome
            }
        };

        write_shared_document(path, self.store.document_mut()).await?;
        tracing::info!(
            path = %path.display(),
            created_shared,
            sentinels_removed = outcome.removed.len(),
            "synced with shared document"
        );

        Ok(SyncReport {
            created_shared,
            sentinels_removed: outcome.removed.len(),
            items_moved: outcome.items_moved,
        })
    }

    // ==================== Private helpers ====================

    fn edit_item(&mut self, id: Uuid, edit: impl FnOnce(&mut Item)) -> Result<Item> {
        self.store.transact(|doc| {
            let mut item = require_item(doc, id)?;
            edit(&mut item);
            doc.update_item(&item)?;
            Ok(item)
        })
    }

    fn edit_on_list(&mut self, edit: impl Fn(&mut Item)) -> Result<usize> {
        self.store.transact(|doc| {
            let mut count = 0;
            for mut item in doc.get_all_items()?.into_iter().filter(|i| i.on_list) {
                edit(&mut item);
                doc.update_item(&item)?;
                count += 1;
            }
            Ok(count)
        })
    }

    fn announce_resolution(&self, outcome: &SentinelOutcome) {
        if outcome.changed() {
            self.emit(ListEvent::LocationsChanged);
        }
        if outcome.items_moved > 0 {
            self.emit(ListEvent::OnListCountChanged);
        }
    }

    fn emit(&self, event: ListEvent) {
        let _ = self.event_tx.send(event);
    }
}
