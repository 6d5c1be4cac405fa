//! Automerge document handling
//!
//! This module provides the integration between our domain models (Item,
//! Location) and Automerge documents. It handles serialization to/from
//! Automerge format.
//!
//! ## Layout
//!
//! ```text
//! ROOT
//! ├── schema_version: u64
//! ├── locations: { <uuid>: { id, name, position, red, green, blue, opacity } }
//! └── items:     { <uuid>: { id, name, quantity, on_list, is_available,
//!                            last_purchased?, location_id } }
//! ```
//!
//! Every document begins with the same genesis change, written by a fixed
//! actor at a fixed time. Two devices that each create a fresh document
//! therefore share the `locations` and `items` map objects, and merging them
//! unions their entries instead of letting one root map shadow the other.

use automerge::transaction::{CommitOptions, Transactable};
use automerge::{
    ActorId, AutoCommit, ChangeHash, ObjId, ObjType, ReadDoc, ScalarValue, Value, ROOT,
};
use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Color, Item, Location, UNKNOWN_POSITION};

/// Errors that can occur during document operations
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Automerge error: {0}")]
    Automerge(#[from] automerge::AutomergeError),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field type for {0}")]
    InvalidType(String),

    #[error("Invalid UUID: {0}")]
    InvalidUuid(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),
}

/// Keys used in the Automerge document structure
mod keys {
    pub const LOCATIONS: &str = "locations";
    pub const ITEMS: &str = "items";
    pub const SCHEMA_VERSION: &str = "schema_version";

    // Shared fields
    pub const ID: &str = "id";
    pub const NAME: &str = "name";

    // Location fields
    pub const POSITION: &str = "position";
    pub const RED: &str = "red";
    pub const GREEN: &str = "green";
    pub const BLUE: &str = "blue";
    pub const OPACITY: &str = "opacity";

    // Item fields
    pub const QUANTITY: &str = "quantity";
    pub const ON_LIST: &str = "on_list";
    pub const IS_AVAILABLE: &str = "is_available";
    pub const LAST_PURCHASED: &str = "last_purchased";
    pub const LOCATION_ID: &str = "location_id";
}

/// Current schema version
pub const CURRENT_SCHEMA_VERSION: u64 = 1;

/// Actor that writes the genesis change of every document
const GENESIS_ACTOR: &[u8] = b"aisle-genesis";

/// A shopping list document backed by Automerge
pub struct ShoppingDocument {
    doc: AutoCommit,
}

impl ShoppingDocument {
    /// Create a new empty document
    pub fn new() -> Self {
        let mut doc = AutoCommit::new().with_actor(ActorId::from(GENESIS_ACTOR));

        // Initialize document structure
        doc.put(ROOT, keys::SCHEMA_VERSION, CURRENT_SCHEMA_VERSION)
            .expect("Failed to set schema version");
        doc.put_object(ROOT, keys::LOCATIONS, ObjType::Map)
            .expect("Failed to create locations map");
        doc.put_object(ROOT, keys::ITEMS, ObjType::Map)
            .expect("Failed to create items map");
        doc.commit_with(CommitOptions::default().with_time(0));

        doc.set_actor(ActorId::random());
        Self { doc }
    }

    /// Load a document from Automerge bytes
    pub fn load(bytes: &[u8]) -> Result<Self, DocumentError> {
        let doc = AutoCommit::load(bytes)?;
        let loaded = Self { doc };

        // Reject anything that doesn't look like one of our documents
        loaded.map_id(keys::LOCATIONS)?;
        loaded.map_id(keys::ITEMS)?;

        Ok(loaded)
    }

    /// Save the document to bytes
    pub fn save(&mut self) -> Vec<u8> {
        self.doc.save()
    }

    /// Fork the document as an independent replica with its own actor
    pub fn fork(&mut self) -> Self {
        Self {
            doc: self.doc.fork(),
        }
    }

    /// Fork under the same actor, for staging a batch of changes
    ///
    /// The parent must not change until the staged copy is merged back
    /// or dropped, otherwise both would claim the same sequence numbers.
    pub fn stage(&mut self) -> Self {
        let actor = self.doc.get_actor().clone();
        Self {
            doc: self.doc.fork().with_actor(actor),
        }
    }

    /// Merge another document into this one
    pub fn merge(&mut self, other: &mut ShoppingDocument) -> Result<(), DocumentError> {
        self.doc.merge(&mut other.doc)?;
        Ok(())
    }

    /// Current heads of the change graph
    pub fn heads(&mut self) -> Vec<ChangeHash> {
        self.doc.get_heads()
    }

    // ==================== Locations ====================

    /// Add a new location to the document
    pub fn add_location(&mut self, location: &Location) -> Result<(), DocumentError> {
        let locations_id = self.map_id(keys::LOCATIONS)?;
        let obj_id = self
            .doc
            .put_object(&locations_id, location.id.to_string(), ObjType::Map)?;

        self.write_location_fields(&obj_id, location)?;
        Ok(())
    }

    /// Update an existing location
    pub fn update_location(&mut self, location: &Location) -> Result<(), DocumentError> {
        let obj_id = self.location_obj(location.id)?;
        self.write_location_fields(&obj_id, location)?;
        Ok(())
    }

    /// Change only a location's position
    pub fn set_location_position(&mut self, id: Uuid, position: i32) -> Result<(), DocumentError> {
        let obj_id = self.location_obj(id)?;
        self.doc.put(&obj_id, keys::POSITION, i64::from(position))?;
        Ok(())
    }

    /// Delete a location from the document
    pub fn delete_location(&mut self, id: Uuid) -> Result<(), DocumentError> {
        let locations_id = self.map_id(keys::LOCATIONS)?;
        self.doc.delete(&locations_id, id.to_string())?;
        Ok(())
    }

    /// Get a location by ID
    pub fn get_location(&self, id: Uuid) -> Result<Option<Location>, DocumentError> {
        let locations_id = self.map_id(keys::LOCATIONS)?;

        match self.doc.get(&locations_id, id.to_string())? {
            Some((_, obj_id)) => Ok(Some(self.read_location(&obj_id, id)?)),
            None => Ok(None),
        }
    }

    /// Get all locations (unordered)
    pub fn get_all_locations(&self) -> Result<Vec<Location>, DocumentError> {
        let locations_id = self.map_id(keys::LOCATIONS)?;

        let mut locations = Vec::new();
        for key in self.doc.keys(&locations_id) {
            let id = Uuid::parse_str(&key).map_err(|_| DocumentError::InvalidUuid(key.clone()))?;
            if let Some((_, obj_id)) = self.doc.get(&locations_id, &key)? {
                locations.push(self.read_location(&obj_id, id)?);
            }
        }
        Ok(locations)
    }

    /// Get every location sitting at the Unknown Location position
    ///
    /// Normally there is exactly one; replicas that each created their own
    /// before syncing can leave more.
    pub fn unknown_locations(&self) -> Result<Vec<Location>, DocumentError> {
        Ok(self
            .get_all_locations()?
            .into_iter()
            .filter(|location| location.position == UNKNOWN_POSITION)
            .collect())
    }

    /// Highest position among user-defined locations
    pub fn last_user_position(&self) -> Result<Option<i32>, DocumentError> {
        Ok(self
            .get_all_locations()?
            .iter()
            .map(|location| location.position)
            .filter(|position| *position < UNKNOWN_POSITION)
            .max())
    }

    // ==================== Items ====================

    /// Add a new item to the document
    pub fn add_item(&mut self, item: &Item) -> Result<(), DocumentError> {
        let items_id = self.map_id(keys::ITEMS)?;
        let obj_id = self
            .doc
            .put_object(&items_id, item.id.to_string(), ObjType::Map)?;

        self.write_item_fields(&obj_id, item)?;
        Ok(())
    }

    /// Update an existing item
    pub fn update_item(&mut self, item: &Item) -> Result<(), DocumentError> {
        let obj_id = self.item_obj(item.id)?;
        self.write_item_fields(&obj_id, item)?;
        Ok(())
    }

    /// Point an item at a different location, leaving its other fields alone
    pub fn set_item_location(&mut self, id: Uuid, location_id: Uuid) -> Result<(), DocumentError> {
        let obj_id = self.item_obj(id)?;
        self.doc
            .put(&obj_id, keys::LOCATION_ID, location_id.to_string())?;
        Ok(())
    }

    /// Delete an item from the document
    pub fn delete_item(&mut self, id: Uuid) -> Result<(), DocumentError> {
        let items_id = self.map_id(keys::ITEMS)?;
        self.doc.delete(&items_id, id.to_string())?;
        Ok(())
    }

    /// Get an item by ID
    pub fn get_item(&self, id: Uuid) -> Result<Option<Item>, DocumentError> {
        let items_id = self.map_id(keys::ITEMS)?;

        match self.doc.get(&items_id, id.to_string())? {
            Some((_, obj_id)) => Ok(Some(self.read_item(&obj_id, id)?)),
            None => Ok(None),
        }
    }

    /// Get all items (unordered)
    pub fn get_all_items(&self) -> Result<Vec<Item>, DocumentError> {
        let items_id = self.map_id(keys::ITEMS)?;

        let mut items = Vec::new();
        for key in self.doc.keys(&items_id) {
            let id = Uuid::parse_str(&key).map_err(|_| DocumentError::InvalidUuid(key.clone()))?;
            if let Some((_, obj_id)) = self.doc.get(&items_id, &key)? {
                items.push(self.read_item(&obj_id, id)?);
            }
        }
        Ok(items)
    }

    /// Get the items owned by a location (unordered)
    pub fn items_at(&self, location_id: Uuid) -> Result<Vec<Item>, DocumentError> {
        Ok(self
            .get_all_items()?
            .into_iter()
            .filter(|item| item.location_id == location_id)
            .collect())
    }

    // ==================== Private helpers ====================

    fn map_id(&self, key: &str) -> Result<ObjId, DocumentError> {
        match self.doc.get(ROOT, key)? {
            Some((Value::Object(ObjType::Map), id)) => Ok(id),
            Some(_) => Err(DocumentError::InvalidType(key.to_string())),
            None => Err(DocumentError::MissingField(key.to_string())),
        }
    }

    fn location_obj(&self, id: Uuid) -> Result<ObjId, DocumentError> {
        let locations_id = self.map_id(keys::LOCATIONS)?;
        Ok(self
            .doc
            .get(&locations_id, id.to_string())?
            .ok_or_else(|| DocumentError::MissingField(format!("location {}", id)))?
            .1)
    }

    fn item_obj(&self, id: Uuid) -> Result<ObjId, DocumentError> {
        let items_id = self.map_id(keys::ITEMS)?;
        Ok(self
            .doc
            .get(&items_id, id.to_string())?
            .ok_or_else(|| DocumentError::MissingField(format!("item {}", id)))?
            .1)
    }

    fn write_location_fields(
        &mut self,
        obj_id: &ObjId,
        location: &Location,
    ) -> Result<(), DocumentError> {
        self.doc.put(obj_id, keys::ID, location.id.to_string())?;
        self.doc.put(obj_id, keys::NAME, location.name.clone())?;
        self.doc
            .put(obj_id, keys::POSITION, i64::from(location.position))?;
        self.doc.put(obj_id, keys::RED, location.color.red)?;
        self.doc.put(obj_id, keys::GREEN, location.color.green)?;
        self.doc.put(obj_id, keys::BLUE, location.color.blue)?;
        self.doc.put(obj_id, keys::OPACITY, location.color.opacity)?;
        Ok(())
    }

    fn read_location(&self, obj_id: &ObjId, id: Uuid) -> Result<Location, DocumentError> {
        let name = self.get_string(obj_id, keys::NAME)?;
        let position = self.get_i64(obj_id, keys::POSITION)?;
        let position =
            i32::try_from(position).map_err(|_| DocumentError::InvalidType(keys::POSITION.into()))?;
        let color = Color {
            red: self.get_f64(obj_id, keys::RED)?,
            green: self.get_f64(obj_id, keys::GREEN)?,
            blue: self.get_f64(obj_id, keys::BLUE)?,
            opacity: self.get_f64(obj_id, keys::OPACITY)?,
        };

        Ok(Location {
            id,
            name,
            position,
            color,
        })
    }

    fn write_item_fields(&mut self, obj_id: &ObjId, item: &Item) -> Result<(), DocumentError> {
        self.doc.put(obj_id, keys::ID, item.id.to_string())?;
        self.doc.put(obj_id, keys::NAME, item.name.clone())?;
        self.doc
            .put(obj_id, keys::QUANTITY, i64::from(item.quantity))?;
        self.doc.put(obj_id, keys::ON_LIST, item.on_list)?;
        self.doc.put(obj_id, keys::IS_AVAILABLE, item.is_available)?;

        match item.last_purchased {
            Some(date) => {
                self.doc
                    .put(obj_id, keys::LAST_PURCHASED, date.timestamp_millis())?;
            }
            None => {
                if self.doc.get(obj_id, keys::LAST_PURCHASED)?.is_some() {
                    self.doc.delete(obj_id, keys::LAST_PURCHASED)?;
                }
            }
        }

        self.doc
            .put(obj_id, keys::LOCATION_ID, item.location_id.to_string())?;
        Ok(())
    }

    fn read_item(&self, obj_id: &ObjId, id: Uuid) -> Result<Item, DocumentError> {
        let name = self.get_string(obj_id, keys::NAME)?;
        let quantity = self.get_i64(obj_id, keys::QUANTITY)?;
        let quantity =
            u32::try_from(quantity).map_err(|_| DocumentError::InvalidType(keys::QUANTITY.into()))?;
        let on_list = self.get_bool(obj_id, keys::ON_LIST)?;
        let is_available = self.get_bool(obj_id, keys::IS_AVAILABLE)?;
        let last_purchased = self.get_optional_timestamp(obj_id, keys::LAST_PURCHASED)?;
        let location_id = self.get_string(obj_id, keys::LOCATION_ID)?;
        let location_id = Uuid::parse_str(&location_id)
            .map_err(|_| DocumentError::InvalidUuid(location_id.clone()))?;

        Ok(Item {
            id,
            name,
            quantity,
            on_list,
            is_available,
            last_purchased,
            location_id,
        })
    }

    fn get_string(&self, obj_id: &ObjId, key: &str) -> Result<String, DocumentError> {
        match self.doc.get(obj_id, key)? {
            Some((value, _)) => value
                .to_str()
                .map(|s| s.to_string())
                .ok_or_else(|| DocumentError::InvalidType(key.to_string())),
            None => Err(DocumentError::MissingField(key.to_string())),
        }
    }

    fn get_i64(&self, obj_id: &ObjId, key: &str) -> Result<i64, DocumentError> {
        match self.get_scalar(obj_id, key)? {
            ScalarValue::Int(i) => Ok(i),
            ScalarValue::Uint(u) => {
                i64::try_from(u).map_err(|_| DocumentError::InvalidType(key.to_string()))
            }
            _ => Err(DocumentError::InvalidType(key.to_string())),
        }
    }

    fn get_f64(&self, obj_id: &ObjId, key: &str) -> Result<f64, DocumentError> {
        match self.get_scalar(obj_id, key)? {
            ScalarValue::F64(f) => Ok(f),
            ScalarValue::Int(i) => Ok(i as f64),
            ScalarValue::Uint(u) => Ok(u as f64),
            _ => Err(DocumentError::InvalidType(key.to_string())),
        }
    }

    fn get_bool(&self, obj_id: &ObjId, key: &str) -> Result<bool, DocumentError> {
        match self.get_scalar(obj_id, key)? {
            ScalarValue::Boolean(b) => Ok(b),
            _ => Err(DocumentError::InvalidType(key.to_string())),
        }
    }

    fn get_optional_timestamp(
        &self,
        obj_id: &ObjId,
        key: &str,
    ) -> Result<Option<DateTime<Utc>>, DocumentError> {
        if self.doc.get(obj_id, key)?.is_none() {
            return Ok(None);
        }

        let millis = self.get_i64(obj_id, key)?;
        Utc.timestamp_millis_opt(millis)
            .single()
            .map(Some)
            .ok_or(DocumentError::InvalidTimestamp(millis))
    }

    fn get_scalar(&self, obj_id: &ObjId, key: &str) -> Result<ScalarValue, DocumentError> {
        match self.doc.get(obj_id, key)? {
            Some((Value::Scalar(scalar), _)) => Ok(scalar.into_owned()),
            Some(_) => Err(DocumentError::InvalidType(key.to_string())),
            None => Err(DocumentError::MissingField(key.to_string())),
        }
    }
}

impl Default for ShoppingDocument {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dairy_with_milk(doc: &mut ShoppingDocument) -> (Location, Item) {
        let location = Location::new("Dairy", 1);
        let item = Item::new("Milk", location.id);
        doc.add_location(&location).unwrap();
        doc.add_item(&item).unwrap();
        (location, item)
    }

    #[test]
    fn test_new_document() {
        let doc = ShoppingDocument::new();
        assert!(doc.get_all_locations().unwrap().is_empty());
        assert!(doc.get_all_items().unwrap().is_empty());
        assert!(doc.last_user_position().unwrap().is_none());
    }

    #[test]
    fn test_add_and_get_location() {
        let mut doc = ShoppingDocument::new();
        let mut location = Location::new("Produce", 3);
        location.set_color(Color::new(0.1, 0.9, 0.2, 0.75));

        doc.add_location(&location).unwrap();

        let retrieved = doc.get_location(location.id).unwrap().unwrap();
        assert_eq!(retrieved, location);
    }

    #[test]
    fn test_update_location() {
        let mut doc = ShoppingDocument::new();
        let mut location = Location::new("Produce", 3);
        doc.add_location(&location).unwrap();

        location.name = "Fruit & Veg".to_string();
        doc.update_location(&location).unwrap();
        doc.set_location_position(location.id, 7).unwrap();

        let retrieved = doc.get_location(location.id).unwrap().unwrap();
        assert_eq!(retrieved.name, "Fruit & Veg");
        assert_eq!(retrieved.position, 7);
    }

    #[test]
    fn test_update_missing_location_fails() {
        let mut doc = ShoppingDocument::new();
        let location = Location::new("Nowhere", 1);
        assert!(matches!(
            doc.update_location(&location),
            Err(DocumentError::MissingField(_))
        ));
    }

    #[test]
    fn test_delete_location() {
        let mut doc = ShoppingDocument::new();
        let location = Location::new("Bakery", 1);
        doc.add_location(&location).unwrap();

        doc.delete_location(location.id).unwrap();
        assert!(doc.get_location(location.id).unwrap().is_none());
    }

    #[test]
    fn test_unknown_locations_and_last_position() {
        let mut doc = ShoppingDocument::new();
        doc.add_location(&Location::unknown()).unwrap();
        doc.add_location(&Location::new("Dairy", 4)).unwrap();
        doc.add_location(&Location::new("Bakery", 2)).unwrap();

        assert_eq!(doc.unknown_locations().unwrap().len(), 1);
        assert_eq!(doc.last_user_position().unwrap(), Some(4));
    }

    #[test]
    fn test_add_and_get_item() {
        let mut doc = ShoppingDocument::new();
        let (location, mut item) = dairy_with_milk(&mut doc);
        item.quantity = 3;
        item.mark_as_purchased();
        doc.update_item(&item).unwrap();

        let retrieved = doc.get_item(item.id).unwrap().unwrap();
        assert_eq!(retrieved, item);
        assert_eq!(retrieved.location_id, location.id);
    }

    #[test]
    fn test_clearing_last_purchased() {
        let mut doc = ShoppingDocument::new();
        let (_, mut item) = dairy_with_milk(&mut doc);
        item.mark_as_purchased();
        doc.update_item(&item).unwrap();

        item.last_purchased = None;
        doc.update_item(&item).unwrap();

        let retrieved = doc.get_item(item.id).unwrap().unwrap();
        assert!(retrieved.last_purchased.is_none());
    }

    #[test]
    fn test_set_item_location_and_items_at() {
        let mut doc = ShoppingDocument::new();
        let (dairy, item) = dairy_with_milk(&mut doc);
        let fridge = Location::new("Fridge", 2);
        doc.add_location(&fridge).unwrap();

        doc.set_item_location(item.id, fridge.id).unwrap();

        assert!(doc.items_at(dairy.id).unwrap().is_empty());
        let moved = doc.items_at(fridge.id).unwrap();
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].name, "Milk");
    }

    #[test]
    fn test_delete_item() {
        let mut doc = ShoppingDocument::new();
        let (_, item) = dairy_with_milk(&mut doc);

        doc.delete_item(item.id).unwrap();
        assert!(doc.get_item(item.id).unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let mut doc = ShoppingDocument::new();
        let (location, item) = dairy_with_milk(&mut doc);

        let bytes = doc.save();

        let loaded = ShoppingDocument::load(&bytes).unwrap();
        assert_eq!(loaded.get_location(location.id).unwrap().unwrap(), location);
        assert_eq!(loaded.get_item(item.id).unwrap().unwrap(), item);
    }

    #[test]
    fn test_load_garbage_fails() {
        assert!(ShoppingDocument::load(b"not an automerge document").is_err());
    }

    #[test]
    fn test_merge_forked_documents() {
        let mut doc1 = ShoppingDocument::new();
        let mut doc2 = doc1.fork();

        doc1.add_location(&Location::new("Dairy", 1)).unwrap();
        doc2.add_location(&Location::new("Bakery", 1)).unwrap();

        doc1.merge(&mut doc2).unwrap();
        assert_eq!(doc1.get_all_locations().unwrap().len(), 2);
    }

    #[test]
    fn test_stage_and_merge_back() {
        let mut doc = ShoppingDocument::new();
        doc.add_location(&Location::unknown()).unwrap();

        let mut staged = doc.stage();
        staged.add_location(&Location::new("Deli", 1)).unwrap();
        assert_eq!(doc.get_all_locations().unwrap().len(), 1);

        doc.merge(&mut staged).unwrap();
        assert_eq!(doc.get_all_locations().unwrap().len(), 2);

        // Still writable afterwards
        doc.add_location(&Location::new("Bakery", 2)).unwrap();
        assert_eq!(doc.get_all_locations().unwrap().len(), 3);
    }

    #[test]
    fn test_merge_independent_documents_share_root_maps() {
        // Two devices start from scratch and never saw each other
        let mut phone = ShoppingDocument::new();
        let mut tablet = ShoppingDocument::new();

        phone.add_location(&Location::unknown()).unwrap();
        tablet.add_location(&Location::unknown()).unwrap();
        dairy_with_milk(&mut tablet);

        phone.merge(&mut tablet).unwrap();

        assert_eq!(phone.unknown_locations().unwrap().len(), 2);
        assert_eq!(phone.get_all_locations().unwrap().len(), 3);
        assert_eq!(phone.get_all_items().unwrap().len(), 1);
    }
}
