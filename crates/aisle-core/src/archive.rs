//! JSON archive codec
//!
//! An archive is a pretty-printed JSON array of locations, each carrying its
//! items nested inside. The field names are a compatibility contract with
//! archives written by earlier releases and must not change:
//!
//! ```json
//! [
//!   {
//!     "id": "…", "name": "Dairy", "visitationOrder": 0,
//!     "red": 0.85, "green": 0.85, "blue": 0.85, "opacity": 1.0,
//!     "items": [
//!       { "id": "…", "name": "Milk", "onList": true, "isAvailable": true,
//!         "quantity": 1, "dateLastPurchased": null }
//!     ]
//!   }
//! ]
//! ```
//!
//! `visitationOrder` equal to `i32::MAX` marks the Unknown Location.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::models::{Color, Item, Location, UNKNOWN_POSITION};

/// Errors reading, writing or decoding an archive
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Permission denied: cannot access '{path}'")]
    AccessDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not read '{path}': {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Not a shopping list archive: {0}")]
    NotDecodable(String),

    #[error("Could not write '{path}': {source}")]
    Unwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not encode archive: {0}")]
    NotEncodable(#[source] serde_json::Error),
}

impl ArchiveError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArchiveError::AccessDenied { .. } => ErrorKind::AccessDenied,
            ArchiveError::Unreadable { .. } => ErrorKind::Unreadable,
            ArchiveError::NotDecodable(_) => ErrorKind::NotDecodable,
            ArchiveError::Unwritable { .. } | ArchiveError::NotEncodable(_) => {
                ErrorKind::PersistenceFailure
            }
        }
    }

    fn from_read(source: io::Error, path: &Path) -> Self {
        let path = path.to_path_buf();
        match source.kind() {
            io::ErrorKind::PermissionDenied => ArchiveError::AccessDenied { path, source },
            _ => ArchiveError::Unreadable { path, source },
        }
    }

    fn from_write(source: io::Error, path: &Path) -> Self {
        let path = path.to_path_buf();
        match source.kind() {
            io::ErrorKind::PermissionDenied => ArchiveError::AccessDenied { path, source },
            _ => ArchiveError::Unwritable { path, source },
        }
    }
}

/// A location and its items, as stored in an archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "visitationOrder")]
    pub visitation_order: i32,
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub opacity: f64,
    pub items: Vec<ItemRecord>,
}

/// An item as stored in an archive; its location is implied by nesting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "onList")]
    pub on_list: bool,
    #[serde(rename = "isAvailable")]
    pub is_available: bool,
    pub quantity: u32,
    #[serde(rename = "dateLastPurchased", default, with = "purchase_date")]
    pub date_last_purchased: Option<DateTime<Utc>>,
}

impl LocationRecord {
    /// Whether this record describes the Unknown Location
    pub fn is_unknown(&self) -> bool {
        self.visitation_order == UNKNOWN_POSITION
    }

    pub fn color(&self) -> Color {
        Color::new(self.red, self.green, self.blue, self.opacity)
    }

    /// Build a local location from this record at a locally chosen position
    pub fn to_location(&self, position: i32) -> Location {
        let mut location = Location::with_id(self.id, self.name.clone(), position);
        location.set_color(self.color());
        location
    }

    fn from_location(location: &Location, items: Vec<ItemRecord>) -> Self {
        Self {
            id: location.id,
            name: location.name.clone(),
            visitation_order: location.position,
            red: location.color.red,
            green: location.color.green,
            blue: location.color.blue,
            opacity: location.color.opacity,
            items,
        }
    }
}

impl ItemRecord {
    /// Build a local item owned by `location_id`
    pub fn to_item(&self, location_id: Uuid) -> Item {
        Item {
            id: self.id,
            name: self.name.clone(),
            quantity: self.quantity,
            on_list: self.on_list,
            is_available: self.is_available,
            last_purchased: self.date_last_purchased,
            location_id,
        }
    }
}

impl From<&Item> for ItemRecord {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
            on_list: item.on_list,
            is_available: item.is_available,
            quantity: item.quantity,
            date_last_purchased: item.last_purchased,
        }
    }
}

/// Purchase dates travel as RFC 3339 strings in UTC, or `null`
mod purchase_date {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(date) => {
                serializer.serialize_str(&date.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) => DateTime::parse_from_rfc3339(&text)
                .map(|date| Some(date.with_timezone(&Utc)))
                .map_err(|e| serde::de::Error::custom(format!("bad date '{}': {}", text, e))),
            None => Ok(None),
        }
    }
}

/// Flatten the entity graph into archive records
///
/// Locations come out in route order, each with its items sorted by name.
pub fn encode(locations: &[Location], items: &[Item]) -> Vec<LocationRecord> {
    let mut by_location: HashMap<Uuid, Vec<&Item>> = HashMap::new();
    for item in items {
        by_location.entry(item.location_id).or_default().push(item);
    }

    let mut ordered: Vec<&Location> = locations.iter().collect();
    ordered.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });

    let records: Vec<LocationRecord> = ordered
        .into_iter()
        .map(|location| {
            let mut owned = by_location.remove(&location.id).unwrap_or_default();
            owned.sort_by(|a, b| {
                a.name
                    .to_lowercase()
                    .cmp(&b.name.to_lowercase())
                    .then_with(|| a.id.cmp(&b.id))
            });
            let items = owned.into_iter().map(ItemRecord::from).collect();
            LocationRecord::from_location(location, items)
        })
        .collect();

    let stranded: usize = by_location.values().map(Vec::len).sum();
    if stranded > 0 {
        tracing::warn!(stranded, "items without a known location left out of archive");
    }

    records
}

/// Serialize records as pretty-printed JSON
pub fn to_json(records: &[LocationRecord]) -> Result<Vec<u8>, ArchiveError> {
    serde_json::to_vec_pretty(records).map_err(ArchiveError::NotEncodable)
}

/// Parse and validate archive bytes
pub fn decode(bytes: &[u8]) -> Result<Vec<LocationRecord>, ArchiveError> {
    let records: Vec<LocationRecord> =
        serde_json::from_slice(bytes).map_err(|e| ArchiveError::NotDecodable(e.to_string()))?;
    validate(&records)?;
    Ok(records)
}

/// Reject archives that could not be merged cleanly
///
/// Ids must be unique across the whole archive, item names non-blank and
/// quantities positive.
pub fn validate(records: &[LocationRecord]) -> Result<(), ArchiveError> {
    let mut location_ids = HashSet::new();
    let mut item_ids = HashSet::new();

    for record in records {
        if !location_ids.insert(record.id) {
            return Err(ArchiveError::NotDecodable(format!(
                "location {} appears more than once",
                record.id
            )));
        }

        for item in &record.items {
            if !item_ids.insert(item.id) {
                return Err(ArchiveError::NotDecodable(format!(
                    "item {} appears more than once",
                    item.id
                )));
            }
            if item.name.trim().is_empty() {
                return Err(ArchiveError::NotDecodable(format!(
                    "item {} has no name",
                    item.id
                )));
            }
            if item.quantity == 0 {
                return Err(ArchiveError::NotDecodable(format!(
                    "item {} has quantity 0",
                    item.id
                )));
            }
        }
    }

    Ok(())
}

/// Read and decode an archive file
pub async fn read_archive(path: &Path) -> Result<Vec<LocationRecord>, ArchiveError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ArchiveError::from_read(e, path))?;
    decode(&bytes)
}

/// Encode records and write them to `path`
pub async fn write_archive(path: &Path, records: &[LocationRecord]) -> Result<(), ArchiveError> {
    let bytes = to_json(records)?;
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| ArchiveError::from_write(e, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn graph() -> (Vec<Location>, Vec<Item>) {
        let unknown = Location::unknown();
        let dairy = Location::new("Dairy", 0);
        let produce = Location::new("Produce", 1);

        let mut milk = Item::new("Milk", dairy.id);
        milk.last_purchased = DateTime::from_timestamp_millis(1_700_000_000_123);
        milk.on_list = false;
        let butter = Item::new("butter", dairy.id);
        let mut kiwi = Item::new("Kiwi", produce.id);
        kiwi.quantity = 4;
        let mystery = Item::new("Mystery", unknown.id);

        (
            vec![unknown, produce, dairy],
            vec![milk, kiwi, butter, mystery],
        )
    }

    #[test]
    fn test_encode_orders_locations_and_items() {
        let (locations, items) = graph();
        let records = encode(&locations, &items);

        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Dairy", "Produce", "Unknown Location"]);

        let dairy_items: Vec<_> = records[0].items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(dairy_items, vec!["butter", "Milk"]);
        assert!(records[2].is_unknown());
    }

    #[test]
    fn test_wire_field_names() {
        let (locations, items) = graph();
        let json = String::from_utf8(to_json(&encode(&locations, &items)).unwrap()).unwrap();

        for field in [
            "\"visitationOrder\"",
            "\"onList\"",
            "\"isAvailable\"",
            "\"dateLastPurchased\"",
            "\"opacity\"",
            "\"quantity\"",
        ] {
            assert!(json.contains(field), "missing {}", field);
        }
        assert!(json.contains("\"dateLastPurchased\": null"));
        assert!(json.contains("\"dateLastPurchased\": \"2023-11-14T22:13:20.123Z\""));
        assert!(json.contains("\"visitationOrder\": 2147483647"));
    }

    #[test]
    fn test_decode_reproduces_graph() {
        let (locations, items) = graph();
        let records = encode(&locations, &items);

        let decoded = decode(&to_json(&records).unwrap()).unwrap();
        assert_eq!(decoded, records);

        let milk = decoded[0]
            .items
            .iter()
            .find(|i| i.name == "Milk")
            .unwrap()
            .to_item(decoded[0].id);
        let original = items.iter().find(|i| i.name == "Milk").unwrap();
        assert_eq!(&milk, original);
    }

    #[test]
    fn test_missing_purchase_date_means_never() {
        let json = r#"[{
            "id": "5e2b2c9c-8f5c-4c1e-9a43-0b7d6f1f2a10",
            "name": "Bakery",
            "visitationOrder": 3,
            "red": 1.0, "green": 0.5, "blue": 0.0, "opacity": 1.0,
            "items": [{
                "id": "a1b2c3d4-0000-4000-8000-000000000001",
                "name": "Baguette",
                "onList": true,
                "isAvailable": true,
                "quantity": 2
            }]
        }]"#;

        let records = decode(json.as_bytes()).unwrap();
        assert_eq!(records[0].visitation_order, 3);
        assert!(records[0].items[0].date_last_purchased.is_none());
        assert_eq!(records[0].color(), Color::new(1.0, 0.5, 0.0, 1.0));
    }

    #[test]
    fn test_offset_dates_normalize_to_utc() {
        let json = r#"[{
            "id": "5e2b2c9c-8f5c-4c1e-9a43-0b7d6f1f2a10",
            "name": "Bakery", "visitationOrder": 0,
            "red": 1.0, "green": 1.0, "blue": 1.0, "opacity": 1.0,
            "items": [{
                "id": "a1b2c3d4-0000-4000-8000-000000000001",
                "name": "Rye", "onList": false, "isAvailable": true, "quantity": 1,
                "dateLastPurchased": "2024-03-01T09:30:00-05:00"
            }]
        }]"#;

        let records = decode(json.as_bytes()).unwrap();
        let date = records[0].items[0].date_last_purchased.unwrap();
        assert_eq!(date.to_rfc3339(), "2024-03-01T14:30:00+00:00");
    }

    #[test]
    fn test_decode_rejects_malformed_input() {
        for bad in [
            "not json",
            "{}",
            r#"[{"id": "nope", "name": "x"}]"#,
            r#"[{
                "id": "5e2b2c9c-8f5c-4c1e-9a43-0b7d6f1f2a10",
                "name": "Bakery", "visitationOrder": 0,
                "red": 1.0, "green": 1.0, "blue": 1.0, "opacity": 1.0,
                "items": [{
                    "id": "a1b2c3d4-0000-4000-8000-000000000001",
                    "name": "Rye", "onList": false, "isAvailable": true, "quantity": 1,
                    "dateLastPurchased": "last tuesday"
                }]
            }]"#,
        ] {
            let err = decode(bad.as_bytes()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotDecodable, "accepted {}", bad);
        }
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let (locations, items) = graph();
        let mut records = encode(&locations, &items);

        let stray = records[0].items[0].clone();
        records[1].items.push(stray);
        assert!(matches!(
            validate(&records),
            Err(ArchiveError::NotDecodable(msg)) if msg.contains("item")
        ));

        let mut records = encode(&locations, &items);
        let copy = records[1].clone();
        records.push(copy);
        assert!(matches!(
            validate(&records),
            Err(ArchiveError::NotDecodable(msg)) if msg.contains("location")
        ));
    }

    #[test]
    fn test_validate_rejects_blank_item_names() {
        let (locations, items) = graph();
        let mut records = encode(&locations, &items);
        records[0].items[0].name = " ".to_string();
        assert!(validate(&records).is_err());
    }

    #[test]
    fn test_decode_rejects_zero_quantity() {
        let json = r#"[{
            "id": "5e2b2c9c-8f5c-4c1e-9a43-0b7d6f1f2a10",
            "name": "Bakery", "visitationOrder": 0,
            "red": 1.0, "green": 1.0, "blue": 1.0, "opacity": 1.0,
            "items": [{
                "id": "a1b2c3d4-0000-4000-8000-000000000001",
                "name": "Rye", "onList": true, "isAvailable": true, "quantity": 0
            }]
        }]"#;

        let err = decode(json.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotDecodable);
        assert!(err.to_string().contains("quantity"));
    }

    #[tokio::test]
    async fn test_write_and_read_archive() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("export.json");
        let (locations, items) = graph();
        let records = encode(&locations, &items);

        write_archive(&path, &records).await.unwrap();
        let read = read_archive(&path).await.unwrap();
        assert_eq!(read, records);
    }

    #[tokio::test]
    async fn test_read_missing_archive_is_unreadable() {
        let temp_dir = TempDir::new().unwrap();
        let err = read_archive(&temp_dir.path().join("nope.json"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unreadable);
    }

    #[tokio::test]
    async fn test_write_into_missing_directory_is_unwritable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing").join("export.json");
        let err = write_archive(&path, &[]).await.unwrap_err();
        assert!(matches!(err, ArchiveError::Unwritable { .. }));
    }
}
