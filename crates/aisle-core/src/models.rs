//! Data models for aisle
//!
//! Defines the core data structures: Item, Location, and Color.
//! These models are designed to work with Automerge for CRDT-based sync.
//!
//! An Item always names its owning Location by id. The reverse direction
//! ("which items are at this location") is answered by a query against the
//! store, so there is exactly one source of truth for the relationship.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name given to the Unknown Location when it is created
pub const UNKNOWN_LOCATION_NAME: &str = "Unknown Location";

/// Position reserved for the Unknown Location
pub const UNKNOWN_POSITION: i32 = i32::MAX;

/// Something you would buy at a grocery store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    /// Stable identifier, shared across devices and archives
    pub id: Uuid,
    /// Display name (must be non-empty to be saved)
    pub name: String,
    /// How many to buy
    pub quantity: u32,
    /// Whether the item is on the active shopping list
    pub on_list: bool,
    /// Whether the item was found in the store on the last trip
    pub is_available: bool,
    /// When this item was last purchased, if ever
    pub last_purchased: Option<DateTime<Utc>>,
    /// The Location that owns this item
    pub location_id: Uuid,
}

impl Item {
    /// Create a new item at the given location
    ///
    /// New items start on the shopping list with a quantity of 1.
    pub fn new(name: impl Into<String>, location_id: Uuid) -> Self {
        Self::with_id(Uuid::new_v4(), name, location_id)
    }

    /// Create an item with a specific ID (for loading from storage)
    pub fn with_id(id: Uuid, name: impl Into<String>, location_id: Uuid) -> Self {
        Self {
            id,
            name: name.into(),
            quantity: 1,
            on_list: true,
            is_available: true,
            last_purchased: None,
            location_id,
        }
    }

    /// Items must have a name to be saved
    pub fn can_be_saved(&self) -> bool {
        !self.name.trim().is_empty()
    }

    /// Take the item off the list and stamp the purchase time
    pub fn mark_as_purchased(&mut self) {
        self.on_list = false;
        self.last_purchased = Some(now_millis());
    }

    /// Put the item back on the list
    pub fn move_to_list(&mut self) {
        self.on_list = true;
    }

    /// Human-readable purchase date
    pub fn date_text(&self) -> String {
        match self.last_purchased {
            Some(date) => date.format("%B %-d, %Y").to_string(),
            None => "(Never)".to_string(),
        }
    }
}

/// RGBA color components, each conceptually in [0, 1]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Color {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub opacity: f64,
}

impl Color {
    pub fn new(red: f64, green: f64, blue: f64, opacity: f64) -> Self {
        Self {
            red,
            green,
            blue,
            opacity,
        }
    }

    /// Parse "r,g,b" or "r,g,b,a" with components in [0, 1]
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .ok()?;

        if parts.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return None;
        }

        match parts.as_slice() {
            [r, g, b] => Some(Self::new(*r, *g, *b, 1.0)),
            [r, g, b, a] => Some(Self::new(*r, *g, *b, *a)),
            _ => None,
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::new(0.85, 0.85, 0.85, 1.0)
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.2},{:.2},{:.2},{:.2}",
            self.red, self.green, self.blue, self.opacity
        )
    }
}

/// An area of a store where items of a certain kind can be found
///
/// `position` orders locations along the user's route through the store.
/// The Unknown Location always sits at [`UNKNOWN_POSITION`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    /// Stable identifier, shared across devices and archives
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Sort key along the shopping route
    pub position: i32,
    /// Display color
    pub color: Color,
}

impl Location {
    /// Create a new location at the given position
    pub fn new(name: impl Into<String>, position: i32) -> Self {
        Self::with_id(Uuid::new_v4(), name, position)
    }

    /// Create a location with a specific ID (for loading from storage)
    pub fn with_id(id: Uuid, name: impl Into<String>, position: i32) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            color: Color::default(),
        }
    }

    /// Create a fresh Unknown Location
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_LOCATION_NAME, UNKNOWN_POSITION)
    }

    /// Whether this is the Unknown Location
    pub fn is_unknown(&self) -> bool {
        self.position == UNKNOWN_POSITION
    }

    /// Set the color
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }
}

/// Current time truncated to the millisecond precision the document stores
pub(crate) fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}
