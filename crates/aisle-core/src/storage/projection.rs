//! SQLite projection layer
//!
//! Projects Automerge document state to SQLite for fast read queries.
//! SQLite serves as a read-optimized cache; Automerge remains source of truth.
//!
//! ## Architecture
//!
//! - Full projection: clears and rebuilds all SQLite data from Automerge,
//!   inside one transaction
//! - Counts, sorted bulk queries, point lookups and the items-at-location
//!   index are all answered here
//!
//! ## Tables
//!
//! - `locations` - Location records, indexed by position
//! - `items` - Item records, indexed by owning location

use chrono::DateTime;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction};
use uuid::Uuid;

use crate::config::Config;
use crate::document::ShoppingDocument;
use crate::models::{Color, Item, Location, UNKNOWN_POSITION};
use crate::query::{ItemFilter, ItemSort};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::schema::{init_schema, needs_init};

const ITEM_COLUMNS: &str =
    "i.id, i.name, i.quantity, i.on_list, i.is_available, i.last_purchased, i.location_id";

const LOCATION_COLUMNS: &str = "id, name, position, red, green, blue, opacity";

/// SQLite projection layer for read-optimized queries
pub struct SqliteProjection {
    conn: Connection,
}

impl SqliteProjection {
    /// Open or create the SQLite database
    pub fn open(config: &Config) -> StorageResult<Self> {
        let path = config.sqlite_path();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(&path)?;

        if needs_init(&conn) {
            init_schema(&conn)?;
        }

        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Project the entire Automerge document to SQLite
    ///
    /// Clears all existing rows and repopulates from the document.
    pub fn project_full(&mut self, doc: &ShoppingDocument) -> StorageResult<()> {
        let locations = doc.get_all_locations()?;
        let items = doc.get_all_items()?;

        let tx = self.conn.transaction()?;
        clear_all_data(&tx)?;

        for location in &locations {
            insert_location(&tx, location)?;
        }
        for item in &items {
            insert_item(&tx, item)?;
        }

        tx.commit()?;
        tracing::debug!(
            locations = locations.len(),
            items = items.len(),
            "projected document"
        );
        Ok(())
    }

    // ==================== Query Methods ====================

    /// Count items matching a filter
    pub fn count_items(&self, filter: ItemFilter) -> StorageResult<usize> {
        let (predicate, args) = filter.to_sql();
        let sql = format!("SELECT COUNT(*) FROM items i WHERE {}", predicate);
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(args.iter()), |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Count all locations, the Unknown Location included
    pub fn count_locations(&self) -> StorageResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM locations", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Items matching a filter, in the requested order
    pub fn items(&self, filter: ItemFilter, sort: ItemSort) -> StorageResult<Vec<Item>> {
        let (predicate, args) = filter.to_sql();
        let sql = format!(
            "SELECT {} FROM items i LEFT JOIN locations l ON l.id = i.location_id WHERE {} ORDER BY {}",
            ITEM_COLUMNS,
            predicate,
            sort.to_sql()
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(args.iter()), item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Items owned by a location, name-sorted
    pub fn items_at(&self, location_id: Uuid) -> StorageResult<Vec<Item>> {
        self.items(ItemFilter::AtLocation(location_id), ItemSort::Name)
    }

    /// All locations in route order (position, then name)
    pub fn locations(&self) -> StorageResult<Vec<Location>> {
        let sql = format!(
            "SELECT {} FROM locations ORDER BY position, name COLLATE NOCASE, id",
            LOCATION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let locations = stmt
            .query_map([], location_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(locations)
    }

    /// Get an item by ID
    pub fn get_item(&self, id: Uuid) -> StorageResult<Option<Item>> {
        let sql = format!("SELECT {} FROM items i WHERE i.id = ?", ITEM_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![id.to_string()])?;

        match rows.next()? {
            Some(row) => Ok(Some(item_from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Get a location by ID
    pub fn get_location(&self, id: Uuid) -> StorageResult<Option<Location>> {
        let sql = format!("SELECT {} FROM locations WHERE id = ?", LOCATION_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![id.to_string()])?;

        match rows.next()? {
            Some(row) => Ok(Some(location_from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Highest position held by a user-defined location
    pub fn last_user_position(&self) -> StorageResult<Option<i32>> {
        let position: Option<i32> = self.conn.query_row(
            "SELECT MAX(position) FROM locations WHERE position < ?",
            params![UNKNOWN_POSITION],
            |row| row.get(0),
        )?;
        Ok(position)
    }
}

// ==================== Row mapping ====================

fn uuid_column(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn item_from_row(row: &Row) -> rusqlite::Result<Item> {
    let last_purchased = match row.get::<_, Option<i64>>(5)? {
        Some(millis) => Some(DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            rusqlite::Error::IntegralValueOutOfRange(5, millis)
        })?),
        None => None,
    };

    Ok(Item {
        id: uuid_column(row, 0)?,
        name: row.get(1)?,
        quantity: row.get(2)?,
        on_list: row.get(3)?,
        is_available: row.get(4)?,
        last_purchased,
        location_id: uuid_column(row, 6)?,
    })
}

fn location_from_row(row: &Row) -> rusqlite::Result<Location> {
    Ok(Location {
        id: uuid_column(row, 0)?,
        name: row.get(1)?,
        position: row.get(2)?,
        color: Color {
            red: row.get(3)?,
            green: row.get(4)?,
            blue: row.get(5)?,
            opacity: row.get(6)?,
        },
    })
}

// ==================== Transaction helpers ====================

/// Clear all data from tables (preserving schema)
fn clear_all_data(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute("DELETE FROM items", [])?;
    tx.execute("DELETE FROM locations", [])?;
    Ok(())
}

fn insert_location(tx: &Transaction, location: &Location) -> rusqlite::Result<()> {
    tx.execute(
        r#"
        INSERT INTO locations (id, name, position, red, green, blue, opacity)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            location.id.to_string(),
            location.name,
            location.position,
            location.color.red,
            location.color.green,
            location.color.blue,
            location.color.opacity,
        ],
    )?;
    Ok(())
}

fn insert_item(tx: &Transaction, item: &Item) -> rusqlite::Result<()> {
    tx.execute(
        r#"
        INSERT INTO items (id, name, quantity, on_list, is_available, last_purchased, location_id)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            item.id.to_string(),
            item.name,
            item.quantity,
            item.on_list,
            item.is_available,
            item.last_purchased.map(|d| d.timestamp_millis()),
            item.location_id.to_string(),
        ],
    )?;
    Ok(())
}
