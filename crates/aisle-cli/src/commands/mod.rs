//! Command handlers
//!
//! Each submodule handles one top-level command. Ids on the command line
//! may be full UUIDs or unique prefixes; locations may also be named.

pub mod archive;
pub mod config;
pub mod item;
pub mod location;
pub mod status;
pub mod sync;
pub mod view;

use anyhow::{bail, Result};
use uuid::Uuid;

use aisle_core::{Item, ItemFilter, ItemSort, Location, ShoppingList};

/// Resolve an item id (full UUID or prefix)
pub fn parse_item_id(list: &ShoppingList, id: &str) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(id) {
        return Ok(uuid);
    }

    let items = list.items(ItemFilter::All, ItemSort::Name)?;
    let matches = match_prefix(&items, id, |i: &Item| i.id);

    match matches.len() {
        0 => bail!("No item found matching: {}", id),
        1 => Ok(matches[0].id),
        _ => {
            eprintln!("Multiple items match '{}':", id);
            for item in &matches {
                eprintln!("  {} - {}", item.id, item.name);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}

/// Resolve a location by UUID, id prefix, or case-insensitive name
pub fn parse_location_id(list: &ShoppingList, id: &str) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(id) {
        return Ok(uuid);
    }

    let locations = list.locations()?;
    if let Some(location) = find_by_name(&locations, id) {
        return Ok(location.id);
    }

    let matches = match_prefix(&locations, id, |l: &Location| l.id);
    match matches.len() {
        0 => bail!("No location found matching: {}", id),
        1 => Ok(matches[0].id),
        _ => {
            eprintln!("Multiple locations match '{}':", id);
            for location in &matches {
                eprintln!("  {} - {}", location.id, location.name);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}

fn find_by_name<'a>(locations: &'a [Location], name: &str) -> Option<&'a Location> {
    let name = name.trim().to_lowercase();
    locations.iter().find(|l| l.name.to_lowercase() == name)
}

fn match_prefix<'a, T>(entries: &'a [T], prefix: &str, id: impl Fn(&T) -> Uuid) -> Vec<&'a T> {
    let prefix = prefix.to_lowercase();
    entries
        .iter()
        .filter(|e| id(e).to_string().starts_with(&prefix))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aisle_core::Config;
    use tempfile::TempDir;

    fn open_list(temp_dir: &TempDir) -> ShoppingList {
        ShoppingList::open(Config::with_data_dir(temp_dir.path())).unwrap()
    }

    #[test]
    fn test_parse_item_id_by_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let mut list = open_list(&temp_dir);
        let item = list.add_item("Milk", None).unwrap();

        let full = item.id.to_string();
        assert_eq!(parse_item_id(&list, &full).unwrap(), item.id);
        assert_eq!(parse_item_id(&list, &full[..8]).unwrap(), item.id);
        assert_eq!(
            parse_item_id(&list, &full[..8].to_uppercase()).unwrap(),
            item.id
        );
        assert!(parse_item_id(&list, "zzzz").is_err());
    }

    #[test]
    fn test_parse_location_id_by_name() {
        let temp_dir = TempDir::new().unwrap();
        let mut list = open_list(&temp_dir);
        let dairy = list.add_location("Dairy", None).unwrap();

        assert_eq!(parse_location_id(&list, "dairy").unwrap(), dairy.id);
        assert_eq!(parse_location_id(&list, " DAIRY ").unwrap(), dairy.id);
        assert_eq!(
            parse_location_id(&list, &dairy.id.to_string()[..6]).unwrap(),
            dairy.id
        );
        assert!(parse_location_id(&list, "Bakery").is_err());
    }
}
