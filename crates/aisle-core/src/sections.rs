//! Grouping items into titled sections for display and sharing

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Item, Location};

/// How a list of items is broken into sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayType {
    /// One alphabetical section
    ByName,
    /// One section per location, in route order
    #[default]
    ByLocation,
    /// One section per purchase day, newest first
    ByDate,
}

/// A titled run of items
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemSection {
    pub title: String,
    /// Set for sections built per location
    pub location_id: Option<Uuid>,
    pub items: Vec<Item>,
}

impl ItemSection {
    fn new(title: impl Into<String>, items: Vec<Item>) -> Self {
        Self {
            title: title.into(),
            location_id: None,
            items,
        }
    }
}

/// Sections for the active shopping list
///
/// `on_list` should hold only items on the list. Nothing on the list means
/// no sections at all.
pub fn list_sections(
    display: DisplayType,
    locations: &[Location],
    on_list: Vec<Item>,
) -> Vec<ItemSection> {
    if on_list.is_empty() {
        return Vec::new();
    }

    match display {
        DisplayType::ByName => {
            let title = format!("Items Remaining: {}", on_list.len());
            vec![ItemSection::new(title, sorted_by_name(on_list))]
        }
        DisplayType::ByLocation => by_location(locations, on_list),
        DisplayType::ByDate => by_date(on_list),
    }
}

/// Sections for the full item catalog, optionally narrowed by a search
///
/// The search is a case-insensitive substring match on the name; the
/// "Items" count in the by-name title covers the whole catalog.
pub fn history_sections(
    display: DisplayType,
    locations: &[Location],
    items: Vec<Item>,
    search: Option<&str>,
) -> Vec<ItemSection> {
    let total = items.len();
    let items: Vec<Item> = match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(needle) => {
            let needle = needle.to_lowercase();
            items
                .into_iter()
                .filter(|item| item.name.to_lowercase().contains(&needle))
                .collect()
        }
        None => items,
    };

    match display {
        DisplayType::ByName => vec![ItemSection::new(
            format!("Items: {}", total),
            sorted_by_name(items),
        )],
        DisplayType::ByLocation => by_location(locations, items),
        DisplayType::ByDate => by_date(items),
    }
}

/// Plain-text rendering of sections, as sent from the share sheet
pub fn share_text(sections: &[ItemSection]) -> String {
    let mut message = String::from("Items on your Shopping List: \n");
    for section in sections {
        message.push('\n');
        message.push_str(&section.title);
        message.push_str("\n\n");
        for item in &section.items {
            message.push_str("  ");
            message.push_str(&item.name);
            message.push('\n');
        }
    }
    message
}

fn sorted_by_name(mut items: Vec<Item>) -> Vec<Item> {
    items.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
    items
}

fn by_location(locations: &[Location], items: Vec<Item>) -> Vec<ItemSection> {
    let mut grouped: HashMap<Uuid, Vec<Item>> = HashMap::new();
    for item in items {
        grouped.entry(item.location_id).or_default().push(item);
    }

    let mut ordered: Vec<&Location> = locations.iter().collect();
    ordered.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });

    ordered
        .into_iter()
        .filter_map(|location| {
            let items = grouped.remove(&location.id)?;
            Some(ItemSection {
                title: location.name.clone(),
                location_id: Some(location.id),
                items: sorted_by_name(items),
            })
        })
        .collect()
}

fn by_date(items: Vec<Item>) -> Vec<ItemSection> {
    let mut days: BTreeMap<NaiveDate, Vec<Item>> = BTreeMap::new();
    let mut never = Vec::new();
    for item in items {
        match item.last_purchased {
            Some(date) => days.entry(date.date_naive()).or_default().push(item),
            None => never.push(item),
        }
    }

    let mut sections: Vec<ItemSection> = days
        .into_iter()
        .rev()
        .map(|(day, items)| {
            ItemSection::new(day.format("%A, %B %-d, %Y").to_string(), sorted_by_name(items))
        })
        .collect();

    if !never.is_empty() {
        sections.push(ItemSection::new("Never Purchased", sorted_by_name(never)));
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn titles(sections: &[ItemSection]) -> Vec<&str> {
        sections.iter().map(|s| s.title.as_str()).collect()
    }

    fn names(section: &ItemSection) -> Vec<&str> {
        section.items.iter().map(|i| i.name.as_str()).collect()
    }

    struct Aisles {
        dairy: Location,
        produce: Location,
        unknown: Location,
    }

    fn aisles() -> Aisles {
        Aisles {
            dairy: Location::new("Dairy", 1),
            produce: Location::new("Produce", 0),
            unknown: Location::unknown(),
        }
    }

    impl Aisles {
        fn all(&self) -> Vec<Location> {
            vec![self.unknown.clone(), self.dairy.clone(), self.produce.clone()]
        }
    }

    #[test]
    fn test_empty_list_has_no_sections() {
        let a = aisles();
        for display in [DisplayType::ByName, DisplayType::ByLocation, DisplayType::ByDate] {
            assert!(list_sections(display, &a.all(), Vec::new()).is_empty());
        }
    }

    #[test]
    fn test_by_name() {
        let a = aisles();
        let items = vec![
            Item::new("milk", a.dairy.id),
            Item::new("Apples", a.produce.id),
        ];

        let sections = list_sections(DisplayType::ByName, &a.all(), items);
        assert_eq!(titles(&sections), vec!["Items Remaining: 2"]);
        assert_eq!(names(&sections[0]), vec!["Apples", "milk"]);
    }

    #[test]
    fn test_by_location_follows_route_and_skips_empty() {
        let a = aisles();
        let items = vec![
            Item::new("Yogurt", a.dairy.id),
            Item::new("Cheese", a.dairy.id),
            Item::new("Foil", a.unknown.id),
        ];

        let sections = list_sections(DisplayType::ByLocation, &a.all(), items);
        assert_eq!(titles(&sections), vec!["Dairy", "Unknown Location"]);
        assert_eq!(names(&sections[0]), vec!["Cheese", "Yogurt"]);
        assert_eq!(sections[0].location_id, Some(a.dairy.id));
    }

    #[test]
    fn test_by_date_newest_first_then_never() {
        let a = aisles();
        let mut older = Item::new("Flour", a.unknown.id);
        older.last_purchased = DateTime::from_timestamp(1_700_000_000, 0);
        let mut newer = Item::new("Sugar", a.unknown.id);
        newer.last_purchased = DateTime::from_timestamp(1_700_100_000, 0);
        let never = Item::new("Yeast", a.unknown.id);

        let sections = history_sections(
            DisplayType::ByDate,
            &a.all(),
            vec![older, never, newer],
            None,
        );
        assert_eq!(
            titles(&sections),
            vec![
                "Thursday, November 16, 2023",
                "Tuesday, November 14, 2023",
                "Never Purchased"
            ]
        );
        assert_eq!(names(&sections[2]), vec!["Yeast"]);
    }

    #[test]
    fn test_history_search() {
        let a = aisles();
        let items = vec![
            Item::new("Green Tea", a.unknown.id),
            Item::new("Teabags", a.unknown.id),
            Item::new("Coffee", a.unknown.id),
        ];

        let sections = history_sections(DisplayType::ByName, &a.all(), items, Some("tea"));
        assert_eq!(titles(&sections), vec!["Items: 3"]);
        assert_eq!(names(&sections[0]), vec!["Green Tea", "Teabags"]);
    }

    #[test]
    fn test_share_text() {
        let a = aisles();
        let items = vec![
            Item::new("Milk", a.dairy.id),
            Item::new("Pears", a.produce.id),
        ];
        let sections = list_sections(DisplayType::ByLocation, &a.all(), items);

        assert_eq!(
            share_text(&sections),
            "Items on your Shopping List: \n\nProduce\n\n  Pears\n\nDairy\n\n  Milk\n"
        );
    }
}
