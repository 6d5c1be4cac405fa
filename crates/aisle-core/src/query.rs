//! Filters and orderings for bulk item queries

use uuid::Uuid;

/// Which items a query covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemFilter {
    /// Every item
    All,
    /// Items on the active shopping list
    OnList,
    /// Items not on the list (the purchase history)
    OffList,
    /// Items marked as not found in the store
    Unavailable,
    /// Items owned by one location
    AtLocation(Uuid),
}

impl ItemFilter {
    /// SQL predicate over the `items` table (aliased `i`) plus its parameters
    pub(crate) fn to_sql(self) -> (&'static str, Vec<String>) {
        match self {
            ItemFilter::All => ("1 = 1", Vec::new()),
            ItemFilter::OnList => ("i.on_list = 1", Vec::new()),
            ItemFilter::OffList => ("i.on_list = 0", Vec::new()),
            ItemFilter::Unavailable => ("i.is_available = 0", Vec::new()),
            ItemFilter::AtLocation(id) => ("i.location_id = ?", vec![id.to_string()]),
        }
    }
}

/// Deterministic ordering for bulk item queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemSort {
    /// Case-insensitive name, then id
    #[default]
    Name,
    /// Most recently purchased first, never-purchased last, then name
    LastPurchased,
    /// Location route order, then name
    Location,
}

impl ItemSort {
    pub(crate) fn to_sql(self) -> &'static str {
        match self {
            ItemSort::Name => "i.name COLLATE NOCASE, i.id",
            ItemSort::LastPurchased => {
                "i.last_purchased IS NULL, i.last_purchased DESC, i.name COLLATE NOCASE, i.id"
            }
            ItemSort::Location => "l.position, l.name COLLATE NOCASE, i.name COLLATE NOCASE, i.id",
        }
    }
}
