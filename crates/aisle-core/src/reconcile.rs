//! Reconciliation engine
//!
//! Two merge problems live here:
//!
//! - **Unknown Location resolution.** Devices that each create an Unknown
//!   Location before they see each other's writes end up, after sync, with
//!   several. Every device independently picks the same winner (smallest id
//!   in its hyphenated string form), moves the losers' items onto it and
//!   deletes the losers. Because the choice depends only on the set of
//!   duplicates, replicas converge no matter who resolves first.
//! - **Archive import.** Records are merged by id without overwriting local
//!   edits: existing locations and items are only relinked, missing ones are
//!   created.
//!
//! Both operate on a [`ShoppingDocument`] and are meant to run inside
//! [`Store::transact`](crate::store::Store::transact).

use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

use crate::archive::LocationRecord;
use crate::document::ShoppingDocument;
use crate::error::Result;
use crate::models::{Location, UNKNOWN_POSITION};

/// Outcome of choosing among duplicate Unknown Locations
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// The Unknown Location that stays
    pub winner: Location,
    /// Duplicates to fold into the winner
    pub losers: Vec<Location>,
}

/// Pick the canonical Unknown Location
///
/// Only locations at the Unknown position are considered; `None` means
/// there are none. The result is independent of input order.
pub fn resolve(candidates: &[Location]) -> Option<Resolution> {
    let mut sentinels: Vec<&Location> = candidates.iter().filter(|l| l.is_unknown()).collect();
    sentinels.sort_by_cached_key(|l| l.id.to_string());

    let (winner, losers) = sentinels.split_first()?;
    Some(Resolution {
        winner: (*winner).clone(),
        losers: losers.iter().map(|l| (*l).clone()).collect(),
    })
}

/// What [`resolve_unknown_locations`] did
#[derive(Debug, Clone, PartialEq)]
pub struct SentinelOutcome {
    /// The single Unknown Location left in the document
    pub sentinel: Location,
    /// Whether it had to be created
    pub created: bool,
    /// Ids of duplicates that were folded in and deleted
    pub removed: Vec<Uuid>,
    /// How many items moved onto the winner
    pub items_moved: usize,
}

impl SentinelOutcome {
    /// Whether the document was modified
    pub fn changed(&self) -> bool {
        self.created || !self.removed.is_empty() || self.items_moved > 0
    }
}

/// Make sure exactly one Unknown Location exists and return it
///
/// Creates one when there is none and merges duplicates when there are
/// several. Items whose location no longer exists, for example because a
/// peer added them to a location this replica deleted, are moved onto the
/// winner too. Running it on a converged document changes nothing.
pub fn resolve_unknown_locations(doc: &mut ShoppingDocument) -> Result<SentinelOutcome> {
    let sentinels = doc.unknown_locations()?;

    let (winner, losers, created) = match resolve(&sentinels) {
        Some(Resolution { winner, losers }) => (winner, losers, false),
        None => {
            let sentinel = Location::unknown();
            doc.add_location(&sentinel)?;
            tracing::info!(id = %sentinel.id, "created Unknown Location");
            (sentinel, Vec::new(), true)
        }
    };

    let mut items_moved = 0;
    for loser in &losers {
        for item in doc.items_at(loser.id)? {
            doc.set_item_location(item.id, winner.id)?;
            items_moved += 1;
        }
        doc.delete_location(loser.id)?;
    }

    if !losers.is_empty() {
        tracing::info!(
            winner = %winner.id,
            removed = losers.len(),
            items_moved,
            "merged duplicate Unknown Locations"
        );
    }

    items_moved += rehome_stranded_items(doc, winner.id)?;

    Ok(SentinelOutcome {
        sentinel: winner,
        created,
        removed: losers.iter().map(|l| l.id).collect(),
        items_moved,
    })
}

/// Move items that reference a missing location onto `sentinel`
fn rehome_stranded_items(doc: &mut ShoppingDocument, sentinel: Uuid) -> Result<usize> {
    let known: HashSet<Uuid> = doc.get_all_locations()?.iter().map(|l| l.id).collect();

    let mut moved = 0;
    for item in doc.get_all_items()? {
        if !known.contains(&item.location_id) {
            tracing::warn!(
                item = %item.id,
                missing = %item.location_id,
                "moved stranded item to Unknown Location"
            );
            doc.set_item_location(item.id, sentinel)?;
            moved += 1;
        }
    }
    Ok(moved)
}

/// Counts reported after an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub locations_added: usize,
    pub items_added: usize,
    pub items_relinked: usize,
    pub items_unchanged: usize,
}

/// Merge decoded archive records into the document
///
/// The local Unknown Location is resolved first so that records at the
/// Unknown position always land on it. Records are processed in ascending
/// `visitationOrder`. Nothing local is overwritten: an existing location
/// keeps its name, color and position; an existing item keeps its fields
/// and is only moved to the record's location.
pub fn import_records(
    doc: &mut ShoppingDocument,
    records: &[LocationRecord],
) -> Result<ImportSummary> {
    let sentinel = resolve_unknown_locations(doc)?.sentinel;

    let mut ordered: Vec<&LocationRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.visitation_order);

    let mut summary = ImportSummary::default();
    for record in ordered {
        let target = if record.is_unknown() {
            sentinel.id
        } else {
            match doc.get_location(record.id)? {
                Some(existing) => existing.id,
                None => {
                    let location = record.to_location(next_position(doc)?);
                    doc.add_location(&location)?;
                    summary.locations_added += 1;
                    location.id
                }
            }
        };

        for item_record in &record.items {
            match doc.get_item(item_record.id)? {
                Some(existing) if existing.location_id == target => {
                    summary.items_unchanged += 1;
                }
                Some(existing) => {
                    doc.set_item_location(existing.id, target)?;
                    summary.items_relinked += 1;
                }
                None => {
                    doc.add_item(&item_record.to_item(target))?;
                    summary.items_added += 1;
                }
            }
        }
    }

    tracing::info!(
        locations_added = summary.locations_added,
        items_added = summary.items_added,
        items_relinked = summary.items_relinked,
        "imported archive"
    );
    Ok(summary)
}

/// Position for a location appended to the end of the route
pub(crate) fn next_position(doc: &ShoppingDocument) -> Result<i32> {
    Ok(match doc.last_user_position()? {
        Some(last) => last.saturating_add(1).min(UNKNOWN_POSITION - 1),
        None => 1,
    })
}
