//! Status command handler

use anyhow::Result;

use aisle_core::{ItemFilter, ShoppingList};

use crate::output::{Output, OutputFormat};

/// Counts fall back to zero so status always renders
fn count_or_zero(what: &str, count: aisle_core::Result<usize>) -> usize {
    count.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "could not count {}", what);
        0
    })
}

/// Show status information
pub fn show(list: &ShoppingList, output: &Output) -> Result<()> {
    let store = list.store();
    let config = store.config();

    let on_list = count_or_zero("items on list", store.count_items(ItemFilter::OnList));
    let items = count_or_zero("items", store.count_items(ItemFilter::All));
    let unavailable = count_or_zero("unavailable items", store.count_items(ItemFilter::Unavailable));
    let locations = count_or_zero("locations", store.count_locations());

    let document_size = std::fs::metadata(config.automerge_path())
        .map(|m| m.len())
        .unwrap_or(0);

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "sync_path": config.sync_path,
                    "document_size": document_size,
                    "counts": {
                        "on_list": on_list,
                        "items": items,
                        "unavailable": unavailable,
                        "locations": locations
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", on_list);
        }
        OutputFormat::Human => {
            println!("aisle Status");
            println!("============");
            println!();
            println!("Storage:");
            println!("  Location: {}", config.data_dir.display());
            println!("  Document: {} bytes", document_size);
            println!();
            println!("Sync:");
            match config.sync_path {
                Some(ref path) => println!("  Shared document: {}", path.display()),
                None => println!("  Shared document: (not set)"),
            }
            println!();
            println!("Contents:");
            println!("  On list:     {}", on_list);
            println!("  Items:       {}", items);
            println!("  Unavailable: {}", unavailable);
            println!("  Locations:   {}", locations);
        }
    }

    Ok(())
}
