//! Sync command handler

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use aisle_core::ShoppingList;

use crate::output::{Output, OutputFormat};

/// Sync with a shared document file
///
/// The path comes from the command line, falling back to `sync_path`.
pub async fn sync(list: &mut ShoppingList, path: Option<PathBuf>, output: &Output) -> Result<()> {
    let path = match path.or_else(|| list.store().config().sync_path.clone()) {
        Some(path) => path,
        None => bail!(
            "No shared document configured. Pass a path or set one with:\n  \
             aisle config set sync_path /path/to/shared/shopping.automerge"
        ),
    };

    output.message(&format!("Syncing with {}...", path.display()));

    let report = list
        .sync_with_file(&path)
        .await
        .with_context(|| format!("Sync with {} failed", path.display()))?;

    match output.format {
        OutputFormat::Json => output.print_json(&report),
        _ => {
            if report.created_shared {
                output.success("Sync complete - shared document created");
            } else {
                output.success("Sync complete");
            }
            if report.sentinels_removed > 0 {
                output.message(&format!(
                    "  Merged {} duplicate Unknown Location(s), moved {} item(s)",
                    report.sentinels_removed, report.items_moved
                ));
            }
            output.message(&format!(
                "  On list: {}, Locations: {}",
                list.on_list_count()?,
                list.locations()?.len()
            ));
        }
    }

    Ok(())
}
