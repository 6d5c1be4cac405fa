//! Export and import of JSON archives

use std::path::PathBuf;

use anyhow::{Context, Result};

use aisle_core::ShoppingList;

use crate::output::Output;

/// Write every location and item to a JSON archive
pub async fn export(list: &ShoppingList, path: PathBuf, output: &Output) -> Result<()> {
    let count = list
        .export_archive(&path)
        .await
        .with_context(|| format!("Failed to export to {}", path.display()))?;

    output.success(&format!(
        "Exported {} location(s) to {}",
        count,
        path.display()
    ));
    Ok(())
}

/// Merge a JSON archive into the list
pub async fn import(list: &mut ShoppingList, path: PathBuf, output: &Output) -> Result<()> {
    let summary = list
        .import_archive(&path)
        .await
        .with_context(|| format!("Failed to import {}", path.display()))?;

    output.print_import_summary(&summary);
    Ok(())
}
