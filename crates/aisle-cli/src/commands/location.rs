//! Location command handlers

use anyhow::{anyhow, Context, Result};

use aisle_core::{Color, ShoppingList};

use super::parse_location_id;
use crate::editor::confirm;
use crate::output::Output;

fn parse_color(value: &str) -> Result<Color> {
    Color::parse(value).ok_or_else(|| {
        anyhow!(
            "Invalid color '{}'. Use r,g,b or r,g,b,a with values from 0 to 1.",
            value
        )
    })
}

/// Add a location at the end of the route
pub fn add(
    list: &mut ShoppingList,
    name: String,
    color: Option<String>,
    output: &Output,
) -> Result<()> {
    let color = color.as_deref().map(parse_color).transpose()?;
    let location = list
        .add_location(&name, color)
        .context("Failed to add location")?;

    output.success(&format!("Added location: {}", location.id));
    output.print_location(&location, &[]);
    Ok(())
}

/// List locations in route order
pub fn list(list: &ShoppingList, output: &Output) -> Result<()> {
    output.print_locations(&list.locations()?);
    Ok(())
}

/// Show a location and its items
pub fn show(list: &ShoppingList, id: String, output: &Output) -> Result<()> {
    let uuid = parse_location_id(list, &id)?;
    let location = list
        .location(uuid)?
        .ok_or_else(|| anyhow!("Location not found: {}", id))?;

    let items = list.items_at(uuid)?;
    output.print_location(&location, &items);
    Ok(())
}

/// Rename or recolor a location
pub fn edit(
    list: &mut ShoppingList,
    id: String,
    name: Option<String>,
    color: Option<String>,
    output: &Output,
) -> Result<()> {
    let uuid = parse_location_id(list, &id)?;
    let mut location = list
        .location(uuid)?
        .ok_or_else(|| anyhow!("Location not found: {}", id))?;

    if let Some(name) = name {
        location.name = name;
    }
    if let Some(color) = color {
        location.set_color(parse_color(&color)?);
    }

    let location = list
        .update_location(&location)
        .context("Failed to update location")?;

    output.success("Location updated");
    output.print_location(&location, &[]);
    Ok(())
}

/// Delete a location; its items move to the Unknown Location
pub fn delete(list: &mut ShoppingList, id: String, output: &Output) -> Result<()> {
    let uuid = parse_location_id(list, &id)?;
    let location = list
        .location(uuid)?
        .ok_or_else(|| anyhow!("Location not found: {}", id))?;

    if output.should_prompt() {
        let count = list.items_at(uuid)?.len();
        println!(
            "Delete location: {} - {} ({} item(s) will move to the Unknown Location)",
            &location.id.to_string()[..8],
            location.name,
            count
        );
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let moved = list
        .delete_location(uuid)
        .context("Failed to delete location")?;
    output.success(&format!(
        "Deleted location: {} ({} item(s) moved)",
        location.name, moved
    ));
    Ok(())
}

/// Set the route order from a full list of locations
pub fn reorder(list: &mut ShoppingList, ids: Vec<String>, output: &Output) -> Result<()> {
    let order = ids
        .iter()
        .map(|id| parse_location_id(list, id))
        .collect::<Result<Vec<_>>>()?;

    list.reorder_locations(&order).context(
        "Failed to reorder locations (name every location except the Unknown Location once)",
    )?;

    output.success("Locations reordered");
    if !output.is_quiet() {
        output.print_locations(&list.locations()?);
    }
    Ok(())
}
