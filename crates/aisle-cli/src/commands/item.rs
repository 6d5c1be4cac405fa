//! Item command handlers

use anyhow::{bail, Context, Result};

use aisle_core::{ItemFilter, ItemSort, ShoppingList};

use super::{parse_item_id, parse_location_id};
use crate::editor::{confirm, is_interactive, prompt_with_default};
use crate::output::Output;

/// Which items `item list` shows
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub all: bool,
    pub purchased: bool,
    pub unavailable: bool,
    pub location: Option<String>,
    pub sort: ItemSort,
}

/// Changes requested by `item edit`
#[derive(Debug, Clone, Default)]
pub struct EditOptions {
    pub name: Option<String>,
    pub quantity: Option<u32>,
    pub location: Option<String>,
}

impl EditOptions {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.quantity.is_none() && self.location.is_none()
    }
}

/// Add an item to the shopping list
pub fn add(
    list: &mut ShoppingList,
    name: String,
    location: Option<String>,
    quantity: Option<u32>,
    output: &Output,
) -> Result<()> {
    let location_id = location
        .map(|l| parse_location_id(list, &l))
        .transpose()?;

    let item = list
        .add_item_with_quantity(&name, location_id, quantity.unwrap_or(1))
        .context("Failed to add item")?;

    output.success(&format!("Added item: {}", item.id));
    let owner = list.location(item.location_id)?;
    output.print_item(&item, owner.as_ref());
    Ok(())
}

/// List items
pub fn list(list: &ShoppingList, options: ListOptions, output: &Output) -> Result<()> {
    let filter = if let Some(location) = options.location {
        ItemFilter::AtLocation(parse_location_id(list, &location)?)
    } else if options.unavailable {
        ItemFilter::Unavailable
    } else if options.purchased {
        ItemFilter::OffList
    } else if options.all {
        ItemFilter::All
    } else {
        ItemFilter::OnList
    };

    let items = list.items(filter, options.sort)?;
    let locations = list.locations()?;
    output.print_items(&items, &locations);
    Ok(())
}

/// Show a single item
pub fn show(list: &ShoppingList, id: String, output: &Output) -> Result<()> {
    let uuid = parse_item_id(list, &id)?;
    let item = list
        .item(uuid)?
        .ok_or_else(|| anyhow::anyhow!("Item not found: {}", id))?;

    let owner = list.location(item.location_id)?;
    output.print_item(&item, owner.as_ref());
    Ok(())
}

/// Edit an item
///
/// With no flags on a terminal, prompts for each field.
pub fn edit(
    list: &mut ShoppingList,
    id: String,
    mut options: EditOptions,
    output: &Output,
) -> Result<()> {
    let uuid = parse_item_id(list, &id)?;
    let mut item = list
        .item(uuid)?
        .ok_or_else(|| anyhow::anyhow!("Item not found: {}", id))?;

    if options.is_empty() {
        if !(output.should_prompt() && is_interactive()) {
            bail!("Nothing to change. Use --name, --quantity or --location.");
        }

        println!("Editing item: {}", item.id);
        println!("Press Enter to keep current value, or type new value.\n");

        options.name = prompt_with_default("Name", &item.name)?;
        if let Some(quantity) = prompt_with_default("Quantity", &item.quantity.to_string())? {
            options.quantity = Some(
                quantity
                    .parse()
                    .with_context(|| format!("Invalid quantity: {}", quantity))?,
            );
        }
        let current = list
            .location(item.location_id)?
            .map(|l| l.name)
            .unwrap_or_default();
        options.location = prompt_with_default("Location", &current)?;
    }

    if let Some(name) = options.name {
        item.name = name.trim().to_string();
    }
    if let Some(quantity) = options.quantity {
        item.quantity = quantity;
    }
    if let Some(location) = options.location {
        item.location_id = parse_location_id(list, &location)?;
    }

    list.update_item(&item).context("Failed to update item")?;

    output.success("Item updated");
    let owner = list.location(item.location_id)?;
    output.print_item(&item, owner.as_ref());
    Ok(())
}

/// Mark an item as purchased
pub fn purchase(list: &mut ShoppingList, id: String, output: &Output) -> Result<()> {
    let uuid = parse_item_id(list, &id)?;
    let item = list.purchase_item(uuid).context("Failed to purchase item")?;
    output.success(&format!("Purchased: {}", item.name));
    Ok(())
}

/// Put an item back on the list
pub fn restore(list: &mut ShoppingList, id: String, output: &Output) -> Result<()> {
    let uuid = parse_item_id(list, &id)?;
    let item = list.move_to_list(uuid).context("Failed to restore item")?;
    output.success(&format!("Back on the list: {}", item.name));
    Ok(())
}

/// Mark an item as available or unavailable
pub fn available(
    list: &mut ShoppingList,
    id: String,
    available: bool,
    output: &Output,
) -> Result<()> {
    let uuid = parse_item_id(list, &id)?;
    let item = list
        .set_available(uuid, available)
        .context("Failed to update item")?;

    let state = if available { "available" } else { "unavailable" };
    output.success(&format!("{} is {}", item.name, state));
    Ok(())
}

/// Delete an item
pub fn delete(list: &mut ShoppingList, id: String, output: &Output) -> Result<()> {
    let uuid = parse_item_id(list, &id)?;
    let item = list
        .item(uuid)?
        .ok_or_else(|| anyhow::anyhow!("Item not found: {}", id))?;

    // Confirm deletion
    if output.should_prompt() {
        println!("Delete item: {} - {}", &item.id.to_string()[..8], item.name);
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    list.delete_item(uuid).context("Failed to delete item")?;
    output.success(&format!("Deleted item: {}", uuid));
    Ok(())
}

/// Purchase everything on the list
pub fn purchase_all(list: &mut ShoppingList, output: &Output) -> Result<()> {
    let count = list
        .mark_all_purchased()
        .context("Failed to purchase items")?;
    output.success(&format!("Purchased {} item(s)", count));
    Ok(())
}

/// Mark everything on the list as available
pub fn available_all(list: &mut ShoppingList, output: &Output) -> Result<()> {
    let count = list
        .mark_all_available()
        .context("Failed to update items")?;
    output.success(&format!("Marked {} item(s) available", count));
    Ok(())
}
