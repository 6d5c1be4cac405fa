//! Shopping list, history and share views

use anyhow::Result;
use clap::ValueEnum;

use aisle_core::{DisplayType, ShoppingList};

use crate::output::{Output, OutputFormat};

/// How `list` and `history` group their items
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GroupBy {
    Name,
    Location,
    Date,
}

impl From<GroupBy> for DisplayType {
    fn from(group: GroupBy) -> Self {
        match group {
            GroupBy::Name => DisplayType::ByName,
            GroupBy::Location => DisplayType::ByLocation,
            GroupBy::Date => DisplayType::ByDate,
        }
    }
}

/// Show the shopping list
pub fn shopping_list(list: &ShoppingList, by: GroupBy, output: &Output) -> Result<()> {
    let sections = list.sections(by.into())?;
    output.print_sections(&sections, "Your shopping list is empty.");
    Ok(())
}

/// Show every item, optionally filtered by name
pub fn history(
    list: &ShoppingList,
    by: GroupBy,
    search: Option<String>,
    output: &Output,
) -> Result<()> {
    let sections = list.history(by.into(), search.as_deref())?;
    output.print_sections(&sections, "No items found.");
    Ok(())
}

/// Print the list as shareable text
pub fn share(list: &ShoppingList, output: &Output) -> Result<()> {
    let text = list.share_text()?;
    match output.format {
        OutputFormat::Json => output.print_json(&serde_json::json!({ "text": text })),
        _ => print!("{}", text),
    }
    Ok(())
}
