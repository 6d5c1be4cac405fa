//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use aisle_core::{ImportSummary, Item, ItemSection, Location, StorageError};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print a single item
    pub fn print_item(&self, item: &Item, location: Option<&Location>) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:             {}", item.id);
                println!("Name:           {}", item.name);
                println!("Quantity:       {}", item.quantity);
                println!("On list:        {}", yes_no(item.on_list));
                println!("Available:      {}", yes_no(item.is_available));
                println!("Last purchased: {}", item.date_text());
                match location {
                    Some(location) => println!("Location:       {}", location.name),
                    None => println!("Location:       {}", item.location_id),
                }
            }
            OutputFormat::Json => print_json(item),
            OutputFormat::Quiet => println!("{}", item.id),
        }
    }

    /// Print a list of items with their location names
    pub fn print_items(&self, items: &[Item], locations: &[Location]) {
        match self.format {
            OutputFormat::Human => {
                if items.is_empty() {
                    println!("No items found.");
                    return;
                }
                let names = location_names(locations);
                for item in items {
                    let marker = if item.on_list { "*" } else { " " };
                    println!(
                        "{} {} | {} | x{} | {}",
                        marker,
                        short_id(item.id),
                        pad(&truncate(&item.name, 30), 30),
                        item.quantity,
                        names.get(&item.location_id).copied().unwrap_or("?")
                    );
                }
                println!("\n{} item(s)", items.len());
            }
            OutputFormat::Json => print_json(&items),
            OutputFormat::Quiet => {
                for item in items {
                    println!("{}", item.id);
                }
            }
        }
    }

    /// Print a single location
    pub fn print_location(&self, location: &Location, items: &[Item]) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:       {}", location.id);
                println!("Name:     {}", location.name);
                if location.is_unknown() {
                    println!("Position: (last)");
                } else {
                    println!("Position: {}", location.position);
                }
                println!("Color:    {}", location.color);

                if !items.is_empty() {
                    println!();
                    println!("── Items ({}) ──", items.len());
                    for item in items {
                        let marker = if item.on_list { "*" } else { " " };
                        println!("{} {} {}", marker, short_id(item.id), item.name);
                    }
                }
            }
            OutputFormat::Json => print_json(&serde_json::json!({
                "location": location,
                "items": items,
            })),
            OutputFormat::Quiet => println!("{}", location.id),
        }
    }

    /// Print locations in route order
    pub fn print_locations(&self, locations: &[Location]) {
        match self.format {
            OutputFormat::Human => {
                if locations.is_empty() {
                    println!("No locations found.");
                    return;
                }
                for location in locations {
                    let position = if location.is_unknown() {
                        "-".to_string()
                    } else {
                        location.position.to_string()
                    };
                    println!(
                        "{} | {:>3} | {}",
                        short_id(location.id),
                        position,
                        location.name
                    );
                }
                println!("\n{} location(s)", locations.len());
            }
            OutputFormat::Json => print_json(&locations),
            OutputFormat::Quiet => {
                for location in locations {
                    println!("{}", location.id);
                }
            }
        }
    }

    /// Print titled sections of items
    pub fn print_sections(&self, sections: &[ItemSection], empty_message: &str) {
        match self.format {
            OutputFormat::Human => {
                if sections.is_empty() {
                    println!("{}", empty_message);
                    return;
                }
                for (i, section) in sections.iter().enumerate() {
                    if i > 0 {
                        println!();
                    }
                    println!("{}", section.title);
                    for item in &section.items {
                        let quantity = if item.quantity > 1 {
                            format!(" (x{})", item.quantity)
                        } else {
                            String::new()
                        };
                        let unavailable = if item.is_available { "" } else { " [unavailable]" };
                        println!(
                            "  {} {}{}{}",
                            short_id(item.id),
                            item.name,
                            quantity,
                            unavailable
                        );
                    }
                }
            }
            OutputFormat::Json => print_json(&sections),
            OutputFormat::Quiet => {
                for item in sections.iter().flat_map(|s| &s.items) {
                    println!("{}", item.id);
                }
            }
        }
    }

    /// Print the counts from an archive import
    pub fn print_import_summary(&self, summary: &ImportSummary) {
        match self.format {
            OutputFormat::Human => {
                println!("✓ Import complete");
                println!("  Locations added: {}", summary.locations_added);
                println!("  Items added:     {}", summary.items_added);
                println!("  Items moved:     {}", summary.items_relinked);
                println!("  Unchanged:       {}", summary.items_unchanged);
            }
            OutputFormat::Json => print_json(summary),
            OutputFormat::Quiet => {}
        }
    }

    /// Print any serializable value as JSON
    pub fn print_json<T: Serialize>(&self, value: &T) {
        print_json(value);
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// What the user can do about a failed command, if the cause is a storage problem
pub fn recovery_hint(err: &anyhow::Error) -> Option<&'static str> {
    err.chain().find_map(|cause| {
        if let Some(aisle_core::Error::Storage(storage)) =
            cause.downcast_ref::<aisle_core::Error>()
        {
            return storage.recovery_suggestion();
        }
        cause
            .downcast_ref::<StorageError>()
            .and_then(StorageError::recovery_suggestion)
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to encode JSON output: {}", e),
    }
}

fn location_names(locations: &[Location]) -> HashMap<Uuid, &str> {
    locations
        .iter()
        .map(|l| (l.id, l.name.as_str()))
        .collect()
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// First eight characters of an id, enough to pass back as a prefix
pub fn short_id(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

/// Right-pad to a character width
fn pad(s: &str, width: usize) -> String {
    format!("{:<width$}", s, width = width)
}
