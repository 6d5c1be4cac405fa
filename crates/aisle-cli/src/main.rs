//! aisle CLI
//!
//! Command-line interface for aisle - a local-first shopping list.

use std::fs::File;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use aisle_core::{Config, ItemSort, ShoppingList};

mod commands;
mod editor;
mod output;

use commands::item::{EditOptions, ListOptions};
use commands::view::GroupBy;
use output::{recovery_hint, Output, OutputFormat};

#[derive(Parser)]
#[command(name = "aisle")]
#[command(about = "aisle - Local-first shopping list")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage items
    Item {
        #[command(subcommand)]
        command: ItemCommands,
    },
    /// Manage store locations
    Location {
        #[command(subcommand)]
        command: LocationCommands,
    },
    /// Show the shopping list
    List {
        /// How to group items
        #[arg(short, long, value_enum, default_value = "location")]
        by: GroupBy,
    },
    /// Show every item, newest purchases first
    History {
        /// How to group items
        #[arg(short, long, value_enum, default_value = "date")]
        by: GroupBy,
        /// Only items whose name contains this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Print the shopping list as plain text
    Share,
    /// Export all items and locations to a JSON archive
    Export {
        /// Archive file to write
        file: PathBuf,
    },
    /// Merge a JSON archive into the list
    Import {
        /// Archive file to read
        file: PathBuf,
    },
    /// Sync with a shared document file
    Sync {
        /// Shared document (defaults to sync_path from config)
        path: Option<PathBuf>,
    },
    /// Show status (storage, sync, counts)
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Name,
    Purchased,
    Location,
}

impl From<SortArg> for ItemSort {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::Name => ItemSort::Name,
            SortArg::Purchased => ItemSort::LastPurchased,
            SortArg::Location => ItemSort::Location,
        }
    }
}

#[derive(Subcommand)]
enum ItemCommands {
    /// Add an item to the shopping list
    #[command(alias = "create")]
    Add {
        /// Item name
        name: String,
        /// Location (name, ID or prefix); defaults to the Unknown Location
        #[arg(short, long)]
        location: Option<String>,
        /// How many to buy
        #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..))]
        quantity: Option<u32>,
    },
    /// List items (on the list by default)
    #[command(alias = "ls")]
    List {
        /// Every item, on the list or not
        #[arg(short, long)]
        all: bool,
        /// Only items off the list
        #[arg(short, long, conflicts_with = "all")]
        purchased: bool,
        /// Only items marked unavailable
        #[arg(short, long)]
        unavailable: bool,
        /// Only items at this location
        #[arg(short, long)]
        location: Option<String>,
        /// Sort order
        #[arg(short, long, value_enum, default_value = "name")]
        sort: SortArg,
    },
    /// Show item details
    Show {
        /// Item ID (full UUID or prefix)
        id: String,
    },
    /// Edit an item (prompts when no flags are given)
    Edit {
        /// Item ID (full UUID or prefix)
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..))]
        quantity: Option<u32>,
        #[arg(short, long)]
        location: Option<String>,
    },
    /// Mark an item as purchased
    Purchase {
        /// Item ID (full UUID or prefix)
        id: String,
    },
    /// Put an item back on the list
    Restore {
        /// Item ID (full UUID or prefix)
        id: String,
    },
    /// Mark an item as available (or unavailable with --no)
    Available {
        /// Item ID (full UUID or prefix)
        id: String,
        /// Mark as unavailable instead
        #[arg(long)]
        no: bool,
    },
    /// Delete an item
    #[command(alias = "rm")]
    Delete {
        /// Item ID (full UUID or prefix)
        id: String,
    },
    /// Purchase everything on the list
    PurchaseAll,
    /// Mark everything on the list as available
    AvailableAll,
}

#[derive(Subcommand)]
enum LocationCommands {
    /// Add a location at the end of the route
    #[command(alias = "create")]
    Add {
        /// Location name
        name: String,
        /// Color as r,g,b[,a] with values from 0 to 1
        #[arg(short, long)]
        color: Option<String>,
    },
    /// List locations in route order
    #[command(alias = "ls")]
    List,
    /// Show a location and its items
    Show {
        /// Location (name, ID or prefix)
        id: String,
    },
    /// Rename or recolor a location
    Edit {
        /// Location (name, ID or prefix)
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        color: Option<String>,
    },
    /// Delete a location (its items move to the Unknown Location)
    #[command(alias = "rm")]
    Delete {
        /// Location (name, ID or prefix)
        id: String,
    },
    /// Set the route order; name every location except the Unknown Location
    Reorder {
        /// Locations in the order you walk the store
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, sync_path, settle_delay_ms, log_file)
        key: String,
        /// Configuration value (empty to clear optional paths)
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    let result = run(cli, &output).await;
    if let Err(err) = &result {
        if let Some(hint) = recovery_hint(err) {
            eprintln!("Hint: {}", hint);
        }
    }
    result
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    let config_path = cli.config.as_ref();

    // Config commands don't open the store
    if let Commands::Config { command } = &cli.command {
        return match command.clone() {
            Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key, value, config_path, output)
            }
        };
    }

    let config = commands::config::load(config_path)?;
    init_logging(&config);

    let mut list = ShoppingList::open(config)?;

    match cli.command {
        Commands::Item { command } => handle_item_command(command, &mut list, output),
        Commands::Location { command } => handle_location_command(command, &mut list, output),
        Commands::List { by } => commands::view::shopping_list(&list, by, output),
        Commands::History { by, search } => commands::view::history(&list, by, search, output),
        Commands::Share => commands::view::share(&list, output),
        Commands::Export { file } => commands::archive::export(&list, file, output).await,
        Commands::Import { file } => commands::archive::import(&mut list, file, output).await,
        Commands::Sync { path } => commands::sync::sync(&mut list, path, output).await,
        Commands::Status => commands::status::show(&list, output),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_item_command(
    command: ItemCommands,
    list: &mut ShoppingList,
    output: &Output,
) -> Result<()> {
    match command {
        ItemCommands::Add {
            name,
            location,
            quantity,
        } => commands::item::add(list, name, location, quantity, output),
        ItemCommands::List {
            all,
            purchased,
            unavailable,
            location,
            sort,
        } => {
            let options = ListOptions {
                all,
                purchased,
                unavailable,
                location,
                sort: sort.into(),
            };
            commands::item::list(list, options, output)
        }
        ItemCommands::Show { id } => commands::item::show(list, id, output),
        ItemCommands::Edit {
            id,
            name,
            quantity,
            location,
        } => {
            let options = EditOptions {
                name,
                quantity,
                location,
            };
            commands::item::edit(list, id, options, output)
        }
        ItemCommands::Purchase { id } => commands::item::purchase(list, id, output),
        ItemCommands::Restore { id } => commands::item::restore(list, id, output),
        ItemCommands::Available { id, no } => commands::item::available(list, id, !no, output),
        ItemCommands::Delete { id } => commands::item::delete(list, id, output),
        ItemCommands::PurchaseAll => commands::item::purchase_all(list, output),
        ItemCommands::AvailableAll => commands::item::available_all(list, output),
    }
}

fn handle_location_command(
    command: LocationCommands,
    list: &mut ShoppingList,
    output: &Output,
) -> Result<()> {
    match command {
        LocationCommands::Add { name, color } => {
            commands::location::add(list, name, color, output)
        }
        LocationCommands::List => commands::location::list(list, output),
        LocationCommands::Show { id } => commands::location::show(list, id, output),
        LocationCommands::Edit { id, name, color } => {
            commands::location::edit(list, id, name, color, output)
        }
        LocationCommands::Delete { id } => commands::location::delete(list, id, output),
        LocationCommands::Reorder { ids } => commands::location::reorder(list, ids, output),
    }
}

/// Install a log subscriber when AISLE_LOG is set
///
/// AISLE_LOG holds the level (e.g. "debug"). Logs go to `log_file` when
/// configured, otherwise stderr.
fn init_logging(config: &Config) {
    let Ok(log_level) = std::env::var("AISLE_LOG") else {
        return;
    };
    let log_level = if log_level.is_empty() {
        "info".to_string()
    } else {
        log_level
    };

    let env_filter = EnvFilter::new(format!(
        "aisle_core={},aisle_cli={}",
        log_level, log_level
    ));

    match config.log_file {
        Some(ref log_path) => {
            let log_file = match File::create(log_path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
                    return;
                }
            };

            // Ignore error if already initialized
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(log_file)
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }

    tracing::debug!(level = %log_level, "logging initialized");
}
