//! Config command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};

use aisle_core::Config;

use crate::output::{Output, OutputFormat};

/// Load from the CLI-specified path, or the default location
pub fn load(config_path: Option<&PathBuf>) -> Result<Config> {
    let config = match config_path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    config.context("Failed to load configuration")
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(not set)".to_string())
}

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config = load(config_path)?;

    match output.format {
        OutputFormat::Json => output.print_json(&config),
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:        {}", config.data_dir.display());
            println!("  sync_path:       {}", display_path(&config.sync_path));
            println!("  settle_delay_ms: {}", config.settle_delay_ms);
            println!("  log_file:        {}", display_path(&config.log_file));
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config = load(config_path)?;
    config.set(&key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}
