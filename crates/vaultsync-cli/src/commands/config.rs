//! Config command - View and manage VaultSync configuration
//!
//! Provides the `vaultsync config` CLI command which:
//! 1. Shows the current configuration (YAML or JSON)
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use vaultsync_core::config::Config;

use crate::app::AppContext;

/// Keys accepted by `config set`, with a short description
const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("sync.local_root", "Root directory of the local tree"),
    ("sync.batch_size", "Maximum concurrent remote calls"),
    ("sync.remote_timeout_secs", "Seconds before a remote call fails"),
    ("sync.pull_on_startup", "true|false"),
    ("remote.api_base_url", "Base URL of the files API"),
    ("remote.token_url", "Access token endpoint"),
    ("remote.ping_url", "Connectivity probe endpoint"),
    ("remote.vault_name", "Name scoping every remote object"),
    ("config_files.directory", "Host configuration folder"),
    ("config_files.whitelist", "Comma-separated entries to sync"),
    ("config_files.blacklist", "Comma-separated entries never synced"),
    ("logging.level", "trace|debug|info|warn|error"),
    ("state.path", "Location of the state document"),
];

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Print the configuration file location
    Path,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "sync.local_root")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(app),
            ConfigCommand::Path => {
                if app.format.is_json() {
                    app.formatter().print_json(&serde_json::json!({
                        "config_path": app.config_path.display().to_string(),
                        "exists": app.config_path.exists(),
                    }));
                } else {
                    println!("{}", app.config_path.display());
                }
                Ok(())
            }
            ConfigCommand::Set { key, value } => self.execute_set(app, key, value),
            ConfigCommand::Validate => self.execute_validate(app),
        }
    }

    fn execute_show(&self, app: &AppContext) -> Result<()> {
        let formatter = app.formatter();
        info!(config_path = %app.config_path.display(), "Showing configuration");

        if app.format.is_json() {
            let json = serde_json::to_value(&app.config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", app.config_path.display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(&app.config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                formatter.info(line);
            }
        }
        Ok(())
    }

    fn execute_set(&self, app: &AppContext, key: &str, value: &str) -> Result<()> {
        let formatter = app.formatter();
        let mut config = app.config.clone();
        info!(key = %key, value = %value, "Setting configuration value");

        if let Err(e) = apply_config_value(&mut config, key, value) {
            if app.format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "error": e.to_string(),
                }));
            } else {
                formatter.error(&format!("Failed to set '{}': {}", key, e));
                formatter.info("");
                formatter.info("Supported keys:");
                for (key, description) in SUPPORTED_KEYS {
                    formatter.info(&format!("  {:<28} - {}", key, description));
                }
            }
            return Ok(());
        }

        let errors: Vec<String> = config
            .validate()
            .into_iter()
            .filter(|e| e.field == key)
            .map(|e| e.message)
            .collect();
        if !errors.is_empty() {
            if app.format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "errors": errors,
                }));
            } else {
                formatter.error(&format!(
                    "Invalid value for '{}': {}",
                    key,
                    errors.join("; ")
                ));
            }
            return Ok(());
        }

        config
            .save(&app.config_path)
            .context("Failed to write configuration file")?;

        if app.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "key": key,
                "value": value,
                "config_path": app.config_path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Set {} = {}", key, value));
            formatter.info(&format!("Saved to {}", app.config_path.display()));
        }
        Ok(())
    }

    fn execute_validate(&self, app: &AppContext) -> Result<()> {
        let formatter = app.formatter();
        let config_path = &app.config_path;

        if !config_path.exists() {
            if app.format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": ["Configuration file not found. Using defaults."],
                }));
            } else {
                formatter.info(&format!(
                    "Configuration file not found at {}",
                    config_path.display()
                ));
                formatter.info(
                    "Using default configuration. Run 'vaultsync config set <key> <value>' to create one.",
                );
            }
            return Ok(());
        }

        // Parse the file itself; the loaded context may hold defaults.
        let config = match Config::load(config_path) {
            Ok(config) => config,
            Err(e) => {
                if app.format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": config_path.display().to_string(),
                        "errors": [format!("Failed to parse configuration: {}", e)],
                    }));
                } else {
                    formatter.error(&format!("Failed to parse configuration: {}", e));
                    formatter.info(&format!("File: {}", config_path.display()));
                }
                return Ok(());
            }
        };

        info!(config_path = %config_path.display(), "Validating configuration");
        let errors = config.validate();

        if app.format.is_json() {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {}", config_path.display()));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }
        Ok(())
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- sync ---
        "sync.local_root" => {
            config.sync.local_root = PathBuf::from(value);
        }
        "sync.batch_size" => {
            config.sync.batch_size = value
                .parse::<usize>()
                .context("Expected a positive integer for sync.batch_size")?;
        }
        "sync.remote_timeout_secs" => {
            config.sync.remote_timeout_secs = value
                .parse::<u64>()
                .context("Expected a positive integer for sync.remote_timeout_secs")?;
        }
        "sync.pull_on_startup" => {
            config.sync.pull_on_startup = value
                .parse::<bool>()
                .context("Expected true or false for sync.pull_on_startup")?;
        }

        // --- remote ---
        "remote.api_base_url" => config.remote.api_base_url = value.to_string(),
        "remote.token_url" => config.remote.token_url = value.to_string(),
        "remote.ping_url" => config.remote.ping_url = value.to_string(),
        "remote.vault_name" => config.remote.vault_name = value.to_string(),

        // --- config_files ---
        "config_files.directory" => config.config_files.directory = value.to_string(),
        "config_files.whitelist" => config.config_files.whitelist = parse_list(value),
        "config_files.blacklist" => config.config_files.blacklist = parse_list(value),

        // --- logging ---
        "logging.level" => config.logging.level = value.to_string(),

        // --- state ---
        "state.path" => config.state.path = PathBuf::from(value),

        _ => {
            anyhow::bail!("Unknown configuration key: '{}'", key);
        }
    }

    Ok(())
}
