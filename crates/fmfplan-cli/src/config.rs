//! Configuration file management for fmfplan.
//!
//! Provides a TOML-based config file at `~/.config/fmfplan/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use fmfplan_core::Context;

/// Env var holding space-separated `name=value` context specs.
pub const CONTEXT_ENV: &str = "FMFPLAN_CONTEXT";
/// Env var selecting the output format.
pub const FORMAT_ENV: &str = "FMFPLAN_FORMAT";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Default context dimensions.
    #[serde(default)]
    pub context: BTreeMap<String, ContextValue>,
    #[serde(default)]
    pub output: OutputSection,
}

/// A dimension written as `distro = "fedora-40"` or `arch = ["x86_64", "aarch64"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    One(String),
    Many(Vec<String>),
}

impl ContextValue {
    fn into_values(self) -> Vec<String> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputSection {
    #[serde(default)]
    pub format: OutputFormat,
}

/// How resolved plans are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the fmfplan config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/fmfplan` or `~/.config/fmfplan`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("fmfplan");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("fmfplan")
}

/// Return the path to the fmfplan config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct FmfplanConfig {
    pub context: Context,
    pub format: OutputFormat,
}

impl FmfplanConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - Context: dimensions from `config_file.context`, overridden per
    ///   dimension by `FMFPLAN_CONTEXT`, overridden by `-c` specs.
    /// - Format: `cli_format` > `FMFPLAN_FORMAT` env > `config_file.output.format` > text
    pub fn resolve(cli_context: &[String], cli_format: Option<OutputFormat>) -> Result<Self> {
        let file_config = if config_path().exists() {
            Some(load_config()?)
        } else {
            None
        };

        let mut context = Context::new();
        let mut file_format = None;
        if let Some(cfg) = file_config {
            for (name, value) in cfg.context {
                context.set(name, value.into_values());
            }
            file_format = Some(cfg.output.format);
        }

        if let Ok(specs) = std::env::var(CONTEXT_ENV) {
            let env_context = Context::from_specs(specs.split_whitespace())
                .with_context(|| format!("invalid {CONTEXT_ENV} value {specs:?}"))?;
            context.merge(&env_context);
        }

        let cli = Context::from_specs(cli_context).context("invalid --context value")?;
        context.merge(&cli);

        let format = if let Some(format) = cli_format {
            format
        } else if let Ok(value) = std::env::var(FORMAT_ENV) {
            OutputFormat::from_str(&value, true)
                .map_err(|e| anyhow::anyhow!("invalid {FORMAT_ENV} value {value:?}: {e}"))?
        } else {
            file_format.unwrap_or_default()
        };

        Ok(Self { context, format })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
