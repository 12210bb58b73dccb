//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.symptom-ensemble.toml` files.

use crate::analysis::RankOptions;
use crate::cli::OutputFormat;
use crate::ensemble::EnsembleOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".symptom-ensemble.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Ensemble settings.
    #[serde(default)]
    pub ensemble: EnsembleConfig,

    /// Model registry settings.
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Ranking and model query settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleConfig {
    /// Number of ranked diseases to return.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Top probability (percent) above which a result is HIGH priority.
    #[serde(default = "default_threshold")]
    pub high_priority_threshold: f64,

    /// Number of models queried concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-model timeout in milliseconds. No timeout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_timeout_ms: Option<u64>,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            high_priority_threshold: default_threshold(),
            concurrency: default_concurrency(),
            model_timeout_ms: None,
        }
    }
}

fn default_top_k() -> usize {
    3
}

fn default_threshold() -> f64 {
    50.0
}

fn default_concurrency() -> usize {
    4
}

/// Model registry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Path to the model manifest.
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            manifest: default_manifest(),
        }
    }
}

fn default_manifest() -> PathBuf {
    PathBuf::from("models/registry.json")
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only values given explicitly on the command line override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if args.verbose {
            self.general.verbose = true;
        }

        if let Some(top_k) = args.top_k {
            self.ensemble.top_k = top_k;
        }
        if let Some(threshold) = args.threshold {
            self.ensemble.high_priority_threshold = threshold;
        }
        if let Some(concurrency) = args.concurrency {
            self.ensemble.concurrency = concurrency;
        }
        if let Some(timeout) = args.timeout_ms {
            self.ensemble.model_timeout_ms = Some(timeout);
        }

        if let Some(ref manifest) = args.manifest {
            self.registry.manifest = manifest.clone();
        }
    }

    /// Ensemble runtime options described by this configuration.
    pub fn ensemble_options(&self) -> EnsembleOptions {
        EnsembleOptions {
            rank: RankOptions {
                top_k: self.ensemble.top_k.max(1),
                high_priority_threshold: self.ensemble.high_priority_threshold,
            },
            concurrency: self.ensemble.concurrency.max(1),
            model_timeout: self.ensemble.model_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
