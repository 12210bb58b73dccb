//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Symptom Ensemble - rank likely diseases across several classifiers
///
/// Maps free-text symptoms onto every registered model's vocabulary,
/// queries the models that matched and merges their predictions into
/// one ranked, priority-tagged result.
///
/// Examples:
///   symptom-ensemble --manifest models/registry.json --symptoms "fever,chest pain"
///   symptom-ensemble --symptoms cough,fatigue --format json --output result.json
///   symptom-ensemble --list-symptoms
///   symptom-ensemble --health
///   symptom-ensemble --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Symptoms to evaluate (comma-separated)
    ///
    /// Free text; case, hyphens and underscores do not matter.
    /// Example: --symptoms "Chest Pain,high-fever,cough"
    #[arg(
        short,
        long,
        value_name = "LIST",
        value_delimiter = ',',
        required_unless_present_any = ["init_config", "list_symptoms", "health"]
    )]
    pub symptoms: Option<Vec<String>>,

    /// Path to the model manifest
    ///
    /// Overrides `registry.manifest` from the configuration file.
    #[arg(short, long, value_name = "FILE", env = "SYMPTOM_ENSEMBLE_MANIFEST")]
    pub manifest: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .symptom-ensemble.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Write the result to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Number of ranked diseases to return
    #[arg(long, value_name = "COUNT")]
    pub top_k: Option<usize>,

    /// Top probability (percent) above which the result is HIGH priority
    #[arg(long, value_name = "PERCENT")]
    pub threshold: Option<f64>,

    /// Number of models queried concurrently
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Per-model timeout in milliseconds
    ///
    /// A model that does not answer in time is treated as unavailable.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Print every symptom known to the loaded models and exit
    #[arg(long, conflicts_with_all = ["health", "symptoms"])]
    pub list_symptoms: bool,

    /// Print which models loaded and exit
    #[arg(long, conflicts_with = "symptoms")]
    pub health: bool,

    /// Exit with code 2 when the result is HIGH priority
    ///
    /// Useful in pipelines that escalate urgent cases.
    #[arg(long)]
    pub fail_on_high: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .symptom-ensemble.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for results.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text (default)
    #[default]
    Text,
    /// JSON
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Submitted symptoms, empty when none were given.
    pub fn symptom_list(&self) -> &[String] {
        self.symptoms.as_deref().unwrap_or(&[])
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.top_k == Some(0) {
            return Err("Top-k must be at least 1".to_string());
        }

        if let Some(threshold) = self.threshold {
            if !(0.0..=100.0).contains(&threshold) {
                return Err("Threshold must be between 0 and 100".to_string());
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.timeout_ms == Some(0) {
            return Err("Timeout must be at least 1 millisecond".to_string());
        }

        if let Some(ref manifest) = self.manifest {
            if !manifest.is_file() {
                return Err(format!("Manifest not found: {}", manifest.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
