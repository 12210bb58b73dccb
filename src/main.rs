//! Symptom Ensemble - multi-model disease inference from symptoms
//!
//! A CLI tool that maps free-text symptoms onto several independently
//! trained classifiers, queries the ones that recognise the symptoms and
//! merges their outputs into one ranked, priority-tagged prediction.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad config, unreadable manifest, etc.)
//!   2 - Result is HIGH priority and --fail-on-high is set

mod analysis;
mod cli;
mod config;
mod ensemble;
mod models;
mod registry;
mod report;

use anyhow::{bail, Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use ensemble::Ensemble;
use models::{HealthReport, Priority};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Configuration decides the default verbosity, so it is read first
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&args, &config);

    info!("Symptom Ensemble v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Configuration: {:?}", config);

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .symptom-ensemble.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to set the model manifest, ranking and timeouts.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = if !args.quiet && config.general.verbose {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to set tracing subscriber: {}", e);
    }
}

/// Load the registry and run the requested action. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    let manifest = &config.registry.manifest;
    let registry = registry::load_registry(manifest)
        .with_context(|| format!("Failed to load model registry: {}", manifest.display()))?;

    if registry.is_empty() {
        warn!("No models loaded from {}", manifest.display());
    }

    let failed = registry.failed;
    let ensemble = Ensemble::new(registry.models, config.ensemble_options());
    let format = config.general.format;

    if args.list_symptoms {
        let symptoms = ensemble.symptom_catalogue();
        if symptoms.is_empty() {
            bail!("Symptom catalogue unavailable: no models are loaded");
        }

        let output = match format {
            OutputFormat::Json => report::generate_json_report(&symptoms)?,
            OutputFormat::Text => report::generate_symptom_list(symptoms),
        };
        emit(&output, args.output.as_deref())?;
        return Ok(0);
    }

    if args.health {
        let health = HealthReport {
            loaded: ensemble.model_info(),
            failed,
        };

        let output = match format {
            OutputFormat::Json => report::generate_json_report(&health)?,
            OutputFormat::Text => report::generate_health_report(&health),
        };
        emit(&output, args.output.as_deref())?;
        return Ok(0);
    }

    let symptoms = args.symptom_list();
    info!(
        "Evaluating {} symptoms against {} models",
        symptoms.len(),
        ensemble.models().len()
    );

    let prediction = ensemble.predict(symptoms).await;

    let output = match format {
        OutputFormat::Json => report::generate_json_report(&prediction)?,
        OutputFormat::Text => report::generate_markdown_report(&prediction),
    };
    emit(&output, args.output.as_deref())?;

    if let Some(ref path) = args.output {
        let response = &prediction.response;
        println!("\n📊 Prediction Summary:");
        match response.top() {
            Some(top) => println!("   Top: {} ({:.2}%)", top.disease, top.probability),
            None => println!("   Top: none"),
        }
        println!("   Priority: {}", response.priority);
        println!(
            "   Models: {} active of {}",
            prediction.active_models(),
            prediction.registered_models
        );
        println!("   Duration: {:.3}s", start_time.elapsed().as_secs_f64());
        println!("\n✅ Result saved to: {}", path.display());
    }

    if args.fail_on_high && prediction.response.priority == Priority::High {
        eprintln!("\n⛔ HIGH priority result. Failing (exit code 2).");
        return Ok(2);
    }

    Ok(0)
}

/// Write rendered output to the requested file, or stdout.
fn emit(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => report::write_output(content, path),
        None => {
            println!("{}", content);
            Ok(())
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match args.config {
        // Try explicit config path
        Some(ref config_path) => Config::load(config_path)?,
        // Try default location
        None => Config::load_default()?.unwrap_or_default(),
    };

    config.merge_with_args(args);
    Ok(config)
}
