//! Prediction report generation.
//!
//! This module renders prediction results, registry health and the symptom
//! catalogue as Markdown text or JSON.

use crate::models::{HealthReport, ModelOutcome, PredictionReport, Priority, RankedPrediction};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Generate a complete Markdown prediction report.
pub fn generate_markdown_report(report: &PredictionReport) -> String {
    let mut output = String::new();

    output.push_str("# Symptom Ensemble Report\n\n");

    output.push_str(&generate_metadata_section(report));
    output.push_str(&generate_predictions_section(
        &report.response.top_predictions,
        report.response.priority,
        report.response.warning.as_deref(),
    ));
    output.push_str(&generate_models_section(&report.models));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(report: &PredictionReport) -> String {
    let mut section = String::new();

    section.push_str("## Request\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    let symptoms = if report.symptoms.is_empty() {
        "(none)".to_string()
    } else {
        report.symptoms.join(", ")
    };
    section.push_str(&format!("- **Symptoms:** {}\n", symptoms));
    section.push_str(&format!(
        "- **Matched Symptoms:** {}\n",
        report.response.matched_symptoms
    ));
    section.push_str(&format!(
        "- **Models:** {} active of {} registered\n",
        report.active_models(),
        report.registered_models
    ));
    section.push('\n');

    section
}

/// Generate the ranked predictions section.
fn generate_predictions_section(
    predictions: &[RankedPrediction],
    priority: Priority,
    warning: Option<&str>,
) -> String {
    let mut section = String::new();

    section.push_str("## Predictions\n\n");
    section.push_str(&format!("**Priority:** {}\n\n", priority_badge(priority)));

    if let Some(warning) = warning {
        section.push_str(&format!("> ⚠️ {}\n\n", warning));
    }

    if predictions.is_empty() {
        section.push_str("No disease could be ranked for these symptoms.\n\n");
        return section;
    }

    section.push_str("| Rank | Disease | Probability |\n");
    section.push_str("|:---:|:---|---:|\n");
    for (i, prediction) in predictions.iter().enumerate() {
        section.push_str(&format!(
            "| {} | {} | {:.2}% |\n",
            i + 1,
            prediction.disease,
            prediction.probability
        ));
    }
    section.push('\n');

    section
}

fn priority_badge(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "🔴 **HIGH**",
        Priority::Normal => "🟢 **NORMAL**",
    }
}

/// Generate the per-model contribution section.
fn generate_models_section(models: &[ModelOutcome]) -> String {
    if models.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Model Contributions\n\n");
    section.push_str("| Model | Matched | Status | Predicted |\n");
    section.push_str("|:---|:---:|:---|:---|\n");
    for outcome in models {
        section.push_str(&format!(
            "| `{}` | {} | {} | {} |\n",
            outcome.model,
            outcome.matched,
            outcome.status,
            outcome.predicted.as_deref().unwrap_or("-")
        ));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Generated by symptom-ensemble v{}. Not a medical diagnosis.*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a Markdown registry health report.
pub fn generate_health_report(health: &HealthReport) -> String {
    let mut output = String::new();

    output.push_str("# Model Registry Health\n\n");
    output.push_str(&format!(
        "- **Loaded:** {}\n- **Failed:** {}\n\n",
        health.loaded.len(),
        health.failed.len()
    ));

    if !health.loaded.is_empty() {
        output.push_str("## Loaded Models\n\n");
        output.push_str("| Model | Kind | Output | Features | Classes | Decoder |\n");
        output.push_str("|:---|:---|:---|:---:|:---:|:---:|\n");
        for info in &health.loaded {
            let decoder = match info.decoder_classes {
                Some(n) => format!("{} labels", n),
                None => "none".to_string(),
            };
            output.push_str(&format!(
                "| `{}` | {} | {} | {} | {} | {} |\n",
                info.name,
                info.kind,
                if info.probabilistic { "probabilities" } else { "label only" },
                info.features,
                info.classes,
                decoder
            ));
        }
        output.push('\n');
    }

    if !health.failed.is_empty() {
        output.push_str("## Failed Models\n\n");
        for (name, reason) in &health.failed {
            output.push_str(&format!("- `{}`: {}\n", name, reason));
        }
        output.push('\n');
    }

    output
}

/// Generate a plain listing of known symptoms, one per line.
pub fn generate_symptom_list(symptoms: &[String]) -> String {
    let mut output = String::new();
    for symptom in symptoms {
        output.push_str(symptom);
        output.push('\n');
    }
    output
}

/// Serialize any report value as pretty JSON.
pub fn generate_json_report<T: Serialize>(report: &T) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write rendered output to a file.
pub fn write_output(content: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(())
}
