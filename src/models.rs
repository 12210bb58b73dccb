//! Data models for the symptom ensemble.
//!
//! This module contains the request-scoped structures shared by the
//! aggregation pipeline and the report renderer: class labels, per-model
//! query results, ranked predictions and the final response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Class identifier as emitted by a classifier.
///
/// Some models are trained on human-readable targets, others on integers
/// produced by a label encoder. Both forms appear in model files, so the
/// enum is untagged: a JSON string is `Text`, a JSON integer is `Encoded`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassLabel {
    /// Human-readable class name.
    Text(String),
    /// Encoded class index that needs a decoder.
    Encoded(i64),
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassLabel::Text(s) => write!(f, "{}", s),
            ClassLabel::Encoded(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for ClassLabel {
    fn from(s: &str) -> Self {
        ClassLabel::Text(s.to_string())
    }
}

impl From<i64> for ClassLabel {
    fn from(n: i64) -> Self {
        ClassLabel::Encoded(n)
    }
}

/// Coarse urgency classification of a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    /// The top-ranked disease is above the high-priority threshold.
    High,
    /// Everything else, including "no evidence".
    #[default]
    Normal,
}

impl Priority {
    /// Derive the priority from the top-ranked probability (percent).
    ///
    /// The comparison is strict: a top probability equal to the threshold
    /// stays `Normal`.
    pub fn from_top_probability(probability: f64, threshold: f64) -> Self {
        if probability > threshold {
            Priority::High
        } else {
            Priority::Normal
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "HIGH"),
            Priority::Normal => write!(f, "NORMAL"),
        }
    }
}

/// Output of querying a single model for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Name of the model that produced the result.
    pub model: String,
    /// Number of vocabulary entries matched by the request.
    pub matched: usize,
    /// Resolved display name of the predicted class.
    pub predicted: String,
    /// Resolved class name to probability, in the model's class order.
    pub distribution: Vec<(String, f64)>,
}

/// A ranked disease with its ensemble probability in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPrediction {
    pub disease: String,
    pub probability: f64,
}

/// The caller-visible result of an ensemble prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    /// Total matched features across active models.
    pub matched_symptoms: usize,
    /// At most `top_k` predictions, strictly descending.
    pub top_predictions: Vec<RankedPrediction>,
    pub priority: Priority,
    /// Set when no model supplied usable evidence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl PredictionResponse {
    /// Build the well-formed "no evidence" response.
    pub fn no_evidence(warning: impl Into<String>) -> Self {
        Self {
            matched_symptoms: 0,
            top_predictions: Vec::new(),
            priority: Priority::Normal,
            warning: Some(warning.into()),
        }
    }

    /// Returns the top-ranked prediction, if any.
    pub fn top(&self) -> Option<&RankedPrediction> {
        self.top_predictions.first()
    }
}

/// How a registered model took part in a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ModelStatus {
    /// Matched at least one feature and produced a prediction.
    Active,
    /// No vocabulary entry matched; the model was not queried.
    NoMatch,
    /// Matched but failed to produce a prediction.
    Unavailable(String),
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelStatus::Active => write!(f, "active"),
            ModelStatus::NoMatch => write!(f, "no match"),
            ModelStatus::Unavailable(reason) => write!(f, "unavailable ({})", reason),
        }
    }
}

/// Per-model participation summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOutcome {
    pub model: String,
    pub matched: usize,
    pub status: ModelStatus,
    /// Resolved label the model predicted, when active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted: Option<String>,
}

/// A prediction together with everything needed to render it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionReport {
    /// Date and time the prediction was produced.
    pub generated_at: DateTime<Utc>,
    /// Symptoms as submitted by the caller.
    pub symptoms: Vec<String>,
    /// Number of models in the registry.
    pub registered_models: usize,
    /// The ranked response.
    pub response: PredictionResponse,
    /// Participation of each registered model, in registration order.
    pub models: Vec<ModelOutcome>,
}

impl PredictionReport {
    /// Number of models that contributed to the ranking.
    pub fn active_models(&self) -> usize {
        self.models
            .iter()
            .filter(|m| m.status == ModelStatus::Active)
            .count()
    }
}

/// Health information about one loaded model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub kind: String,
    pub features: usize,
    pub classes: usize,
    /// Whether the model yields calibrated distributions.
    pub probabilistic: bool,
    /// Number of classes the label decoder knows, when there is one.
    pub decoder_classes: Option<usize>,
}

/// Registry health summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthReport {
    pub loaded: Vec<ModelInfo>,
    /// Manifest entries that could not be loaded, with the reason.
    pub failed: Vec<(String, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_threshold_is_strict() {
        assert_eq!(Priority::from_top_probability(50.0, 50.0), Priority::Normal);
        assert_eq!(Priority::from_top_probability(50.01, 50.0), Priority::High);
        assert_eq!(Priority::from_top_probability(0.0, 50.0), Priority::Normal);
    }

    #[test]
    fn test_class_label_untagged() {
        let labels: Vec<ClassLabel> = serde_json::from_str(r#"["Flu", 7]"#).unwrap();
        assert_eq!(labels[0], ClassLabel::Text("Flu".to_string()));
        assert_eq!(labels[1], ClassLabel::Encoded(7));
        assert_eq!(labels[1].to_string(), "7");
    }

    #[test]
    fn test_response_json_shape() {
        let response = PredictionResponse {
            matched_symptoms: 2,
            top_predictions: vec![RankedPrediction {
                disease: "Flu".to_string(),
                probability: 90.0,
            }],
            priority: Priority::High,
            warning: None,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["matchedSymptoms"], 2);
        assert_eq!(json["priority"], "HIGH");
        assert_eq!(json["topPredictions"][0]["disease"], "Flu");
        assert!(json.get("warning").is_none());
    }

    #[test]
    fn test_no_evidence_response() {
        let response = PredictionResponse::no_evidence("nothing matched");
        assert_eq!(response.matched_symptoms, 0);
        assert!(response.top_predictions.is_empty());
        assert_eq!(response.priority, Priority::Normal);
        assert!(response.top().is_none());

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["priority"], "NORMAL");
        assert_eq!(json["warning"], "nothing matched");
    }

    #[test]
    fn test_model_status_display() {
        assert_eq!(ModelStatus::Active.to_string(), "active");
        assert_eq!(ModelStatus::NoMatch.to_string(), "no match");
        assert_eq!(
            ModelStatus::Unavailable("timed out".to_string()).to_string(),
            "unavailable (timed out)"
        );
    }
}
