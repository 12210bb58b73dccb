//! Score aggregation across models.
//!
//! This module merges the per-model class distributions of one request
//! into a single ranked, priority-tagged response.

use crate::models::{PredictionResponse, Priority, QueryResult, RankedPrediction};
use std::collections::HashMap;

/// Warning attached when no model matched any submitted symptom.
pub const NO_EVIDENCE_WARNING: &str = "No submitted symptom matched any available model";

/// Ranking parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RankOptions {
    /// Maximum number of predictions to return.
    pub top_k: usize,
    /// Top probability (percent) above which the result is `HIGH` priority.
    pub high_priority_threshold: f64,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            top_k: 3,
            high_priority_threshold: 50.0,
        }
    }
}

/// Accumulated probability mass of one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    /// Disease name to summed probability, in first-encountered order.
    pub totals: Vec<(String, f64)>,
    /// Sum of matched features over active models.
    pub total_matched: usize,
    /// Number of models that contributed.
    pub active_models: usize,
}

/// Sum the distributions of all active query results.
///
/// Results are expected in registration order; that order decides the
/// insertion order of diseases and therefore how ties are broken later.
/// A result with zero matched features is not active and is ignored.
pub fn aggregate(results: &[QueryResult]) -> Aggregation {
    let mut aggregation = Aggregation::default();
    let mut index: HashMap<String, usize> = HashMap::new();

    for result in results.iter().filter(|r| r.matched > 0) {
        aggregation.active_models += 1;
        // Counted once per model, so a symptom known to two models counts twice.
        aggregation.total_matched += result.matched;

        for (disease, probability) in &result.distribution {
            match index.get(disease) {
                Some(&slot) => aggregation.totals[slot].1 += probability,
                None => {
                    index.insert(disease.clone(), aggregation.totals.len());
                    aggregation.totals.push((disease.clone(), *probability));
                }
            }
        }
    }

    aggregation
}

/// Turn an aggregation into the caller-visible response.
pub fn rank(aggregation: &Aggregation, options: &RankOptions) -> PredictionResponse {
    if aggregation.active_models == 0 {
        return PredictionResponse::no_evidence(NO_EVIDENCE_WARNING);
    }

    let divisor = aggregation.active_models.max(1) as f64;
    let mut predictions: Vec<RankedPrediction> = aggregation
        .totals
        .iter()
        .map(|(disease, mass)| RankedPrediction {
            disease: disease.clone(),
            probability: round_percent(mass / divisor * 100.0),
        })
        .collect();

    sort_descending(&mut predictions);
    predictions.truncate(options.top_k);

    let priority = predictions
        .first()
        .map(|top| Priority::from_top_probability(top.probability, options.high_priority_threshold))
        .unwrap_or_default();

    PredictionResponse {
        matched_symptoms: aggregation.total_matched,
        top_predictions: predictions,
        priority,
        warning: None,
    }
}

/// Round a percentage to two decimal places.
pub fn round_percent(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Sort predictions by probability, highest first.
///
/// The sort is stable: equal probabilities keep their relative order.
pub fn sort_descending(predictions: &mut [RankedPrediction]) {
    predictions.sort_by(|a, b| b.probability.total_cmp(&a.probability));
}
