//! Uniform querying of heterogeneous models.
//!
//! Whatever the capability of a model, [`query`] turns one inference call
//! into a [`QueryResult`] whose distribution is keyed by resolved disease
//! names.

use super::classifier::{Capability, LabelDecoder, ModelError, ModelHandle};
use crate::models::{ClassLabel, QueryResult};
use tracing::debug;

/// Maximum distance from 1.0 tolerated in a probability sum.
const SUM_TOLERANCE: f64 = 1e-6;

/// Query a model with a presence vector that matched `matched` features.
///
/// Probabilistic models are called once and the predicted class is the
/// arg-max of that distribution. Deterministic-only models get a uniform
/// distribution over their known classes, and must predict one of them.
pub fn query(model: &ModelHandle, features: &[u8], matched: usize) -> Result<QueryResult, ModelError> {
    if features.len() != model.vocabulary.len() {
        return Err(ModelError::InputShape {
            expected: model.vocabulary.len(),
            actual: features.len(),
        });
    }

    let decoder = model.decoder.as_ref();

    let (predicted, distribution) = match &model.capability {
        Capability::Probabilistic(classifier) => {
            let classes = classifier.classes();
            let probabilities = classifier.predict_proba(features)?;
            validate_distribution(classes.len(), &probabilities)?;

            let best = argmax(&probabilities).ok_or(ModelError::NoClasses)?;
            let distribution: Vec<(String, f64)> = classes
                .iter()
                .zip(&probabilities)
                .map(|(class, p)| (resolve_label(class, decoder), *p))
                .collect();
            let predicted = distribution[best].0.clone();

            (predicted, distribution)
        }
        Capability::DeterministicOnly(classifier) => {
            let label = classifier.predict(features)?;
            let predicted = resolve_label(&label, decoder);
            let classes = classifier.classes();
            if !classes.is_empty() && !classes.contains(&label) {
                return Err(ModelError::UnknownPrediction(label.to_string()));
            }

            let distribution = if classes.is_empty() {
                vec![(predicted.clone(), 1.0)]
            } else {
                let share = 1.0 / classes.len() as f64;
                classes
                    .iter()
                    .map(|class| (resolve_label(class, decoder), share))
                    .collect()
            };

            (predicted, distribution)
        }
    };

    debug!(
        "Model {} predicted {} from {} matched features",
        model.name, predicted, matched
    );

    Ok(QueryResult {
        model: model.name.clone(),
        matched,
        predicted,
        distribution,
    })
}

/// Resolve a class identifier into a display name. Never fails.
pub fn resolve_label(label: &ClassLabel, decoder: Option<&LabelDecoder>) -> String {
    match label {
        ClassLabel::Text(name) => display_name(name),
        ClassLabel::Encoded(class) => match decoder.map(|d| d.decode(*class)) {
            Some(Ok(name)) => display_name(&name),
            Some(Err(e)) => {
                debug!("Label decoding failed: {}", e);
                unknown_label(*class)
            }
            None => unknown_label(*class),
        },
    }
}

/// Fallback name for a class that cannot be decoded.
pub fn unknown_label(class: i64) -> String {
    format!("Unknown Disease (Class {})", class)
}

/// Apply conventional name casing to a raw class name.
///
/// Underscores become spaces and surrounding whitespace is trimmed. Names
/// that are entirely lowercase are title-cased; anything with an uppercase
/// letter is assumed to be cased on purpose (`"GERD"`, `"Heart attack"`).
pub fn display_name(raw: &str) -> String {
    let spaced = raw.replace('_', " ");
    let words: Vec<&str> = spaced.split_whitespace().collect();
    let joined = words.join(" ");

    if joined.chars().any(|c| c.is_uppercase()) {
        return joined;
    }

    words
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn validate_distribution(classes: usize, probabilities: &[f64]) -> Result<(), ModelError> {
    if classes == 0 {
        return Err(ModelError::NoClasses);
    }
    if probabilities.len() != classes {
        return Err(ModelError::DistributionShape {
            expected: classes,
            actual: probabilities.len(),
        });
    }
    if let Some(bad) = probabilities.iter().find(|p| !p.is_finite() || **p < 0.0) {
        return Err(ModelError::InvalidProbability(*bad));
    }
    let total: f64 = probabilities.iter().sum();
    if (total - 1.0).abs() > SUM_TOLERANCE {
        return Err(ModelError::InvalidDistribution(total));
    }
    Ok(())
}

/// Index of the first maximum.
fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, v)| match best {
            Some((_, max)) if *v <= max => best,
            _ => Some((i, *v)),
        })
        .map(|(i, _)| i)
}
