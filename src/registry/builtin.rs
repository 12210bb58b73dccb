//! Built-in classifier kinds that can be described in a model file.

use crate::analysis::normalize;
use crate::ensemble::{DeterministicClassifier, ModelError, ProbabilisticClassifier};
use crate::models::ClassLabel;

/// Multinomial logistic regression over binary features.
#[derive(Debug, Clone)]
pub struct LinearModel {
    classes: Vec<ClassLabel>,
    /// One row per class, one column per feature.
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

impl LinearModel {
    /// Build a model, checking that the parameters line up.
    pub fn new(
        classes: Vec<ClassLabel>,
        weights: Vec<Vec<f64>>,
        bias: Option<Vec<f64>>,
        features: usize,
    ) -> Result<Self, String> {
        if classes.is_empty() {
            return Err("no classes".to_string());
        }
        if weights.len() != classes.len() {
            return Err(format!(
                "{} weight rows for {} classes",
                weights.len(),
                classes.len()
            ));
        }
        if let Some((i, row)) = weights.iter().enumerate().find(|(_, r)| r.len() != features) {
            return Err(format!(
                "weight row {} has {} columns, vocabulary has {} features",
                i,
                row.len(),
                features
            ));
        }

        let bias = bias.unwrap_or_else(|| vec![0.0; classes.len()]);
        if bias.len() != classes.len() {
            return Err(format!("{} bias terms for {} classes", bias.len(), classes.len()));
        }

        Ok(Self {
            classes,
            weights,
            bias,
        })
    }
}

impl ProbabilisticClassifier for LinearModel {
    fn classes(&self) -> &[ClassLabel] {
        &self.classes
    }

    fn predict_proba(&self, features: &[u8]) -> Result<Vec<f64>, ModelError> {
        let expected = self.weights.first().map(|r| r.len()).unwrap_or(0);
        if features.len() != expected {
            return Err(ModelError::InputShape {
                expected,
                actual: features.len(),
            });
        }

        let logits: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| {
                row.iter()
                    .zip(features)
                    .map(|(w, x)| w * f64::from(*x))
                    .sum::<f64>()
                    + b
            })
            .collect();

        Ok(softmax(&logits))
    }

    fn kind(&self) -> &'static str {
        "linear"
    }
}

/// Numerically stable softmax.
fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Nearest-profile classifier without calibrated probabilities.
///
/// Each class lists its characteristic features. The prediction is the
/// class sharing the most features with the input; the first listed class
/// wins a tie.
#[derive(Debug, Clone)]
pub struct ProfileModel {
    classes: Vec<ClassLabel>,
    /// Vocabulary indices of each class's features.
    profiles: Vec<Vec<usize>>,
    features: usize,
}

impl ProfileModel {
    /// Build a model from `(class, feature names)` pairs resolved against
    /// the vocabulary.
    pub fn new(profiles: Vec<(ClassLabel, Vec<String>)>, vocabulary: &[String]) -> Result<Self, String> {
        if profiles.is_empty() {
            return Err("no profiles".to_string());
        }

        let normalized: Vec<String> = vocabulary.iter().map(|f| normalize(f)).collect();
        let mut classes = Vec::with_capacity(profiles.len());
        let mut indices = Vec::with_capacity(profiles.len());

        for (class, features) in profiles {
            let mut resolved = Vec::with_capacity(features.len());
            for feature in &features {
                let key = normalize(feature);
                match normalized.iter().position(|v| *v == key) {
                    Some(i) => resolved.push(i),
                    None => {
                        return Err(format!(
                            "profile {} uses {:?}, which is not in the vocabulary",
                            class, feature
                        ))
                    }
                }
            }
            classes.push(class);
            indices.push(resolved);
        }

        Ok(Self {
            classes,
            profiles: indices,
            features: vocabulary.len(),
        })
    }
}

impl DeterministicClassifier for ProfileModel {
    fn classes(&self) -> &[ClassLabel] {
        &self.classes
    }

    fn predict(&self, features: &[u8]) -> Result<ClassLabel, ModelError> {
        if features.len() != self.features {
            return Err(ModelError::InputShape {
                expected: self.features,
                actual: features.len(),
            });
        }

        let mut best: Option<(usize, usize)> = None;
        for (i, profile) in self.profiles.iter().enumerate() {
            let score = profile.iter().filter(|&&f| features[f] == 1).count();
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((i, score));
            }
        }

        best.map(|(i, _)| self.classes[i].clone())
            .ok_or(ModelError::NoClasses)
    }

    fn kind(&self) -> &'static str {
        "profile"
    }
}
