//! Ensemble orchestration.
//!
//! The [`Ensemble`] owns the read-only model registry. Each call to
//! [`Ensemble::predict`] vectorizes the request against every model,
//! queries the models that matched on the blocking pool, and folds the
//! successful results into one ranked response. Nothing request-scoped is
//! stored on the ensemble, so one instance can serve many requests at once.

use super::adapter;
use super::classifier::{LabelDecoder, ModelError, ModelHandle};
use crate::analysis::{aggregate, normalize, normalize_tokens, rank, vectorize, FeatureVector, RankOptions};
use crate::models::{ModelInfo, ModelOutcome, ModelStatus, PredictionReport, QueryResult};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Warning attached when every matching model failed.
pub const MODELS_UNAVAILABLE_WARNING: &str =
    "Symptoms matched registered models but none of them produced a prediction";

/// Runtime settings of the ensemble.
#[derive(Debug, Clone)]
pub struct EnsembleOptions {
    pub rank: RankOptions,
    /// Maximum number of models queried at the same time.
    pub concurrency: usize,
    /// Per-model deadline. A model that misses it is treated as unavailable.
    pub model_timeout: Option<Duration>,
}

impl Default for EnsembleOptions {
    fn default() -> Self {
        Self {
            rank: RankOptions::default(),
            concurrency: 4,
            model_timeout: None,
        }
    }
}

/// A set of registered models queried together.
pub struct Ensemble {
    models: Vec<Arc<ModelHandle>>,
    options: EnsembleOptions,
    catalogue: OnceCell<Vec<String>>,
}

impl Ensemble {
    /// Create an ensemble. Registration order is preserved and decides how
    /// ties between equally likely diseases are broken.
    pub fn new(models: Vec<ModelHandle>, options: EnsembleOptions) -> Self {
        info!("Ensemble initialized with {} models", models.len());

        Self {
            models: models.into_iter().map(Arc::new).collect(),
            options,
            catalogue: OnceCell::new(),
        }
    }

    /// Registered models, in registration order.
    pub fn models(&self) -> &[Arc<ModelHandle>] {
        &self.models
    }

    /// Normalized, sorted union of every model's vocabulary.
    ///
    /// Computed on first use and cached for the lifetime of the ensemble.
    pub fn symptom_catalogue(&self) -> &[String] {
        self.catalogue.get_or_init(|| {
            let mut symptoms: Vec<String> = self
                .models
                .iter()
                .flat_map(|m| m.vocabulary.iter().map(|f| normalize(f)))
                .filter(|s| !s.is_empty())
                .collect();
            symptoms.sort();
            symptoms.dedup();
            debug!("Computed symptom catalogue with {} entries", symptoms.len());
            symptoms
        })
    }

    /// Health information for every loaded model.
    pub fn model_info(&self) -> Vec<ModelInfo> {
        self.models
            .iter()
            .map(|m| ModelInfo {
                name: m.name.clone(),
                kind: m.capability.kind().to_string(),
                features: m.vocabulary.len(),
                classes: m.capability.classes().len(),
                probabilistic: m.capability.is_probabilistic(),
                decoder_classes: m.decoder.as_ref().map(LabelDecoder::len),
            })
            .collect()
    }

    /// Rank diseases for a set of free-text symptoms.
    ///
    /// Never fails: models that do not match are skipped, models that fault
    /// are reported as unavailable, and a request with no usable evidence
    /// yields the "no evidence" response.
    pub async fn predict<S: AsRef<str>>(&self, symptoms: &[S]) -> PredictionReport {
        let tokens = normalize_tokens(symptoms.iter().map(|s| s.as_ref()));
        debug!("Normalized {} symptom tokens", tokens.len());

        let vectors: Vec<(Arc<ModelHandle>, FeatureVector)> = self
            .models
            .iter()
            .map(|model| (Arc::clone(model), vectorize(&tokens, &model.vocabulary)))
            .collect();

        let timeout = self.options.model_timeout;
        let queried: Vec<(String, usize, Option<Result<QueryResult, ModelError>>)> =
            stream::iter(vectors)
                .map(|(model, vector)| async move {
                    let name = model.name.clone();
                    let matched = vector.matched;
                    debug!("Model {} matched {} features", name, matched);

                    if matched == 0 {
                        return (name, matched, None);
                    }
                    (name, matched, Some(run_query(model, vector, timeout).await))
                })
                .buffered(self.options.concurrency.max(1))
                .collect()
                .await;

        let mut results = Vec::new();
        let mut outcomes = Vec::with_capacity(queried.len());
        let mut failed = 0;

        for (model, matched, result) in queried {
            let (status, predicted) = match result {
                None => (ModelStatus::NoMatch, None),
                Some(Ok(result)) => {
                    let predicted = result.predicted.clone();
                    results.push(result);
                    (ModelStatus::Active, Some(predicted))
                }
                Some(Err(e)) => {
                    warn!("Model {} unavailable for this request: {}", model, e);
                    failed += 1;
                    (ModelStatus::Unavailable(e.to_string()), None)
                }
            };
            outcomes.push(ModelOutcome {
                model,
                matched,
                status,
                predicted,
            });
        }

        let aggregation = aggregate(&results);
        let mut response = rank(&aggregation, &self.options.rank);

        if aggregation.active_models == 0 && failed > 0 {
            response.warning = Some(MODELS_UNAVAILABLE_WARNING.to_string());
        }

        info!(
            "Ranked {} diseases from {} active models ({} unavailable)",
            response.top_predictions.len(),
            aggregation.active_models,
            failed
        );

        PredictionReport {
            generated_at: Utc::now(),
            symptoms: symptoms.iter().map(|s| s.as_ref().to_string()).collect(),
            registered_models: self.models.len(),
            response,
            models: outcomes,
        }
    }
}

/// Query one model on the blocking pool, honoring the optional deadline.
async fn run_query(
    model: Arc<ModelHandle>,
    vector: FeatureVector,
    timeout: Option<Duration>,
) -> Result<QueryResult, ModelError> {
    let task =
        tokio::task::spawn_blocking(move || adapter::query(&model, &vector.bits, vector.matched));

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            // The worker keeps running detached; its result is discarded.
            Err(_) => return Err(ModelError::TimedOut(limit.as_millis() as u64)),
        },
        None => task.await,
    };

    joined.map_err(|e| ModelError::Aborted(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregator::NO_EVIDENCE_WARNING;
    use crate::ensemble::classifier::{DeterministicClassifier, ProbabilisticClassifier};
    use crate::models::{ClassLabel, Priority};

    /// Returns a fixed distribution once every feature is present.
    struct AllFeatures {
        classes: Vec<ClassLabel>,
        probabilities: Vec<f64>,
    }

    impl ProbabilisticClassifier for AllFeatures {
        fn classes(&self) -> &[ClassLabel] {
            &self.classes
        }

        fn predict_proba(&self, features: &[u8]) -> Result<Vec<f64>, ModelError> {
            if features.iter().all(|b| *b == 1) {
                Ok(self.probabilities.clone())
            } else {
                let share = 1.0 / self.classes.len() as f64;
                Ok(vec![share; self.classes.len()])
            }
        }

        fn kind(&self) -> &'static str {
            "test"
        }
    }

    struct Failing;

    impl DeterministicClassifier for Failing {
        fn classes(&self) -> &[ClassLabel] {
            &[]
        }

        fn predict(&self, features: &[u8]) -> Result<ClassLabel, ModelError> {
            Err(ModelError::InputShape {
                expected: 3,
                actual: features.len(),
            })
        }

        fn kind(&self) -> &'static str {
            "failing"
        }
    }

    struct Panicking;

    impl DeterministicClassifier for Panicking {
        fn classes(&self) -> &[ClassLabel] {
            &[]
        }

        fn predict(&self, _features: &[u8]) -> Result<ClassLabel, ModelError> {
            panic!("model exploded")
        }

        fn kind(&self) -> &'static str {
            "panicking"
        }
    }

    struct Slow;

    impl DeterministicClassifier for Slow {
        fn classes(&self) -> &[ClassLabel] {
            &[]
        }

        fn predict(&self, _features: &[u8]) -> Result<ClassLabel, ModelError> {
            std::thread::sleep(Duration::from_millis(300));
            Ok("Late".into())
        }

        fn kind(&self) -> &'static str {
            "slow"
        }
    }

    fn words(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn flu_model() -> ModelHandle {
        ModelHandle::probabilistic(
            "respiratory",
            words(&["fever", "cough"]),
            AllFeatures {
                classes: vec!["Flu".into(), "Cold".into()],
                probabilities: vec![0.9, 0.1],
            },
        )
    }

    fn rash_model() -> ModelHandle {
        ModelHandle::probabilistic(
            "dermatology",
            words(&["rash"]),
            AllFeatures {
                classes: vec!["Eczema".into()],
                probabilities: vec![1.0],
            },
        )
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "expected {}, got {}", expected, actual);
    }

    #[tokio::test]
    async fn test_unmatched_model_is_excluded() {
        let ensemble = Ensemble::new(vec![flu_model(), rash_model()], EnsembleOptions::default());
        let report = ensemble.predict(&["fever", "cough"]).await;
        let response = &report.response;

        assert_eq!(response.matched_symptoms, 2);
        assert_eq!(response.priority, Priority::High);
        assert!(response.warning.is_none());
        assert_eq!(response.top_predictions.len(), 2);
        assert_eq!(response.top_predictions[0].disease, "Flu");
        assert_close(response.top_predictions[0].probability, 90.0);
        assert_eq!(response.top_predictions[1].disease, "Cold");
        assert_close(response.top_predictions[1].probability, 10.0);

        assert_eq!(report.models[0].status, ModelStatus::Active);
        assert_eq!(report.models[1].status, ModelStatus::NoMatch);
        assert_eq!(report.active_models(), 1);
    }

    #[tokio::test]
    async fn test_no_matches_gives_no_evidence() {
        let ensemble = Ensemble::new(vec![flu_model(), rash_model()], EnsembleOptions::default());
        let report = ensemble.predict(&["blurred vision"]).await;

        assert_eq!(report.response.matched_symptoms, 0);
        assert!(report.response.top_predictions.is_empty());
        assert_eq!(report.response.priority, Priority::Normal);
        assert_eq!(report.response.warning.as_deref(), Some(NO_EVIDENCE_WARNING));
    }

    #[tokio::test]
    async fn test_failing_model_is_absorbed() {
        let broken = ModelHandle::deterministic("broken", words(&["fever"]), Failing);
        let ensemble = Ensemble::new(vec![broken, flu_model()], EnsembleOptions::default());
        let report = ensemble.predict(&["Fever", "Cough"]).await;

        assert!(matches!(report.models[0].status, ModelStatus::Unavailable(_)));
        assert_eq!(report.active_models(), 1);
        // Only the active model's matches count.
        assert_eq!(report.response.matched_symptoms, 2);
        assert_close(report.response.top_predictions[0].probability, 90.0);
    }

    #[tokio::test]
    async fn test_panicking_model_is_absorbed() {
        let exploding = ModelHandle::deterministic("exploding", words(&["cough"]), Panicking);
        let ensemble = Ensemble::new(vec![exploding, flu_model()], EnsembleOptions::default());
        let report = ensemble.predict(&["fever", "cough"]).await;

        match &report.models[0].status {
            ModelStatus::Unavailable(reason) => assert!(reason.contains("inference aborted")),
            other => panic!("unexpected status {:?}", other),
        }
        assert_eq!(report.response.top_predictions[0].disease, "Flu");
    }

    #[tokio::test]
    async fn test_slow_model_times_out() {
        let options = EnsembleOptions {
            model_timeout: Some(Duration::from_millis(20)),
            ..EnsembleOptions::default()
        };
        let slow = ModelHandle::deterministic("slow", words(&["fever"]), Slow);
        let ensemble = Ensemble::new(vec![slow], options);
        let report = ensemble.predict(&["fever"]).await;

        assert_eq!(
            report.models[0].status,
            ModelStatus::Unavailable("timed out after 20ms".to_string())
        );
        assert_eq!(
            report.response.warning.as_deref(),
            Some(MODELS_UNAVAILABLE_WARNING)
        );
        assert!(report.response.top_predictions.is_empty());
    }

    #[tokio::test]
    async fn test_shared_disease_across_models() {
        let second = ModelHandle::probabilistic(
            "general",
            words(&["fever"]),
            AllFeatures {
                classes: vec!["Flu".into(), "Malaria".into()],
                probabilities: vec![0.7, 0.3],
            },
        );
        let ensemble = Ensemble::new(vec![flu_model(), second], EnsembleOptions::default());
        let report = ensemble.predict(&["fever", "cough"]).await;
        let response = &report.response;

        // fever counted by both vocabularies
        assert_eq!(response.matched_symptoms, 3);
        assert_eq!(response.top_predictions[0].disease, "Flu");
        assert_close(response.top_predictions[0].probability, 80.0);
        assert_eq!(response.top_predictions[1].disease, "Malaria");
        assert_close(response.top_predictions[1].probability, 15.0);
        assert_eq!(response.top_predictions[2].disease, "Cold");
        assert_close(response.top_predictions[2].probability, 5.0);
    }

    #[test]
    fn test_empty_registry() {
        let ensemble = Ensemble::new(Vec::new(), EnsembleOptions::default());
        let report = tokio_test::block_on(ensemble.predict(&["fever"]));

        assert_eq!(report.registered_models, 0);
        assert_eq!(report.response.warning.as_deref(), Some(NO_EVIDENCE_WARNING));
        assert!(ensemble.symptom_catalogue().is_empty());
    }

    #[test]
    fn test_symptom_catalogue() {
        let extra = ModelHandle::probabilistic(
            "extra",
            words(&["Skin Rash", "Fever"]),
            AllFeatures {
                classes: vec!["Measles".into()],
                probabilities: vec![1.0],
            },
        );
        let ensemble = Ensemble::new(vec![flu_model(), rash_model(), extra], EnsembleOptions::default());

        let catalogue = ensemble.symptom_catalogue();
        assert_eq!(catalogue, &["cough", "fever", "rash", "skin_rash"]);
        // Cached: same allocation on the second call.
        assert!(std::ptr::eq(catalogue, ensemble.symptom_catalogue()));
    }

    #[test]
    fn test_model_info() {
        let ensemble = Ensemble::new(vec![flu_model()], EnsembleOptions::default());
        let info = ensemble.model_info();

        assert_eq!(info.len(), 1);
        assert_eq!(info[0].name, "respiratory");
        assert_eq!(info[0].features, 2);
        assert_eq!(info[0].classes, 2);
        assert!(info[0].probabilistic);
        assert_eq!(info[0].decoder_classes, None);

        let decoded = flu_model().with_decoder(LabelDecoder::new(words(&["Flu", "Cold", "Croup"])));
        let rules = ModelHandle::deterministic("broken", words(&["fever"]), Failing);
        let info = Ensemble::new(vec![decoded, rules], EnsembleOptions::default()).model_info();
        assert_eq!(info[0].decoder_classes, Some(3));
        assert!(!info[1].probabilistic);
        assert_eq!(info[1].kind, "failing");
    }
}
