//! Classifier capabilities and model registration records.
//!
//! A registered model is a [`ModelHandle`]: its vocabulary, an optional
//! [`LabelDecoder`] and exactly one [`Capability`]. The capability is fixed
//! at registration time; models that can produce calibrated distributions
//! are `Probabilistic`, the rest are `DeterministicOnly`.

use crate::models::ClassLabel;
use thiserror::Error;

/// Fault raised while querying a single model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// The feature vector does not have the length the model expects.
    #[error("expected {expected} features, got {actual}")]
    InputShape { expected: usize, actual: usize },

    /// The model returned a distribution that does not line up with its classes.
    #[error("distribution has {actual} entries for {expected} classes")]
    DistributionShape { expected: usize, actual: usize },

    /// The model returned a negative or non-finite probability.
    #[error("invalid probability {0}")]
    InvalidProbability(f64),

    /// The model's probabilities do not sum to one.
    #[error("probabilities sum to {0}, expected 1")]
    InvalidDistribution(f64),

    /// A deterministic model predicted a class it does not declare.
    #[error("predicted class {0} is not one of the model's classes")]
    UnknownPrediction(String),

    /// The model produced no class at all.
    #[error("model has no classes")]
    NoClasses,

    /// The model call did not finish in time and was abandoned.
    #[error("timed out after {0}ms")]
    TimedOut(u64),

    /// The model call panicked or its worker was cancelled.
    #[error("inference aborted: {0}")]
    Aborted(String),
}

/// Failure to decode an encoded class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("class {class} is outside the decoder range 0..{len}")]
    OutOfRange { class: i64, len: usize },
}

/// Maps encoded integer classes back to human-readable names.
///
/// Mirrors a fitted label encoder: the class with code `i` is `classes[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDecoder {
    classes: Vec<String>,
}

impl LabelDecoder {
    pub fn new(classes: Vec<String>) -> Self {
        Self { classes }
    }

    /// Decode an encoded class into its name.
    pub fn decode(&self, class: i64) -> Result<String, DecodeError> {
        usize::try_from(class)
            .ok()
            .and_then(|i| self.classes.get(i))
            .cloned()
            .ok_or(DecodeError::OutOfRange {
                class,
                len: self.classes.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[allow(dead_code)] // Pairs with len()
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// A classifier that yields a full probability distribution per call.
pub trait ProbabilisticClassifier: Send + Sync {
    /// Class identifiers, in the order probabilities are returned.
    fn classes(&self) -> &[ClassLabel];

    /// Probability of each class in [`classes`](Self::classes) order.
    fn predict_proba(&self, features: &[u8]) -> Result<Vec<f64>, ModelError>;

    /// Short name of the model family, for health reporting.
    fn kind(&self) -> &'static str;
}

/// A classifier that can only name its predicted class.
pub trait DeterministicClassifier: Send + Sync {
    /// Every class the model can emit.
    fn classes(&self) -> &[ClassLabel];

    fn predict(&self, features: &[u8]) -> Result<ClassLabel, ModelError>;

    fn kind(&self) -> &'static str;
}

/// The prediction capability of a model, chosen once at registration.
pub enum Capability {
    Probabilistic(Box<dyn ProbabilisticClassifier>),
    DeterministicOnly(Box<dyn DeterministicClassifier>),
}

impl Capability {
    pub fn classes(&self) -> &[ClassLabel] {
        match self {
            Capability::Probabilistic(model) => model.classes(),
            Capability::DeterministicOnly(model) => model.classes(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Capability::Probabilistic(model) => model.kind(),
            Capability::DeterministicOnly(model) => model.kind(),
        }
    }

    pub fn is_probabilistic(&self) -> bool {
        matches!(self, Capability::Probabilistic(_))
    }
}

/// A loaded model and everything needed to query it.
pub struct ModelHandle {
    /// Registry name, unique within a manifest.
    pub name: String,
    /// Ordered feature names the model was trained on.
    pub vocabulary: Vec<String>,
    pub decoder: Option<LabelDecoder>,
    pub capability: Capability,
}

impl ModelHandle {
    pub fn probabilistic(
        name: impl Into<String>,
        vocabulary: Vec<String>,
        model: impl ProbabilisticClassifier + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            vocabulary,
            decoder: None,
            capability: Capability::Probabilistic(Box::new(model)),
        }
    }

    pub fn deterministic(
        name: impl Into<String>,
        vocabulary: Vec<String>,
        model: impl DeterministicClassifier + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            vocabulary,
            decoder: None,
            capability: Capability::DeterministicOnly(Box::new(model)),
        }
    }

    /// Attach a label decoder.
    pub fn with_decoder(mut self, decoder: LabelDecoder) -> Self {
        self.decoder = Some(decoder);
        self
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("name", &self.name)
            .field("kind", &self.capability.kind())
            .field("features", &self.vocabulary.len())
            .field("classes", &self.capability.classes().len())
            .field("decoder", &self.decoder.is_some())
            .finish()
    }
}
