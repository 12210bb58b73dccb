//! Multi-model ensemble.
//!
//! This module provides the model capability traits, the query adapter
//! and the engine that fans a request out over every registered model.

pub mod adapter;
pub mod classifier;
pub mod engine;

pub use classifier::{
    DeterministicClassifier, LabelDecoder, ModelError, ModelHandle, ProbabilisticClassifier,
};
pub use engine::{Ensemble, EnsembleOptions};
