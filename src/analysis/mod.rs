//! Request-scoped analysis stages.
//!
//! Normalization and vectorization run once per model; aggregation merges
//! the per-model results into the final ranking.

pub mod aggregator;
pub mod normalizer;
pub mod vectorizer;

pub use aggregator::{aggregate, rank, RankOptions};
pub use normalizer::normalize;
pub use vectorizer::{normalize_tokens, vectorize, FeatureVector};
