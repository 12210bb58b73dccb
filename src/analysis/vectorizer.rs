//! Binary feature vectors from normalized symptom tokens.

use super::normalizer::normalize;
use std::collections::HashSet;

/// A model's presence vector for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureVector {
    /// One bit per vocabulary entry, in vocabulary order.
    pub bits: Vec<u8>,
    /// Number of set bits.
    pub matched: usize,
}

/// Normalize a set of caller tokens once so it can be reused for every model.
pub fn normalize_tokens<I, S>(tokens: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokens
        .into_iter()
        .map(|t| normalize(t.as_ref()))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Build the presence vector of `tokens` against `vocabulary`.
///
/// `tokens` must already be normalized (see [`normalize_tokens`]); each
/// vocabulary entry is normalized here. The output always has exactly one
/// entry per vocabulary item.
pub fn vectorize<S: AsRef<str>>(tokens: &HashSet<String>, vocabulary: &[S]) -> FeatureVector {
    let bits: Vec<u8> = vocabulary
        .iter()
        .map(|feature| u8::from(tokens.contains(&normalize(feature.as_ref()))))
        .collect();
    let matched = bits.iter().map(|b| *b as usize).sum();

    FeatureVector { bits, matched }
}
