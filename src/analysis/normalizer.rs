//! Symptom token normalization.
//!
//! Caller-submitted symptoms and model feature names are both run through
//! [`normalize`] so that `"Chest Pain"`, `"chest-pain"` and `"chest_pain"`
//! compare equal.

/// Canonicalize a free-text symptom or feature name.
///
/// Lower-cases, trims, strips commas and periods, turns hyphens into
/// spaces, collapses whitespace and finally joins the words with
/// underscores. Existing underscores count as separators, so the result
/// never contains empty segments and the function is idempotent.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let cleaned: String = lowered
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '.')
        .map(|c| if c == '-' { ' ' } else { c })
        .collect();

    // Underscores and any whitespace (tabs included) split words, so
    // "chest__pain" and "chest\tpain" both end up as "chest_pain".
    cleaned
        .split(|c: char| c.is_whitespace() || c == '_')
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equivalent_spellings() {
        assert_eq!(normalize("Chest Pain"), "chest_pain");
        assert_eq!(normalize("chest-pain"), "chest_pain");
        assert_eq!(normalize("chest_pain"), "chest_pain");
    }

    #[test]
    fn test_punctuation_and_whitespace() {
        assert_eq!(normalize("  High   Fever. "), "high_fever");
        assert_eq!(normalize("pain, behind the eyes"), "pain_behind_the_eyes");
        assert_eq!(normalize("Yellowish-Skin"), "yellowish_skin");
        assert_eq!(normalize("chest _ pain"), "chest_pain");
        assert_eq!(normalize("\tcough\n"), "cough");
    }

    #[test]
    fn test_underscore_runs_and_tabs() {
        assert_eq!(normalize("chest__pain"), "chest_pain");
        assert_eq!(normalize("a\tb"), "a_b");
        assert_eq!(normalize("_chest_pain_"), "chest_pain");
    }

    #[test]
    fn test_degenerate_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("-.,"), "");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "Chest Pain",
            "  muscle--wasting ",
            "spotting_ urination",
            "Dischromic _patches",
            "a.b,c-d e",
            "__leading",
        ];

        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", sample);
        }
    }
}
