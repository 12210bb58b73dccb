//! Model manifest loading.
//!
//! A manifest is a JSON file listing model files by name and path. Paths
//! are resolved relative to the manifest. A model file that cannot be read,
//! parsed or validated is logged and left out of the registry; only an
//! unreadable manifest is an error.

use super::builtin::{LinearModel, ProfileModel};
use crate::ensemble::{LabelDecoder, ModelHandle};
use crate::models::ClassLabel;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failure to load the manifest or one of its model files.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid model {model}: {reason}")]
    Invalid { model: String, reason: String },

    #[error("duplicate model name {0}")]
    DuplicateName(String),
}

/// Top-level manifest document.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub models: Vec<ManifestEntry>,
}

/// One model listed in a manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub path: PathBuf,
}

/// A class profile of a `profile` model.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileSpec {
    pub class: ClassLabel,
    pub features: Vec<String>,
}

/// Contents of a model file, tagged by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    /// Probabilistic multinomial logistic model.
    Linear {
        vocabulary: Vec<String>,
        classes: Vec<ClassLabel>,
        weights: Vec<Vec<f64>>,
        #[serde(default)]
        bias: Option<Vec<f64>>,
        #[serde(default)]
        decoder: Option<Vec<String>>,
    },
    /// Deterministic nearest-profile model.
    Profile {
        vocabulary: Vec<String>,
        profiles: Vec<ProfileSpec>,
        #[serde(default)]
        decoder: Option<Vec<String>>,
    },
}

impl ModelSpec {
    /// Turn the description into a registered model.
    pub fn build(self, name: &str) -> Result<ModelHandle, RegistryError> {
        let invalid = |reason: String| RegistryError::Invalid {
            model: name.to_string(),
            reason,
        };

        let (handle, decoder) = match self {
            ModelSpec::Linear {
                vocabulary,
                classes,
                weights,
                bias,
                decoder,
            } => {
                let model = LinearModel::new(classes, weights, bias, vocabulary.len()).map_err(invalid)?;
                (ModelHandle::probabilistic(name, vocabulary, model), decoder)
            }
            ModelSpec::Profile {
                vocabulary,
                profiles,
                decoder,
            } => {
                let profiles = profiles.into_iter().map(|p| (p.class, p.features)).collect();
                let model = ProfileModel::new(profiles, &vocabulary).map_err(invalid)?;
                (ModelHandle::deterministic(name, vocabulary, model), decoder)
            }
        };

        if handle.vocabulary.is_empty() {
            return Err(RegistryError::Invalid {
                model: name.to_string(),
                reason: "empty vocabulary".to_string(),
            });
        }

        Ok(match decoder {
            Some(classes) => handle.with_decoder(LabelDecoder::new(classes)),
            None => handle,
        })
    }
}

/// Models loaded from a manifest, in manifest order.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    pub models: Vec<ModelHandle>,
    /// Entries that failed to load, with the reason.
    pub failed: Vec<(String, String)>,
}

impl ModelRegistry {
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Load every model listed in the manifest at `path`.
pub fn load_registry(path: &Path) -> Result<ModelRegistry, RegistryError> {
    info!("Loading model manifest: {}", path.display());

    let manifest: Manifest = read_json(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let mut registry = ModelRegistry::default();
    let mut names = HashSet::new();

    for entry in manifest.models {
        if !names.insert(entry.name.clone()) {
            let err = RegistryError::DuplicateName(entry.name.clone());
            warn!("Skipping model {}: {}", entry.name, err);
            registry.failed.push((entry.name, err.to_string()));
            continue;
        }

        match load_model(&base.join(&entry.path), &entry.name) {
            Ok(model) => {
                info!("Loaded model {} ({})", entry.name, model.capability.kind());
                registry.models.push(model);
            }
            Err(e) => {
                warn!("Failed loading model {}: {}", entry.name, e);
                registry.failed.push((entry.name, e.to_string()));
            }
        }
    }

    debug!(
        "Registry has {} models, {} failed",
        registry.models.len(),
        registry.failed.len()
    );

    Ok(registry)
}

/// Load a single model file.
pub fn load_model(path: &Path, name: &str) -> Result<ModelHandle, RegistryError> {
    let spec: ModelSpec = read_json(path)?;
    spec.build(name)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, RegistryError> {
    let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| RegistryError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::classifier::Capability;
    use tempfile::TempDir;

    const LINEAR: &str = r#"{
        "kind": "linear",
        "vocabulary": ["fever", "cough"],
        "classes": [0, 1],
        "weights": [[1.5, 1.5], [0.0, 0.0]],
        "decoder": ["Flu", "Cold"]
    }"#;

    const PROFILE: &str = r#"{
        "kind": "profile",
        "vocabulary": ["rash", "itching"],
        "profiles": [
            {"class": "eczema", "features": ["rash", "itching"]},
            {"class": "hives", "features": ["itching"]}
        ]
    }"#;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_registry() {
        let dir = TempDir::new().unwrap();
        write(&dir, "linear.json", LINEAR);
        write(&dir, "profile.json", PROFILE);
        let manifest = write(
            &dir,
            "registry.json",
            r#"{"models": [
                {"name": "respiratory", "path": "linear.json"},
                {"name": "dermatology", "path": "profile.json"}
            ]}"#,
        );

        let registry = load_registry(&manifest).unwrap();
        assert_eq!(registry.models.len(), 2);
        assert!(registry.failed.is_empty());

        assert_eq!(registry.models[0].name, "respiratory");
        assert!(registry.models[0].capability.is_probabilistic());
        assert!(registry.models[0].decoder.is_some());

        assert_eq!(registry.models[1].name, "dermatology");
        assert!(matches!(
            registry.models[1].capability,
            Capability::DeterministicOnly(_)
        ));
    }

    #[test]
    fn test_broken_model_is_skipped() {
        let dir = TempDir::new().unwrap();
        write(&dir, "linear.json", LINEAR);
        write(&dir, "broken.json", r#"{"kind": "linear", "vocabulary": ["a"]"#);
        write(
            &dir,
            "mismatch.json",
            r#"{"kind": "linear", "vocabulary": ["a"], "classes": ["X"], "weights": [[1.0, 2.0]]}"#,
        );
        let manifest = write(
            &dir,
            "registry.json",
            r#"{"models": [
                {"name": "broken", "path": "broken.json"},
                {"name": "missing", "path": "missing.json"},
                {"name": "mismatch", "path": "mismatch.json"},
                {"name": "respiratory", "path": "linear.json"},
                {"name": "respiratory", "path": "linear.json"}
            ]}"#,
        );

        let registry = load_registry(&manifest).unwrap();
        assert_eq!(registry.models.len(), 1);
        assert_eq!(registry.models[0].name, "respiratory");

        let failed: Vec<_> = registry.failed.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(failed, vec!["broken", "missing", "mismatch", "respiratory"]);
        assert!(registry.failed[2].1.contains("columns"));
        assert!(registry.failed[3].1.contains("duplicate"));
    }

    #[test]
    fn test_missing_manifest_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = load_registry(&dir.path().join("nope.json"));
        assert!(matches!(result, Err(RegistryError::Io { .. })));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "tree.json", r#"{"kind": "tree", "vocabulary": ["a"]}"#);
        assert!(matches!(
            load_model(&path, "tree"),
            Err(RegistryError::Parse { .. })
        ));
    }

    fn fixture_manifest() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/registry.json")
    }

    #[test]
    fn test_load_fixture_registry() {
        let registry = load_registry(&fixture_manifest()).unwrap();
        let names: Vec<_> = registry.models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["respiratory", "cardiology", "dermatology"]);
        assert!(registry.failed.is_empty());
    }

    #[tokio::test]
    async fn test_fixture_registry_end_to_end() {
        use crate::ensemble::{Ensemble, EnsembleOptions};
        use crate::models::{ModelStatus, Priority};

        let registry = load_registry(&fixture_manifest()).unwrap();
        let ensemble = Ensemble::new(registry.models, EnsembleOptions::default());

        let report = ensemble.predict(&["Fever", "Cough", "headache"]).await;
        let response = &report.response;

        // respiratory matches 3 features, dermatology matches fever.
        assert_eq!(response.matched_symptoms, 4);
        assert_eq!(report.active_models(), 2);
        assert_eq!(report.models[1].status, ModelStatus::NoMatch);
        assert_eq!(report.models[2].predicted.as_deref(), Some("Chickenpox"));

        let diseases: Vec<_> = response
            .top_predictions
            .iter()
            .map(|p| p.disease.as_str())
            .collect();
        assert_eq!(diseases, vec!["Influenza", "Eczema", "Chickenpox"]);
        assert_eq!(response.top_predictions[1].probability, 16.67);
        assert_eq!(response.priority, Priority::Normal);
        assert!(response.warning.is_none());

        assert!(ensemble
            .symptom_catalogue()
            .contains(&"shortness_of_breath".to_string()));
    }

    #[test]
    fn test_empty_vocabulary_is_rejected() {
        let spec: ModelSpec = serde_json::from_str(
            r#"{"kind": "linear", "vocabulary": [], "classes": ["A"], "weights": [[]]}"#,
        )
        .unwrap();
        assert!(matches!(spec.build("empty"), Err(RegistryError::Invalid { .. })));
    }
}
