use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use super::{CostPredictor, ForestModel, LinearModel, ModelVariant, PredictError};

#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifacts {
    pub dir: PathBuf,
    pub linear: PathBuf,
    pub forest: PathBuf,
    pub metadata: PathBuf,
}

impl ModelArtifacts {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            linear: dir.join("linear_model.json"),
            forest: dir.join("rf_model.json"),
            metadata: dir.join("model_metadata.json"),
            dir,
        }
    }

    pub fn path_for(&self, variant: ModelVariant) -> &Path {
        match variant {
            ModelVariant::Linear => &self.linear,
            ModelVariant::Forest => &self.forest,
        }
    }
}

impl Default for ModelArtifacts {
    fn default() -> Self {
        Self::in_dir("model_artifacts")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub variant: ModelVariant,
    pub loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Predictors resolved once at startup, keyed by variant.
///
/// A variant that failed to load stays unavailable for the life of the
/// registry; lookups never touch the filesystem.
#[derive(Default)]
pub struct ModelRegistry {
    models: BTreeMap<ModelVariant, Arc<dyn CostPredictor>>,
    failures: BTreeMap<ModelVariant, String>,
    metadata: Option<Value>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(artifacts: &ModelArtifacts) -> Self {
        let mut registry = Self::new();

        match read_json::<Value>(&artifacts.metadata) {
            Ok(metadata) => {
                info!("model metadata loaded from {}", artifacts.metadata.display());
                registry.metadata = Some(metadata);
            }
            Err(err) => warn!("model metadata unavailable: {err:#}"),
        }

        let linear = read_json::<LinearModel>(&artifacts.linear).and_then(|model| {
            model.validate()?;
            Ok(model)
        });
        registry.record(ModelVariant::Linear, artifacts, linear);

        let forest = read_json::<ForestModel>(&artifacts.forest).and_then(|model| {
            model.validate()?;
            Ok(model)
        });
        registry.record(ModelVariant::Forest, artifacts, forest);

        registry
    }

    fn record<P>(&mut self, variant: ModelVariant, artifacts: &ModelArtifacts, loaded: Result<P>)
    where
        P: CostPredictor + 'static,
    {
        match loaded {
            Ok(model) => {
                info!(
                    "{} model loaded from {}",
                    variant,
                    artifacts.path_for(variant).display()
                );
                self.insert(variant, Arc::new(model));
            }
            Err(err) => {
                error!("{variant} model unavailable: {err:#}");
                self.failures.insert(variant, format!("{err:#}"));
            }
        }
    }

    pub fn insert(&mut self, variant: ModelVariant, predictor: Arc<dyn CostPredictor>) {
        self.failures.remove(&variant);
        self.models.insert(variant, predictor);
    }

    pub fn with_model(mut self, variant: ModelVariant, predictor: impl CostPredictor + 'static) -> Self {
        self.insert(variant, Arc::new(predictor));
        self
    }

    pub fn get(&self, variant: ModelVariant) -> Result<Arc<dyn CostPredictor>, PredictError> {
        self.models
            .get(&variant)
            .cloned()
            .ok_or(PredictError::ModelUnavailable(variant))
    }

    pub fn is_available(&self, variant: ModelVariant) -> bool {
        self.models.contains_key(&variant)
    }

    pub fn metadata(&self) -> Option<&Value> {
        self.metadata.as_ref()
    }

    pub fn statuses(&self) -> Vec<ModelStatus> {
        ModelVariant::ALL
            .iter()
            .map(|variant| ModelStatus {
                variant: *variant,
                loaded: self.is_available(*variant),
                detail: self.failures.get(variant).cloned(),
            })
            .collect()
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("loaded", &self.models.keys().collect::<Vec<_>>())
            .field("failures", &self.failures)
            .finish()
    }
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let payload = serde_json::to_string_pretty(value).context("failed to encode artifact")?;
    fs::write(path, payload).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::{CostQuery, RegressionTree, TreeNode};

    #[test]
    fn missing_artifacts_leave_every_variant_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = ModelRegistry::load(&ModelArtifacts::in_dir(dir.path().join("absent")));
        for variant in ModelVariant::ALL {
            assert!(!registry.is_available(variant));
            assert!(matches!(
                registry.get(variant),
                Err(PredictError::ModelUnavailable(v)) if v == variant
            ));
        }
        assert!(registry.statuses().iter().all(|status| status.detail.is_some()));
    }

    #[test]
    fn loads_written_artifacts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let artifacts = ModelArtifacts::in_dir(dir.path());
        write_json(&artifacts.linear, &LinearModel::default()).expect("write linear");
        let forest = ForestModel {
            trees: vec![RegressionTree {
                nodes: vec![TreeNode::Leaf { value: 12.5 }],
            }],
        };
        write_json(&artifacts.forest, &forest).expect("write forest");
        write_json(&artifacts.metadata, &serde_json::json!({"linear": {}})).expect("metadata");

        let registry = ModelRegistry::load(&artifacts);
        assert!(registry.is_available(ModelVariant::Linear));
        assert!(registry.metadata().is_some());
        let query = CostQuery {
            distance: 1.0,
            traffic: 1.0,
            quality_inverse: 1.0,
        };
        let predictor = registry.get(ModelVariant::Forest).expect("forest loaded");
        assert_eq!(predictor.predict(&query), Ok(12.5));
    }

    #[test]
    fn malformed_forest_is_recorded_as_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let artifacts = ModelArtifacts::in_dir(dir.path());
        write_json(&artifacts.forest, &ForestModel::default()).expect("write forest");
        let registry = ModelRegistry::load(&artifacts);
        assert!(!registry.is_available(ModelVariant::Forest));
        let status = registry
            .statuses()
            .into_iter()
            .find(|status| status.variant == ModelVariant::Forest)
            .expect("forest status");
        assert!(status
            .detail
            .as_deref()
            .is_some_and(|detail| detail.contains("no trees")));
    }
}
