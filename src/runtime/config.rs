use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{NodeId, Topology, DEFAULT_CONNECTIONS, DEFAULT_NODES};
use crate::predict::{LinearModel, ModelArtifacts};

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub nodes: Vec<String>,
    pub connections: Vec<(String, String)>,
    pub seed: Option<u64>,
}

impl NetworkConfig {
    pub fn build_topology(&self) -> Result<Topology> {
        let nodes = self.nodes.iter().map(|id| NodeId::from(id.as_str())).collect();
        let connections = self
            .connections
            .iter()
            .map(|(u, v)| (NodeId::from(u.as_str()), NodeId::from(v.as_str())))
            .collect();
        Topology::new(nodes, connections).context("invalid network topology")
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            nodes: DEFAULT_NODES.iter().map(ToString::to_string).collect(),
            connections: DEFAULT_CONNECTIONS
                .iter()
                .map(|(u, v)| (u.to_string(), v.to_string()))
                .collect(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub bind_address: String,
    pub port: u16,
    pub request_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5000,
            request_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub models: ModelArtifacts,
    pub http: HttpConfig,
    pub default_weights: LinearModel,
}

#[derive(Debug, Deserialize, Default)]
struct RawNetwork {
    nodes: Option<Vec<String>>,
    connections: Option<Vec<(String, String)>>,
    seed: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct RawModels {
    artifacts_dir: Option<PathBuf>,
    linear: Option<PathBuf>,
    forest: Option<PathBuf>,
    metadata: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct RawHttp {
    address: Option<String>,
    port: Option<u16>,
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct RawTraining {
    default_weights: Option<LinearModel>,
}

#[derive(Debug, Deserialize, Default)]
struct RawAppConfig {
    network: Option<RawNetwork>,
    models: Option<RawModels>,
    http: Option<RawHttp>,
    training: Option<RawTraining>,
}

/// Loads the YAML config at `path`, or the defaults when no path is given.
pub fn load_app_config(path: Option<&Path>) -> Result<AppConfig> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };
    let raw_text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse_app_config(&raw_text)
}

pub fn parse_app_config(raw_text: &str) -> Result<AppConfig> {
    let raw_cfg: RawAppConfig = if raw_text.trim().is_empty() {
        RawAppConfig::default()
    } else {
        serde_yaml::from_str(raw_text).context("failed to parse app config yaml")?
    };

    let network_raw = raw_cfg.network.unwrap_or_default();
    let models_raw = raw_cfg.models.unwrap_or_default();
    let http_raw = raw_cfg.http.unwrap_or_default();
    let training_raw = raw_cfg.training.unwrap_or_default();

    let network_default = NetworkConfig::default();
    let network = NetworkConfig {
        nodes: network_raw.nodes.unwrap_or(network_default.nodes),
        connections: network_raw
            .connections
            .unwrap_or(network_default.connections),
        seed: network_raw.seed,
    };
    network.build_topology()?;

    let artifacts_dir = models_raw
        .artifacts_dir
        .unwrap_or_else(|| PathBuf::from("model_artifacts"));
    let defaults = ModelArtifacts::in_dir(&artifacts_dir);
    let models = ModelArtifacts {
        linear: resolve_in(&artifacts_dir, models_raw.linear).unwrap_or(defaults.linear),
        forest: resolve_in(&artifacts_dir, models_raw.forest).unwrap_or(defaults.forest),
        metadata: resolve_in(&artifacts_dir, models_raw.metadata).unwrap_or(defaults.metadata),
        dir: artifacts_dir,
    };

    let http_default = HttpConfig::default();
    let http = HttpConfig {
        bind_address: http_raw.address.unwrap_or(http_default.bind_address),
        port: http_raw.port.unwrap_or(http_default.port),
        request_timeout_ms: http_raw
            .request_timeout_ms
            .unwrap_or(http_default.request_timeout_ms),
    };

    let default_weights = training_raw.default_weights.unwrap_or_default();
    default_weights
        .validate()
        .context("invalid training.default_weights")?;

    Ok(AppConfig {
        network,
        models,
        http,
        default_weights,
    })
}

fn resolve_in(dir: &Path, file: Option<PathBuf>) -> Option<PathBuf> {
    file.map(|file| {
        if file.is_absolute() {
            file
        } else {
            dir.join(file)
        }
    })
}
