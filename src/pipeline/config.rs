//! Cluster configuration (JSON) and its per-node resolution.
//!
//! Only the hostname-keyed node schema is accepted. Per-node settings override the cluster
//! `defaults`, which override the built-in defaults.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::{
    decimate::DecimationConfig,
    foundation::core::Fps,
    foundation::error::{DomeWarpError, DomeWarpResult},
    render::backend::BackendKind,
};

pub const DEFAULT_FPS: u32 = 30;
pub const DEFAULT_CRF: u32 = 18;
pub const DEFAULT_MAX_EMPTY_READS: u32 = 8;
const MAX_CRF: u32 = 51;

/// Optional per-node tunables; unset fields fall through to the next level.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimate: Option<bool>,
    /// Decimation bucket size in input pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimation_tolerance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,
    /// x264 constant rate factor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crf: Option<u32>,
    /// Consecutive empty source reads treated as end of stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_empty_reads: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendKind>,
}

impl NodeSettings {
    /// Field-wise `self` over `fallback`.
    pub fn or(&self, fallback: &NodeSettings) -> NodeSettings {
        NodeSettings {
            decimate: self.decimate.or(fallback.decimate),
            decimation_tolerance: self.decimation_tolerance.or(fallback.decimation_tolerance),
            fps: self.fps.or(fallback.fps),
            crf: self.crf.or(fallback.crf),
            max_empty_reads: self.max_empty_reads.or(fallback.max_empty_reads),
            backend: self.backend.or(fallback.backend),
        }
    }

    fn validate(&self, scope: &str) -> DomeWarpResult<()> {
        if let Some(t) = self.decimation_tolerance
            && (t.is_nan() || t <= 0.0)
        {
            return Err(DomeWarpError::config(format!(
                "{scope}: decimation_tolerance must be > 0, got {t}"
            )));
        }
        if self.fps == Some(0) {
            return Err(DomeWarpError::config(format!("{scope}: fps must be > 0")));
        }
        if let Some(crf) = self.crf
            && crf > MAX_CRF
        {
            return Err(DomeWarpError::config(format!(
                "{scope}: crf must be <= {MAX_CRF}, got {crf}"
            )));
        }
        if self.max_empty_reads == Some(0) {
            return Err(DomeWarpError::config(format!(
                "{scope}: max_empty_reads must be > 0"
            )));
        }
        Ok(())
    }
}

/// One cluster node, identified by hostname.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    pub hostname: String,
    /// Overrides the cluster input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<PathBuf>,
    /// Overrides `<output_dir>/<hostname>.mp4`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub settings: NodeSettings,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    /// Holds `<hostname>.txt` descriptors and the warp-map files they name.
    pub calibration_dir: PathBuf,
    /// Equirectangular source video.
    pub input: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub defaults: NodeSettings,
    pub nodes: Vec<NodeConfig>,
}

/// Fully resolved settings for processing one node.
#[derive(Clone, Debug, PartialEq)]
pub struct NodePlan {
    pub hostname: String,
    pub calibration_dir: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
    pub decimation: DecimationConfig,
    pub fps: Fps,
    pub crf: u32,
    pub max_empty_reads: u32,
    pub backend: BackendKind,
}

impl NodePlan {
    /// Plan with built-in defaults; handy for tools and tests that bypass the JSON layer.
    pub fn with_defaults(
        hostname: impl Into<String>,
        calibration_dir: impl Into<PathBuf>,
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            calibration_dir: calibration_dir.into(),
            input: input.into(),
            output: output.into(),
            decimation: DecimationConfig::default(),
            fps: Fps {
                num: DEFAULT_FPS,
                den: 1,
            },
            crf: DEFAULT_CRF,
            max_empty_reads: DEFAULT_MAX_EMPTY_READS,
            backend: BackendKind::default(),
        }
    }
}

impl ClusterConfig {
    pub fn load(path: &Path) -> DomeWarpResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            DomeWarpError::config(format!("failed to read '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Parse and validate.
    pub fn from_json_str(text: &str) -> DomeWarpResult<Self> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| DomeWarpError::config(format!("invalid JSON: {e}")))?;
        reject_legacy_schema(&value)?;
        let cfg: ClusterConfig = serde_json::from_value(value)
            .map_err(|e| DomeWarpError::config(format!("invalid cluster config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> DomeWarpResult<()> {
        if self.nodes.is_empty() {
            return Err(DomeWarpError::config("cluster config lists no nodes"));
        }
        self.defaults.validate("defaults")?;
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.hostname.trim().is_empty() {
                return Err(DomeWarpError::config("node hostname must be non-empty"));
            }
            if !seen.insert(node.hostname.as_str()) {
                return Err(DomeWarpError::config(format!(
                    "duplicate node hostname '{}'",
                    node.hostname
                )));
            }
            node.settings.validate(&node.hostname)?;
        }
        Ok(())
    }

    /// Resolved plans in config order.
    pub fn plans(&self) -> Vec<NodePlan> {
        self.nodes.iter().map(|n| self.resolve(n)).collect()
    }

    pub fn plan_for(&self, hostname: &str) -> Option<NodePlan> {
        self.nodes
            .iter()
            .find(|n| n.hostname == hostname)
            .map(|n| self.resolve(n))
    }

    fn resolve(&self, node: &NodeConfig) -> NodePlan {
        let s = node.settings.or(&self.defaults);
        NodePlan {
            hostname: node.hostname.clone(),
            calibration_dir: self.calibration_dir.clone(),
            input: node.input.clone().unwrap_or_else(|| self.input.clone()),
            output: node
                .output
                .clone()
                .unwrap_or_else(|| self.output_dir.join(format!("{}.mp4", node.hostname))),
            decimation: DecimationConfig {
                enabled: s.decimate.unwrap_or(true),
                tolerance_pixels: s
                    .decimation_tolerance
                    .unwrap_or(DecimationConfig::default().tolerance_pixels),
            },
            fps: Fps {
                num: s.fps.unwrap_or(DEFAULT_FPS),
                den: 1,
            },
            crf: s.crf.unwrap_or(DEFAULT_CRF),
            max_empty_reads: s.max_empty_reads.unwrap_or(DEFAULT_MAX_EMPTY_READS),
            backend: s.backend.unwrap_or_default(),
        }
    }
}

fn reject_legacy_schema(value: &serde_json::Value) -> DomeWarpResult<()> {
    let Some(nodes) = value.get("nodes").and_then(|n| n.as_array()) else {
        return Ok(());
    };
    for (i, node) in nodes.iter().enumerate() {
        if node.get("nodeId").is_some() {
            return Err(DomeWarpError::config(format!(
                "node #{i} uses the nodeId-keyed schema, which is not supported; key nodes by 'hostname'"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/config.rs"]
mod tests;
