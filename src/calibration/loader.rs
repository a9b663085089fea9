use std::path::{Path, PathBuf};

use crate::{
    calibration::descriptor::{NodeCalibration, ProjectorConfig, parse_descriptor},
    calibration::warp_file::read_warp_file,
    foundation::error::{DomeWarpError, DomeWarpResult},
    warp::map::WarpMap,
};

/// A projector whose warp map loaded successfully.
#[derive(Clone, Debug)]
pub struct LoadedProjector {
    pub config: ProjectorConfig,
    pub warp: WarpMap,
}

/// Resolves node descriptors (`<dir>/<hostname>.txt`) and the warp maps they reference.
///
/// Warp maps are looked up by basename in the same directory.
#[derive(Clone, Debug)]
pub struct CalibrationLoader {
    dir: PathBuf,
}

impl CalibrationLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Descriptor location for `hostname`.
    pub fn descriptor_path(&self, hostname: &str) -> PathBuf {
        self.dir.join(format!("{hostname}.txt"))
    }

    /// Parse the descriptor for `hostname`.
    ///
    /// A missing descriptor is [`DomeWarpError::CalibrationNotFound`]; an unreadable one is a
    /// parse error.
    pub fn load_node(&self, hostname: &str) -> DomeWarpResult<NodeCalibration> {
        let path = self.descriptor_path(hostname);
        if !path.is_file() {
            return Err(DomeWarpError::calibration_not_found(format!(
                "no descriptor for host '{hostname}' at '{}'",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(&path).map_err(|e| {
            DomeWarpError::calibration_parse(format!(
                "failed to read descriptor '{}': {e}",
                path.display()
            ))
        })?;
        let node = parse_descriptor(hostname, &text);
        tracing::debug!(
            hostname,
            projectors = node.projectors.len(),
            "parsed calibration descriptor"
        );
        Ok(node)
    }

    /// Load one projector's warp map.
    pub fn load_warp_map(&self, config: &ProjectorConfig) -> DomeWarpResult<WarpMap> {
        let path = self.dir.join(&config.warp_map_filename);
        let warp = read_warp_file(&path, config.resolution)?;
        if warp.resolution() != config.resolution {
            tracing::warn!(
                projector = config.index,
                configured = %config.resolution,
                actual = %warp.resolution(),
                "warp map resolution differs from descriptor; warp map wins"
            );
        }
        Ok(warp)
    }

    /// Load every projector of `hostname`, dropping projectors whose warp maps fail to load.
    ///
    /// Fails when the descriptor is missing or no projector survives.
    pub fn load_projectors(&self, hostname: &str) -> DomeWarpResult<Vec<LoadedProjector>> {
        let node = self.load_node(hostname)?;
        let mut loaded = Vec::with_capacity(node.projectors.len());
        for config in node.projectors {
            match self.load_warp_map(&config) {
                Ok(warp) => loaded.push(LoadedProjector { config, warp }),
                Err(e @ DomeWarpError::CalibrationParse(_)) => {
                    tracing::warn!(
                        hostname,
                        projector = config.index,
                        error = %e,
                        "skipping projector"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        if loaded.is_empty() {
            return Err(DomeWarpError::calibration_parse(format!(
                "host '{hostname}' has no projector with a usable warp map"
            )));
        }
        Ok(loaded)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/calibration/loader.rs"]
mod tests;
