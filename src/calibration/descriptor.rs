//! Per-node calibration descriptor text format.
//!
//! ```text
//! id 3
//! filepath C:\calib\warps\proj3.bin
//! width 1920
//! height 1200
//! active 1
//! id 4
//! ...
//! ```
//!
//! Each line is `key value [ignored...]`. A record starts at every `id` line and becomes a
//! [`ProjectorConfig`] once `id`, `filepath`, `width` and `height` have all been seen.
//! Unknown keys (viewport bounds, active flags, ...) are ignored.

use crate::foundation::core::Resolution;

/// Static per-projector metadata from a node descriptor.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ProjectorConfig {
    /// 0-based order among completed records.
    pub index: usize,
    /// Raw `id` value from the descriptor.
    pub id: i64,
    /// Projector output resolution.
    pub resolution: Resolution,
    /// Warp-map file basename (directory components stripped).
    pub warp_map_filename: String,
}

/// All projectors driven by one cluster node.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct NodeCalibration {
    pub hostname: String,
    /// Projectors in descriptor order.
    pub projectors: Vec<ProjectorConfig>,
}

#[derive(Debug, Default)]
struct PartialRecord {
    id: i64,
    filepath: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    emitted: bool,
}

impl PartialRecord {
    fn complete(&self) -> Option<(Resolution, String)> {
        match (&self.filepath, self.width, self.height) {
            (Some(f), Some(w), Some(h)) => Some((Resolution::new(w, h), f.clone())),
            _ => None,
        }
    }
}

/// Parse a node descriptor. Incomplete records are dropped with a warning.
pub fn parse_descriptor(hostname: &str, text: &str) -> NodeCalibration {
    let mut projectors = Vec::new();
    let mut current: Option<PartialRecord> = None;

    for (line_no, line) in text.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        let Some(key) = tokens.next() else {
            continue;
        };
        let value = tokens.next();

        if key == "id" {
            drop_if_incomplete(hostname, current.take());
            match value.and_then(|v| v.parse::<i64>().ok()) {
                Some(id) => {
                    current = Some(PartialRecord {
                        id,
                        ..PartialRecord::default()
                    })
                }
                None => tracing::warn!(
                    hostname,
                    line = line_no + 1,
                    "descriptor 'id' without integer value; record ignored"
                ),
            }
            continue;
        }

        let Some(rec) = current.as_mut() else {
            continue;
        };
        match (key, value) {
            ("filepath", Some(v)) => rec.filepath = Some(basename(v).to_string()),
            ("width", Some(v)) => rec.width = parse_dim(v),
            ("height", Some(v)) => rec.height = parse_dim(v),
            _ => continue,
        }

        if !rec.emitted
            && let Some((resolution, warp_map_filename)) = rec.complete()
        {
            rec.emitted = true;
            projectors.push(ProjectorConfig {
                index: projectors.len(),
                id: rec.id,
                resolution,
                warp_map_filename,
            });
        }
    }
    drop_if_incomplete(hostname, current);

    NodeCalibration {
        hostname: hostname.to_string(),
        projectors,
    }
}

fn drop_if_incomplete(hostname: &str, rec: Option<PartialRecord>) {
    if let Some(rec) = rec
        && !rec.emitted
    {
        tracing::warn!(
            hostname,
            id = rec.id,
            "dropping incomplete projector record (needs filepath, width and height)"
        );
    }
}

fn parse_dim(v: &str) -> Option<u32> {
    v.parse::<u32>().ok().filter(|&d| d > 0)
}

/// Final path component, accepting both `/` and `\` separators.
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
#[path = "../../tests/unit/calibration/descriptor.rs"]
mod tests;
