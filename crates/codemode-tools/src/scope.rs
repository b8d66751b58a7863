//! Filesystem scoping for plan files.
//!
//! A plan may only run if it lives under the workspace root, inside a
//! `sessions/<id>/.../artifacts/` directory chain, and actually exists.

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::GatewayError;

/// Sentinel session id for plans outside the `sessions/<id>/` convention.
pub const UNKNOWN_SESSION: &str = "unknown";

const DEFAULT_REQUIRED_SEGMENTS: [&str; 2] = ["sessions", "artifacts"];

#[derive(Debug, Clone)]
pub struct ScopeBoundary {
    root: PathBuf,
    required_segments: Vec<String>,
}

impl ScopeBoundary {
    /// Scope rooted at `workspace_root`, requiring `sessions` and
    /// `artifacts` directories on the way to every plan.
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            root: normalize(workspace_root.as_ref()),
            required_segments: DEFAULT_REQUIRED_SEGMENTS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Lexically resolve `plan_path` against the root. Absolute paths
    /// replace the root; `.` and `..` are folded without touching disk.
    pub fn resolve(&self, plan_path: &str) -> PathBuf {
        normalize(&self.root.join(plan_path))
    }

    /// Run every check in order and return the resolved path of an
    /// admissible plan. Nothing is read before all checks pass.
    pub fn validate(&self, plan_path: &str) -> Result<PathBuf, GatewayError> {
        let resolved = self.resolve(plan_path);
        debug!(plan = %plan_path, resolved = %resolved.display(), "Validating plan path");

        let relative = resolved
            .strip_prefix(&self.root)
            .map_err(|_| GatewayError::OutsideWorkspace {
                path: plan_path.to_string(),
            })?;

        let dirs = directory_segments(relative);
        let in_scope = self
            .required_segments
            .iter()
            .all(|required| dirs.iter().any(|dir| dir == required));
        if !in_scope {
            return Err(GatewayError::OutsideSessionArtifacts {
                path: plan_path.to_string(),
            });
        }

        if !resolved.is_file() {
            return Err(GatewayError::NotFound {
                path: plan_path.to_string(),
            });
        }

        // A symlink inside the workspace must not lead back out of it.
        let real_root = self.root.canonicalize().map_err(|source| GatewayError::Read {
            path: self.root.display().to_string(),
            source,
        })?;
        let real_plan = resolved.canonicalize().map_err(|source| GatewayError::Read {
            path: plan_path.to_string(),
            source,
        })?;
        if !real_plan.starts_with(&real_root) {
            return Err(GatewayError::OutsideWorkspace {
                path: plan_path.to_string(),
            });
        }

        Ok(resolved)
    }

    /// The `<id>` of the first `sessions/<id>/` pair on the way to
    /// `resolved`, or [`UNKNOWN_SESSION`].
    pub fn session_id(&self, resolved: &Path) -> String {
        let relative = resolved.strip_prefix(&self.root).unwrap_or(resolved);
        let dirs = directory_segments(relative);
        dirs.iter()
            .position(|dir| dir == "sessions")
            .and_then(|at| dirs.get(at + 1))
            .cloned()
            .unwrap_or_else(|| UNKNOWN_SESSION.to_string())
    }
}

/// Names of the directories between the root and the file.
fn directory_segments(relative: &Path) -> Vec<String> {
    relative
        .parent()
        .map(|parent| {
            parent
                .components()
                .filter_map(|c| match c {
                    Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
