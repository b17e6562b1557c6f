//! Discovery of the auxiliary graph-layout helper (Graphviz `dot`).

use super::process::{self, Invocation};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// A layout helper that exists and answered `-V`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutHelperInstall {
    pub path: PathBuf,
    pub version: Option<String>,
}

fn resolve(candidate: &str) -> Option<PathBuf> {
    let path = Path::new(candidate);
    if path.components().count() > 1 || path.is_absolute() {
        path.is_file().then(|| path.to_path_buf())
    } else {
        which::which(candidate).ok()
    }
}

fn probe(path: &Path, timeout: Duration) -> Option<Option<String>> {
    let invocation = Invocation::new(path.to_string_lossy(), vec!["-V".to_string()]);
    match process::run(&invocation, None, timeout) {
        // dot prints its version banner on stderr.
        Ok(output) if output.status.success() => Some(
            output
                .stderr
                .lines()
                .chain(String::from_utf8_lossy(&output.stdout).lines())
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(str::to_string),
        ),
        Ok(output) => {
            log::debug!("{} -V exited with {}", path.display(), output.status);
            None
        }
        Err(e) => {
            log::debug!("{} -V failed: {}", path.display(), e);
            None
        }
    }
}

/// Resolve each candidate (absolute paths must exist, bare names are looked up
/// on `PATH`), keep those whose `-V` succeeds, and drop duplicates.
pub fn discover_layout_helpers(candidates: &[String], timeout: Duration) -> Vec<LayoutHelperInstall> {
    let timeout = timeout.min(VERSION_PROBE_TIMEOUT);
    let mut found: Vec<LayoutHelperInstall> = Vec::new();
    let mut seen: Vec<PathBuf> = Vec::new();

    for candidate in candidates {
        let Some(path) = resolve(candidate) else {
            continue;
        };
        let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
        if seen.contains(&canonical) {
            continue;
        }
        seen.push(canonical);

        if let Some(version) = probe(&path, timeout) {
            log::info!(
                "Layout helper at {} ({})",
                path.display(),
                version.as_deref().unwrap_or("unknown version")
            );
            found.push(LayoutHelperInstall { path, version });
        }
    }

    found
}
