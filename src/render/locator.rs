//! Finding the artifact a file-mode invocation left behind.
//!
//! The renderer may write next to its input, into the requested output
//! directory, or one level below it. Only paths inside the run directory are
//! ever considered, so concurrent requests cannot pick up each other's files.

use super::error::AttemptFailure;
use crate::format::OutputFormat;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| ext.eq_ignore_ascii_case(want)))
}

fn stem_matches(path: &Path, stem: &str) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.contains(stem))
}

/// Files directly in `dir` plus files one directory down.
fn files_two_levels(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return files;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Ok(nested) = fs::read_dir(&path) {
                files.extend(
                    nested
                        .flatten()
                        .map(|e| e.path())
                        .filter(|p| p.is_file()),
                );
            }
        } else if path.is_file() {
            files.push(path);
        }
    }
    files
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Locate the artifact for `stem` in `out_dir`, preferring the conventional
/// exact names, then the newest matching file found by scanning.
pub(crate) fn locate(
    run_dir: &Path,
    out_dir: &Path,
    stem: &str,
    format: &OutputFormat,
) -> Result<PathBuf, AttemptFailure> {
    let extensions = format.extensions();

    for ext in &extensions {
        let file_name = format!("{}.{}", stem, ext);
        for candidate in [out_dir.join(&file_name), run_dir.join(&file_name)] {
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }

    let files = files_two_levels(out_dir);
    let newest = files
        .iter()
        .filter(|p| has_extension(p, &extensions) && stem_matches(p, stem))
        .max_by_key(|p| modified(p));

    match newest {
        Some(path) => Ok(path.clone()),
        None => Err(AttemptFailure::ArtifactNotFound {
            dir: out_dir.display().to_string(),
            stem: stem.to_string(),
            extension: extensions.first().copied().unwrap_or_default().to_string(),
            found: files
                .iter()
                .map(|p| {
                    p.strip_prefix(out_dir)
                        .unwrap_or(p)
                        .display()
                        .to_string()
                })
                .collect(),
        }),
    }
}
