//! A directory of `.puml` files the user can browse and load.

use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

const EXTENSION: &str = "puml";

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("File {0} not found")]
    NotFound(String),
    #[error("Invalid file type: {0}")]
    InvalidType(String),
    #[error("Invalid file name: {0}")]
    Traversal(String),
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid directory pattern: {0}")]
    Pattern(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagramEntry {
    pub filename: String,
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagramFile {
    pub filename: String,
    pub content: String,
    /// Length of `content` in characters.
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct DiagramLibrary {
    dir: PathBuf,
}

impl DiagramLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every `*.puml` file directly inside the directory, sorted by file name.
    /// A missing directory lists as empty.
    pub fn list(&self) -> Result<Vec<DiagramEntry>, LibraryError> {
        if !self.dir.is_dir() {
            log::warn!("Diagram directory {} does not exist", self.dir.display());
            return Ok(Vec::new());
        }

        let pattern = self
            .dir
            .join(format!("*.{}", EXTENSION))
            .to_string_lossy()
            .into_owned();
        let pattern = escape_prefix(&self.dir, &pattern);
        let paths = glob::glob(&pattern).map_err(|e| LibraryError::Pattern(e.to_string()))?;

        let mut entries: Vec<DiagramEntry> = paths
            .flatten()
            .filter(|p| p.is_file())
            .filter_map(|path| {
                let filename = path.file_name()?.to_str()?.to_string();
                let name = path.file_stem()?.to_str()?.to_string();
                Some(DiagramEntry { filename, name, path })
            })
            .collect();
        entries.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(entries)
    }

    /// Read one diagram by bare file name.
    pub fn read(&self, filename: &str) -> Result<DiagramFile, LibraryError> {
        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => return Err(LibraryError::Traversal(filename.to_string())),
        }

        let path = self.dir.join(filename);
        if !path.is_file() {
            return Err(LibraryError::NotFound(filename.to_string()));
        }
        if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
            return Err(LibraryError::InvalidType(filename.to_string()));
        }

        let content = fs::read_to_string(&path).map_err(|source| LibraryError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(DiagramFile {
            filename: filename.to_string(),
            size: content.chars().count(),
            content,
        })
    }
}

/// Escape glob metacharacters in the directory part of `pattern`.
fn escape_prefix(dir: &Path, pattern: &str) -> String {
    let dir = dir.to_string_lossy();
    match pattern.strip_prefix(dir.as_ref()) {
        Some(rest) => format!("{}{}", glob::Pattern::escape(&dir), rest),
        None => pattern.to_string(),
    }
}
