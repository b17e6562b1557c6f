use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Run-scoped scratch space: `<root>/<run-id>/diagram_<run-id>.puml` plus one
/// output directory per file-mode attempt.
///
/// Dropping the guard removes the input file on every exit path. Output
/// artifacts stay on disk unless `retain_outputs` is false, in which case the
/// whole run directory goes.
#[derive(Debug)]
pub(crate) struct ScratchRun {
    stem: String,
    dir: PathBuf,
    input: PathBuf,
    retain_outputs: bool,
}

impl ScratchRun {
    pub fn create(root: &Path, source: &str, retain_outputs: bool) -> io::Result<Self> {
        // Shared by every request; create_dir_all copes with concurrent creation.
        fs::create_dir_all(root)?;

        let id = Uuid::new_v4().simple().to_string();
        let dir = root.join(&id);
        fs::create_dir(&dir)?;

        let stem = format!("diagram_{}", id);
        let run = Self {
            input: dir.join(format!("{}.puml", stem)),
            stem,
            dir,
            retain_outputs,
        };
        fs::write(&run.input, source)?;
        Ok(run)
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Fresh output directory for the `index`-th file-mode attempt.
    pub fn attempt_dir(&self, index: usize) -> io::Result<PathBuf> {
        let out = self.dir.join(format!("out-{}", index));
        fs::create_dir_all(&out)?;
        Ok(out)
    }
}

impl Drop for ScratchRun {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.input) {
            log::debug!("Could not remove {}: {}", self.input.display(), e);
        }
        if !self.retain_outputs {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }
}
