use crate::format::OutputFormat;
use thiserror::Error;

/// Why a single invocation strategy did not produce usable output. These are
/// recorded per attempt and never surface on their own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptFailure {
    #[error("failed to start {program}: {reason}")]
    Spawn { program: String, reason: String },
    #[error("exited with {status}: {stderr}")]
    ExitStatus { status: String, stderr: String },
    #[error("timed out after {0}s")]
    Timeout(u64),
    #[error("renderer reported an error ({marker}): {stderr}")]
    StderrMarker { marker: String, stderr: String },
    #[error("output is an error image ({0})")]
    ErrorImage(String),
    #[error("PNG output is only {len} bytes (minimum {min}), treating it as corrupt")]
    Undersized { len: usize, min: usize },
    #[error("output is malformed: {0}")]
    Malformed(String),
    #[error("no {extension} artifact for {stem} in {dir} (found: {})", .found.join(", "))]
    ArtifactNotFound {
        dir: String,
        stem: String,
        extension: String,
        found: Vec<String>,
    },
    #[error("scratch file I/O failed: {0}")]
    Io(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("No diagram source provided")]
    EmptySource,
    #[error(
        "Rendering {format} failed after {attempts} attempts ({}). Last error: {last_error}",
        .tried.join("; ")
    )]
    Exhausted {
        format: OutputFormat,
        attempts: usize,
        tried: Vec<String>,
        last_error: String,
    },
    #[error(
        "No SVG to {target} conversion capability available. Enable or install one of: {}",
        .required.join(", ")
    )]
    ConversionUnavailable {
        target: OutputFormat,
        required: Vec<String>,
    },
    #[error("SVG to {target} conversion failed: {detail}")]
    ConversionFailed { target: OutputFormat, detail: String },
    #[error("Even the text fallback failed: {0}")]
    Fallback(String),
    #[error("Error during diagram generation: {0}")]
    Internal(String),
}
