//! Ordered invocation strategies against the external renderer.
//!
//! Every strategy is a plain description; [`Invoker::attempt`] turns one
//! description into an outcome and [`Invoker::run`] walks the list until the
//! first success.

use super::error::{AttemptFailure, RenderError};
use super::locator;
use super::process::{self, Invocation};
use super::scratch::ScratchRun;
use super::types::{AttemptOutcome, RenderAttempt};
use crate::config::Config;
use crate::format::OutputFormat;
use std::fmt;
use std::path::{Path, PathBuf};

/// Messages the renderer prints on stderr while still exiting 0.
const STDERR_ERROR_MARKERS: &[&str] = &[
    "Dot executable does not exist",
    "Cannot find Graphviz",
    "cannot run dot",
    "Exception in thread",
    "java.lang.OutOfMemoryError",
    "Unable to access jarfile",
];

/// Text found in the placeholder images the renderer draws instead of a diagram.
/// Tied to the renderer's wording and therefore best-effort.
const SVG_ERROR_MARKERS: &[&str] = &[
    "Syntax Error?",
    "Cannot find Graphviz",
    "Dot Executable:",
    "Dot executable does not exist",
    "An error has occured",
    "An error has occurred",
];

/// Graphviz property understood by the renderer.
const LAYOUT_HELPER_PROPERTY: &str = "-DGRAPHVIZ_DOT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Source on stdin, image on stdout.
    Pipe,
    /// Source file in, output directory scanned afterwards.
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutHelper {
    Path(PathBuf),
    /// Let the renderer find Graphviz on its own.
    AutoDetect,
    /// Point the renderer at nothing so it runs without Graphviz.
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strategy {
    pub transport: Transport,
    pub helper: LayoutHelper,
}

impl Strategy {
    /// Streaming strategies for every helper preference, then file strategies
    /// in the same helper order.
    pub fn plan(helpers: &[PathBuf]) -> Vec<Strategy> {
        let preferences: Vec<LayoutHelper> = helpers
            .iter()
            .cloned()
            .map(LayoutHelper::Path)
            .chain([LayoutHelper::AutoDetect, LayoutHelper::Disabled])
            .collect();

        [Transport::Pipe, Transport::File]
            .into_iter()
            .flat_map(|transport| {
                preferences.iter().cloned().map(move |helper| Strategy { transport, helper })
            })
            .collect()
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let transport = match self.transport {
            Transport::Pipe => "pipe",
            Transport::File => "file",
        };
        match &self.helper {
            LayoutHelper::Path(path) => write!(f, "{} with Graphviz at {}", transport, path.display()),
            LayoutHelper::AutoDetect => write!(f, "{} with auto-detected Graphviz", transport),
            LayoutHelper::Disabled => write!(f, "{} without Graphviz", transport),
        }
    }
}

/// Bytes from the first successful strategy.
#[derive(Debug)]
pub struct InvokerSuccess {
    pub content: Vec<u8>,
    pub strategy: String,
    pub attempts: Vec<RenderAttempt>,
}

/// Every strategy failed.
#[derive(Debug)]
pub struct Exhausted {
    pub attempts: Vec<RenderAttempt>,
}

impl Exhausted {
    pub fn last_error(&self) -> String {
        self.attempts
            .iter()
            .rev()
            .find_map(|a| a.failure())
            .map(|f| f.to_string())
            .unwrap_or_else(|| "All execution attempts failed".to_string())
    }

    pub fn into_error(self, format: &OutputFormat) -> RenderError {
        RenderError::Exhausted {
            format: format.clone(),
            attempts: self.attempts.len(),
            last_error: self.last_error(),
            tried: self.attempts.into_iter().map(|a| a.strategy).collect(),
        }
    }
}

/// Runs strategies for one request. Holds no state between requests.
pub struct Invoker<'a> {
    config: &'a Config,
    helpers: &'a [PathBuf],
}

impl<'a> Invoker<'a> {
    pub fn new(config: &'a Config, helpers: &'a [PathBuf]) -> Self {
        Self { config, helpers }
    }

    /// Build the command line for `strategy`. File mode needs the input path
    /// and the directory the renderer should write to.
    pub fn invocation(
        &self,
        strategy: &Strategy,
        format: &OutputFormat,
        files: Option<(&Path, &Path)>,
    ) -> Invocation {
        let mut args = self.config.tool.args.clone();
        args.push(format!("-t{}", format.tool_flag()));
        args.push("-charset".to_string());
        args.push("UTF-8".to_string());

        match &strategy.helper {
            LayoutHelper::Path(path) => {
                args.push(format!("{}={}", LAYOUT_HELPER_PROPERTY, path.display()))
            }
            LayoutHelper::AutoDetect => {}
            LayoutHelper::Disabled => args.push(format!("{}=", LAYOUT_HELPER_PROPERTY)),
        }

        match (strategy.transport, files) {
            (Transport::File, Some((input, out_dir))) => {
                args.push("-o".to_string());
                args.push(out_dir.display().to_string());
                args.push(input.display().to_string());
            }
            _ => args.push("-pipe".to_string()),
        }

        Invocation::new(self.config.tool.program.clone(), args)
    }

    /// Try each strategy in order, stopping at the first usable output.
    pub fn run(&self, source: &str, format: &OutputFormat) -> Result<InvokerSuccess, Exhausted> {
        let strategies = Strategy::plan(self.helpers);
        let mut attempts = Vec::with_capacity(strategies.len());
        let mut scratch: Option<Result<ScratchRun, String>> = None;

        for (index, strategy) in strategies.iter().enumerate() {
            let (invocation, result) = match strategy.transport {
                Transport::Pipe => {
                    let invocation = self.invocation(strategy, format, None);
                    let result = self.attempt_pipe(&invocation, source, format);
                    (invocation, result)
                }
                Transport::File => {
                    // Only touch the disk once streaming has failed.
                    let run = scratch.get_or_insert_with(|| {
                        ScratchRun::create(&self.config.scratch_root, source, self.config.retain_outputs)
                            .map_err(|e| e.to_string())
                    });
                    match run {
                        Ok(run) => self.attempt_file(run, index, strategy, format),
                        Err(e) => (
                            self.invocation(strategy, format, None),
                            Err(AttemptFailure::Io(e.clone())),
                        ),
                    }
                }
            };

            let outcome = match &result {
                Ok(_) => AttemptOutcome::Success,
                Err(failure) => AttemptOutcome::Failure(failure.clone()),
            };
            attempts.push(RenderAttempt {
                strategy: strategy.to_string(),
                invocation: invocation.to_string(),
                outcome,
            });

            match result {
                Ok(content) => {
                    log::info!("Rendered {} with {} ({} bytes)", format, strategy, content.len());
                    return Ok(InvokerSuccess {
                        content,
                        strategy: strategy.to_string(),
                        attempts,
                    });
                }
                Err(failure) => log::debug!("Strategy '{}' failed: {}", strategy, failure),
            }
        }

        Err(Exhausted { attempts })
    }

    fn attempt_pipe(
        &self,
        invocation: &Invocation,
        source: &str,
        format: &OutputFormat,
    ) -> Result<Vec<u8>, AttemptFailure> {
        log::debug!("Trying {}", invocation);
        let output = process::run(invocation, Some(source.as_bytes()), self.config.timeout())?;
        check_exit(output.status, &output.stderr)?;
        self.validate(format, output.stdout)
    }

    fn attempt_file(
        &self,
        run: &ScratchRun,
        index: usize,
        strategy: &Strategy,
        format: &OutputFormat,
    ) -> (Invocation, Result<Vec<u8>, AttemptFailure>) {
        let out_dir = match run.attempt_dir(index) {
            Ok(dir) => dir,
            Err(e) => {
                return (
                    self.invocation(strategy, format, None),
                    Err(AttemptFailure::Io(e.to_string())),
                );
            }
        };

        let invocation = self.invocation(strategy, format, Some((run.input(), out_dir.as_path())));
        log::debug!("Trying {}", invocation);

        let result = process::run(&invocation, None, self.config.timeout()).and_then(|output| {
            check_exit(output.status, &output.stderr)?;
            let artifact = locator::locate(run.dir(), &out_dir, run.stem(), format)?;
            log::debug!("Found output file {}", artifact.display());
            let content = std::fs::read(&artifact)
                .map_err(|e| AttemptFailure::Io(format!("{}: {}", artifact.display(), e)))?;
            self.validate(format, content)
        });

        (invocation, result)
    }

    /// Reject output that is empty, an error placeholder, or implausibly small.
    fn validate(&self, format: &OutputFormat, content: Vec<u8>) -> Result<Vec<u8>, AttemptFailure> {
        if content.is_empty() {
            return Err(AttemptFailure::Malformed("no output".to_string()));
        }

        match format {
            OutputFormat::Svg => {
                let text = String::from_utf8_lossy(&content);
                if !text.contains("<svg") {
                    return Err(AttemptFailure::Malformed("output is not SVG".to_string()));
                }
                if let Some(marker) = SVG_ERROR_MARKERS.iter().find(|m| text.contains(*m)) {
                    return Err(AttemptFailure::ErrorImage(marker.to_string()));
                }
            }
            OutputFormat::Png => {
                if content.len() < self.config.min_png_bytes {
                    return Err(AttemptFailure::Undersized {
                        len: content.len(),
                        min: self.config.min_png_bytes,
                    });
                }
                match imagesize::image_type(&content) {
                    Ok(imagesize::ImageType::Png) => {}
                    _ => return Err(AttemptFailure::Malformed("output is not a PNG".to_string())),
                }
                if let Ok(size) = imagesize::blob_size(&content) {
                    log::debug!("PNG output is {}x{}", size.width, size.height);
                }
            }
            OutputFormat::Jpeg => match imagesize::image_type(&content) {
                Ok(imagesize::ImageType::Jpeg) => {}
                _ => return Err(AttemptFailure::Malformed("output is not a JPEG".to_string())),
            },
            OutputFormat::Other(_) => {}
        }

        Ok(content)
    }
}

fn check_exit(status: std::process::ExitStatus, stderr: &str) -> Result<(), AttemptFailure> {
    if !status.success() {
        return Err(AttemptFailure::ExitStatus {
            status: status.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }
    if let Some(marker) = STDERR_ERROR_MARKERS.iter().find(|m| stderr.contains(*m)) {
        return Err(AttemptFailure::StderrMarker {
            marker: marker.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }
    Ok(())
}
