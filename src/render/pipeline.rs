use super::background::ensure_white_background;
use super::convert::FormatConverter;
use super::error::RenderError;
use super::fallback::render_fallback;
use super::helpers::{LayoutHelperInstall, discover_layout_helpers};
use super::invoker::Invoker;
use super::types::{RenderAttempt, RenderRequest, RenderResult};
use crate::config::Config;
use crate::format::OutputFormat;
use crate::preprocess::enlarge_fonts;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

/// Everything needed to serve render requests. Built once, then shared; it
/// holds no per-request state.
pub struct Pipeline {
    config: Config,
    helpers: Vec<LayoutHelperInstall>,
    helper_paths: Vec<PathBuf>,
    converter: FormatConverter,
}

/// SVG text from the SVG step, genuine or degraded.
struct SvgStep {
    svg: String,
    method: String,
    is_fallback: bool,
    attempts: Vec<RenderAttempt>,
}

impl Pipeline {
    /// Build a pipeline, probing the configured layout helper candidates once.
    pub fn new(config: Config) -> Self {
        let helpers = discover_layout_helpers(&config.layout_helpers, config.timeout());
        if helpers.is_empty() {
            log::info!("No layout helper found, relying on the renderer's own detection");
        }
        Self::with_installs(config, helpers)
    }

    /// Build a pipeline with an explicit helper list, skipping discovery.
    pub fn with_helpers(config: Config, helpers: Vec<PathBuf>) -> Self {
        let installs = helpers
            .into_iter()
            .map(|path| LayoutHelperInstall { path, version: None })
            .collect();
        Self::with_installs(config, installs)
    }

    fn with_installs(config: Config, helpers: Vec<LayoutHelperInstall>) -> Self {
        let converter = FormatConverter::from_config(&config);
        let helper_paths = helpers.iter().map(|h| h.path.clone()).collect();
        Self {
            config,
            helpers,
            helper_paths,
            converter,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout_helpers(&self) -> &[LayoutHelperInstall] {
        &self.helpers
    }

    pub fn converter(&self) -> &FormatConverter {
        &self.converter
    }

    /// Render one request. SVG requests always produce a result unless the
    /// fallback itself fails; raster requests may additionally fail in
    /// conversion; other formats fail once every strategy is exhausted.
    pub fn render(&self, request: &RenderRequest) -> Result<RenderResult, RenderError> {
        if request.source.trim().is_empty() {
            return Err(RenderError::EmptySource);
        }

        let source = if request.options.enlarge_fonts {
            enlarge_fonts(&request.source)
        } else {
            request.source.clone()
        };

        panic::catch_unwind(AssertUnwindSafe(|| self.render_source(&source, &request.format)))
            .unwrap_or_else(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                log::error!("Rendering panicked: {}", message);
                Err(RenderError::Internal(message))
            })
    }

    fn render_source(&self, source: &str, format: &OutputFormat) -> Result<RenderResult, RenderError> {
        match format {
            OutputFormat::Svg => {
                let step = self.render_svg(source)?;
                Ok(RenderResult {
                    content: step.svg.into_bytes(),
                    format: OutputFormat::Svg,
                    method: step.method,
                    is_fallback: step.is_fallback,
                    attempts: step.attempts,
                })
            }
            OutputFormat::Png | OutputFormat::Jpeg => self.render_raster(source, format),
            OutputFormat::Other(_) => {
                let invoker = Invoker::new(&self.config, &self.helper_paths);
                match invoker.run(source, format) {
                    Ok(success) => Ok(RenderResult {
                        content: success.content,
                        format: format.clone(),
                        method: success.strategy,
                        is_fallback: false,
                        attempts: success.attempts,
                    }),
                    Err(exhausted) => Err(exhausted.into_error(format)),
                }
            }
        }
    }

    /// Genuine SVG normalized to a white background, or the degraded view.
    fn render_svg(&self, source: &str) -> Result<SvgStep, RenderError> {
        let invoker = Invoker::new(&self.config, &self.helper_paths);
        match invoker.run(source, &OutputFormat::Svg) {
            Ok(success) => Ok(SvgStep {
                svg: ensure_white_background(&String::from_utf8_lossy(&success.content)),
                method: success.strategy,
                is_fallback: false,
                attempts: success.attempts,
            }),
            Err(exhausted) => {
                log::warn!(
                    "All {} SVG strategies failed, using text fallback. Last error: {}",
                    exhausted.attempts.len(),
                    exhausted.last_error()
                );
                Ok(SvgStep {
                    svg: render_fallback(source)?,
                    method: "text fallback".to_string(),
                    is_fallback: true,
                    attempts: exhausted.attempts,
                })
            }
        }
    }

    fn render_raster(&self, source: &str, format: &OutputFormat) -> Result<RenderResult, RenderError> {
        let invoker = Invoker::new(&self.config, &self.helper_paths);
        let mut attempts = match invoker.run(source, format) {
            Ok(success) => {
                return Ok(RenderResult {
                    content: success.content,
                    format: format.clone(),
                    method: success.strategy,
                    is_fallback: false,
                    attempts: success.attempts,
                });
            }
            Err(exhausted) => {
                log::warn!(
                    "Direct {} rendering failed ({}), converting from SVG",
                    format,
                    exhausted.last_error()
                );
                exhausted.attempts
            }
        };

        let step = self.render_svg(source)?;
        let converted = self.converter.convert(&step.svg, format)?;
        attempts.extend(step.attempts);

        let mut method = format!(
            "SVG->{} via {}",
            format.to_string().to_ascii_uppercase(),
            converted.method
        );
        if step.is_fallback {
            method.push_str(" (fallback)");
        }

        Ok(RenderResult {
            content: converted.bytes,
            format: format.clone(),
            method,
            is_fallback: step.is_fallback,
            attempts,
        })
    }
}
