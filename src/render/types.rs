use super::error::AttemptFailure;
use crate::format::OutputFormat;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Inject a scale and white-background directive before rendering.
    pub enlarge_fonts: bool,
}

/// One diagram to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub source: String,
    pub format: OutputFormat,
    pub options: RenderOptions,
}

impl RenderRequest {
    pub fn new(source: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            source: source.into(),
            format,
            options: RenderOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failure(AttemptFailure),
}

/// Record of one invocation strategy tried for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderAttempt {
    pub strategy: String,
    pub invocation: String,
    pub outcome: AttemptOutcome,
}

impl RenderAttempt {
    pub fn failure(&self) -> Option<&AttemptFailure> {
        match &self.outcome {
            AttemptOutcome::Success => None,
            AttemptOutcome::Failure(failure) => Some(failure),
        }
    }
}

/// Final output of the pipeline for one request.
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub content: Vec<u8>,
    pub format: OutputFormat,
    /// Which strategy or conversion produced the bytes. Diagnostic only.
    pub method: String,
    /// True when the bytes come from the local schematic instead of the renderer.
    pub is_fallback: bool,
    pub attempts: Vec<RenderAttempt>,
}

impl RenderResult {
    pub fn content_type(&self) -> String {
        self.format.content_type()
    }

    /// Content as text, for SVG results.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}
