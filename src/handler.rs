//! The request boundary: untyped input in, bytes or an error message out.

use crate::format::OutputFormat;
use crate::render::{Pipeline, RenderOptions, RenderRequest};
use serde::Deserialize;

/// A render request as it arrives from a client.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderPayload {
    #[serde(alias = "uml_content", default)]
    pub source_text: Option<String>,
    #[serde(alias = "format", default = "default_output_format")]
    pub output_format: String,
    #[serde(default)]
    pub enlarge_fonts: bool,
}

fn default_output_format() -> String {
    "svg".to_string()
}

impl Default for RenderPayload {
    fn default() -> Self {
        Self {
            source_text: None,
            output_format: default_output_format(),
            enlarge_fonts: false,
        }
    }
}

impl RenderPayload {
    pub fn new(source_text: impl Into<String>, output_format: impl Into<String>) -> Self {
        Self {
            source_text: Some(source_text.into()),
            output_format: output_format.into(),
            enlarge_fonts: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request itself was unusable.
    InvalidRequest,
    /// The pipeline ran and could not produce output.
    RenderFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Rendered {
        bytes: Vec<u8>,
        content_type: String,
        /// Suggested name for the returned image, e.g. `diagram.svg`.
        filename: String,
        is_fallback: bool,
        method: String,
    },
    Failed {
        kind: FailureKind,
        error_message: String,
    },
}

impl Response {
    fn invalid(message: impl Into<String>) -> Self {
        Response::Failed {
            kind: FailureKind::InvalidRequest,
            error_message: message.into(),
        }
    }
}

/// Validate `payload`, run it through `pipeline`, and shape the outcome.
pub fn handle(pipeline: &Pipeline, payload: RenderPayload) -> Response {
    let Some(source) = payload.source_text.filter(|s| !s.trim().is_empty()) else {
        return Response::invalid("No UML content provided");
    };
    let format: OutputFormat = match payload.output_format.parse() {
        Ok(format) => format,
        Err(e) => return Response::invalid(e),
    };

    let request = RenderRequest::new(source, format.clone()).with_options(RenderOptions {
        enlarge_fonts: payload.enlarge_fonts,
    });

    match pipeline.render(&request) {
        Ok(result) => {
            log::debug!(
                "Rendered {} ({} bytes, method: {})",
                format,
                result.content.len(),
                result.method
            );
            Response::Rendered {
                content_type: result.content_type(),
                filename: format!("diagram.{}", format.tool_flag()),
                is_fallback: result.is_fallback,
                method: result.method,
                bytes: result.content,
            }
        }
        Err(e) => {
            log::error!("Render request failed: {}", e);
            Response::Failed {
                kind: FailureKind::RenderFailed,
                error_message: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FailureKind, RenderPayload, Response, handle};
    use crate::config::{Config, ToolConfig};
    use crate::render::Pipeline;

    fn pipeline(scratch: &std::path::Path) -> Pipeline {
        Pipeline::with_helpers(
            Config {
                tool: ToolConfig::executable("/nonexistent/plantuml"),
                layout_helpers: Vec::new(),
                scratch_root: scratch.to_path_buf(),
                ..Config::default()
            },
            Vec::new(),
        )
    }

    #[test]
    fn payload_accepts_legacy_field_names() {
        let payload: RenderPayload =
            serde_json::from_str(r#"{"uml_content": "A -> B", "format": "png"}"#).unwrap();
        assert_eq!(payload.source_text.as_deref(), Some("A -> B"));
        assert_eq!(payload.output_format, "png");
        assert!(!payload.enlarge_fonts);

        let payload: RenderPayload = serde_json::from_str(r#"{"source_text": "x"}"#).unwrap();
        assert_eq!(payload.output_format, "svg");
    }

    #[test]
    fn missing_source_is_invalid() {
        let scratch = tempfile::tempdir().unwrap();
        let response = handle(&pipeline(scratch.path()), RenderPayload::default());
        assert_eq!(
            response,
            Response::Failed {
                kind: FailureKind::InvalidRequest,
                error_message: "No UML content provided".to_string(),
            }
        );
    }

    #[test]
    fn bad_format_is_invalid() {
        let scratch = tempfile::tempdir().unwrap();
        let response = handle(&pipeline(scratch.path()), RenderPayload::new("A -> B", "p n g"));
        assert!(matches!(
            response,
            Response::Failed {
                kind: FailureKind::InvalidRequest,
                ..
            }
        ));
    }

    #[test]
    fn svg_request_returns_content_type_and_name() {
        let scratch = tempfile::tempdir().unwrap();
        let response = handle(
            &pipeline(scratch.path()),
            RenderPayload::new("@startuml\ntitle Demo\n@enduml", "SVG"),
        );
        match response {
            Response::Rendered {
                bytes,
                content_type,
                filename,
                is_fallback,
                ..
            } => {
                assert_eq!(content_type, "image/svg+xml");
                assert_eq!(filename, "diagram.svg");
                assert!(is_fallback);
                assert!(String::from_utf8(bytes).unwrap().contains("Demo"));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn exhausted_other_format_is_a_render_failure() {
        let scratch = tempfile::tempdir().unwrap();
        let response = handle(&pipeline(scratch.path()), RenderPayload::new("A -> B", "eps"));
        match response {
            Response::Failed { kind, error_message } => {
                assert_eq!(kind, FailureKind::RenderFailed);
                assert!(error_message.contains("eps"));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
