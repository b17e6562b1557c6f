//! Line-delimited JSON request loop.
//!
//! Each input line is `{"id": .., "method": .., "params": {..}}`; each output
//! line is `{"id": .., "result": ..}` or `{"id": .., "error": {"message": ..}}`.
//! Rendered images travel base64-encoded.

use crate::handler::{self, FailureKind, RenderPayload, Response};
use crate::library::{DiagramLibrary, LibraryError};
use crate::render::Pipeline;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::io::{self, BufRead, Write};

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct OutgoingMessage {
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    /// `invalid_request`, `not_found`, or `render_failed`.
    kind: &'static str,
}

impl OutgoingMessage {
    fn ok(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Value, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(ErrorBody {
                message: message.into(),
                kind,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReadParams {
    filename: String,
}

pub struct Server<'a> {
    pipeline: &'a Pipeline,
    library: DiagramLibrary,
}

impl<'a> Server<'a> {
    pub fn new(pipeline: &'a Pipeline, library: DiagramLibrary) -> Self {
        Self { pipeline, library }
    }

    /// Serve requests until `reader` hits end of input.
    pub fn serve(&self, reader: impl BufRead, mut writer: impl Write) -> io::Result<()> {
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<IncomingMessage>(trimmed) {
                Ok(message) => {
                    log::debug!("<- {} (id {})", message.method, message.id);
                    self.dispatch(message)
                }
                Err(e) => {
                    log::warn!("Unparseable request: {}", e);
                    OutgoingMessage::err(Value::Null, "invalid_request", format!("Parse error: {}", e))
                }
            };

            let json = serde_json::to_string(&response).map_err(io::Error::other)?;
            writeln!(writer, "{}", json)?;
            writer.flush()?;
        }
        log::debug!("Input closed, stopping");
        Ok(())
    }

    fn dispatch(&self, message: IncomingMessage) -> OutgoingMessage {
        let id = message.id;
        match message.method.as_str() {
            "render" => self.render(id, message.params),
            "list" => match self.library.list() {
                Ok(entries) => match serde_json::to_value(entries) {
                    Ok(value) => OutgoingMessage::ok(id, value),
                    Err(e) => OutgoingMessage::err(id, "render_failed", e.to_string()),
                },
                Err(e) => OutgoingMessage::err(id, "render_failed", e.to_string()),
            },
            "read" => self.read(id, message.params),
            other => OutgoingMessage::err(id, "invalid_request", format!("Method not found: {}", other)),
        }
    }

    fn render(&self, id: Value, params: Value) -> OutgoingMessage {
        let payload: RenderPayload = match serde_json::from_value(params) {
            Ok(payload) => payload,
            Err(e) => return OutgoingMessage::err(id, "invalid_request", e.to_string()),
        };

        match handler::handle(self.pipeline, payload) {
            Response::Rendered {
                bytes,
                content_type,
                filename,
                is_fallback,
                method,
            } => OutgoingMessage::ok(
                id,
                json!({
                    "content": BASE64_STANDARD.encode(bytes),
                    "content_type": content_type,
                    "filename": filename,
                    "is_fallback": is_fallback,
                    "method": method,
                }),
            ),
            Response::Failed { kind, error_message } => {
                let kind = match kind {
                    FailureKind::InvalidRequest => "invalid_request",
                    FailureKind::RenderFailed => "render_failed",
                };
                OutgoingMessage::err(id, kind, error_message)
            }
        }
    }

    fn read(&self, id: Value, params: Value) -> OutgoingMessage {
        let params: ReadParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => return OutgoingMessage::err(id, "invalid_request", e.to_string()),
        };

        match self.library.read(&params.filename) {
            Ok(file) => match serde_json::to_value(file) {
                Ok(value) => OutgoingMessage::ok(id, value),
                Err(e) => OutgoingMessage::err(id, "render_failed", e.to_string()),
            },
            Err(e @ LibraryError::NotFound(_)) => OutgoingMessage::err(id, "not_found", e.to_string()),
            Err(e @ (LibraryError::InvalidType(_) | LibraryError::Traversal(_))) => {
                OutgoingMessage::err(id, "invalid_request", e.to_string())
            }
            Err(e) => OutgoingMessage::err(id, "render_failed", e.to_string()),
        }
    }
}
