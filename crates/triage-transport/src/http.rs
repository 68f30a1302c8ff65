//! HTTP multipart transport backed by `reqwest`.

use std::time::Instant;

use reqwest::multipart::{Form, Part};

use triage_core::config::TransportConfig;
use triage_core::error::TriageError;
use triage_core::types::{ErrorBody, RawResponse, TurnRequest};

use crate::Transport;

/// Header carrying the session token on every request.
pub const SESSION_HEADER: &str = "X-Session-ID";

/// Sends turns as `multipart/form-data` to the configured endpoints.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: TransportConfig,
}

impl HttpTransport {
    /// Build a client enforcing the configured connect and request timeouts.
    pub fn new(config: TransportConfig) -> Result<Self, TriageError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .build()
            .map_err(|e| TriageError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn map_error(&self, err: reqwest::Error) -> TriageError {
        if err.is_timeout() {
            TriageError::TransportTimeout {
                timeout_ms: self.config.timeout_ms,
            }
        } else {
            TriageError::TransportUnreachable(err.to_string())
        }
    }
}

/// Assemble the multipart body: `message` (omitted when empty), `file`, and
/// `condition` (diet turns only).
pub fn build_form(request: &TurnRequest) -> Result<Form, TriageError> {
    let mut form = Form::new();

    if let Some(message) = request.message.as_deref().map(str::trim) {
        if !message.is_empty() {
            form = form.text("message", message.to_string());
        }
    }

    if let Some(attachment) = &request.attachment {
        let part = Part::bytes(attachment.bytes.clone())
            .file_name(attachment.file_name.clone())
            .mime_str(&attachment.mime_type)
            .map_err(|e| TriageError::AttachmentRejected(e.to_string()))?;
        form = form.part("file", part);
    }

    if let Some(condition) = &request.condition {
        form = form.text("condition", condition.clone());
    }

    Ok(form)
}

/// Decode a 2xx body. Anything but a JSON object is malformed; the fields
/// themselves are decoded later, by the branch that needs them.
pub fn decode_payload(body: &[u8]) -> Result<RawResponse, TriageError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| TriageError::MalformedResponse(format!("invalid JSON: {}", e)))?;
    match value {
        serde_json::Value::Object(map) => Ok(RawResponse::from(map)),
        _ => Err(TriageError::MalformedResponse(
            "expected a JSON object".to_string(),
        )),
    }
}

/// Extract the optional `detail` string from a non-2xx body.
pub fn decode_error_detail(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail_text())
}

impl Transport for HttpTransport {
    async fn send(&self, request: TurnRequest) -> Result<RawResponse, TriageError> {
        let url = self.config.endpoint(request.mode).to_string();
        let form = build_form(&request)?;

        tracing::info!(
            session_id = %request.session_id,
            mode = %request.mode,
            url = %url,
            has_file = request.attachment.is_some(),
            "Sending turn"
        );
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
            .header(SESSION_HEADER, request.session_id.to_string())
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.map_error(e))?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if !status.is_success() {
            let detail = decode_error_detail(&body);
            tracing::warn!(
                session_id = %request.session_id,
                status = status.as_u16(),
                elapsed_ms,
                "Server rejected turn"
            );
            return Err(TriageError::TransportRejected {
                status: status.as_u16(),
                detail,
            });
        }

        tracing::debug!(
            session_id = %request.session_id,
            elapsed_ms,
            body_len = body.len(),
            "Turn response received"
        );
        decode_payload(&body)
    }
}

// =============================================================================
// Tests
// =============================================================================
