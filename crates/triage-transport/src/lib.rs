//! Triage Transport crate - one multipart request per user turn.
//!
//! Provides the [`Transport`] abstraction used by the session controller, the
//! reqwest-backed [`HttpTransport`], and a scripted [`MockTransport`] for
//! testing without a server.

pub mod http;

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use triage_core::error::TriageError;
use triage_core::types::{RawResponse, TurnRequest};

pub use http::{HttpTransport, SESSION_HEADER};

// =============================================================================
// Trait
// =============================================================================

/// Sends one turn to the diagnosis service and returns its raw payload.
///
/// Implementations are cheap to clone so a caller can await a request without
/// holding the controller that produced it.
pub trait Transport: Clone + Send + Sync + 'static {
    /// Send the turn to the endpoint selected by `request.mode`.
    ///
    /// Resolves to the decoded payload, or to one of the transport errors
    /// (`TransportTimeout`, `TransportRejected`, `TransportUnreachable`,
    /// `MalformedResponse`).
    fn send(
        &self,
        request: TurnRequest,
    ) -> impl Future<Output = Result<RawResponse, TriageError>> + Send;
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Scripted transport for testing.
///
/// Replies are returned in the order they were queued; every request is
/// recorded. An empty script answers with `TransportUnreachable`.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    replies: Arc<Mutex<VecDeque<Result<RawResponse, TriageError>>>>,
    requests: Arc<Mutex<Vec<TurnRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn push_response(&self, response: RawResponse) {
        self.push_reply(Ok(response));
    }

    /// Queue a failure.
    pub fn push_error(&self, error: TriageError) {
        self.push_reply(Err(error));
    }

    /// Queue a reply given as JSON text, decoded as the HTTP client would.
    pub fn push_json(&self, json: &str) {
        self.push_reply(http::decode_payload(json.as_bytes()));
    }

    fn push_reply(&self, reply: Result<RawResponse, TriageError>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// All requests sent so far, oldest first.
    pub fn requests(&self) -> Vec<TurnRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl Transport for MockTransport {
    async fn send(&self, request: TurnRequest) -> Result<RawResponse, TriageError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .unwrap_or_else(|| {
                Err(TriageError::TransportUnreachable(
                    "no scripted response".to_string(),
                ))
            })
    }
}

// =============================================================================
// Tests
// =============================================================================
