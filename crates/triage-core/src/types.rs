use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TriageError;

/// Condition label used when the server omitted one, and after a diet plan
/// completes.
pub const UNKNOWN_CONDITION: &str = "Unknown";

/// The only document type accepted as an attachment.
pub const PDF_MIME: &str = "application/pdf";

// =============================================================================
// Enums
// =============================================================================

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    User,
    Assistant,
}

/// Which sub-dialogue governs the next request's endpoint and payload shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Symptom intake against the diagnosis endpoint.
    #[default]
    Diagnosis,
    /// Diet-plan follow-up against the diet endpoint.
    Diet,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Diagnosis => write!(f, "diagnosis"),
            Mode::Diet => write!(f, "diet"),
        }
    }
}

// =============================================================================
// Message log
// =============================================================================

/// A single entry in the conversation log.
///
/// The text of the trailing assistant message grows while a reveal is in
/// progress; every other message is immutable once appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub origin: Origin,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text.into(), Origin::User)
    }

    /// An empty assistant message, filled in by the reveal animator.
    pub fn assistant_placeholder() -> Self {
        Self::new(String::new(), Origin::Assistant)
    }

    fn new(text: String, origin: Origin) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            origin,
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// Identity and dialogue state of one conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Sent as `X-Session-ID` on every request. Never changes.
    pub session_id: Uuid,
    pub mode: Mode,
    /// Condition carried from a completed diagnosis into the diet sub-dialogue.
    pub pending_condition: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            mode: Mode::Diagnosis,
            pending_condition: None,
        }
    }

    /// The condition label to send with a diet-mode request.
    pub fn condition_label(&self) -> &str {
        self.pending_condition
            .as_deref()
            .unwrap_or(UNKNOWN_CONDITION)
    }
}

// =============================================================================
// Attachment
// =============================================================================

/// A document staged for upload with the next turn.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

// =============================================================================
// Wire types
// =============================================================================

/// The outbound payload of one turn, owned so it can outlive the controller
/// borrow while the request is in flight.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnRequest {
    pub session_id: Uuid,
    /// Selects the endpoint.
    pub mode: Mode,
    /// Trimmed user text; `None` when empty.
    pub message: Option<String>,
    pub attachment: Option<Attachment>,
    /// Present on diet-mode turns only.
    pub condition: Option<String>,
}

/// The raw JSON body returned by the diagnosis and diet endpoints.
///
/// Every field is optional and any combination is legal. Fields are kept as
/// undecoded JSON and only read into their typed shape when classification
/// reaches the branch that uses them, so an odd value in an unused field never
/// spoils an otherwise valid reply. `null` reads the same as absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawResponse(serde_json::Map<String, serde_json::Value>);

impl From<serde_json::Map<String, serde_json::Value>> for RawResponse {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(map)
    }
}

impl RawResponse {
    pub const QUESTION: &'static str = "question";
    pub const DIAGNOSIS: &'static str = "diagnosis";
    pub const SEVERITY_SCORE: &'static str = "severity_score";
    pub const HOME_REMEDY: &'static str = "home_remedy";
    pub const DIET_PLAN: &'static str = "diet_plan";

    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field to an arbitrary JSON value.
    pub fn with_field(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn with_question(self, question: impl Into<String>) -> Self {
        self.with_field(Self::QUESTION, question.into())
    }

    pub fn with_diagnosis(self, diagnosis: RawDiagnosis) -> Self {
        let value = serde_json::to_value(diagnosis).unwrap_or_default();
        self.with_field(Self::DIAGNOSIS, value)
    }

    pub fn with_severity_score(self, score: f64) -> Self {
        self.with_field(Self::SEVERITY_SCORE, score)
    }

    pub fn with_home_remedy(self, remedy: impl Into<String>) -> Self {
        self.with_field(Self::HOME_REMEDY, remedy.into())
    }

    pub fn with_diet_plan(self, plan: impl Into<String>) -> Self {
        self.with_field(Self::DIET_PLAN, plan.into())
    }

    /// Whether `key` is present with a non-null value.
    pub fn is_present(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|v| !v.is_null())
    }

    /// Decode one field. Absent and `null` give `None`; a value of the wrong
    /// shape is a [`TriageError::MalformedResponse`] naming the field.
    pub fn field<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, TriageError> {
        match self.0.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| TriageError::MalformedResponse(format!("{}: {}", key, e))),
        }
    }

    pub fn question(&self) -> Result<Option<String>, TriageError> {
        self.field(Self::QUESTION)
    }

    pub fn diagnosis(&self) -> Result<Option<RawDiagnosis>, TriageError> {
        self.field(Self::DIAGNOSIS)
    }

    pub fn severity_score(&self) -> Result<Option<f64>, TriageError> {
        self.field(Self::SEVERITY_SCORE)
    }

    pub fn home_remedy(&self) -> Result<Option<String>, TriageError> {
        self.field(Self::HOME_REMEDY)
    }

    pub fn diet_plan(&self) -> Result<Option<String>, TriageError> {
        self.field(Self::DIET_PLAN)
    }
}

/// The `diagnosis` object of a [`RawResponse`].
///
/// List fields may be absent or `null`; both read as empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDiagnosis {
    #[serde(default)]
    pub condition: Option<String>,
    /// Confidence in `[0, 1]`.
    #[serde(default)]
    pub probability: Option<f64>,
    #[serde(default)]
    pub recommendations: Option<Vec<String>>,
    #[serde(default, alias = "tests")]
    pub medical_tests: Option<Vec<String>>,
    #[serde(default, alias = "medications")]
    pub medication: Option<Vec<String>>,
    #[serde(default, alias = "lifestyle_changes")]
    pub lifestyle: Option<Vec<String>>,
    #[serde(default)]
    pub precautions: Option<Vec<String>>,
}

/// Error body returned with non-2xx statuses.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    /// The `detail` field when it is a plain string.
    pub fn detail_text(&self) -> Option<String> {
        match &self.detail {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            _ => None,
        }
    }
}
