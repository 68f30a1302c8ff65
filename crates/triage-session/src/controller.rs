//! The session controller.
//!
//! Owns session identity and dialogue mode, the append-only message log, the
//! pending input and attachment, the single in-flight request, and the reveal
//! of each reply. Everything runs on one logical thread: the controller is
//! `&mut` driven and only suspends while awaiting permission, the transport,
//! or a reveal tick.
//!
//! Submissions are split in two so a caller can await the network without
//! holding the controller:
//! ```text
//! let request = controller.begin_submit()?;   // Idle -> Submitting
//! let result = transport.send(request).await;
//! controller.complete_submit(result)?;        // -> Revealing, or Failed -> Idle
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use triage_capture::{merge_transcript, CaptureAdapter, CaptureDevice, CaptureEvent};
use triage_core::config::TriageConfig;
use triage_core::error::TriageError;
use triage_core::types::{
    Attachment, Message, Mode, Origin, RawResponse, Session, TurnRequest, UNKNOWN_CONDITION,
};
use triage_transport::Transport;

use crate::animator::{Animator, RevealPacing};
use crate::attachment::AttachmentManager;
use crate::classify::{classify, ResponseKind, ServerResponse};
use crate::events::{EventSink, SessionEvent};
use crate::render::render;
use crate::state::{SessionState, StateMachine};

/// Default recording limit when none is configured.
const DEFAULT_MAX_CAPTURE: Duration = Duration::from_secs(30);

/// Outcome of one reveal step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealProgress {
    /// One more character is visible.
    Revealed { revealed: usize, total: usize },
    /// The reply is fully visible and the reveal released.
    Completed { id: Uuid },
}

/// Conversation controller for one session.
pub struct SessionController<T, D> {
    session: Session,
    state: StateMachine,
    messages: Vec<Message>,
    input: String,
    attachments: AttachmentManager,
    animator: Animator,
    capture: CaptureAdapter<D>,
    transport: T,
    banner: Option<String>,
    last_kind: Option<ResponseKind>,
    events: EventSink,
}

impl<T, D> std::fmt::Debug for SessionController<T, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("session", &self.session)
            .field("state", &self.state.current())
            .field("messages", &self.messages.len())
            .field("attachment", &self.attachments.file_name())
            .field("banner", &self.banner)
            .finish()
    }
}

impl<T: Transport, D: CaptureDevice> SessionController<T, D> {
    /// Create a controller with default pacing and limits.
    pub fn new(transport: T, device: Arc<D>) -> Self {
        Self {
            session: Session::new(),
            state: StateMachine::new(),
            messages: Vec::new(),
            input: String::new(),
            attachments: AttachmentManager::default(),
            animator: Animator::new(RevealPacing::default()),
            capture: CaptureAdapter::new(device, DEFAULT_MAX_CAPTURE),
            transport,
            banner: None,
            last_kind: None,
            events: EventSink::default(),
        }
    }

    /// Create a controller using the reveal, capture, and attachment settings
    /// from `config`.
    pub fn from_config(transport: T, device: Arc<D>, config: &TriageConfig) -> Self {
        let mut controller = Self::new(transport, device);
        controller.animator = Animator::new(RevealPacing::from(&config.reveal));
        controller.attachments = AttachmentManager::new(&config.attachment);
        controller.capture = CaptureAdapter::new(
            controller.capture.device(),
            Duration::from_secs(u64::from(config.capture.max_duration_secs)),
        );
        tracing::info!(
            session_id = %controller.session.session_id,
            diagnosis_url = %config.transport.diagnosis_url,
            diet_url = %config.transport.diet_url,
            "Session created"
        );
        controller
    }

    /// Replace the reveal pacing. Only takes effect for the next reveal.
    pub fn with_pacing(mut self, pacing: RevealPacing) -> Self {
        self.animator = Animator::new(pacing);
        self
    }

    /// Receive every subsequent [`SessionEvent`]. Replaces any earlier
    /// subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        self.events.subscribe()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_id(&self) -> Uuid {
        self.session.session_id
    }

    pub fn mode(&self) -> Mode {
        self.session.mode
    }

    pub fn pending_condition(&self) -> Option<&str> {
        self.session.pending_condition.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachments.current()
    }

    /// The visible error line, kept until the next successful reply.
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn is_revealing(&self) -> bool {
        self.animator.is_revealing()
    }

    pub fn is_recording(&self) -> bool {
        self.capture.is_recording()
    }

    pub fn can_capture(&self) -> bool {
        self.capture.is_available()
    }

    /// Kind of the most recently classified reply.
    pub fn last_response_kind(&self) -> Option<ResponseKind> {
        self.last_kind
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // =========================================================================
    // Input and attachment
    // =========================================================================

    /// Replace the pending input buffer.
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
        self.events.emit(SessionEvent::InputChanged {
            text: self.input.clone(),
        });
    }

    /// Stage an attachment for the next diagnosis turn.
    ///
    /// Refused in diet mode. A rejected file raises the banner and leaves any
    /// previously staged file in place.
    pub fn attach(&mut self, attachment: Attachment) -> Result<(), TriageError> {
        let result = if self.session.mode == Mode::Diet {
            Err(TriageError::AttachmentRejected(
                "attachments are not accepted while preparing a diet plan".to_string(),
            ))
        } else {
            self.attachments.set_file(attachment)
        };
        self.after_attach(result)
    }

    /// Read a file from disk and stage it as the attachment.
    pub async fn attach_path(&mut self, path: &Path) -> Result<(), TriageError> {
        let result = if self.session.mode == Mode::Diet {
            Err(TriageError::AttachmentRejected(
                "attachments are not accepted while preparing a diet plan".to_string(),
            ))
        } else {
            self.attachments.load(path).await
        };
        self.after_attach(result)
    }

    fn after_attach(&mut self, result: Result<(), TriageError>) -> Result<(), TriageError> {
        match result {
            Ok(()) => {
                self.events.emit(SessionEvent::AttachmentChanged {
                    file_name: self.attachments.file_name().map(str::to_string),
                });
                Ok(())
            }
            Err(e) => {
                self.raise_banner(&e);
                Err(e)
            }
        }
    }

    pub fn detach(&mut self) {
        if self.attachments.is_set() {
            self.attachments.clear();
            self.events
                .emit(SessionEvent::AttachmentChanged { file_name: None });
        }
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Start a turn from the pending input and attachment.
    ///
    /// Refused with `Busy` unless `Idle`, and with `EmptySubmission` when a
    /// diagnosis turn has neither text nor attachment. Refusals change
    /// nothing. On success the user message is appended, the input and
    /// attachment are cleared, and the request to send is returned.
    pub fn begin_submit(&mut self) -> Result<TurnRequest, TriageError> {
        if self.state.current() != SessionState::Idle {
            tracing::debug!(state = %self.state.current(), "Submission refused while busy");
            return Err(TriageError::Busy);
        }

        let text = self.input.trim().to_string();
        if text.is_empty() && !self.attachments.is_set() && self.session.mode == Mode::Diagnosis {
            return Err(TriageError::EmptySubmission);
        }

        let message = (!text.is_empty()).then_some(text);
        let request = self.start_turn(message)?;
        self.set_input(String::new());
        Ok(request)
    }

    /// Start the diet turn offered after a diagnosis.
    ///
    /// Only valid while the offer is open. The turn carries the pending
    /// condition, no text, and never an attachment.
    pub fn begin_diet(&mut self) -> Result<TurnRequest, TriageError> {
        let current = self.state.current();
        if current != SessionState::AwaitingDietChoice {
            return Err(TriageError::InvalidTransition(format!(
                "{} -> accept diet offer",
                current
            )));
        }
        self.set_mode(Mode::Diet);
        self.detach();
        self.start_turn(None)
    }

    /// Append the user message and assemble the outbound request.
    fn start_turn(&mut self, message: Option<String>) -> Result<TurnRequest, TriageError> {
        self.transition(SessionState::Submitting)?;

        let mode = self.session.mode;
        let attachment = self.attachments.take();
        if attachment.is_some() {
            self.events
                .emit(SessionEvent::AttachmentChanged { file_name: None });
        }
        let attachment = match mode {
            Mode::Diagnosis => attachment,
            Mode::Diet => None,
        };
        let condition = match mode {
            Mode::Diagnosis => None,
            Mode::Diet => Some(self.session.condition_label().to_string()),
        };

        let display = match (&message, &attachment, &condition) {
            (Some(text), _, _) => text.clone(),
            (None, Some(att), _) => format!("[attachment: {}]", att.file_name),
            (None, None, Some(condition)) => format!("Diet plan for {}, please.", condition),
            (None, None, None) => String::new(),
        };
        self.append(Message::user(display));

        tracing::info!(
            session_id = %self.session.session_id,
            mode = %mode,
            has_text = message.is_some(),
            has_file = attachment.is_some(),
            "Turn submitted"
        );

        Ok(TurnRequest {
            session_id: self.session.session_id,
            mode,
            message,
            attachment,
            condition,
        })
    }

    /// Apply the result of the in-flight request.
    ///
    /// A reply is classified, its side effects on mode and pending condition
    /// applied, and its rendered text handed to the animator behind a fresh
    /// empty assistant message. A failure, or a reply whose chosen branch
    /// cannot be decoded, raises the banner and returns the
    /// controller to `Idle` without appending anything.
    pub fn complete_submit(
        &mut self,
        result: Result<RawResponse, TriageError>,
    ) -> Result<ResponseKind, TriageError> {
        let current = self.state.current();
        if current != SessionState::Submitting {
            return Err(TriageError::InvalidTransition(format!(
                "{} -> complete submission",
                current
            )));
        }

        let response = match result.and_then(classify) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    session_id = %self.session.session_id,
                    mode = %self.session.mode,
                    error = %e,
                    "Turn failed"
                );
                self.transition(SessionState::Failed)?;
                self.raise_banner(&e);
                self.transition(SessionState::Idle)?;
                return Err(e);
            }
        };

        let kind = response.kind();
        tracing::info!(
            session_id = %self.session.session_id,
            kind = %kind,
            "Reply classified"
        );

        match &response {
            ServerResponse::Diagnosis { diagnosis, .. } => {
                self.session.pending_condition = Some(diagnosis.condition_label().to_string());
                self.set_mode(Mode::Diet);
                self.detach();
            }
            ServerResponse::DietPlan(_) => {
                self.session.pending_condition = Some(UNKNOWN_CONDITION.to_string());
                self.set_mode(Mode::Diagnosis);
            }
            ServerResponse::Question(_) | ServerResponse::Inconclusive => {}
        }

        self.clear_banner();
        self.last_kind = Some(kind);

        let text = render(&response);
        let placeholder = Message::assistant_placeholder();
        let id = placeholder.id;
        self.append(placeholder);
        self.transition(SessionState::Revealing)?;
        self.animator.start(id, &text)?;
        if self.animator.is_finished() {
            self.complete_reveal();
        }
        Ok(kind)
    }

    /// Submit the pending input over the controller's own transport and wait
    /// for the reply to be classified.
    pub async fn submit(&mut self) -> Result<ResponseKind, TriageError> {
        let request = self.begin_submit()?;
        let transport = self.transport.clone();
        let result = transport.send(request).await;
        self.complete_submit(result)
    }

    /// Accept the diet offer and wait for the reply to be classified.
    pub async fn accept_diet(&mut self) -> Result<ResponseKind, TriageError> {
        let request = self.begin_diet()?;
        let transport = self.transport.clone();
        let result = transport.send(request).await;
        self.complete_submit(result)
    }

    /// Close the diet offer and return to symptom intake.
    pub fn decline_diet(&mut self) -> Result<(), TriageError> {
        let current = self.state.current();
        if current != SessionState::AwaitingDietChoice {
            return Err(TriageError::InvalidTransition(format!(
                "{} -> decline diet offer",
                current
            )));
        }
        self.set_mode(Mode::Diagnosis);
        self.transition(SessionState::Idle)?;
        tracing::info!(session_id = %self.session.session_id, "Diet offer declined");
        Ok(())
    }

    // =========================================================================
    // Reveal
    // =========================================================================

    /// When the next reveal character is due.
    pub fn reveal_deadline(&self) -> Option<Instant> {
        if self.state.current() == SessionState::Revealing {
            self.animator.deadline()
        } else {
            None
        }
    }

    /// Reveal the next character now, completing the reveal after the last.
    pub fn advance_reveal(&mut self) -> Option<RevealProgress> {
        if self.state.current() != SessionState::Revealing {
            return None;
        }
        let owner = self.animator.owner()?;
        let Some(tick) = self.animator.advance() else {
            return self.complete_reveal();
        };

        let mut buf = [0u8; 4];
        let grown: &str = tick.ch.encode_utf8(&mut buf);
        if self.grow_message(owner, grown) {
            self.events.emit(SessionEvent::MessageGrew {
                id: owner,
                text: grown.to_string(),
                revealed: tick.revealed,
                total: tick.total,
            });
        }

        if tick.revealed >= tick.total {
            self.complete_reveal()
        } else {
            Some(RevealProgress::Revealed {
                revealed: tick.revealed,
                total: tick.total,
            })
        }
    }

    /// Wait for the next reveal deadline, then reveal one character.
    pub async fn next_reveal_tick(&mut self) -> Option<RevealProgress> {
        let deadline = self.reveal_deadline()?;
        tokio::time::sleep_until(deadline).await;
        self.advance_reveal()
    }

    /// Drive the active reveal to completion at its own pace.
    pub async fn finish_reveal(&mut self) {
        while let Some(progress) = self.next_reveal_tick().await {
            if matches!(progress, RevealProgress::Completed { .. }) {
                break;
            }
        }
    }

    /// Show the rest of the active reply at once.
    pub fn skip_reveal(&mut self) -> Option<RevealProgress> {
        if self.state.current() != SessionState::Revealing {
            return None;
        }
        let owner = self.animator.owner()?;
        let rest = self.animator.finish_now().unwrap_or_default();
        if !rest.is_empty() && self.grow_message(owner, &rest) {
            let total = self
                .messages
                .last()
                .map(|m| m.text.chars().count())
                .unwrap_or_default();
            self.events.emit(SessionEvent::MessageGrew {
                id: owner,
                text: rest,
                revealed: total,
                total,
            });
        }
        self.complete_reveal()
    }

    /// Release the animator and leave `Revealing`.
    fn complete_reveal(&mut self) -> Option<RevealProgress> {
        let id = self.animator.complete()?;
        self.events.emit(SessionEvent::RevealCompleted { id });

        let next = if self.last_kind == Some(ResponseKind::Diagnosis) {
            SessionState::AwaitingDietChoice
        } else {
            SessionState::Idle
        };
        if let Err(e) = self.transition(next) {
            tracing::warn!(error = %e, "Reveal completed outside Revealing");
            return Some(RevealProgress::Completed { id });
        }
        if next == SessionState::AwaitingDietChoice {
            self.events.emit(SessionEvent::DietOfferShown {
                condition: self.session.condition_label().to_string(),
            });
        }
        Some(RevealProgress::Completed { id })
    }

    /// Append to the trailing assistant message if it is the reveal owner.
    fn grow_message(&mut self, owner: Uuid, text: &str) -> bool {
        match self.messages.last_mut() {
            Some(message) if message.id == owner && message.origin == Origin::Assistant => {
                message.text.push_str(text);
                true
            }
            _ => {
                tracing::warn!(message_id = %owner, "Reveal target is no longer the last message");
                false
            }
        }
    }

    // =========================================================================
    // Voice capture
    // =========================================================================

    /// Ask for microphone consent and start recording.
    ///
    /// Allowed in every session state; the transcript only lands in the
    /// input buffer.
    pub async fn start_capture(&mut self) -> Result<(), TriageError> {
        match self.capture.begin().await {
            Ok(()) => {
                self.events.emit(SessionEvent::CaptureStarted);
                Ok(())
            }
            Err(e) => {
                self.raise_banner(&e);
                Err(e)
            }
        }
    }

    /// The current recording's result, bounded by the configured maximum
    /// duration. Awaitable without borrowing the controller; hand the event
    /// to [`SessionController::finish_capture`].
    pub fn capture_result(&self) -> impl Future<Output = CaptureEvent> + Send + 'static
    where
        D: 'static,
    {
        self.capture.next_result()
    }

    /// Fold a recording result into the input buffer.
    pub fn finish_capture(&mut self, event: CaptureEvent) -> Result<Option<String>, TriageError> {
        match self.capture.finish(event) {
            Ok(transcript) => {
                if let Some(text) = &transcript {
                    let merged = merge_transcript(&self.input, text);
                    self.set_input(merged);
                }
                self.events.emit(SessionEvent::CaptureFinished {
                    transcript: transcript.clone(),
                });
                Ok(transcript)
            }
            Err(e) => {
                self.events
                    .emit(SessionEvent::CaptureFinished { transcript: None });
                self.raise_banner(&e);
                Err(e)
            }
        }
    }

    /// Stop the current recording early.
    pub async fn stop_capture(&mut self) -> Result<(), TriageError> {
        self.capture.stop().await
    }

    /// Record one utterance and merge its transcript into the input buffer.
    ///
    /// A recording longer than the configured limit is stopped and reported
    /// as a capture error.
    pub async fn capture_voice(&mut self) -> Result<Option<String>, TriageError>
    where
        D: 'static,
    {
        self.start_capture().await?;
        let event = self.capture_result().await;
        self.finish_capture(event)
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Release the reveal and any recording. The log is kept.
    pub async fn close(&mut self) {
        if let Some(id) = self.animator.cancel() {
            tracing::debug!(message_id = %id, "Reveal abandoned on close");
        }
        if let Err(e) = self.capture.stop().await {
            tracing::debug!(error = %e, "Capture stop failed on close");
        }
        self.attachments.clear();
        let from = self.state.reset();
        if from != SessionState::Idle {
            self.events.emit(SessionEvent::StateChanged {
                from,
                to: SessionState::Idle,
            });
        }
        tracing::info!(
            session_id = %self.session.session_id,
            messages = self.messages.len(),
            "Session closed"
        );
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn transition(&mut self, to: SessionState) -> Result<(), TriageError> {
        let from = self.state.transition(to)?;
        self.events.emit(SessionEvent::StateChanged { from, to });
        Ok(())
    }

    fn set_mode(&mut self, mode: Mode) {
        if self.session.mode != mode {
            tracing::info!(
                session_id = %self.session.session_id,
                from = %self.session.mode,
                to = %mode,
                "Mode changed"
            );
            self.session.mode = mode;
            self.events.emit(SessionEvent::ModeChanged { mode });
        }
    }

    fn append(&mut self, message: Message) {
        self.events.emit(SessionEvent::MessageAppended {
            id: message.id,
            origin: message.origin,
            text: message.text.clone(),
        });
        self.messages.push(message);
    }

    fn raise_banner(&mut self, err: &TriageError) {
        if err.is_guard() {
            return;
        }
        let message = err.banner();
        tracing::warn!(banner = %message, "Error surfaced");
        self.banner = Some(message.clone());
        self.events.emit(SessionEvent::BannerRaised { message });
    }

    fn clear_banner(&mut self) {
        if self.banner.take().is_some() {
            self.events.emit(SessionEvent::BannerCleared);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use triage_capture::MockCaptureDevice;
    use triage_core::types::PDF_MIME;
    use triage_transport::MockTransport;

    type Controller = SessionController<MockTransport, MockCaptureDevice>;

    fn controller() -> (Controller, MockTransport) {
        let transport = MockTransport::new();
        let controller = SessionController::new(transport.clone(), Arc::new(MockCaptureDevice::new()))
            .with_pacing(RevealPacing::instant());
        (controller, transport)
    }

    fn pdf(name: &str) -> Attachment {
        Attachment::new(name, PDF_MIME, b"%PDF-1.4".to_vec())
    }

    fn reveal_all(c: &mut Controller) {
        while let Some(progress) = c.advance_reveal() {
            if matches!(progress, RevealProgress::Completed { .. }) {
                break;
            }
        }
    }

    // =====================================================================
    // Guards
    // =====================================================================

    #[test]
    fn test_empty_diagnosis_submission_refused() {
        let (mut c, _) = controller();
        c.set_input("   ");
        assert!(matches!(c.begin_submit(), Err(TriageError::EmptySubmission)));
        assert_eq!(c.state(), SessionState::Idle);
        assert!(c.messages().is_empty());
        assert!(c.banner().is_none());
    }

    #[test]
    fn test_attachment_alone_is_enough() {
        let (mut c, _) = controller();
        c.attach(pdf("labs.pdf")).unwrap();
        let request = c.begin_submit().unwrap();
        assert!(request.message.is_none());
        assert_eq!(request.attachment.map(|a| a.file_name), Some("labs.pdf".into()));
        assert_eq!(c.messages()[0].text, "[attachment: labs.pdf]");
        assert!(c.attachment().is_none());
    }

    #[test]
    fn test_second_submission_refused_while_in_flight() {
        let (mut c, _) = controller();
        c.set_input("fever");
        c.begin_submit().unwrap();
        c.set_input("also a cough");
        c.attach(pdf("labs.pdf")).unwrap();

        assert!(matches!(c.begin_submit(), Err(TriageError::Busy)));
        assert_eq!(c.messages().len(), 1);
        // Refusals leave pending input and attachment alone.
        assert_eq!(c.input(), "also a cough");
        assert!(c.attachment().is_some());
    }

    #[test]
    fn test_complete_without_submission_is_refused() {
        let (mut c, _) = controller();
        let err = c.complete_submit(Ok(RawResponse::new())).unwrap_err();
        assert!(matches!(err, TriageError::InvalidTransition(_)));
        assert!(c.messages().is_empty());
    }

    // =====================================================================
    // Turns
    // =====================================================================

    #[test]
    fn test_begin_submit_builds_request() {
        let (mut c, _) = controller();
        c.set_input("  fever and chills ");
        let request = c.begin_submit().unwrap();
        assert_eq!(request.session_id, c.session_id());
        assert_eq!(request.mode, Mode::Diagnosis);
        assert_eq!(request.message.as_deref(), Some("fever and chills"));
        assert!(request.condition.is_none());
        assert_eq!(c.state(), SessionState::Submitting);
        assert_eq!(c.input(), "");
        assert_eq!(c.messages()[0].origin, Origin::User);
        assert_eq!(c.messages()[0].text, "fever and chills");
    }

    #[test]
    fn test_question_reply_is_revealed_into_placeholder() {
        let (mut c, _) = controller();
        c.set_input("fever");
        c.begin_submit().unwrap();
        let kind = c
            .complete_submit(Ok(RawResponse::new().with_question("Since when?")))
            .unwrap();
        assert_eq!(kind, ResponseKind::Question);
        assert_eq!(c.state(), SessionState::Revealing);
        assert!(c.is_revealing());
        assert_eq!(c.messages()[1].text, "");

        assert_eq!(
            c.advance_reveal(),
            Some(RevealProgress::Revealed {
                revealed: 1,
                total: 11
            })
        );
        assert_eq!(c.messages()[1].text, "S");
        reveal_all(&mut c);
        assert_eq!(c.messages()[1].text, "Since when?");
        assert_eq!(c.state(), SessionState::Idle);
        assert!(!c.is_revealing());
        assert!(c.advance_reveal().is_none());
    }

    #[test]
    fn test_empty_question_completes_immediately() {
        let (mut c, _) = controller();
        c.set_input("fever");
        c.begin_submit().unwrap();
        c.complete_submit(Ok(RawResponse::new().with_question("")))
        .unwrap();
        assert_eq!(c.state(), SessionState::Idle);
        assert_eq!(c.messages().len(), 2);
    }

    #[test]
    fn test_skip_reveal_shows_full_text() {
        let (mut c, _) = controller();
        c.set_input("fever");
        c.begin_submit().unwrap();
        c.complete_submit(Ok(RawResponse::new())).unwrap();
        c.advance_reveal();
        let progress = c.skip_reveal();
        assert!(matches!(progress, Some(RevealProgress::Completed { .. })));
        assert_eq!(c.messages()[1].text, crate::render::INCONCLUSIVE_ADVISORY);
        assert_eq!(c.state(), SessionState::Idle);
        assert!(c.skip_reveal().is_none());
    }

    #[test]
    fn test_failure_raises_banner_and_returns_idle() {
        let (mut c, _) = controller();
        c.set_input("fever");
        c.attach(pdf("labs.pdf")).unwrap();
        c.begin_submit().unwrap();
        let err = c
            .complete_submit(Err(TriageError::TransportRejected {
                status: 400,
                detail: Some("No input message or file provided.".into()),
            }))
            .unwrap_err();
        assert!(matches!(err, TriageError::TransportRejected { .. }));
        assert_eq!(c.state(), SessionState::Idle);
        assert_eq!(c.banner(), Some("No input message or file provided."));
        assert_eq!(c.messages().len(), 1);
        assert!(c.attachment().is_none());
    }

    #[test]
    fn test_banner_cleared_by_next_success() {
        let (mut c, _) = controller();
        c.set_input("fever");
        c.begin_submit().unwrap();
        let _ = c.complete_submit(Err(TriageError::TransportTimeout { timeout_ms: 10 }));
        assert!(c.banner().unwrap().contains("timeout"));

        c.set_input("fever");
        c.begin_submit().unwrap();
        // Still shown while the retry is in flight.
        assert!(c.banner().is_some());
        c.complete_submit(Ok(RawResponse::new())).unwrap();
        assert!(c.banner().is_none());
    }

    // =====================================================================
    // Diet sub-dialogue
    // =====================================================================

    fn diagnosed(condition: Option<&str>) -> Controller {
        let (mut c, _) = controller();
        c.set_input("fever");
        c.begin_submit().unwrap();
        c.complete_submit(Ok(RawResponse::new()
            .with_diagnosis(triage_core::types::RawDiagnosis {
                condition: condition.map(str::to_string),
                probability: Some(0.5),
                ..Default::default()
            })
            .with_home_remedy("Rest")))
        .unwrap();
        c
    }

    #[test]
    fn test_diagnosis_switches_mode_and_opens_offer_after_reveal() {
        let mut c = diagnosed(Some("Influenza"));
        assert_eq!(c.mode(), Mode::Diet);
        assert_eq!(c.pending_condition(), Some("Influenza"));
        assert_eq!(c.state(), SessionState::Revealing);
        reveal_all(&mut c);
        assert_eq!(c.state(), SessionState::AwaitingDietChoice);
    }

    #[test]
    fn test_missing_condition_carries_unknown() {
        let mut c = diagnosed(None);
        reveal_all(&mut c);
        assert_eq!(c.pending_condition(), Some("Unknown"));
        let request = c.begin_diet().unwrap();
        assert_eq!(request.condition.as_deref(), Some("Unknown"));
    }

    #[test]
    fn test_submission_refused_while_offer_open() {
        let mut c = diagnosed(Some("Influenza"));
        reveal_all(&mut c);
        c.set_input("what about my cough");
        assert!(matches!(c.begin_submit(), Err(TriageError::Busy)));
    }

    #[test]
    fn test_attach_refused_in_diet_mode() {
        let mut c = diagnosed(Some("Influenza"));
        let err = c.attach(pdf("labs.pdf")).unwrap_err();
        assert!(matches!(err, TriageError::AttachmentRejected(_)));
        assert!(c.attachment().is_none());
        assert!(c.banner().is_some());
    }

    #[test]
    fn test_decline_returns_to_diagnosis() {
        let mut c = diagnosed(Some("Influenza"));
        assert!(c.decline_diet().is_err());
        reveal_all(&mut c);
        c.decline_diet().unwrap();
        assert_eq!(c.state(), SessionState::Idle);
        assert_eq!(c.mode(), Mode::Diagnosis);
    }

    #[test]
    fn test_diet_plan_resets_mode_and_condition() {
        let mut c = diagnosed(Some("Influenza"));
        reveal_all(&mut c);
        let request = c.begin_diet().unwrap();
        assert_eq!(request.mode, Mode::Diet);
        assert!(request.message.is_none());
        assert!(request.attachment.is_none());
        assert_eq!(c.messages().last().unwrap().text, "Diet plan for Influenza, please.");

        c.complete_submit(Ok(RawResponse::new().with_diet_plan("Soups")))
        .unwrap();
        assert_eq!(c.mode(), Mode::Diagnosis);
        assert_eq!(c.pending_condition(), Some("Unknown"));
        reveal_all(&mut c);
        assert_eq!(c.state(), SessionState::Idle);
        assert_eq!(c.messages().last().unwrap().text, "Diet plan:\nSoups");
    }

    #[test]
    fn test_failed_diet_turn_can_be_retried_without_text() {
        let mut c = diagnosed(Some("Influenza"));
        reveal_all(&mut c);
        c.begin_diet().unwrap();
        let _ = c.complete_submit(Err(TriageError::TransportUnreachable("refused".into())));
        assert_eq!(c.state(), SessionState::Idle);
        assert_eq!(c.mode(), Mode::Diet);

        let request = c.begin_submit().unwrap();
        assert_eq!(request.mode, Mode::Diet);
        assert_eq!(request.condition.as_deref(), Some("Influenza"));
    }

    // =====================================================================
    // Events
    // =====================================================================

    #[test]
    fn test_events_describe_a_turn() {
        let (mut c, _) = controller();
        let mut rx = c.subscribe();
        c.set_input("hi");
        c.begin_submit().unwrap();
        c.complete_submit(Ok(RawResponse::new().with_question("ok")))
        .unwrap();
        reveal_all(&mut c);

        let mut events = vec![];
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        let grew: String = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::MessageGrew { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(grew, "ok");
        assert!(events.contains(&SessionEvent::StateChanged {
            from: SessionState::Revealing,
            to: SessionState::Idle
        }));
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::RevealCompleted { .. })));
    }

    // =====================================================================
    // Capture
    // =====================================================================

    #[tokio::test]
    async fn test_voice_transcript_merges_into_input() {
        let transport = MockTransport::new();
        let device = Arc::new(MockCaptureDevice::new().with_transcript("and a headache"));
        let mut c = SessionController::new(transport, Arc::clone(&device));
        c.set_input("fever");

        let transcript = c.capture_voice().await.unwrap();
        assert_eq!(transcript.as_deref(), Some("and a headache"));
        assert_eq!(c.input(), "fever and a headache");
        assert!(!c.is_recording());
        assert_eq!(device.permission_requests(), 1);
    }

    #[tokio::test]
    async fn test_denied_permission_raises_banner() {
        let mut c = SessionController::new(MockTransport::new(), Arc::new(MockCaptureDevice::denying()));
        let err = c.capture_voice().await.unwrap_err();
        assert!(matches!(err, TriageError::PermissionDenied));
        assert!(c.banner().unwrap().contains("denied"));
        assert!(!c.is_recording());
    }

    #[tokio::test]
    async fn test_capture_error_surfaces_as_banner() {
        let device = MockCaptureDevice::new();
        device.push_event(CaptureEvent::Error("no-speech".into()));
        let mut c = SessionController::new(MockTransport::new(), Arc::new(device));
        c.set_input("fever");
        assert!(c.capture_voice().await.is_err());
        assert_eq!(c.banner(), Some("Voice input failed: no-speech"));
        assert_eq!(c.input(), "fever");
    }

    #[tokio::test]
    async fn test_close_releases_reveal() {
        let (mut c, transport) = controller();
        transport.push_json(r#"{"question": "How long?"}"#);
        c.set_input("fever");
        c.submit().await.unwrap();
        assert!(c.is_revealing());

        c.close().await;
        assert!(!c.is_revealing());
        assert_eq!(c.state(), SessionState::Idle);
        assert!(c.advance_reveal().is_none());
        assert_eq!(c.messages().len(), 2);
    }
}
