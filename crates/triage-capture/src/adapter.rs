//! Recording lifecycle on top of a [`CaptureDevice`].
//!
//! Enforces one recording at a time:
//! - Idle -> RequestingPermission (start requested)
//! - RequestingPermission -> Recording (consent granted, device started)
//! - RequestingPermission -> Idle (consent denied or device failed)
//! - Recording -> Idle (result delivered, error, or stop)

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use triage_core::error::TriageError;

use crate::{CaptureDevice, CaptureEvent, PermissionStatus};

/// Recording state of the capture adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordingState {
    Idle,
    RequestingPermission,
    Recording,
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingState::Idle => write!(f, "Idle"),
            RecordingState::RequestingPermission => write!(f, "RequestingPermission"),
            RecordingState::Recording => write!(f, "Recording"),
        }
    }
}

/// Append a transcript to the pending input buffer, space-joined when the
/// buffer already holds text.
pub fn merge_transcript(buffer: &str, transcript: &str) -> String {
    let transcript = transcript.trim();
    if transcript.is_empty() {
        return buffer.to_string();
    }
    if buffer.trim().is_empty() {
        transcript.to_string()
    } else {
        format!("{} {}", buffer.trim_end(), transcript)
    }
}

/// Drives a capture device through single recordings.
///
/// The device is shared behind an `Arc` so a caller can await
/// [`CaptureDevice::next_event`] without holding the adapter borrow, then hand
/// the event back through [`CaptureAdapter::finish`].
pub struct CaptureAdapter<D> {
    device: Arc<D>,
    state: RecordingState,
    max_duration: Duration,
}

impl<D> fmt::Debug for CaptureAdapter<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureAdapter")
            .field("state", &self.state)
            .field("max_duration", &self.max_duration)
            .finish()
    }
}

impl<D: CaptureDevice> CaptureAdapter<D> {
    pub fn new(device: Arc<D>, max_duration: Duration) -> Self {
        Self {
            device,
            state: RecordingState::Idle,
            max_duration,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    pub fn is_available(&self) -> bool {
        self.device.is_available()
    }

    /// Shared handle to the device, for awaiting its next event.
    pub fn device(&self) -> Arc<D> {
        Arc::clone(&self.device)
    }

    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    /// Request consent and start a recording.
    ///
    /// Permission is asked for on every call. On any failure the adapter is
    /// back in `Idle`.
    pub async fn begin(&mut self) -> Result<(), TriageError> {
        if self.state != RecordingState::Idle {
            return Err(TriageError::Busy);
        }
        if !self.device.is_available() {
            return Err(TriageError::CaptureUnavailable);
        }

        self.state = RecordingState::RequestingPermission;
        if self.device.request_permission().await == PermissionStatus::Denied {
            tracing::info!("Microphone permission denied");
            self.state = RecordingState::Idle;
            return Err(TriageError::PermissionDenied);
        }

        if let Err(e) = self.device.start().await {
            tracing::warn!(error = %e, "Capture device failed to start");
            self.state = RecordingState::Idle;
            return Err(e);
        }

        self.state = RecordingState::Recording;
        tracing::info!("Voice capture started");
        Ok(())
    }

    /// Stop the current recording early. No-op when not recording.
    pub async fn stop(&mut self) -> Result<(), TriageError> {
        if self.state != RecordingState::Recording {
            return Ok(());
        }
        self.state = RecordingState::Idle;
        self.device.stop().await
    }

    /// Consume the recording's result and return to `Idle`.
    ///
    /// Returns the trimmed transcript, or `None` when the recording produced
    /// no text.
    pub fn finish(&mut self, event: CaptureEvent) -> Result<Option<String>, TriageError> {
        self.state = RecordingState::Idle;
        match event {
            CaptureEvent::Transcript(text) => {
                let text = text.trim();
                tracing::info!(text_len = text.len(), "Voice capture transcribed");
                if text.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(text.to_string()))
                }
            }
            CaptureEvent::Error(msg) => {
                tracing::warn!(error = %msg, "Voice capture failed");
                Err(TriageError::CaptureError(msg))
            }
            CaptureEvent::Ended => {
                tracing::debug!("Voice capture ended without a transcript");
                Ok(None)
            }
        }
    }

    /// Wait for the current recording's result, bounded by `max_duration`.
    ///
    /// The future owns a device handle, so it can be awaited without holding
    /// the adapter. A recording that outlives the limit is stopped and yields
    /// [`CaptureEvent::Error`]. Either way the event goes back through
    /// [`CaptureAdapter::finish`].
    pub fn next_result(&self) -> impl Future<Output = CaptureEvent> + Send + 'static
    where
        D: 'static,
    {
        let device = self.device();
        let limit = self.max_duration;
        async move {
            match tokio::time::timeout(limit, device.next_event()).await {
                Ok(event) => event,
                Err(_) => {
                    tracing::warn!(limit_secs = limit.as_secs(), "Voice capture hit its time limit");
                    if let Err(e) = device.stop().await {
                        tracing::debug!(error = %e, "Capture stop failed after time limit");
                    }
                    CaptureEvent::Error(format!(
                        "no speech captured within {}s",
                        limit.as_secs()
                    ))
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
