//! Triage Capture crate - speech-to-text capability behind a start/stop/result
//! contract.
//!
//! The platform capability is modelled as the [`CaptureDevice`] trait, whose
//! callback-style results are delivered as [`CaptureEvent`]s. The
//! [`CaptureAdapter`] drives a device through one recording at a time and
//! folds transcripts into the pending input buffer. Includes a mock device for
//! testing without a microphone.

pub mod adapter;
pub mod command;
pub mod system;

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use triage_core::error::TriageError;

pub use adapter::{merge_transcript, CaptureAdapter, RecordingState};
pub use command::CommandCaptureDevice;
pub use system::SystemCaptureDevice;

// =============================================================================
// Enums
// =============================================================================

/// Outcome of a microphone permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// A result delivered by the device once per recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Final transcript of the recording.
    Transcript(String),
    /// The platform reported a capture failure.
    Error(String),
    /// Recording ended without producing a transcript.
    Ended,
}

// =============================================================================
// Trait
// =============================================================================

/// Platform speech-to-text capability.
///
/// Implementations deliver exactly one [`CaptureEvent`] per recording through
/// [`CaptureDevice::next_event`].
pub trait CaptureDevice: Send + Sync {
    /// Whether the platform offers speech capture at all.
    fn is_available(&self) -> bool;

    /// Ask for microphone consent. Called before every recording.
    fn request_permission(&self) -> impl Future<Output = PermissionStatus> + Send;

    /// Begin a recording.
    fn start(&self) -> impl Future<Output = Result<(), TriageError>> + Send;

    /// End the current recording early.
    fn stop(&self) -> impl Future<Output = Result<(), TriageError>> + Send;

    /// Wait for the result of the current recording.
    fn next_event(&self) -> impl Future<Output = CaptureEvent> + Send;
}

// =============================================================================
// Unavailable device
// =============================================================================

/// Device used when the platform has no speech capture.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableCaptureDevice;

impl CaptureDevice for UnavailableCaptureDevice {
    fn is_available(&self) -> bool {
        false
    }

    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Denied
    }

    async fn start(&self) -> Result<(), TriageError> {
        Err(TriageError::CaptureUnavailable)
    }

    async fn stop(&self) -> Result<(), TriageError> {
        Ok(())
    }

    async fn next_event(&self) -> CaptureEvent {
        CaptureEvent::Ended
    }
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Scripted capture device for testing.
///
/// Each recording pops the next scripted event; an exhausted script yields
/// [`CaptureEvent::Ended`].
#[derive(Debug)]
pub struct MockCaptureDevice {
    available: bool,
    permission: PermissionStatus,
    script: Mutex<VecDeque<CaptureEvent>>,
    recording: AtomicBool,
    permission_requests: AtomicUsize,
    starts: AtomicUsize,
    silent: bool,
}

impl Default for MockCaptureDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCaptureDevice {
    pub fn new() -> Self {
        Self {
            available: true,
            permission: PermissionStatus::Granted,
            script: Mutex::new(VecDeque::new()),
            recording: AtomicBool::new(false),
            permission_requests: AtomicUsize::new(0),
            starts: AtomicUsize::new(0),
            silent: false,
        }
    }

    /// A device that reports the capability as missing.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// A device whose permission prompt is always refused.
    pub fn denying() -> Self {
        Self {
            permission: PermissionStatus::Denied,
            ..Self::new()
        }
    }

    /// A device whose recordings never produce a result.
    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::new()
        }
    }

    /// Queue the event delivered by a future recording.
    pub fn push_event(&self, event: CaptureEvent) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(event);
        }
    }

    pub fn with_transcript(self, text: &str) -> Self {
        self.push_event(CaptureEvent::Transcript(text.to_string()));
        self
    }

    pub fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::Relaxed)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::Relaxed)
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Relaxed)
    }
}

impl CaptureDevice for MockCaptureDevice {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn request_permission(&self) -> PermissionStatus {
        self.permission_requests.fetch_add(1, Ordering::Relaxed);
        self.permission
    }

    async fn start(&self) -> Result<(), TriageError> {
        if !self.available {
            return Err(TriageError::CaptureUnavailable);
        }
        if self.recording.swap(true, Ordering::Relaxed) {
            return Err(TriageError::CaptureError(
                "recording already in progress".to_string(),
            ));
        }
        self.starts.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Mock capture started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), TriageError> {
        self.recording.store(false, Ordering::Relaxed);
        tracing::debug!("Mock capture stopped");
        Ok(())
    }

    async fn next_event(&self) -> CaptureEvent {
        if self.silent {
            std::future::pending::<()>().await;
        }
        let event = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or(CaptureEvent::Ended);
        self.recording.store(false, Ordering::Relaxed);
        event
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_counts_permission_requests() {
        let device = MockCaptureDevice::new();
        assert_eq!(device.request_permission().await, PermissionStatus::Granted);
        assert_eq!(device.request_permission().await, PermissionStatus::Granted);
        assert_eq!(device.permission_requests(), 2);
    }

    #[tokio::test]
    async fn test_mock_denying() {
        let device = MockCaptureDevice::denying();
        assert_eq!(device.request_permission().await, PermissionStatus::Denied);
    }

    #[tokio::test]
    async fn test_mock_double_start_fails() {
        let device = MockCaptureDevice::new();
        device.start().await.unwrap();
        assert!(device.is_recording());
        let err = device.start().await.unwrap_err();
        assert!(matches!(err, TriageError::CaptureError(_)));
        device.stop().await.unwrap();
        assert!(!device.is_recording());
    }

    #[tokio::test]
    async fn test_mock_script_order_then_ended() {
        let device = MockCaptureDevice::new().with_transcript("fever");
        device.push_event(CaptureEvent::Error("no-speech".to_string()));

        assert_eq!(
            device.next_event().await,
            CaptureEvent::Transcript("fever".to_string())
        );
        assert_eq!(
            device.next_event().await,
            CaptureEvent::Error("no-speech".to_string())
        );
        assert_eq!(device.next_event().await, CaptureEvent::Ended);
    }

    #[tokio::test]
    async fn test_mock_unavailable_start() {
        let device = MockCaptureDevice::unavailable();
        assert!(!device.is_available());
        assert!(matches!(
            device.start().await,
            Err(TriageError::CaptureUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_unavailable_device() {
        let device = UnavailableCaptureDevice;
        assert!(!device.is_available());
        assert_eq!(device.request_permission().await, PermissionStatus::Denied);
        assert!(matches!(
            device.start().await,
            Err(TriageError::CaptureUnavailable)
        ));
        assert!(device.stop().await.is_ok());
        assert_eq!(device.next_event().await, CaptureEvent::Ended);
    }
}
