//! Capture device selected from configuration at startup.

use triage_core::config::CaptureConfig;
use triage_core::error::TriageError;

use crate::{CaptureDevice, CaptureEvent, CommandCaptureDevice, PermissionStatus, UnavailableCaptureDevice};

/// Either the configured recorder program or no capture at all.
#[derive(Debug)]
pub enum SystemCaptureDevice {
    Command(CommandCaptureDevice),
    Unavailable(UnavailableCaptureDevice),
}

impl SystemCaptureDevice {
    /// Use the recorder command when capture is enabled and a command is set.
    ///
    /// An invalid command is logged and capture is reported as unavailable.
    pub fn from_config(config: &CaptureConfig) -> Self {
        if !config.enabled {
            tracing::info!("Voice capture disabled in config");
            return Self::Unavailable(UnavailableCaptureDevice);
        }
        if config.command.is_empty() {
            tracing::info!("No recorder command configured, voice capture unavailable");
            return Self::Unavailable(UnavailableCaptureDevice);
        }
        match CommandCaptureDevice::new(&config.command) {
            Ok(device) => {
                tracing::info!(program = %device.program(), "Voice capture via recorder command");
                Self::Command(device)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Voice capture unavailable");
                Self::Unavailable(UnavailableCaptureDevice)
            }
        }
    }

    pub fn unavailable() -> Self {
        Self::Unavailable(UnavailableCaptureDevice)
    }
}

impl CaptureDevice for SystemCaptureDevice {
    fn is_available(&self) -> bool {
        match self {
            Self::Command(d) => d.is_available(),
            Self::Unavailable(d) => d.is_available(),
        }
    }

    async fn request_permission(&self) -> PermissionStatus {
        match self {
            Self::Command(d) => d.request_permission().await,
            Self::Unavailable(d) => d.request_permission().await,
        }
    }

    async fn start(&self) -> Result<(), TriageError> {
        match self {
            Self::Command(d) => d.start().await,
            Self::Unavailable(d) => d.start().await,
        }
    }

    async fn stop(&self) -> Result<(), TriageError> {
        match self {
            Self::Command(d) => d.stop().await,
            Self::Unavailable(d) => d.stop().await,
        }
    }

    async fn next_event(&self) -> CaptureEvent {
        match self {
            Self::Command(d) => d.next_event().await,
            Self::Unavailable(d) => d.next_event().await,
        }
    }
}
