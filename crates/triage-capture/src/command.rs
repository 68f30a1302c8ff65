//! Capture device backed by an external recorder program.
//!
//! The configured program records speech, transcribes it, and prints the
//! transcript on stdout. A non-zero exit is reported as a capture error with
//! the program's stderr.

use std::process::Stdio;
use std::sync::Mutex;

use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use triage_core::error::TriageError;

use crate::{CaptureDevice, CaptureEvent, PermissionStatus};

/// Runs one recorder process per recording.
#[derive(Debug)]
pub struct CommandCaptureDevice {
    program: String,
    args: Vec<String>,
    task: Mutex<Option<JoinHandle<()>>>,
    events_tx: mpsc::UnboundedSender<CaptureEvent>,
    events_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<CaptureEvent>>,
}

impl CommandCaptureDevice {
    /// Build a device from `[program, args...]`.
    pub fn new(command: &[String]) -> Result<Self, TriageError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| TriageError::Config("capture.command is empty".to_string()))?;
        if program.trim().is_empty() {
            return Err(TriageError::Config("capture.command is empty".to_string()));
        }
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            task: Mutex::new(None),
            events_tx,
            events_rx: tokio::sync::Mutex::new(events_rx),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn is_running(&self) -> bool {
        self.task
            .lock()
            .map(|t| t.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }
}

impl CaptureDevice for CommandCaptureDevice {
    fn is_available(&self) -> bool {
        true
    }

    // The recorder program owns microphone consent.
    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn start(&self) -> Result<(), TriageError> {
        if self.is_running() {
            return Err(TriageError::CaptureError(
                "recording already in progress".to_string(),
            ));
        }

        {
            let mut rx = self.events_rx.lock().await;
            while rx.try_recv().is_ok() {}
        }

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let tx = self.events_tx.clone();
        let program = self.program.clone();
        let handle = tokio::spawn(async move {
            let event = match command.output().await {
                Ok(output) if output.status.success() => CaptureEvent::Transcript(
                    String::from_utf8_lossy(&output.stdout).trim().to_string(),
                ),
                Ok(output) => {
                    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                    if stderr.is_empty() {
                        CaptureEvent::Error(format!("{} exited with {}", program, output.status))
                    } else {
                        CaptureEvent::Error(stderr)
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    CaptureEvent::Error(format!("recorder program not found: {}", program))
                }
                Err(e) => CaptureEvent::Error(e.to_string()),
            };
            let _ = tx.send(event);
        });

        if let Ok(mut task) = self.task.lock() {
            *task = Some(handle);
        }
        tracing::debug!(program = %self.program, "Recorder process spawned");
        Ok(())
    }

    async fn stop(&self) -> Result<(), TriageError> {
        let handle = self.task.lock().ok().and_then(|mut t| t.take());
        if let Some(handle) = handle {
            if !handle.is_finished() {
                // Dropping the aborted future kills the child.
                handle.abort();
                let _ = self.events_tx.send(CaptureEvent::Ended);
                tracing::debug!(program = %self.program, "Recorder process stopped");
            }
        }
        Ok(())
    }

    async fn next_event(&self) -> CaptureEvent {
        let mut rx = self.events_rx.lock().await;
        rx.recv().await.unwrap_or(CaptureEvent::Ended)
    }
}

// =============================================================================
// Tests
// =============================================================================
