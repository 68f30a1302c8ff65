//! Line-oriented terminal view.
//!
//! Reads commands from stdin and prints the conversation from
//! [`SessionEvent`]s. One `select!` loop multiplexes stdin lines, the
//! in-flight request, the next reveal deadline, and the pending recording,
//! so typing, voice capture, and the reveal never block each other.

use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;
use std::pin::Pin;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use triage_capture::{merge_transcript, CaptureDevice, CaptureEvent};
use triage_core::error::TriageError;
use triage_core::types::{Origin, RawResponse};
use triage_session::{SessionController, SessionEvent, SessionState};
use triage_transport::Transport;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T>>>;

const HELP: &str = "\
Describe your symptoms and press Enter to send.
  /attach <path>  attach a PDF report to the next message
  /detach         remove the attachment
  /voice          start or stop voice input
  /skip           show the rest of the current reply
  /status         show session details
  /help           show this help
  /quit           exit";

// =============================================================================
// Commands
// =============================================================================

/// One parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Free text to append to the pending input and send.
    Send(String),
    Attach(PathBuf),
    Detach,
    Voice,
    Skip,
    Status,
    Help,
    Quit,
    AcceptDiet,
    DeclineDiet,
    Unknown(String),
}

/// Parse a line. `y`/`n` only mean accept/decline while the diet offer is open.
pub fn parse_line(line: &str, diet_offer_open: bool) -> Command {
    let line = line.trim();
    if diet_offer_open {
        match line.to_ascii_lowercase().as_str() {
            "y" | "yes" => return Command::AcceptDiet,
            "n" | "no" => return Command::DeclineDiet,
            _ => {}
        }
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Command::Send(line.to_string());
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name {
        "attach" if !arg.is_empty() => Command::Attach(PathBuf::from(arg)),
        "detach" => Command::Detach,
        "voice" => Command::Voice,
        "skip" => Command::Skip,
        "status" => Command::Status,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    }
}

// =============================================================================
// Rendering
// =============================================================================

/// Print the visible effect of one event.
pub fn render_event(out: &mut impl Write, event: &SessionEvent) -> io::Result<()> {
    match event {
        SessionEvent::MessageAppended {
            origin: Origin::Assistant,
            ..
        } => {
            write!(out, "\nassistant: ")?;
        }
        SessionEvent::MessageGrew { text, .. } => {
            write!(out, "{}", text)?;
        }
        SessionEvent::RevealCompleted { .. } => {
            writeln!(out)?;
        }
        SessionEvent::DietOfferShown { condition } => {
            writeln!(out, "\nWould you like a diet plan for {}? [y/n]", condition)?;
        }
        SessionEvent::BannerRaised { message } => {
            writeln!(out, "\n! {}", message)?;
        }
        SessionEvent::CaptureStarted => {
            writeln!(out, "(listening, /voice to stop)")?;
        }
        SessionEvent::CaptureFinished {
            transcript: Some(text),
        } => {
            writeln!(out, "(heard: {}) press Enter to send", text)?;
        }
        SessionEvent::AttachmentChanged {
            file_name: Some(name),
        } => {
            writeln!(out, "(attached {})", name)?;
        }
        SessionEvent::MessageAppended { .. }
        | SessionEvent::CaptureFinished { .. }
        | SessionEvent::AttachmentChanged { .. }
        | SessionEvent::InputChanged { .. }
        | SessionEvent::BannerCleared => {}
        SessionEvent::StateChanged { from, to } => {
            tracing::debug!(%from, %to, "View saw state change");
        }
        SessionEvent::ModeChanged { mode } => {
            tracing::debug!(%mode, "View saw mode change");
        }
    }
    out.flush()
}

fn print_status<T: Transport, D: CaptureDevice>(
    out: &mut impl Write,
    controller: &SessionController<T, D>,
) -> io::Result<()> {
    writeln!(out, "session:    {}", controller.session_id())?;
    writeln!(out, "mode:       {}", controller.mode())?;
    writeln!(out, "state:      {}", controller.state())?;
    writeln!(
        out,
        "condition:  {}",
        controller.pending_condition().unwrap_or("-")
    )?;
    writeln!(
        out,
        "attachment: {}",
        controller
            .attachment()
            .map(|a| a.file_name.as_str())
            .unwrap_or("-")
    )?;
    writeln!(
        out,
        "voice:      {}",
        if !controller.can_capture() {
            "unavailable"
        } else if controller.is_recording() {
            "recording"
        } else {
            "ready"
        }
    )?;
    writeln!(out, "messages:   {}", controller.messages().len())?;
    out.flush()
}

// =============================================================================
// Loop
// =============================================================================

/// Await the slot's future, or never resolve when it is empty.
async fn poll_slot<T>(slot: &mut Option<BoxFuture<T>>) -> T {
    match slot {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

enum Flow {
    Continue,
    Quit,
}

/// Loop state outside the controller.
struct Pending {
    request: Option<BoxFuture<Result<RawResponse, TriageError>>>,
    recording: Option<BoxFuture<CaptureEvent>>,
}

/// Run the interactive session until `/quit` or end of input.
pub async fn run<T, D>(mut controller: SessionController<T, D>) -> Result<(), TriageError>
where
    T: Transport,
    D: CaptureDevice + 'static,
{
    let mut events = controller.subscribe();
    let mut lines = spawn_stdin_reader();
    let mut out = io::stdout();
    let mut pending = Pending {
        request: None,
        recording: None,
    };

    writeln!(out, "{}\n", HELP)?;
    if !controller.can_capture() {
        writeln!(out, "(voice input unavailable)")?;
    }

    loop {
        let deadline = controller.reveal_deadline();

        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else { break };
                let command = parse_line(&line, controller.state() == SessionState::AwaitingDietChoice);
                match handle_command(&mut controller, &mut pending, &mut out, command).await? {
                    Flow::Continue => {}
                    Flow::Quit => break,
                }
            }
            result = poll_slot(&mut pending.request), if pending.request.is_some() => {
                pending.request = None;
                if let Err(e) = controller.complete_submit(result) {
                    tracing::debug!(error = %e, "Turn ended without a reply");
                }
            }
            event = poll_slot(&mut pending.recording), if pending.recording.is_some() => {
                pending.recording = None;
                if let Err(e) = controller.finish_capture(event) {
                    tracing::debug!(error = %e, "Recording ended without a transcript");
                }
            }
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(tokio::time::Instant::now)), if deadline.is_some() => {
                controller.advance_reveal();
            }
        }

        while let Ok(event) = events.try_recv() {
            render_event(&mut out, &event)?;
        }
    }

    controller.close().await;
    Ok(())
}

async fn handle_command<T, D>(
    controller: &mut SessionController<T, D>,
    pending: &mut Pending,
    out: &mut impl Write,
    command: Command,
) -> Result<Flow, TriageError>
where
    T: Transport,
    D: CaptureDevice + 'static,
{
    match command {
        Command::Send(text) => {
            match controller.state() {
                SessionState::Idle => {}
                SessionState::AwaitingDietChoice => {
                    writeln!(out, "(please answer y or n to the diet plan offer first)")?;
                    return Ok(Flow::Continue);
                }
                _ => {
                    writeln!(out, "(please wait for the current reply)")?;
                    return Ok(Flow::Continue);
                }
            }
            let merged = merge_transcript(controller.input(), &text);
            controller.set_input(merged);
            match controller.begin_submit() {
                Ok(request) => {
                    let transport = controller.transport().clone();
                    pending.request = Some(Box::pin(async move { transport.send(request).await }));
                }
                Err(TriageError::EmptySubmission) => {
                    writeln!(out, "(type a message or /attach a PDF first)")?;
                }
                Err(e) => tracing::debug!(error = %e, "Submission refused"),
            }
        }
        Command::AcceptDiet => match controller.begin_diet() {
            Ok(request) => {
                let transport = controller.transport().clone();
                pending.request = Some(Box::pin(async move { transport.send(request).await }));
            }
            Err(e) => tracing::debug!(error = %e, "Diet offer not open"),
        },
        Command::DeclineDiet => {
            if controller.decline_diet().is_ok() {
                writeln!(out, "(ok, describe any other symptoms)")?;
            }
        }
        Command::Attach(path) => {
            let _ = controller.attach_path(&path).await;
        }
        Command::Detach => {
            controller.detach();
            writeln!(out, "(attachment removed)")?;
        }
        Command::Voice => {
            if controller.is_recording() {
                controller.stop_capture().await?;
            } else if controller.start_capture().await.is_ok() {
                pending.recording = Some(Box::pin(controller.capture_result()));
            }
        }
        Command::Skip => {
            controller.skip_reveal();
        }
        Command::Status => print_status(out, controller)?,
        Command::Help => writeln!(out, "{}", HELP)?,
        Command::Unknown(line) => writeln!(out, "(unknown command {}, try /help)", line)?,
        Command::Quit => return Ok(Flow::Quit),
    }
    out.flush()?;
    Ok(Flow::Continue)
}

/// Forward stdin lines over a channel so the loop can `select!` on them.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read stdin");
                    break;
                }
            }
        }
    });
    rx
}

// =============================================================================
// Tests
// =============================================================================
