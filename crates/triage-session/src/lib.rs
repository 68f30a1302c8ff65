//! Triage Session crate - the conversation session controller.
//!
//! Tracks dialogue mode and session identity, classifies server payloads into
//! questions, diagnoses, diet plans, or inconclusive replies, and reveals each
//! reply character by character without blocking user input, voice capture,
//! or the network.

pub mod animator;
pub mod attachment;
pub mod classify;
pub mod controller;
pub mod events;
pub mod render;
pub mod state;

pub use animator::{Animator, Reveal, RevealPacing, RevealTick};
pub use attachment::AttachmentManager;
pub use classify::{classify, Diagnosis, ResponseKind, ServerResponse};
pub use controller::{RevealProgress, SessionController};
pub use events::SessionEvent;
pub use render::{render, INCONCLUSIVE_ADVISORY};
pub use state::{SessionState, StateMachine};
