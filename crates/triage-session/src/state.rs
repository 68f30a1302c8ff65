//! Session lifecycle state machine.
//!
//! Valid transitions:
//! - Idle -> Submitting (turn sent)
//! - Submitting -> Revealing (reply received)
//! - Submitting -> Failed (transport or decode failure)
//! - Revealing -> Idle (reveal finished)
//! - Revealing -> AwaitingDietChoice (diagnosis revealed, diet offer shown)
//! - AwaitingDietChoice -> Submitting (diet offer accepted)
//! - AwaitingDietChoice -> Idle (diet offer declined)
//! - Failed -> Idle (banner raised)

use std::fmt;

use triage_core::error::TriageError;

/// Where the session is in its turn cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Ready for a new turn.
    #[default]
    Idle,
    /// A request is in flight.
    Submitting,
    /// The reply is being revealed.
    Revealing,
    /// A diagnosis was revealed and the diet offer is open.
    AwaitingDietChoice,
    /// The last request failed. Transient.
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Submitting => write!(f, "Submitting"),
            SessionState::Revealing => write!(f, "Revealing"),
            SessionState::AwaitingDietChoice => write!(f, "AwaitingDietChoice"),
            SessionState::Failed => write!(f, "Failed"),
        }
    }
}

impl SessionState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        matches!(
            (self, target),
            (SessionState::Idle, SessionState::Submitting)
                | (SessionState::Submitting, SessionState::Revealing)
                | (SessionState::Submitting, SessionState::Failed)
                | (SessionState::Revealing, SessionState::Idle)
                | (SessionState::Revealing, SessionState::AwaitingDietChoice)
                | (SessionState::AwaitingDietChoice, SessionState::Submitting)
                | (SessionState::AwaitingDietChoice, SessionState::Idle)
                | (SessionState::Failed, SessionState::Idle)
        )
    }

    /// Whether a request is in flight.
    pub fn is_submitting(&self) -> bool {
        matches!(self, SessionState::Submitting)
    }
}

/// Validated state holder owned by the session controller.
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    state: SessionState,
}

impl StateMachine {
    /// Create a new state machine initialized to `Idle`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> SessionState {
        self.state
    }

    /// Attempt to transition to the target state.
    ///
    /// Returns the previous state, or `TriageError::InvalidTransition` if the
    /// transition is not allowed from the current state.
    pub fn transition(&mut self, target: SessionState) -> Result<SessionState, TriageError> {
        let from = self.state;
        if from.can_transition_to(&target) {
            tracing::debug!("Session state: {} -> {}", from, target);
            self.state = target;
            Ok(from)
        } else {
            Err(TriageError::InvalidTransition(format!(
                "{} -> {}",
                from, target
            )))
        }
    }

    /// Force the state machine back to Idle.
    pub fn reset(&mut self) -> SessionState {
        let from = self.state;
        if from != SessionState::Idle {
            tracing::warn!("Session state machine reset to Idle from {}", from);
        }
        self.state = SessionState::Idle;
        from
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Idle.to_string(), "Idle");
        assert_eq!(SessionState::Submitting.to_string(), "Submitting");
        assert_eq!(
            SessionState::AwaitingDietChoice.to_string(),
            "AwaitingDietChoice"
        );
    }

    #[test]
    fn test_valid_transitions() {
        assert!(SessionState::Idle.can_transition_to(&SessionState::Submitting));
        assert!(SessionState::Submitting.can_transition_to(&SessionState::Revealing));
        assert!(SessionState::Submitting.can_transition_to(&SessionState::Failed));
        assert!(SessionState::Revealing.can_transition_to(&SessionState::Idle));
        assert!(SessionState::Revealing.can_transition_to(&SessionState::AwaitingDietChoice));
        assert!(SessionState::AwaitingDietChoice.can_transition_to(&SessionState::Submitting));
        assert!(SessionState::AwaitingDietChoice.can_transition_to(&SessionState::Idle));
        assert!(SessionState::Failed.can_transition_to(&SessionState::Idle));
    }

    #[test]
    fn test_invalid_transitions() {
        // A second submission cannot start while one is in flight.
        assert!(!SessionState::Submitting.can_transition_to(&SessionState::Submitting));
        assert!(!SessionState::Revealing.can_transition_to(&SessionState::Submitting));
        assert!(!SessionState::Idle.can_transition_to(&SessionState::Revealing));
        assert!(!SessionState::Idle.can_transition_to(&SessionState::AwaitingDietChoice));
        assert!(!SessionState::Failed.can_transition_to(&SessionState::Submitting));
        assert!(!SessionState::Submitting.can_transition_to(&SessionState::Idle));
    }

    #[test]
    fn test_full_turn_cycle() {
        let mut sm = StateMachine::new();
        assert_eq!(sm.current(), SessionState::Idle);

        assert_eq!(sm.transition(SessionState::Submitting).unwrap(), SessionState::Idle);
        assert!(sm.current().is_submitting());
        sm.transition(SessionState::Revealing).unwrap();
        sm.transition(SessionState::AwaitingDietChoice).unwrap();
        sm.transition(SessionState::Submitting).unwrap();
        sm.transition(SessionState::Revealing).unwrap();
        sm.transition(SessionState::Idle).unwrap();
        assert_eq!(sm.current(), SessionState::Idle);
    }

    #[test]
    fn test_failure_path() {
        let mut sm = StateMachine::new();
        sm.transition(SessionState::Submitting).unwrap();
        sm.transition(SessionState::Failed).unwrap();
        sm.transition(SessionState::Idle).unwrap();
        assert_eq!(sm.current(), SessionState::Idle);
    }

    #[test]
    fn test_invalid_transition_leaves_state_unchanged() {
        let mut sm = StateMachine::new();
        let err = sm.transition(SessionState::Revealing).unwrap_err();
        assert!(matches!(err, TriageError::InvalidTransition(ref m) if m == "Idle -> Revealing"));
        assert!(err.is_guard());
        assert_eq!(sm.current(), SessionState::Idle);
    }

    #[test]
    fn test_reset() {
        let mut sm = StateMachine::new();
        sm.transition(SessionState::Submitting).unwrap();
        assert_eq!(sm.reset(), SessionState::Submitting);
        assert_eq!(sm.current(), SessionState::Idle);
    }
}
