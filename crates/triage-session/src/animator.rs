//! Typed reveal of finished assistant replies.
//!
//! A [`Reveal`] is a finite, lazy sequence of one-character ticks over a known
//! string, each due one delay after the previous. The [`Animator`] owns at most
//! one reveal at a time together with the id of the message it writes into.
//! Dropping or cancelling a reveal releases its schedule; nothing fires after.

use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use triage_core::config::RevealConfig;
use triage_core::error::TriageError;

// =============================================================================
// Pacing
// =============================================================================

/// Per-character delays, faster for long replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealPacing {
    pub char_delay: Duration,
    pub fast_char_delay: Duration,
    /// Length in characters above which `fast_char_delay` applies.
    pub long_text_threshold: usize,
}

impl Default for RevealPacing {
    fn default() -> Self {
        Self::from(&RevealConfig::default())
    }
}

impl From<&RevealConfig> for RevealPacing {
    fn from(config: &RevealConfig) -> Self {
        Self {
            char_delay: Duration::from_millis(config.char_delay_ms),
            fast_char_delay: Duration::from_millis(config.fast_char_delay_ms),
            long_text_threshold: config.long_text_threshold,
        }
    }
}

impl RevealPacing {
    /// No delay between characters.
    pub fn instant() -> Self {
        Self {
            char_delay: Duration::ZERO,
            fast_char_delay: Duration::ZERO,
            long_text_threshold: 0,
        }
    }

    pub fn delay_for(&self, char_count: usize) -> Duration {
        if char_count > self.long_text_threshold {
            self.fast_char_delay
        } else {
            self.char_delay
        }
    }
}

// =============================================================================
// Reveal
// =============================================================================

/// One revealed character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealTick {
    pub ch: char,
    /// Characters revealed so far, including this one.
    pub revealed: usize,
    /// Total characters in the source.
    pub total: usize,
}

/// Cancellable character-by-character reveal of one string.
#[derive(Debug, Clone)]
pub struct Reveal {
    chars: Vec<char>,
    revealed: usize,
    delay: Duration,
    next_at: Instant,
    cancelled: bool,
}

impl Reveal {
    pub fn new(text: &str, pacing: &RevealPacing) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let delay = pacing.delay_for(chars.len());
        Self {
            chars,
            revealed: 0,
            delay,
            next_at: Instant::now() + delay,
            cancelled: false,
        }
    }

    /// Total characters in the source.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn revealed(&self) -> usize {
        self.revealed
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_finished(&self) -> bool {
        self.cancelled || self.revealed >= self.chars.len()
    }

    /// When the next tick is due, or `None` once finished.
    pub fn deadline(&self) -> Option<Instant> {
        if self.is_finished() {
            None
        } else {
            Some(self.next_at)
        }
    }

    /// Emit the next character immediately, regardless of its deadline.
    pub fn advance(&mut self) -> Option<RevealTick> {
        if self.is_finished() {
            return None;
        }
        let ch = self.chars[self.revealed];
        self.revealed += 1;
        // A late tick does not let the overdue characters burst out.
        self.next_at = Instant::now().max(self.next_at) + self.delay;
        Some(RevealTick {
            ch,
            revealed: self.revealed,
            total: self.chars.len(),
        })
    }

    /// Wait for the next tick's deadline, then emit it.
    pub async fn tick(&mut self) -> Option<RevealTick> {
        let deadline = self.deadline()?;
        tokio::time::sleep_until(deadline).await;
        self.advance()
    }

    /// The characters not yet revealed.
    pub fn remaining(&self) -> String {
        self.chars[self.revealed.min(self.chars.len())..].iter().collect()
    }

    /// Reveal everything left at once. Returns the remaining text.
    pub fn finish_now(&mut self) -> String {
        let rest = self.remaining();
        self.revealed = self.chars.len();
        rest
    }

    /// Stop without revealing the rest.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }
}

impl Iterator for Reveal {
    type Item = RevealTick;

    fn next(&mut self) -> Option<RevealTick> {
        self.advance()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = if self.cancelled {
            0
        } else {
            self.chars.len().saturating_sub(self.revealed)
        };
        (left, Some(left))
    }
}

// =============================================================================
// Animator
// =============================================================================

/// Owner of the single active reveal.
#[derive(Debug)]
pub struct Animator {
    pacing: RevealPacing,
    active: Option<(Uuid, Reveal)>,
}

impl Animator {
    pub fn new(pacing: RevealPacing) -> Self {
        Self {
            pacing,
            active: None,
        }
    }

    pub fn pacing(&self) -> &RevealPacing {
        &self.pacing
    }

    pub fn is_revealing(&self) -> bool {
        self.active.is_some()
    }

    /// Id of the message the active reveal writes into.
    pub fn owner(&self) -> Option<Uuid> {
        self.active.as_ref().map(|(id, _)| *id)
    }

    /// Begin revealing `text` into message `message_id`.
    ///
    /// Refused while another reveal is active.
    pub fn start(&mut self, message_id: Uuid, text: &str) -> Result<(), TriageError> {
        if self.active.is_some() {
            return Err(TriageError::Busy);
        }
        let reveal = Reveal::new(text, &self.pacing);
        tracing::debug!(
            message_id = %message_id,
            chars = reveal.len(),
            delay_ms = reveal.delay().as_millis() as u64,
            "Reveal started"
        );
        self.active = Some((message_id, reveal));
        Ok(())
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.active.as_ref().and_then(|(_, r)| r.deadline())
    }

    /// Emit the next character of the active reveal.
    pub fn advance(&mut self) -> Option<RevealTick> {
        self.active.as_mut().and_then(|(_, r)| r.advance())
    }

    /// Whether the active reveal has nothing left to emit.
    pub fn is_finished(&self) -> bool {
        self.active.as_ref().is_some_and(|(_, r)| r.is_finished())
    }

    /// Reveal the rest of the active text at once.
    pub fn finish_now(&mut self) -> Option<String> {
        self.active.as_mut().map(|(_, r)| r.finish_now())
    }

    /// Release the active reveal, returning its message id.
    pub fn complete(&mut self) -> Option<Uuid> {
        self.active.take().map(|(id, _)| id)
    }

    /// Abandon the active reveal. Its schedule is dropped with it.
    pub fn cancel(&mut self) -> Option<Uuid> {
        self.active.take().map(|(id, mut reveal)| {
            reveal.cancel();
            tracing::debug!(message_id = %id, revealed = reveal.revealed(), "Reveal cancelled");
            id
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
