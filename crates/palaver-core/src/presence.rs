//! Typing-indicator presence signal.
//!
//! A debounce machine with two states, `Idle` and `Typing`. Every keystroke
//! refreshes the expiry deadline; the "typing started" edge fires only on the
//! `Idle -> Typing` transition and "typing stopped" only after a full quiet
//! window. Debounce, not throttle: each input restarts the timer.
//!
//! ## Timer ownership
//!
//! The signal itself is pure — the driver owns the single outstanding timer
//! task. Each `on_input` returns a fresh [`TimerGeneration`]; the driver
//! cancels the previous timer and arms one for the new generation. If a
//! cancellation loses the race, the stale generation is rejected here, so a
//! leaked expiry can never flip a live `Typing` state back to `Idle`.

use std::time::{Duration, Instant};

/// Token identifying one armed debounce timer.
pub type TimerGeneration = u64;

/// Default quiet window before the indicator self-expires.
pub const DEFAULT_TYPING_WINDOW: Duration = Duration::from_millis(1000);

/// Observable edge of the presence state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceEdge {
    /// `Idle -> Typing`: emitted on the first keystroke only, never on
    /// refresh.
    Started,
    /// `Typing -> Idle`: emitted after a full quiet window, or on reset.
    Stopped,
}

/// Ephemeral typing state, recreated on every keystroke, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingState {
    /// Whether the local user is currently typing.
    pub is_typing: bool,
    /// When the indicator will self-expire, if typing.
    pub expires_at: Option<Instant>,
}

/// Debounced, self-expiring typing indicator.
#[derive(Debug)]
pub struct PresenceSignal {
    /// Quiet window after the last keystroke.
    window: Duration,
    /// Expiry deadline; `Some` iff the state is `Typing`.
    expires_at: Option<Instant>,
    /// Invalidates outstanding timers: only an expiry carrying the current
    /// generation may transition the state.
    generation: TimerGeneration,
}

impl PresenceSignal {
    /// Create an idle signal with the given quiet window.
    pub fn new(window: Duration) -> Self {
        Self { window, expires_at: None, generation: 0 }
    }

    /// The configured quiet window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a keystroke: enter `Typing` or refresh the deadline.
    ///
    /// Returns the generation the caller must arm a timer for, plus
    /// `PresenceEdge::Started` when this keystroke crossed the
    /// `Idle -> Typing` edge. Every call invalidates the prior generation.
    pub fn on_input(&mut self, now: Instant) -> (TimerGeneration, Option<PresenceEdge>) {
        let edge = self.expires_at.is_none().then_some(PresenceEdge::Started);
        self.expires_at = Some(now + self.window);
        self.generation += 1;
        (self.generation, edge)
    }

    /// Apply a timer expiry.
    ///
    /// Transitions `Typing -> Idle` and returns `PresenceEdge::Stopped` iff
    /// the generation is still current; stale generations are discarded.
    pub fn on_expiry(&mut self, generation: TimerGeneration) -> Option<PresenceEdge> {
        if generation != self.generation || self.expires_at.is_none() {
            return None;
        }

        self.expires_at = None;
        Some(PresenceEdge::Stopped)
    }

    /// Force `Idle` and invalidate any outstanding timer.
    ///
    /// Called on message send and session end. Returns
    /// `PresenceEdge::Stopped` if the signal was `Typing`.
    pub fn reset(&mut self) -> Option<PresenceEdge> {
        self.generation += 1;
        self.expires_at.take().map(|_| PresenceEdge::Stopped)
    }

    /// Current ephemeral state, for snapshots.
    pub fn state(&self) -> TypingState {
        TypingState { is_typing: self.expires_at.is_some(), expires_at: self.expires_at }
    }
}

impl Default for PresenceSignal {
    fn default() -> Self {
        Self::new(DEFAULT_TYPING_WINDOW)
    }
}
