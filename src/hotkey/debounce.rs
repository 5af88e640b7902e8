//! Edge detection with activation debounce
//!
//! Turns the tracker's "is satisfied" level into Activated/Deactivated edges.
//! Activation is rate-limited; deactivation never is.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::events::HotkeyEvent;

/// Minimum spacing between two activations
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Whether the hotkey is engaged, and when it last became so
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivationState {
    pub active: bool,
    pub last_activation: Option<Instant>,
}

#[derive(Debug)]
pub struct EdgeDetector {
    interval: Duration,
    state: ActivationState,
}

impl EdgeDetector {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: ActivationState::default(),
        }
    }

    pub fn state(&self) -> ActivationState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    /// Feed the current combination level, returning the edge it produces
    pub fn update(&mut self, satisfied: bool, now: Instant) -> Option<HotkeyEvent> {
        match (satisfied, self.state.active) {
            (true, false) => {
                if let Some(last) = self.state.last_activation {
                    let elapsed = now.saturating_duration_since(last);
                    if elapsed < self.interval {
                        debug!(
                            elapsed_ms = elapsed.as_millis() as u64,
                            interval_ms = self.interval.as_millis() as u64,
                            "activation suppressed by debounce"
                        );
                        return None;
                    }
                }
                self.state.active = true;
                self.state.last_activation = Some(now);
                Some(HotkeyEvent::Activated)
            }
            (false, true) => {
                self.state.active = false;
                Some(HotkeyEvent::Deactivated)
            }
            _ => None,
        }
    }

    /// Feed the level after a key release: only a falling edge is possible
    pub fn update_on_release(&mut self, satisfied: bool) -> Option<HotkeyEvent> {
        if satisfied {
            None
        } else {
            self.release()
        }
    }

    /// Force a release, e.g. when the hook goes away mid-hold
    pub fn release(&mut self) -> Option<HotkeyEvent> {
        if self.state.active {
            self.state.active = false;
            Some(HotkeyEvent::Deactivated)
        } else {
            None
        }
    }
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}
