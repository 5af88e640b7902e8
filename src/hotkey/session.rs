//! Per-hook-thread engine state
//!
//! OS hook callbacks are free functions with no receiver, so the tracker and
//! edge detector live in a thread-local slot on the hook thread. Only that
//! thread ever reads or writes them.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{error, info, trace, warn};

use super::combo::{CombinationTracker, RequiredKeySet};
use super::debounce::EdgeDetector;
use super::keys::KeyCode;
use crate::events::HotkeyEvent;

/// Direction of a raw key transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDirection {
    Down,
    Up,
}

/// A single key transition as reported by a platform hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawKeyEvent {
    pub code: KeyCode,
    pub direction: KeyDirection,
}

impl RawKeyEvent {
    pub fn down(code: KeyCode) -> Self {
        Self {
            code,
            direction: KeyDirection::Down,
        }
    }

    pub fn up(code: KeyCode) -> Self {
        Self {
            code,
            direction: KeyDirection::Up,
        }
    }
}

/// Tracker, detector and outbound channel for one running hook
#[derive(Debug)]
pub struct HookSession {
    tracker: CombinationTracker,
    detector: EdgeDetector,
    event_tx: mpsc::UnboundedSender<HotkeyEvent>,
}

impl HookSession {
    pub fn new(
        required: RequiredKeySet,
        debounce: Duration,
        event_tx: mpsc::UnboundedSender<HotkeyEvent>,
    ) -> Self {
        Self {
            tracker: CombinationTracker::new(required),
            detector: EdgeDetector::new(debounce),
            event_tx,
        }
    }

    /// Run one key transition through the tracker and the edge detector
    pub fn handle(&mut self, event: RawKeyEvent, now: Instant) {
        let satisfied = match event.direction {
            KeyDirection::Down => self.tracker.on_key_down(event.code),
            KeyDirection::Up => self.tracker.on_key_up(event.code),
        };

        trace!(
            code = %event.code,
            direction = ?event.direction,
            satisfied,
            held = self.tracker.pressed().len(),
            "key event"
        );

        // A release can end an activation but never start one
        let edge = match event.direction {
            KeyDirection::Down => self.detector.update(satisfied, now),
            KeyDirection::Up => self.detector.update_on_release(satisfied),
        };

        if let Some(edge) = edge {
            info!(
                %edge,
                trigger = %event.code,
                part_of_hotkey = self.tracker.required().involves(event.code),
                "hotkey edge"
            );
            self.emit(edge);
        }
    }

    /// Forget held keys after the OS may have dropped events
    pub fn resync(&mut self) {
        self.tracker.clear();
        if let Some(edge) = self.detector.release() {
            info!(%edge, "hotkey released on resync");
            self.emit(edge);
        }
    }

    /// Release an engaged hotkey and drop all state
    pub fn finish(mut self) {
        if let Some(edge) = self.detector.release() {
            info!(%edge, "hotkey released on shutdown");
            self.emit(edge);
        }
    }

    fn emit(&self, edge: HotkeyEvent) {
        // Unbounded: the hook callback must never wait on the consumer
        if self.event_tx.send(edge).is_err() {
            warn!(%edge, "hotkey event receiver dropped");
        }
    }
}

thread_local! {
    static SESSION: RefCell<Option<HookSession>> = const { RefCell::new(None) };
}

/// Install the session for the current (hook) thread
pub fn attach(session: HookSession) {
    SESSION.with(|slot| {
        if let Ok(mut slot) = slot.try_borrow_mut() {
            if slot.replace(session).is_some() {
                warn!("replaced a stale hook session");
            }
        }
    });
}

/// Remove the current thread's session, releasing an engaged hotkey
pub fn detach() {
    let session = SESSION.with(|slot| slot.try_borrow_mut().ok().and_then(|mut s| s.take()));
    if let Some(session) = session {
        session.finish();
    }
}

/// Reset the current thread's session after the hook lost events
pub fn resync() {
    SESSION.with(|slot| match slot.try_borrow_mut() {
        Ok(mut slot) => {
            if let Some(session) = slot.as_mut() {
                session.resync();
            }
        }
        Err(_) => error!("hook session busy, resync skipped"),
    });
}

/// Entry point for platform hook callbacks
///
/// Never unwinds: a fault while handling one event drops that event only.
pub fn dispatch(event: RawKeyEvent) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        SESSION.with(|slot| match slot.try_borrow_mut() {
            Ok(mut slot) => {
                if let Some(session) = slot.as_mut() {
                    session.handle(event, Instant::now());
                }
            }
            Err(_) => {
                error!(code = %event.code, "re-entrant hook callback, dropping event");
            }
        })
    }));

    if result.is_err() {
        error!(code = %event.code, direction = ?event.direction, "panic while handling key event, dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::combo::HotkeyConfig;
    use crate::hotkey::keys::vk;

    const F12: KeyCode = KeyCode(0x7B);

    fn session(debounce: Duration) -> (HookSession, mpsc::UnboundedReceiver<HotkeyEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let required = HotkeyConfig::default().required_keys().unwrap();
        (HookSession::new(required, debounce, tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<HotkeyEvent>) -> Vec<HotkeyEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_press_and_release_sequence() {
        let (mut s, mut rx) = session(Duration::from_millis(50));
        let t0 = Instant::now();

        s.handle(RawKeyEvent::down(vk::LCONTROL), t0);
        s.handle(RawKeyEvent::down(vk::LSHIFT), t0);
        s.handle(RawKeyEvent::down(F12), t0);
        assert_eq!(drain(&mut rx), vec![HotkeyEvent::Activated]);

        // Autorepeat while held
        s.handle(RawKeyEvent::down(F12), t0 + Duration::from_millis(300));
        assert!(drain(&mut rx).is_empty());

        s.handle(RawKeyEvent::up(F12), t0 + Duration::from_millis(400));
        assert_eq!(drain(&mut rx), vec![HotkeyEvent::Deactivated]);

        s.handle(RawKeyEvent::up(vk::LCONTROL), t0 + Duration::from_millis(410));
        s.handle(RawKeyEvent::up(vk::LSHIFT), t0 + Duration::from_millis(420));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_any_order_activates_once() {
        let orders = [
            [vk::LCONTROL, vk::LSHIFT, F12],
            [vk::LCONTROL, F12, vk::LSHIFT],
            [vk::LSHIFT, vk::LCONTROL, F12],
            [vk::LSHIFT, F12, vk::LCONTROL],
            [F12, vk::LCONTROL, vk::LSHIFT],
            [F12, vk::LSHIFT, vk::LCONTROL],
        ];

        for order in orders {
            let (mut s, mut rx) = session(Duration::from_millis(50));
            let t0 = Instant::now();

            for (i, code) in order.iter().enumerate() {
                s.handle(RawKeyEvent::down(*code), t0);
                let events = drain(&mut rx);
                if i == order.len() - 1 {
                    assert_eq!(events, vec![HotkeyEvent::Activated], "order {:?}", order);
                } else {
                    assert!(events.is_empty(), "order {:?}", order);
                }
            }
        }
    }

    #[test]
    fn test_rapid_bounce_is_debounced() {
        let (mut s, mut rx) = session(Duration::from_millis(50));
        let t0 = Instant::now();

        s.handle(RawKeyEvent::down(vk::LCONTROL), t0);
        s.handle(RawKeyEvent::down(vk::LSHIFT), t0);
        s.handle(RawKeyEvent::down(F12), t0);
        s.handle(RawKeyEvent::up(F12), t0 + Duration::from_millis(10));
        s.handle(RawKeyEvent::down(F12), t0 + Duration::from_millis(20));

        assert_eq!(
            drain(&mut rx),
            vec![HotkeyEvent::Activated, HotkeyEvent::Deactivated]
        );
    }

    #[test]
    fn test_release_never_activates() {
        let (mut s, mut rx) = session(Duration::from_millis(50));
        let t0 = Instant::now();

        s.handle(RawKeyEvent::down(vk::LCONTROL), t0);
        s.handle(RawKeyEvent::down(vk::LSHIFT), t0);
        s.handle(RawKeyEvent::down(F12), t0);
        s.handle(RawKeyEvent::up(F12), t0 + Duration::from_millis(5));
        // Suppressed by debounce, combination stays held
        s.handle(RawKeyEvent::down(F12), t0 + Duration::from_millis(10));

        // Releasing unrelated or never-pressed keys must not activate
        s.handle(RawKeyEvent::up(KeyCode(0x41)), t0 + Duration::from_millis(110));
        s.handle(RawKeyEvent::down(vk::LMENU), t0 + Duration::from_millis(120));
        s.handle(RawKeyEvent::up(vk::LMENU), t0 + Duration::from_millis(130));

        assert_eq!(
            drain(&mut rx),
            vec![HotkeyEvent::Activated, HotkeyEvent::Deactivated, HotkeyEvent::Activated]
        );
    }

    #[test]
    fn test_resync_clears_held_keys() {
        let (mut s, mut rx) = session(Duration::ZERO);
        let t0 = Instant::now();

        s.handle(RawKeyEvent::down(vk::LCONTROL), t0);
        s.handle(RawKeyEvent::down(vk::LSHIFT), t0);
        s.handle(RawKeyEvent::down(F12), t0);
        s.resync();
        assert_eq!(
            drain(&mut rx),
            vec![HotkeyEvent::Activated, HotkeyEvent::Deactivated]
        );

        // Stale keys are gone: the main key alone does nothing
        s.handle(RawKeyEvent::down(F12), t0);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_finish_releases_active_hotkey() {
        let (mut s, mut rx) = session(Duration::ZERO);
        let t0 = Instant::now();

        s.handle(RawKeyEvent::down(vk::RCONTROL), t0);
        s.handle(RawKeyEvent::down(vk::RSHIFT), t0);
        s.handle(RawKeyEvent::down(F12), t0);
        s.finish();

        assert_eq!(
            drain(&mut rx),
            vec![HotkeyEvent::Activated, HotkeyEvent::Deactivated]
        );
    }

    #[test]
    fn test_dispatch_without_session_is_ignored() {
        dispatch(RawKeyEvent::down(F12));
        detach();
    }

    #[test]
    fn test_dispatch_uses_thread_session() {
        let (s, mut rx) = session(Duration::ZERO);
        attach(s);

        dispatch(RawKeyEvent::down(vk::LCONTROL));
        dispatch(RawKeyEvent::down(vk::LSHIFT));
        dispatch(RawKeyEvent::down(F12));
        detach();

        assert_eq!(
            drain(&mut rx),
            vec![HotkeyEvent::Activated, HotkeyEvent::Deactivated]
        );

        // Slot is empty again
        dispatch(RawKeyEvent::down(F12));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_closed_receiver_does_not_fault() {
        let (mut s, rx) = session(Duration::ZERO);
        drop(rx);
        let t0 = Instant::now();

        s.handle(RawKeyEvent::down(vk::LCONTROL), t0);
        s.handle(RawKeyEvent::down(vk::LSHIFT), t0);
        s.handle(RawKeyEvent::down(F12), t0);
        s.finish();
    }
}
