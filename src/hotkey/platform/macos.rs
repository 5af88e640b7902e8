//! macOS keyboard hook using a listen-only CGEventTap
//!
//! The tap is attached to the hook thread's CFRunLoop. macOS key codes are
//! translated into the virtual key space before dispatch.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use core_foundation::runloop::{
    kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop, CFRunLoopSource,
};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions,
    CGEventTapPlacement, CGEventTapProxy, CGEventType, EventField,
};
use tracing::{debug, warn};

use crate::hotkey::keys::{vk, KeyCode};
use crate::hotkey::listener::{HookWaker, HotkeyError, KeyboardHook};
use crate::hotkey::session::{self, KeyDirection, RawKeyEvent};

/// Covers a stop request that lands before the run loop is entered
const STOP_RECHECK: Duration = Duration::from_secs(1);

pub struct EventTapHook {
    stop: Arc<AtomicBool>,
    /// Set by the callback when the system turns the tap off
    disabled: Rc<Cell<bool>>,
    /// Modifiers seen down via FlagsChanged
    held_modifiers: Rc<RefCell<HashSet<KeyCode>>>,
    tap: Option<CGEventTap<'static>>,
    source: Option<CFRunLoopSource>,
}

// The tap, its run loop source and the shared cells never leave the hook
// thread; `new()` runs before any of them are cloned.
unsafe impl Send for EventTapHook {}

impl EventTapHook {
    pub fn new() -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
            disabled: Rc::new(Cell::new(false)),
            held_modifiers: Rc::new(RefCell::new(HashSet::new())),
            tap: None,
            source: None,
        }
    }

    /// Events were lost while the tap was off: drop stale key state and turn it back on
    fn recover(&mut self) {
        warn!("event tap disabled by the system, re-enabling");
        self.held_modifiers.borrow_mut().clear();
        session::resync();
        if let Some(tap) = &self.tap {
            tap.enable();
        }
    }
}

/// Run loop of the hook thread, handed to the waker
struct RunLoopHandle(CFRunLoop);

// CFRunLoopStop may be called from any thread.
unsafe impl Send for RunLoopHandle {}
unsafe impl Sync for RunLoopHandle {}

impl KeyboardHook for EventTapHook {
    fn install(&mut self) -> Result<HookWaker, HotkeyError> {
        // FlagsChanged carries no direction; remember which modifiers are down
        let held_modifiers = Rc::clone(&self.held_modifiers);
        let disabled = Rc::clone(&self.disabled);

        let callback = move |_proxy: CGEventTapProxy,
                             event_type: CGEventType,
                             event: &CGEvent|
              -> Option<CGEvent> {
            match event_type {
                CGEventType::KeyDown | CGEventType::KeyUp => {
                    let keycode =
                        event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
                    if let Some(code) = virtual_key(keycode) {
                        let direction = if matches!(event_type, CGEventType::KeyDown) {
                            KeyDirection::Down
                        } else {
                            KeyDirection::Up
                        };
                        session::dispatch(RawKeyEvent { code, direction });
                    }
                }
                CGEventType::FlagsChanged => {
                    let keycode =
                        event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
                    if let Some((code, mask)) = modifier_key(keycode) {
                        let mut held = held_modifiers.borrow_mut();
                        let direction = if event.get_flags().contains(mask) && !held.contains(&code)
                        {
                            held.insert(code);
                            KeyDirection::Down
                        } else {
                            held.remove(&code);
                            KeyDirection::Up
                        };
                        session::dispatch(RawKeyEvent { code, direction });
                    }
                }
                CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                    // Leave the run loop so `pump` can recover outside the callback
                    disabled.set(true);
                    CFRunLoop::get_current().stop();
                }
                _ => {}
            }
            Some(event.clone())
        };

        let tap = CGEventTap::new(
            CGEventTapLocation::Session,
            CGEventTapPlacement::HeadInsertEventTap,
            CGEventTapOptions::ListenOnly,
            vec![
                CGEventType::KeyDown,
                CGEventType::KeyUp,
                CGEventType::FlagsChanged,
            ],
            callback,
        )
        .map_err(|_| {
            HotkeyError::HookInstall(
                "failed to create event tap - check Accessibility permissions".to_string(),
            )
        })?;

        let source = tap
            .mach_port
            .create_runloop_source(0)
            .map_err(|_| HotkeyError::HookInstall("failed to create run loop source".to_string()))?;

        unsafe {
            CFRunLoop::get_current().add_source(&source, kCFRunLoopCommonModes);
        }
        tap.enable();
        debug!("event tap created and enabled");

        self.tap = Some(tap);
        self.source = Some(source);

        let stop = Arc::clone(&self.stop);
        let run_loop = RunLoopHandle(CFRunLoop::get_current());
        Ok(HookWaker::new(move || {
            stop.store(true, Ordering::SeqCst);
            run_loop.0.stop();
        }))
    }

    fn pump(&mut self) {
        while !self.stop.load(Ordering::SeqCst) {
            unsafe {
                CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, STOP_RECHECK, false);
            }
            if self.disabled.replace(false) && !self.stop.load(Ordering::SeqCst) {
                self.recover();
            }
        }
    }

    fn uninstall(&mut self) {
        if let Some(source) = self.source.take() {
            unsafe {
                CFRunLoop::get_current().remove_source(&source, kCFRunLoopCommonModes);
            }
        }
        if self.tap.take().is_some() {
            debug!("event tap removed");
        }
    }
}

/// Left/right modifier keys and the flag that reports them
fn modifier_key(keycode: u16) -> Option<(KeyCode, CGEventFlags)> {
    let entry = match keycode {
        56 => (vk::LSHIFT, CGEventFlags::CGEventFlagShift),
        60 => (vk::RSHIFT, CGEventFlags::CGEventFlagShift),
        59 => (vk::LCONTROL, CGEventFlags::CGEventFlagControl),
        62 => (vk::RCONTROL, CGEventFlags::CGEventFlagControl),
        58 => (vk::LMENU, CGEventFlags::CGEventFlagAlternate),
        61 => (vk::RMENU, CGEventFlags::CGEventFlagAlternate),
        _ => return None,
    };
    Some(entry)
}

/// Translate an ANSI-layout macOS key code to a virtual key
fn virtual_key(keycode: u16) -> Option<KeyCode> {
    let letter = |c: u8| KeyCode(c as u32);
    let digit = |n: u32| vk::offset(vk::DIGIT0, n);
    let function = |n: u32| vk::offset(vk::F1, n - 1);
    let numpad = |n: u32| vk::offset(vk::NUMPAD0, n);

    let code = match keycode {
        0 => letter(b'A'),
        1 => letter(b'S'),
        2 => letter(b'D'),
        3 => letter(b'F'),
        4 => letter(b'H'),
        5 => letter(b'G'),
        6 => letter(b'Z'),
        7 => letter(b'X'),
        8 => letter(b'C'),
        9 => letter(b'V'),
        11 => letter(b'B'),
        12 => letter(b'Q'),
        13 => letter(b'W'),
        14 => letter(b'E'),
        15 => letter(b'R'),
        16 => letter(b'Y'),
        17 => letter(b'T'),
        18 => digit(1),
        19 => digit(2),
        20 => digit(3),
        21 => digit(4),
        22 => digit(6),
        23 => digit(5),
        24 => vk::OEM_PLUS,
        25 => digit(9),
        26 => digit(7),
        27 => vk::OEM_MINUS,
        28 => digit(8),
        29 => digit(0),
        30 => vk::OEM_6,
        31 => letter(b'O'),
        32 => letter(b'U'),
        33 => vk::OEM_4,
        34 => letter(b'I'),
        35 => letter(b'P'),
        36 => vk::RETURN,
        37 => letter(b'L'),
        38 => letter(b'J'),
        39 => vk::OEM_7,
        40 => letter(b'K'),
        41 => vk::OEM_1,
        42 => vk::OEM_5,
        43 => vk::OEM_COMMA,
        44 => vk::OEM_2,
        45 => letter(b'N'),
        46 => letter(b'M'),
        47 => vk::OEM_PERIOD,
        48 => vk::TAB,
        49 => vk::SPACE,
        50 => vk::OEM_3,
        51 => vk::BACK,
        53 => vk::ESCAPE,
        64 => function(17),
        65 => vk::DECIMAL,
        67 => vk::MULTIPLY,
        69 => vk::ADD,
        71 => vk::CLEAR,
        75 => vk::DIVIDE,
        76 => vk::RETURN,
        78 => vk::SUBTRACT,
        79 => function(18),
        80 => function(19),
        82 => numpad(0),
        83 => numpad(1),
        84 => numpad(2),
        85 => numpad(3),
        86 => numpad(4),
        87 => numpad(5),
        88 => numpad(6),
        89 => numpad(7),
        90 => function(20),
        91 => numpad(8),
        92 => numpad(9),
        96 => function(5),
        97 => function(6),
        98 => function(7),
        99 => function(3),
        100 => function(8),
        101 => function(9),
        103 => function(11),
        105 => function(13),
        106 => function(16),
        107 => function(14),
        109 => function(10),
        111 => function(12),
        113 => function(15),
        114 => vk::INSERT,
        115 => vk::HOME,
        116 => vk::PRIOR,
        117 => vk::DELETE,
        118 => function(4),
        119 => vk::END,
        120 => function(2),
        121 => vk::NEXT,
        122 => function(1),
        123 => vk::LEFT,
        124 => vk::RIGHT,
        125 => vk::DOWN,
        126 => vk::UP,
        _ => return None,
    };
    Some(code)
}
