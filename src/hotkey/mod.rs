//! Hotkey module for global keyboard event listening
//!
//! A low-level keyboard hook feeds every key transition into a combination
//! tracker; an edge detector turns "combination held" into debounced
//! Activated / Deactivated events.

mod combo;
mod debounce;
mod keys;
mod listener;
mod platform;
mod session;

pub use combo::{CombinationTracker, HotkeyConfig, RequiredKeySet};
pub use debounce::{ActivationState, EdgeDetector, DEFAULT_DEBOUNCE};
pub use keys::{resolve_key, vk, KeyCode, Modifier, UnresolvedKeyError};
pub use listener::{HookWaker, HotkeyError, HotkeyListener, KeyboardHook, ListenerState};
pub use session::{KeyDirection, RawKeyEvent};
