//! Platform keyboard hook backends

use super::listener::{HookWaker, HotkeyError, KeyboardHook};

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "windows")]
mod win32;

/// The keyboard hook for the current platform
pub fn native_hook() -> Box<dyn KeyboardHook> {
    #[cfg(target_os = "windows")]
    return Box::new(win32::LowLevelHook::new());

    #[cfg(target_os = "macos")]
    return Box::new(macos::EventTapHook::new());

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    return Box::new(UnsupportedHook);
}

/// Refuses to install; reported to the caller as a start failure
#[allow(dead_code)]
struct UnsupportedHook;

impl KeyboardHook for UnsupportedHook {
    fn install(&mut self) -> Result<HookWaker, HotkeyError> {
        Err(HotkeyError::Unsupported)
    }

    fn pump(&mut self) {}

    fn uninstall(&mut self) {}
}
