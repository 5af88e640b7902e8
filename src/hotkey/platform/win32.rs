//! Windows low-level keyboard hook (`WH_KEYBOARD_LL`)
//!
//! The hook procedure runs on the thread that installed it, and only while
//! that thread is pumping messages. Stopping posts `WM_QUIT` to the thread.

use tracing::{debug, warn};
use windows::Win32::Foundation::{HINSTANCE, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
    SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, HHOOK, KBDLLHOOKSTRUCT, MSG,
    PM_NOREMOVE, WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP,
    WM_USER,
};

use crate::hotkey::keys::KeyCode;
use crate::hotkey::listener::{HookWaker, HotkeyError, KeyboardHook};
use crate::hotkey::session::{self, KeyDirection, RawKeyEvent};

pub struct LowLevelHook {
    hook: Option<HHOOK>,
}

// The handle is created, used and released on the hook thread only.
unsafe impl Send for LowLevelHook {}

impl LowLevelHook {
    pub fn new() -> Self {
        Self { hook: None }
    }
}

unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 {
        let direction = match wparam.0 as u32 {
            WM_KEYDOWN | WM_SYSKEYDOWN => Some(KeyDirection::Down),
            WM_KEYUP | WM_SYSKEYUP => Some(KeyDirection::Up),
            _ => None,
        };

        if let Some(direction) = direction {
            let info = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
            session::dispatch(RawKeyEvent {
                code: KeyCode(info.vkCode),
                direction,
            });
        }
    }

    // Observation only: always hand the event on
    CallNextHookEx(HHOOK::default(), code, wparam, lparam)
}

impl KeyboardHook for LowLevelHook {
    fn install(&mut self) -> Result<HookWaker, HotkeyError> {
        let thread_id = unsafe {
            // Make sure this thread has a message queue before anyone posts to it
            let mut msg = MSG::default();
            let _ = PeekMessageW(&mut msg, None, WM_USER, WM_USER, PM_NOREMOVE);

            let module =
                GetModuleHandleW(None).map_err(|e| HotkeyError::HookInstall(e.to_string()))?;
            let hook = SetWindowsHookExW(
                WH_KEYBOARD_LL,
                Some(keyboard_proc),
                HINSTANCE::from(module),
                0,
            )
            .map_err(|e| HotkeyError::HookInstall(e.to_string()))?;

            self.hook = Some(hook);
            GetCurrentThreadId()
        };

        debug!(thread_id, "low-level keyboard hook installed");

        Ok(HookWaker::new(move || unsafe {
            if let Err(e) = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) {
                warn!(error = %e, "failed to post quit to hook thread");
            }
        }))
    }

    fn pump(&mut self) {
        let mut msg = MSG::default();
        loop {
            // 0 is WM_QUIT, -1 is an error
            let result = unsafe { GetMessageW(&mut msg, None, 0, 0) };
            if result.0 == 0 || result.0 == -1 {
                break;
            }
            unsafe {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }

    fn uninstall(&mut self) {
        if let Some(hook) = self.hook.take() {
            if let Err(e) = unsafe { UnhookWindowsHookEx(hook) } {
                warn!(error = %e, "failed to remove keyboard hook");
            } else {
                debug!("low-level keyboard hook removed");
            }
        }
    }
}
