//! Global hotkey listener
//!
//! Owns the hook thread: installs the OS keyboard subscription on a dedicated
//! thread, feeds it through the session, and tears it down on `stop()`.
//! Lifecycle is Stopped -> Starting -> Running -> Stopping -> Stopped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::combo::HotkeyConfig;
use super::debounce::DEFAULT_DEBOUNCE;
use super::keys::UnresolvedKeyError;
use super::platform;
use super::session::{self, HookSession};
use crate::events::HotkeyEvent;

/// An OS keyboard subscription, driven entirely from the hook thread
///
/// Implementations deliver key transitions with [`session::dispatch`] and
/// must pass every event on to the rest of the system untouched.
pub trait KeyboardHook: Send {
    /// Install the subscription on the calling thread
    fn install(&mut self) -> Result<HookWaker, HotkeyError>;

    /// Block delivering events until the waker fires
    fn pump(&mut self);

    /// Remove the subscription
    fn uninstall(&mut self);
}

/// Unblocks a pumping hook from another thread
#[derive(Clone)]
pub struct HookWaker(Arc<dyn Fn() + Send + Sync>);

impl HookWaker {
    pub fn new(wake: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(wake))
    }

    pub fn wake(&self) {
        (self.0)()
    }
}

type HookFactory = Box<dyn Fn() -> Box<dyn KeyboardHook> + Send + Sync>;

/// Errors that can occur in the hotkey listener
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("invalid hotkey configuration: {0}")]
    InvalidConfig(#[from] UnresolvedKeyError),

    #[error("failed to install keyboard hook: {0}")]
    HookInstall(String),

    #[error("global keyboard hooks are not supported on this platform")]
    Unsupported,

    #[error("failed to spawn hook thread: {0}")]
    ThreadSpawn(String),
}

/// Lifecycle state of the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenerState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for ListenerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerState::Stopped => write!(f, "Stopped"),
            ListenerState::Starting => write!(f, "Starting"),
            ListenerState::Running => write!(f, "Running"),
            ListenerState::Stopping => write!(f, "Stopping"),
        }
    }
}

struct RunningHook {
    waker: HookWaker,
    thread: JoinHandle<()>,
}

struct Inner {
    state: ListenerState,
    config: HotkeyConfig,
    hook: Option<RunningHook>,
}

/// Global hotkey listener that emits Activated/Deactivated edges
pub struct HotkeyListener {
    event_tx: mpsc::UnboundedSender<HotkeyEvent>,
    debounce: Duration,
    hook_factory: HookFactory,
    inner: Mutex<Inner>,
}

impl HotkeyListener {
    /// Create a listener backed by the platform's keyboard hook
    ///
    /// The configuration is validated here, before any hook is installed.
    pub fn new(
        config: HotkeyConfig,
        event_tx: mpsc::UnboundedSender<HotkeyEvent>,
    ) -> Result<Self, HotkeyError> {
        Self::with_hook(config, event_tx, platform::native_hook)
    }

    /// Create a listener with a custom hook backend
    pub fn with_hook<F>(
        config: HotkeyConfig,
        event_tx: mpsc::UnboundedSender<HotkeyEvent>,
        hook_factory: F,
    ) -> Result<Self, HotkeyError>
    where
        F: Fn() -> Box<dyn KeyboardHook> + Send + Sync + 'static,
    {
        config.required_keys()?;

        Ok(Self {
            event_tx,
            debounce: DEFAULT_DEBOUNCE,
            hook_factory: Box::new(hook_factory),
            inner: Mutex::new(Inner {
                state: ListenerState::Stopped,
                config,
                hook: None,
            }),
        })
    }

    /// Override the activation debounce interval
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Start the listener
    ///
    /// Spawns the hook thread and waits until the OS subscription is either
    /// installed or refused. Calling this while running is a no-op.
    pub fn start(&self) -> Result<(), HotkeyError> {
        let mut inner = self.lock();
        self.start_locked(&mut inner)
    }

    /// Stop the listener and remove the OS subscription
    pub fn stop(&self) {
        let mut inner = self.lock();
        Self::stop_locked(&mut inner);
    }

    /// Replace the hotkey, restarting the hook if it was running
    ///
    /// An invalid configuration is rejected and the current hook is left alone.
    pub fn update_config(&self, config: HotkeyConfig) -> Result<(), HotkeyError> {
        config.required_keys()?;

        let mut inner = self.lock();
        let was_running = Self::refresh_state(&mut inner) == ListenerState::Running;

        info!(from = %inner.config, to = %config, was_running, "updating hotkey");
        Self::stop_locked(&mut inner);
        inner.config = config;

        if was_running {
            self.start_locked(&mut inner)
        } else {
            Ok(())
        }
    }

    /// Check if the listener is currently running
    pub fn is_running(&self) -> bool {
        self.state() == ListenerState::Running
    }

    pub fn state(&self) -> ListenerState {
        let mut inner = self.lock();
        Self::refresh_state(&mut inner)
    }

    pub fn config(&self) -> HotkeyConfig {
        self.lock().config.clone()
    }

    /// Debounce interval used by every hook this listener starts
    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Notice a hook thread that exited on its own (e.g. the OS removed the hook)
    fn refresh_state(inner: &mut Inner) -> ListenerState {
        let finished = inner
            .hook
            .as_ref()
            .is_some_and(|hook| hook.thread.is_finished());
        if finished {
            warn!("hook thread exited unexpectedly");
            Self::stop_locked(inner);
        }
        inner.state
    }

    fn start_locked(&self, inner: &mut Inner) -> Result<(), HotkeyError> {
        if Self::refresh_state(inner) == ListenerState::Running {
            return Ok(());
        }

        let required = inner.config.required_keys()?;
        inner.state = ListenerState::Starting;

        let session = HookSession::new(required, self.debounce, self.event_tx.clone());
        let mut hook = (self.hook_factory)();
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel(1);

        let spawned = thread::Builder::new()
            .name("hotkey-hook".to_string())
            .spawn(move || {
                session::attach(session);

                match hook.install() {
                    Ok(waker) => {
                        if ready_tx.send(Ok(waker)).is_ok() {
                            info!("hook thread started");
                            hook.pump();
                        }
                        hook.uninstall();
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }

                session::detach();
                info!("hook thread stopped");
            });

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                inner.state = ListenerState::Stopped;
                return Err(HotkeyError::ThreadSpawn(e.to_string()));
            }
        };

        let ready = ready_rx.recv().unwrap_or_else(|_| {
            Err(HotkeyError::HookInstall(
                "hook thread exited before installing".to_string(),
            ))
        });

        match ready {
            Ok(waker) => {
                inner.hook = Some(RunningHook { waker, thread });
                inner.state = ListenerState::Running;
                info!(hotkey = %inner.config, "hotkey listener running");
                Ok(())
            }
            Err(e) => {
                if thread.join().is_err() {
                    error!("hook thread panicked during install");
                }
                inner.state = ListenerState::Stopped;
                error!(error = %e, "hotkey listener failed to start");
                Err(e)
            }
        }
    }

    fn stop_locked(inner: &mut Inner) {
        let Some(hook) = inner.hook.take() else {
            inner.state = ListenerState::Stopped;
            return;
        };

        inner.state = ListenerState::Stopping;
        hook.waker.wake();
        if hook.thread.join().is_err() {
            error!("hook thread panicked");
        }
        inner.state = ListenerState::Stopped;
        info!("hotkey listener stopped");
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.stop();
    }
}
