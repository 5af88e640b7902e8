//! shortcut-overlay-daemon: background process driving the shortcut overlay
//!
//! Installs the global keyboard hook and forwards hotkey edges to the
//! overlay controller. Re-reads its configuration on SIGHUP.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use shortcut_overlay::config::Config;
use shortcut_overlay::events::HotkeyEvent;
use shortcut_overlay::hotkey::HotkeyListener;
use shortcut_overlay::lifecycle::{ReloadSignal, ShutdownSignal};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "shortcut-overlay-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        hotkey = %config.hotkey,
        debounce_ms = config.debounce.as_millis() as u64,
        data_dir = ?config.data_dir,
        "configuration loaded"
    );

    let mut shutdown = ShutdownSignal::new()?;
    let mut reload = ReloadSignal::new()?;

    // Hook thread -> overlay controller
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<HotkeyEvent>();

    let listener = Arc::new(
        HotkeyListener::new(config.hotkey.clone(), event_tx)?.with_debounce(config.debounce),
    );

    // start/update_config/stop wait on the hook thread; keep them off the runtime
    let starting = Arc::clone(&listener);
    match task::spawn_blocking(move || starting.start()).await? {
        Ok(()) => {
            info!(hotkey = %listener.config(), "hotkey listener started");
        }
        Err(e) => {
            error!(error = %e, "failed to start hotkey listener");
            warn!("continuing without global hotkey - overlay can only be opened from the tray");
        }
    }

    info!("daemon initialized, entering main loop");

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                match event {
                    HotkeyEvent::Activated => info!(%event, "show overlay"),
                    HotkeyEvent::Deactivated => info!(%event, "hide overlay"),
                }
            }

            _ = reload.recv() => {
                let new_config = match Config::load() {
                    Ok(new_config) => new_config,
                    Err(e) => {
                        warn!(error = %e, "failed to reload configuration");
                        continue;
                    }
                };

                let plan = new_config.reload_plan(&listener.config(), listener.debounce());
                if plan.is_empty() {
                    info!("configuration reloaded, nothing changed");
                }
                if let Some(requested) = plan.debounce {
                    warn!(
                        current_ms = listener.debounce().as_millis() as u64,
                        requested_ms = requested.as_millis() as u64,
                        "debounce change takes effect after restart"
                    );
                }
                if let Some(hotkey) = plan.hotkey {
                    let updating = Arc::clone(&listener);
                    match task::spawn_blocking(move || updating.update_config(hotkey)).await? {
                        Ok(()) => info!(hotkey = %listener.config(), "hotkey updated"),
                        Err(e) => error!(error = %e, "failed to apply new hotkey"),
                    }
                }
            }

            _ = shutdown.wait() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    // Cleanup
    info!("shutting down...");

    let stopping = Arc::clone(&listener);
    task::spawn_blocking(move || stopping.stop()).await?;

    info!("shortcut-overlay-daemon stopped");

    Ok(())
}
