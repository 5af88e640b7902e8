//! Signal handling for graceful shutdown and configuration reload

use std::io;

use tracing::debug;

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Handles shutdown signals (SIGTERM, SIGINT; Ctrl-C elsewhere)
pub struct ShutdownSignal {
    #[cfg(unix)]
    sigterm: Signal,
    #[cfg(unix)]
    sigint: Signal,
}

impl ShutdownSignal {
    /// Register the shutdown signal handlers
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            sigterm: signal(SignalKind::terminate())?,
            #[cfg(unix)]
            sigint: signal(SignalKind::interrupt())?,
        })
    }

    /// Wait for a shutdown signal
    #[cfg(unix)]
    pub async fn wait(&mut self) {
        tokio::select! {
            _ = self.sigterm.recv() => {
                debug!("received SIGTERM");
            }
            _ = self.sigint.recv() => {
                debug!("received SIGINT");
            }
        }
    }

    /// Wait for a shutdown signal
    #[cfg(not(unix))]
    pub async fn wait(&mut self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        debug!("received Ctrl-C");
    }
}

/// Handles configuration reload requests (SIGHUP)
pub struct ReloadSignal {
    #[cfg(unix)]
    sighup: Signal,
}

impl ReloadSignal {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            sighup: signal(SignalKind::hangup())?,
        })
    }

    /// Wait for the next reload request
    ///
    /// Never resolves on platforms without SIGHUP.
    pub async fn recv(&mut self) {
        #[cfg(unix)]
        {
            if self.sighup.recv().await.is_none() {
                std::future::pending::<()>().await;
            }
            debug!("received SIGHUP");
        }

        #[cfg(not(unix))]
        std::future::pending::<()>().await
    }
}
