//! Shutdown signalling for the services.
//!
//! Each long-running service gets a `oneshot` halt channel from its
//! controller and couples it with the process-wide interrupt and terminate
//! signals, so `stop()` and Ctrl-C take the same path through the service's
//! graceful shutdown.
use derive_more::Display;
use tokio::sync::oneshot;
use tracing::info;

/// The message a service receives from its controller when it must shut
/// down. A dropped controller counts as `Dropped`.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq)]
pub enum Halted {
    Normal,
    Dropped,
}

/// Resolves when the process receives an interrupt (Ctrl-C) or, on unix, a
/// terminate signal.
///
/// # Panics
///
/// Panics if the signal handlers cannot be installed.
pub async fn global_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate()).expect("failed to install the SIGTERM handler");

        tokio::select! {
            result = tokio::signal::ctrl_c() => result.expect("failed to install the Ctrl+C handler"),
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await.expect("failed to install the Ctrl+C handler");
}

/// Resolves when the service is told to halt through its channel, or the
/// whole process is shutting down.
pub async fn shutdown_signal(rx_halt: oneshot::Receiver<Halted>) {
    tokio::select! {
        request = rx_halt => {
            let signal = request.unwrap_or(Halted::Dropped);
            info!("Halting: {signal}");
        }
        () = global_shutdown_signal() => {
            info!("Global shutdown signal");
        }
    }
}
