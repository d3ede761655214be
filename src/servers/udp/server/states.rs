//! The two states of the server controller and the transitions between
//! them. Starting spawns the launcher and waits for its boot signal;
//! stopping sends the halt message and joins the service task.
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use torrust_udp_tracker_configuration::UdpTracker;

use super::launcher::Launcher;
use super::{Server, UdpError};
use crate::bootstrap::jobs::Started;
use crate::core::Tracker;
use crate::servers::signals::Halted;

/// A UDP server instance controller with no UDP instance running.
#[allow(clippy::module_name_repetitions)]
pub type StoppedUdpServer = Server<Stopped>;

/// A UDP server instance controller with a running UDP instance.
#[allow(clippy::module_name_repetitions)]
pub type RunningUdpServer = Server<Running>;

/// A stopped UDP server state.
pub struct Stopped {
    pub bind_to: SocketAddr,
}

/// A running UDP server state.
#[derive(Debug)]
pub struct Running {
    /// The address where the server is bound. With an ephemeral bind port
    /// (`:0`) this carries the resolved one.
    pub binding: SocketAddr,
    bind_to: SocketAddr,
    halt: oneshot::Sender<Halted>,
    task: JoinHandle<()>,
}

impl Server<Stopped> {
    /// A server that will bind to the given address once started.
    #[must_use]
    pub fn bound_to(bind_to: SocketAddr) -> Self {
        Self {
            state: Stopped { bind_to },
        }
    }

    /// It starts the server and returns a controller in `running` state.
    ///
    /// The method only returns once the service finished booting: the
    /// returned controller always carries the resolved binding, so callers
    /// can connect immediately.
    ///
    /// # Errors
    ///
    /// Will return an error if the service dies before signalling that it
    /// is listening. The launcher logs the cause.
    pub async fn start(self, tracker: Arc<Tracker>, config: Arc<UdpTracker>) -> Result<Server<Running>, UdpError> {
        let (tx_ready, rx_ready) = oneshot::channel::<Started>();
        let (tx_halt, rx_halt) = oneshot::channel::<Halted>();

        let bind_to = self.state.bind_to;

        let task = tokio::spawn(Launcher::run_with_graceful_shutdown(tracker, config, bind_to, tx_ready, rx_halt));

        match rx_ready.await {
            Ok(started) => Ok(Server {
                state: Running {
                    binding: started.address,
                    bind_to,
                    halt: tx_halt,
                    task,
                },
            }),
            Err(_) => Err(UdpError::FailedToBoot),
        }
    }
}

impl Server<Running> {
    /// It stops the server and returns a controller in `stopped` state.
    ///
    /// The method only returns once the receive loop has exited and the
    /// in-flight workers have been joined.
    ///
    /// # Errors
    ///
    /// Will return an error if the service already stopped listening for
    /// the halt signal, or its task panicked.
    pub async fn stop(self) -> Result<Server<Stopped>, UdpError> {
        let Running { bind_to, halt, task, .. } = self.state;

        halt.send(Halted::Normal).map_err(|_| UdpError::FailedToShutDown {
            reason: "the service is no longer listening for the halt signal".to_owned(),
        })?;

        task.await
            .map_err(|e| UdpError::FailedToShutDown { reason: e.to_string() })?;

        Ok(Server::bound_to(bind_to))
    }

    /// Waits until the service finishes on its own: a fatal socket error or
    /// the process-wide shutdown signal. The halt channel is kept open
    /// while waiting, so this does not tell the service to stop.
    ///
    /// # Errors
    ///
    /// Will return an error if the service task panicked.
    pub async fn wait(self) -> Result<(), UdpError> {
        let Running { halt: _halt, task, .. } = self.state;

        task.await
            .map_err(|e| UdpError::FailedToShutDown { reason: e.to_string() })
    }
}
