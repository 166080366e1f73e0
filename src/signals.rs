use log::info;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::coordinator::{ProcessSignal, ShutdownTrigger};
use crate::error::DaemonError;

/// Turns SIGINT and SIGTERM into shutdown triggers. It never cleans up by
/// itself.
pub struct SignalAdapter {
    sigint: Signal,
    sigterm: Signal,
}

impl SignalAdapter {
    /// Handlers are installed here, replacing the default disposition.
    pub fn new() -> Result<Self, DaemonError> {
        Ok(Self {
            sigint: signal(SignalKind::interrupt())
                .map_err(|e| DaemonError::Signal(format!("SIGINT handler: {e}")))?,
            sigterm: signal(SignalKind::terminate())
                .map_err(|e| DaemonError::Signal(format!("SIGTERM handler: {e}")))?,
        })
    }

    pub async fn wait(&mut self) -> ProcessSignal {
        tokio::select! {
            _ = self.sigint.recv() => ProcessSignal::Interrupt,
            _ = self.sigterm.recv() => ProcessSignal::Terminate,
        }
    }

    pub fn spawn_forwarder(
        mut self,
        triggers: mpsc::UnboundedSender<ShutdownTrigger>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let sig = self.wait().await;
                info!("Received {sig:?}");
                if triggers.send(ShutdownTrigger::Signal(sig)).is_err() {
                    break;
                }
            }
        })
    }
}
