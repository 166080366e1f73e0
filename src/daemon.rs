use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::broker::LineBroker;
use crate::button::ButtonMonitor;
use crate::config::DaemonConfig;
use crate::coordinator::{Button, Coordinator, PhaseHandle, ProcessSignal, ShutdownTrigger};
use crate::error::DaemonError;
use crate::gpio::{Direction, EdgeDetect, GpioBackend};
use crate::indicator::{BlinkPattern, StatusLed};
use crate::power::PowerControl;
use crate::sysfs::SysfsControl;

enum Startup {
    Ready,
    Interrupted(ShutdownTrigger),
}

/// Owns every hardware resource of the process from startup to exit.
pub struct Daemon<G: GpioBackend, S: SysfsControl, P: PowerControl> {
    config: DaemonConfig,
    gpio: Arc<G>,
    broker: LineBroker<S>,
    power: Arc<P>,
    led: Option<StatusLed<G>>,
    monitors: Vec<JoinHandle<()>>,
    coordinator: Coordinator,
    trigger_tx: mpsc::UnboundedSender<ShutdownTrigger>,
    trigger_rx: mpsc::UnboundedReceiver<ShutdownTrigger>,
}

impl<G: GpioBackend, S: SysfsControl, P: PowerControl> Daemon<G, S, P> {
    pub fn new(config: DaemonConfig, gpio: Arc<G>, sysfs: Arc<S>, power: Arc<P>) -> Self {
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        Self {
            config,
            gpio,
            broker: LineBroker::new(sysfs),
            power,
            led: None,
            monitors: Vec::new(),
            coordinator: Coordinator::new(),
            trigger_tx,
            trigger_rx,
        }
    }

    /// Feeds shutdown triggers into the daemon, e.g. from a signal adapter.
    pub fn trigger_sender(&self) -> mpsc::UnboundedSender<ShutdownTrigger> {
        self.trigger_tx.clone()
    }

    pub fn phase_handle(&self) -> PhaseHandle {
        self.coordinator.handle()
    }

    fn pending_trigger(&mut self) -> Option<ShutdownTrigger> {
        self.trigger_rx.try_recv().ok()
    }

    fn start(&mut self) -> Result<Startup, DaemonError> {
        let pins = self.config.pins;

        self.led = Some(StatusLed::new(self.gpio.clone(), pins.status_led)?);

        for (button, line) in [
            (Button::Shutdown, pins.shutdown_button),
            (Button::Reboot, pins.reboot_button),
        ] {
            if let Some(trigger) = self.pending_trigger() {
                return Ok(Startup::Interrupted(trigger));
            }
            let monitor = ButtonMonitor::new(button, line, self.config.hold_time);
            let task = monitor.spawn(self.gpio.as_ref(), self.trigger_tx.clone())?;
            self.monitors.push(task);
        }

        for line in self.config.sysfs_lines() {
            if let Some(trigger) = self.pending_trigger() {
                return Ok(Startup::Interrupted(trigger));
            }
            self.broker.claim(line, Direction::In, EdgeDetect::Both)?;
        }

        if let Some(trigger) = self.pending_trigger() {
            return Ok(Startup::Interrupted(trigger));
        }
        if !self.coordinator.mark_ready() {
            return Err(DaemonError::InvalidState(
                "shutdown began before the daemon was ready".into(),
            ));
        }
        Ok(Startup::Ready)
    }

    async fn wait_for_trigger(&mut self) -> ShutdownTrigger {
        // the daemon holds a sender itself, so this only ends on a trigger
        self.trigger_rx
            .recv()
            .await
            .unwrap_or(ShutdownTrigger::Signal(ProcessSignal::Terminate))
    }

    /// Runs until the first shutdown trigger. Every path ends in the
    /// coordinator's cleanup; an error means startup failed.
    pub async fn run(mut self) -> Result<(), DaemonError> {
        let mut failure = None;

        let trigger = match self.start() {
            Ok(Startup::Ready) => {
                info!("GPIO daemon ready");
                if let Some(led) = self.led.as_mut()
                    && let Err(e) = led.blink(BlinkPattern::READY).await
                {
                    warn!("ready indicator failed: {e}");
                }
                self.wait_for_trigger().await
            }
            Ok(Startup::Interrupted(trigger)) => trigger,
            Err(e) => {
                error!("setup failed: {e}");
                failure = Some(e);
                ShutdownTrigger::SetupFailed
            }
        };

        if let Some(plan) = self.coordinator.begin(trigger) {
            self.coordinator
                .execute(plan, self.led.as_mut(), &mut self.broker, self.power.as_ref())
                .await;
        }

        for monitor in self.monitors.drain(..) {
            monitor.abort();
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
