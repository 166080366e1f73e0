use std::fmt;
use std::sync::Arc;

use log::{error, info, warn};
use parking_lot::Mutex;

use crate::broker::LineBroker;
use crate::gpio::GpioBackend;
use crate::indicator::{BlinkPattern, StatusLed};
use crate::power::{PowerAction, PowerControl};
use crate::sysfs::SysfsControl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonPhase {
    Initializing,
    Ready,
    ShuttingDown,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Shutdown,
    Reboot,
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Button::Shutdown => f.write_str("shutdown"),
            Button::Reboot => f.write_str("reboot"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSignal {
    Interrupt,
    Terminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    ButtonHeld(Button),
    Signal(ProcessSignal),
    SetupFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownAction {
    Halt,
    Reboot,
    AbortOnly,
}

impl ShutdownTrigger {
    pub fn action(&self) -> ShutdownAction {
        match self {
            ShutdownTrigger::ButtonHeld(Button::Shutdown) => ShutdownAction::Halt,
            ShutdownTrigger::ButtonHeld(Button::Reboot) => ShutdownAction::Reboot,
            ShutdownTrigger::Signal(_) | ShutdownTrigger::SetupFailed => ShutdownAction::AbortOnly,
        }
    }
}

impl ShutdownAction {
    pub fn power_action(&self) -> Option<PowerAction> {
        match self {
            ShutdownAction::Halt => Some(PowerAction::Halt),
            ShutdownAction::Reboot => Some(PowerAction::Reboot),
            ShutdownAction::AbortOnly => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownPlan {
    pub trigger: ShutdownTrigger,
    pub action: ShutdownAction,
    /// Only a daemon that reached Ready plays the shutdown pattern.
    pub announce: bool,
}

#[derive(Clone)]
pub struct PhaseHandle(Arc<Mutex<DaemonPhase>>);

impl PhaseHandle {
    pub fn get(&self) -> DaemonPhase {
        *self.0.lock()
    }
}

/// Single entry point for every shutdown trigger. The phase lock makes the
/// first trigger win; later ones are logged and dropped.
pub struct Coordinator {
    phase: Arc<Mutex<DaemonPhase>>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            phase: Arc::new(Mutex::new(DaemonPhase::Initializing)),
        }
    }

    pub fn phase(&self) -> DaemonPhase {
        *self.phase.lock()
    }

    pub fn handle(&self) -> PhaseHandle {
        PhaseHandle(self.phase.clone())
    }

    /// Initializing -> Ready. Returns false if shutdown already began.
    pub fn mark_ready(&self) -> bool {
        let mut phase = self.phase.lock();
        if *phase != DaemonPhase::Initializing {
            return false;
        }
        *phase = DaemonPhase::Ready;
        true
    }

    pub fn begin(&self, trigger: ShutdownTrigger) -> Option<ShutdownPlan> {
        let mut phase = self.phase.lock();
        let announce = match *phase {
            DaemonPhase::Initializing => false,
            DaemonPhase::Ready => true,
            DaemonPhase::ShuttingDown | DaemonPhase::Terminated => {
                info!("Ignoring {trigger:?}, shutdown already in progress");
                return None;
            }
        };
        *phase = DaemonPhase::ShuttingDown;

        Some(ShutdownPlan {
            trigger,
            action: trigger.action(),
            announce,
        })
    }

    /// Announces, releases every claimed line, then runs the power action.
    /// Nothing here aborts the sequence; failures are logged.
    pub async fn execute<G, S, P>(
        &self,
        plan: ShutdownPlan,
        led: Option<&mut StatusLed<G>>,
        broker: &mut LineBroker<S>,
        power: &P,
    ) where
        G: GpioBackend,
        S: SysfsControl,
        P: PowerControl + ?Sized,
    {
        match plan.trigger {
            ShutdownTrigger::ButtonHeld(button) => info!("{button} button held"),
            ShutdownTrigger::Signal(sig) => info!("Received {sig:?}, shutting down"),
            ShutdownTrigger::SetupFailed => warn!("Setup failed, releasing claimed lines"),
        }

        if plan.announce
            && let Some(led) = led
            && let Err(e) = led.blink(BlinkPattern::SHUTDOWN).await
        {
            warn!("shutdown indicator failed: {e}");
        }

        broker.release_all();

        if let Some(action) = plan.action.power_action() {
            info!("Invoking system {action}");
            if let Err(e) = power.execute(action) {
                error!("{e}");
            }
        }

        *self.phase.lock() = DaemonPhase::Terminated;
    }
}
