use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use crate::error::DaemonError;
use crate::gpio::GpioBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkPattern {
    pub on: Duration,
    pub off: Duration,
    pub cycles: u32,
}

impl BlinkPattern {
    pub const READY: Self = Self {
        on: Duration::from_millis(500),
        off: Duration::from_millis(500),
        cycles: 3,
    };

    pub const SHUTDOWN: Self = Self {
        on: Duration::from_millis(200),
        off: Duration::from_millis(200),
        cycles: 3,
    };

    pub fn duration(&self) -> Duration {
        (self.on + self.off) * self.cycles
    }
}

/// The "system ready" LED. Blinking borrows it mutably, so two patterns can
/// never interleave on the line.
pub struct StatusLed<B: GpioBackend> {
    backend: Arc<B>,
    line: u32,
}

impl<B: GpioBackend> StatusLed<B> {
    /// Requests the line as an output that starts lit.
    pub fn new(backend: Arc<B>, line: u32) -> Result<Self, DaemonError> {
        backend.drive_output(line, 1)?;
        Ok(Self { backend, line })
    }

    pub fn on(&mut self) -> Result<(), DaemonError> {
        self.backend.write_value(self.line, 1)
    }

    pub fn off(&mut self) -> Result<(), DaemonError> {
        self.backend.write_value(self.line, 0)
    }

    /// Runs the whole pattern and leaves the LED on.
    pub async fn blink(&mut self, pattern: BlinkPattern) -> Result<(), DaemonError> {
        for _ in 0..pattern.cycles {
            self.on()?;
            sleep(pattern.on).await;
            self.off()?;
            sleep(pattern.off).await;
        }
        self.on()
    }
}
