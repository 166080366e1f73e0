use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::trace;
use tokio::sync::mpsc;

use crate::error::DaemonError;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDetect {
    #[default]
    None,
    Rising,
    Falling,
    Both,
}

impl EdgeDetect {
    pub fn as_sysfs(&self) -> &'static str {
        match self {
            EdgeDetect::None => "none",
            EdgeDetect::Rising => "rising",
            EdgeDetect::Falling => "falling",
            EdgeDetect::Both => "both",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_sysfs(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EdgeEvent {
    pub line: u32,
    pub edge: EdgeDetect,
    pub timestamp_ms: u64,
}

/// Forwards edges of one watched line into a single consumer, so handling
/// for a line is never entered twice at once.
pub struct EventCallbackHandler {
    line: u32,
    event_tx: mpsc::UnboundedSender<EdgeEvent>,
}

impl EventCallbackHandler {
    pub fn new(line: u32, event_tx: mpsc::UnboundedSender<EdgeEvent>) -> Self {
        Self { line, event_tx }
    }

    pub fn dispatch(&self, event: EdgeEvent) {
        if self.event_tx.send(event).is_err() {
            trace!("no consumer left for edges on line {}", self.line);
        }
    }
}

pub type EventHandler = Arc<EventCallbackHandler>;

/// Character-device style access to the button inputs and the status LED.
pub trait GpioBackend: Send + Sync {
    /// Requests `line` as a pulled-up input reporting both edges to `handler`.
    fn watch_input(&self, line: u32, handler: EventHandler) -> Result<(), DaemonError>;
    fn drive_output(&self, line: u32, initial: u8) -> Result<(), DaemonError>;
    fn write_value(&self, line: u32, value: u8) -> Result<(), DaemonError>;
    fn read_value(&self, line: u32) -> Result<u8, DaemonError>;
}

/// Opens a GPIO device read-write once, so missing rights surface as
/// `DaemonError::Privilege` instead of an opaque backend error.
pub fn check_device_access<P: AsRef<Path>>(path: P) -> Result<(), DaemonError> {
    let path = path.as_ref();
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map(drop)
        .map_err(|e| DaemonError::from_io(format!("open chip {}", path.display()), e))
}

pub(crate) fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
