use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use parking_lot::Mutex as PLMutex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::DaemonError;
use crate::gpio::{Direction, EdgeDetect, EdgeEvent, EventHandler, GpioBackend, epoch_millis};
use crate::power::{PowerAction, PowerControl};
use crate::sysfs::SysfsControl;

#[derive(Default)]
pub struct MockGpioBackend {
    pins: RwLock<HashMap<u32, Mutex<MockPinState>>>, // keyed by line
    initial_levels: Mutex<HashMap<u32, u8>>,
}

struct MockPinState {
    direction: Direction,
    value: u8,
    handler: Option<EventHandler>,
    driven: Vec<u8>,
}

impl MockGpioBackend {
    fn request(&self, line: u32, state: MockPinState) -> Result<(), DaemonError> {
        let mut pins = self
            .pins
            .write()
            .map_err(|e| DaemonError::Gpio(format!("lock poisoned: {e}")))?;
        if pins.contains_key(&line) {
            return Err(DaemonError::Busy(format!("line {line} already requested")));
        }
        pins.insert(line, Mutex::new(state));
        Ok(())
    }

    fn with_pin<T>(
        &self,
        line: u32,
        f: impl FnOnce(&mut MockPinState) -> Result<T, DaemonError>,
    ) -> Result<T, DaemonError> {
        let pins = self
            .pins
            .read()
            .map_err(|e| DaemonError::Gpio(format!("lock poisoned: {e}")))?;
        let entry = pins
            .get(&line)
            .ok_or_else(|| DaemonError::InvalidState(format!("line {line} not requested")))?;
        let mut pin = entry
            .lock()
            .map_err(|e| DaemonError::Gpio(format!("lock poisoned: {e}")))?;
        f(&mut pin)
    }

    /// Simulates the external level of an input line, dispatching the edge
    /// when the level changes.
    pub fn set_input(&self, line: u32, value: u8) -> Result<(), DaemonError> {
        self.with_pin(line, |pin| {
            if pin.direction != Direction::In {
                return Err(DaemonError::InvalidState(format!(
                    "line {line} is not an input"
                )));
            }
            let old = pin.value;
            pin.value = value;

            let edge = match (old, value) {
                (0, 1) => EdgeDetect::Rising,
                (1, 0) => EdgeDetect::Falling,
                _ => return Ok(()),
            };
            if let Some(h) = &pin.handler {
                h.dispatch(EdgeEvent {
                    line,
                    edge,
                    timestamp_ms: epoch_millis(),
                });
            }
            Ok(())
        })
    }

    /// Level an input reports once watched; pulled-up lines idle at 1.
    pub fn set_initial_level(&self, line: u32, value: u8) -> Result<(), DaemonError> {
        self.initial_levels
            .lock()
            .map_err(|e| DaemonError::Gpio(format!("lock poisoned: {e}")))?
            .insert(line, value);
        Ok(())
    }

    pub fn value(&self, line: u32) -> Option<u8> {
        self.with_pin(line, |pin| Ok(pin.value)).ok()
    }

    /// Every level driven on an output line, the initial one included.
    pub fn driven(&self, line: u32) -> Vec<u8> {
        self.with_pin(line, |pin| Ok(pin.driven.clone()))
            .unwrap_or_default()
    }

    pub fn is_watched(&self, line: u32) -> bool {
        self.with_pin(line, |pin| Ok(pin.handler.is_some()))
            .unwrap_or(false)
    }
}

impl GpioBackend for MockGpioBackend {
    fn watch_input(&self, line: u32, handler: EventHandler) -> Result<(), DaemonError> {
        let value = self
            .initial_levels
            .lock()
            .map_err(|e| DaemonError::Gpio(format!("lock poisoned: {e}")))?
            .get(&line)
            .copied()
            .unwrap_or(1);
        self.request(
            line,
            MockPinState {
                direction: Direction::In,
                value,
                handler: Some(handler),
                driven: Vec::new(),
            },
        )
    }

    fn drive_output(&self, line: u32, initial: u8) -> Result<(), DaemonError> {
        self.request(
            line,
            MockPinState {
                direction: Direction::Out,
                value: initial,
                handler: None,
                driven: vec![initial],
            },
        )
    }

    fn write_value(&self, line: u32, value: u8) -> Result<(), DaemonError> {
        self.with_pin(line, |pin| {
            if pin.direction != Direction::Out {
                return Err(DaemonError::InvalidState(
                    "line must be in output mode to set value".into(),
                ));
            }
            pin.value = value;
            pin.driven.push(value);
            Ok(())
        })
    }

    fn read_value(&self, line: u32) -> Result<u8, DaemonError> {
        self.with_pin(line, |pin| Ok(pin.value))
    }
}

#[derive(Default)]
struct MockSysfsState {
    exported: FxHashSet<u32>,
    exports: FxHashMap<u32, usize>,
    unexports: FxHashMap<u32, usize>,
    directions: FxHashMap<u32, Direction>,
    edges: FxHashMap<u32, EdgeDetect>,
    deny_all: bool,
    denied: FxHashSet<u32>,
    broken_direction: FxHashSet<u32>,
}

/// In-memory stand-in for `/sys/class/gpio` with fault injection.
#[derive(Default)]
pub struct MockSysfs {
    state: PLMutex<MockSysfsState>,
}

impl MockSysfs {
    /// Every write fails as it would for an unprivileged process.
    pub fn denying() -> Self {
        let sysfs = Self::default();
        sysfs.state.lock().deny_all = true;
        sysfs
    }

    pub fn deny_line(&self, line: u32) {
        self.state.lock().denied.insert(line);
    }

    pub fn break_direction(&self, line: u32) {
        self.state.lock().broken_direction.insert(line);
    }

    /// Marks `line` as exported by someone else.
    pub fn preexport(&self, line: u32) {
        self.state.lock().exported.insert(line);
    }

    pub fn exported(&self) -> Vec<u32> {
        let mut lines: Vec<u32> = self.state.lock().exported.iter().copied().collect();
        lines.sort_unstable();
        lines
    }

    pub fn export_count(&self, line: u32) -> usize {
        self.state.lock().exports.get(&line).copied().unwrap_or(0)
    }

    pub fn unexport_count(&self, line: u32) -> usize {
        self.state.lock().unexports.get(&line).copied().unwrap_or(0)
    }

    pub fn direction(&self, line: u32) -> Option<Direction> {
        self.state.lock().directions.get(&line).copied()
    }

    pub fn edge(&self, line: u32) -> Option<EdgeDetect> {
        self.state.lock().edges.get(&line).copied()
    }
}

impl MockSysfsState {
    fn check_access(&self, line: u32) -> Result<(), DaemonError> {
        if self.deny_all || self.denied.contains(&line) {
            return Err(DaemonError::Privilege(format!(
                "write gpio{line}: permission denied"
            )));
        }
        Ok(())
    }

    fn check_exported(&self, line: u32) -> Result<(), DaemonError> {
        if !self.exported.contains(&line) {
            return Err(DaemonError::Gpio(format!("gpio{line}: no such file or directory")));
        }
        Ok(())
    }
}

impl SysfsControl for MockSysfs {
    fn export(&self, line: u32) -> Result<(), DaemonError> {
        let mut state = self.state.lock();
        state.check_access(line)?;
        if state.exported.contains(&line) {
            return Err(DaemonError::Busy(format!("export {line}: device or resource busy")));
        }
        state.exported.insert(line);
        *state.exports.entry(line).or_default() += 1;
        Ok(())
    }

    fn unexport(&self, line: u32) -> Result<(), DaemonError> {
        let mut state = self.state.lock();
        state.check_access(line)?;
        *state.unexports.entry(line).or_default() += 1;
        if !state.exported.remove(&line) {
            return Err(DaemonError::Gpio(format!("unexport {line}: invalid argument")));
        }
        state.directions.remove(&line);
        state.edges.remove(&line);
        Ok(())
    }

    fn set_direction(&self, line: u32, direction: Direction) -> Result<(), DaemonError> {
        let mut state = self.state.lock();
        state.check_access(line)?;
        state.check_exported(line)?;
        if state.broken_direction.contains(&line) {
            return Err(DaemonError::Gpio(format!("gpio{line}/direction: I/O error")));
        }
        state.directions.insert(line, direction);
        Ok(())
    }

    fn set_edge(&self, line: u32, edge: EdgeDetect) -> Result<(), DaemonError> {
        let mut state = self.state.lock();
        state.check_access(line)?;
        state.check_exported(line)?;
        state.edges.insert(line, edge);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockPower {
    actions: PLMutex<Vec<PowerAction>>,
}

impl MockPower {
    pub fn actions(&self) -> Vec<PowerAction> {
        self.actions.lock().clone()
    }
}

impl PowerControl for MockPower {
    fn execute(&self, action: PowerAction) -> Result<(), DaemonError> {
        self.actions.lock().push(action);
        Ok(())
    }
}
