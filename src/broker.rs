use std::sync::Arc;

use log::{debug, info, warn};
use rustc_hash::FxHashMap;

use crate::error::DaemonError;
use crate::gpio::{Direction, EdgeDetect};
use crate::sysfs::SysfsControl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimedLine {
    pub line: u32,
    pub direction: Direction,
    pub edge: EdgeDetect,
}

/// Owns every line exported through sysfs and guarantees each is unexported
/// exactly once, at the latest when the broker is dropped.
pub struct LineBroker<S: SysfsControl> {
    sysfs: Arc<S>,
    claimed: FxHashMap<u32, ClaimedLine>,
}

impl<S: SysfsControl> LineBroker<S> {
    pub fn new(sysfs: Arc<S>) -> Self {
        Self {
            sysfs,
            claimed: FxHashMap::default(),
        }
    }

    pub fn claim(
        &mut self,
        line: u32,
        direction: Direction,
        edge: EdgeDetect,
    ) -> Result<(), DaemonError> {
        if self.claimed.contains_key(&line) {
            return Err(DaemonError::AlreadyClaimed(line));
        }
        if direction == Direction::Out && edge != EdgeDetect::None {
            return Err(DaemonError::InvalidState(format!(
                "edge detection requires an input on line {line}"
            )));
        }

        info!("Exporting GPIO line {line}");
        match self.sysfs.export(line) {
            Ok(()) => {}
            Err(DaemonError::Busy(e)) => {
                warn!("GPIO line {line} was already exported ({e}), taking ownership");
            }
            Err(e) => return Err(e),
        }

        // on the manifest before configuring, so a failure below still unexports it
        self.claimed.insert(
            line,
            ClaimedLine {
                line,
                direction,
                edge,
            },
        );

        self.sysfs.set_direction(line, direction)?;
        if edge != EdgeDetect::None {
            self.sysfs.set_edge(line, edge)?;
        }

        Ok(())
    }

    pub fn release(&mut self, line: u32) {
        match self.claimed.remove(&line) {
            Some(_) => Self::unexport(&self.sysfs, line),
            None => debug!("GPIO line {line} is not claimed, nothing to release"),
        }
    }

    pub fn release_all(&mut self) {
        for (line, _) in self.claimed.drain() {
            Self::unexport(&self.sysfs, line);
        }
    }

    fn unexport(sysfs: &S, line: u32) {
        info!("Unexporting GPIO line {line}");
        if let Err(e) = sysfs.unexport(line) {
            warn!("failed to unexport GPIO line {line}: {e}");
        }
    }

    pub fn is_claimed(&self, line: u32) -> bool {
        self.claimed.contains_key(&line)
    }

    pub fn claimed(&self) -> impl Iterator<Item = &ClaimedLine> {
        self.claimed.values()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}

impl<S: SysfsControl> Drop for LineBroker<S> {
    fn drop(&mut self) {
        if !self.claimed.is_empty() {
            warn!("{} GPIO lines still claimed on drop", self.claimed.len());
            self.release_all();
        }
    }
}
