use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::trace;

use crate::error::DaemonError;
use crate::gpio::{Direction, EdgeDetect};

/// The kernel's file based GPIO control surface.
pub trait SysfsControl: Send + Sync {
    fn export(&self, line: u32) -> Result<(), DaemonError>;
    fn unexport(&self, line: u32) -> Result<(), DaemonError>;
    fn set_direction(&self, line: u32, direction: Direction) -> Result<(), DaemonError>;
    fn set_edge(&self, line: u32, edge: EdgeDetect) -> Result<(), DaemonError>;
}

pub struct SysfsInterface {
    root: PathBuf,
}

impl SysfsInterface {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn line_attr(&self, line: u32, attr: &str) -> PathBuf {
        self.root.join(format!("gpio{line}")).join(attr)
    }

    // attributes are never created, only written
    fn write_attr(&self, path: &Path, value: &str) -> Result<(), DaemonError> {
        trace!("{} <- {value}", path.display());
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| DaemonError::from_io(format!("open {}", path.display()), e))?;
        file.write_all(value.as_bytes())
            .map_err(|e| DaemonError::from_io(format!("write {}", path.display()), e))
    }
}

impl SysfsControl for SysfsInterface {
    fn export(&self, line: u32) -> Result<(), DaemonError> {
        self.write_attr(&self.root.join("export"), &line.to_string())
    }

    fn unexport(&self, line: u32) -> Result<(), DaemonError> {
        self.write_attr(&self.root.join("unexport"), &line.to_string())
    }

    fn set_direction(&self, line: u32, direction: Direction) -> Result<(), DaemonError> {
        self.write_attr(&self.line_attr(line, "direction"), direction.as_sysfs())
    }

    fn set_edge(&self, line: u32, edge: EdgeDetect) -> Result<(), DaemonError> {
        self.write_attr(&self.line_attr(line, "edge"), edge.as_sysfs())
    }
}
