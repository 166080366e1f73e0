use std::fmt::Display;
use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Permission denied: {0}")]
    Privilege(String),
    #[error("Resource busy: {0}")]
    Busy(String),
    #[error("Line already claimed: {0}")]
    AlreadyClaimed(u32),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("GPIO error: {0}")]
    Gpio(String),
    #[error("Power action failed: {0}")]
    Power(String),
    #[error("Signal handling error: {0}")]
    Signal(String),
}

impl DaemonError {
    pub fn from_io(context: impl Display, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => DaemonError::Privilege(format!("{context}: {err}")),
            io::ErrorKind::ResourceBusy => DaemonError::Busy(format!("{context}: {err}")),
            _ => DaemonError::Gpio(format!("{context}: {err}")),
        }
    }

    pub fn is_privilege(&self) -> bool {
        matches!(self, DaemonError::Privilege(_))
    }

    /// What an operator sees when the privileged setup fails.
    pub fn startup_message(&self) -> String {
        format!("{self}\nYou must run this program as root!")
    }
}
