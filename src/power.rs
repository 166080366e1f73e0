use std::fmt;
use std::process::Command;

use log::info;

use crate::error::DaemonError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Halt,
    Reboot,
}

impl PowerAction {
    fn shutdown_flag(&self) -> &'static str {
        match self {
            PowerAction::Halt => "-h",
            PowerAction::Reboot => "-r",
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerAction::Halt => f.write_str("halt"),
            PowerAction::Reboot => f.write_str("reboot"),
        }
    }
}

pub trait PowerControl: Send + Sync {
    fn execute(&self, action: PowerAction) -> Result<(), DaemonError>;
}

/// Calls the system `shutdown` command. The OS usually kills the daemon
/// before this returns.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPower;

impl PowerControl for SystemPower {
    fn execute(&self, action: PowerAction) -> Result<(), DaemonError> {
        info!("Running shutdown {} now", action.shutdown_flag());
        let status = Command::new("shutdown")
            .args([action.shutdown_flag(), "now"])
            .status()
            .map_err(|e| DaemonError::Power(format!("spawn shutdown: {e}")))?;
        if !status.success() {
            return Err(DaemonError::Power(format!("shutdown {action} exited with {status}")));
        }
        Ok(())
    }
}
