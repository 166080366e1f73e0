use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use configparser::ini::Ini;
use log::debug;

use crate::error::DaemonError;

pub const CONFIG_PATH: &str = "/etc/rpi2caster.conf";
pub const INTERFACE_SECTION: &str = "Interface";
const DEFAULT_SECTION: &str = "DEFAULT";

pub const DEFAULT_SENSOR_GPIO: u32 = 17;
pub const DEFAULT_LED_GPIO: u32 = 18;
pub const DEFAULT_STOP_GPIO: u32 = 22;
pub const DEFAULT_REBOOT_GPIO: u32 = 23;
pub const DEFAULT_SHUTDOWN_GPIO: u32 = 24;

pub const DEFAULT_GPIO_CHIP: &str = "/dev/gpiochip0";
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";
pub const HOLD_TIME: Duration = Duration::from_secs(2);

/// Sections and keys read from an INI-style configuration file.
///
/// Section and key names are case-insensitive. Keys of a `[DEFAULT]`
/// section back every other section that exists in the file.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    ini: Ini,
}

impl Default for ConfigSource {
    fn default() -> Self {
        Self { ini: Ini::new() }
    }
}

impl ConfigSource {
    /// Never fails: an unreadable or malformed file yields an empty source.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::read(path) {
            Ok(source) => source,
            Err(e) => {
                debug!("{e}; using compiled-in defaults");
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Self, DaemonError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            DaemonError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, DaemonError> {
        let mut ini = Ini::new();
        ini.read(contents.to_string())
            .map_err(|e| DaemonError::Config(format!("Invalid config: {e}")))?;
        Ok(Self { ini })
    }

    fn lookup(&self, section: &str, key: &str) -> Option<String> {
        if !self
            .ini
            .get_map_ref()
            .contains_key(&section.to_ascii_lowercase())
        {
            return None;
        }
        self.ini
            .get(section, key)
            .or_else(|| self.ini.get(DEFAULT_SECTION, key))
    }

    /// Returns the parsed value, or `default` when the section or key is
    /// missing or the value does not parse as `T`.
    pub fn get<T: FromStr>(&self, section: &str, key: &str, default: T) -> T {
        match self.lookup(section, key) {
            Some(raw) => match raw.parse() {
                Ok(value) => value,
                Err(_) => {
                    debug!("[{section}] {key} = {raw:?} is not valid, using default");
                    default
                }
            },
            None => default,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SensorMode {
    Sysfs,
    #[default]
    Simulation,
}

impl FromStr for SensorMode {
    type Err = DaemonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sysfs" => Ok(SensorMode::Sysfs),
            "simulation" => Ok(SensorMode::Simulation),
            other => Err(DaemonError::Config(format!("unknown sensor mode {other:?}"))),
        }
    }
}

impl fmt::Display for SensorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorMode::Sysfs => f.write_str("sysfs"),
            SensorMode::Simulation => f.write_str("simulation"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinAssignment {
    pub sensor: u32,
    pub emergency_stop: u32,
    pub shutdown_button: u32,
    pub reboot_button: u32,
    pub status_led: u32,
}

impl Default for PinAssignment {
    fn default() -> Self {
        Self {
            sensor: DEFAULT_SENSOR_GPIO,
            emergency_stop: DEFAULT_STOP_GPIO,
            shutdown_button: DEFAULT_SHUTDOWN_GPIO,
            reboot_button: DEFAULT_REBOOT_GPIO,
            status_led: DEFAULT_LED_GPIO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub pins: PinAssignment,
    pub sensor_mode: SensorMode,
    pub gpio_chip: String,
    pub sysfs_root: PathBuf,
    pub hold_time: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            pins: PinAssignment::default(),
            sensor_mode: SensorMode::default(),
            gpio_chip: DEFAULT_GPIO_CHIP.to_string(),
            sysfs_root: PathBuf::from(SYSFS_GPIO_ROOT),
            hold_time: HOLD_TIME,
        }
    }
}

impl DaemonConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        Self::resolve(&ConfigSource::load_from_file(path))
    }

    pub fn resolve(source: &ConfigSource) -> Self {
        let get_pin = |key: &str, default: u32| source.get(INTERFACE_SECTION, key, default);

        Self {
            pins: PinAssignment {
                sensor: get_pin("sensor_gpio", DEFAULT_SENSOR_GPIO),
                emergency_stop: get_pin("emergency_stop_gpio", DEFAULT_STOP_GPIO),
                shutdown_button: get_pin("shutdown_gpio", DEFAULT_SHUTDOWN_GPIO),
                reboot_button: get_pin("reboot_gpio", DEFAULT_REBOOT_GPIO),
                status_led: get_pin("led_gpio", DEFAULT_LED_GPIO),
            },
            sensor_mode: source.get(INTERFACE_SECTION, "sensor", SensorMode::default()),
            gpio_chip: source.get(
                INTERFACE_SECTION,
                "gpio_chip",
                DEFAULT_GPIO_CHIP.to_string(),
            ),
            ..Self::default()
        }
    }

    /// Lines handed to the unprivileged application through sysfs, in claim order.
    pub fn sysfs_lines(&self) -> Vec<u32> {
        let mut lines = Vec::with_capacity(2);
        if self.sensor_mode == SensorMode::Sysfs {
            lines.push(self.pins.sensor);
        }
        lines.push(self.pins.emergency_stop);
        lines
    }
}
