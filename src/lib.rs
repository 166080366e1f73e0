mod backend;
mod broker;
mod button;
mod config;
mod coordinator;
mod daemon;
mod error;
mod gpio;
mod indicator;
mod power;
mod signals;
mod sysfs;

pub use broker::{ClaimedLine, LineBroker};
pub use button::{ButtonMonitor, ButtonState};
pub use config::{
    CONFIG_PATH, ConfigSource, DEFAULT_GPIO_CHIP, DEFAULT_LED_GPIO, DEFAULT_REBOOT_GPIO,
    DEFAULT_SENSOR_GPIO, DEFAULT_SHUTDOWN_GPIO, DEFAULT_STOP_GPIO, DaemonConfig, HOLD_TIME,
    INTERFACE_SECTION, PinAssignment, SYSFS_GPIO_ROOT, SensorMode,
};
pub use coordinator::{
    Button, Coordinator, DaemonPhase, PhaseHandle, ProcessSignal, ShutdownAction, ShutdownPlan,
    ShutdownTrigger,
};
pub use daemon::Daemon;
pub use error::DaemonError;
pub use gpio::{
    Direction, EdgeDetect, EdgeEvent, EventCallbackHandler, EventHandler, GpioBackend,
    check_device_access,
};
pub use indicator::{BlinkPattern, StatusLed};
pub use power::{PowerAction, PowerControl, SystemPower};
pub use signals::SignalAdapter;
pub use sysfs::{SysfsControl, SysfsInterface};

#[cfg(feature = "hardware-gpio")]
pub use backend::LibgpiodBackend;
pub use backend::{MockGpioBackend, MockPower, MockSysfs};
