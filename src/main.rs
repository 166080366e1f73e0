use log::info;
use std::process::ExitCode;
use std::sync::Arc;

use gpiodaemon::{CONFIG_PATH, Daemon, DaemonConfig, SignalAdapter, SysfsInterface, SystemPower};

#[cfg(feature = "hardware-gpio")]
use gpiodaemon::LibgpiodBackend;
#[cfg(not(feature = "hardware-gpio"))]
use gpiodaemon::MockGpioBackend;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // installed first: a signal at any later point goes through cleanup
    let signals = match SignalAdapter::new() {
        Ok(signals) => signals,
        Err(e) => {
            eprintln!("{}", e.startup_message());
            return ExitCode::FAILURE;
        }
    };

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("GPIODAEMON_CONFIG").ok())
        .unwrap_or_else(|| CONFIG_PATH.to_string());
    let config = DaemonConfig::load_from_file(&config_path);
    info!(
        "Using {:?}, sensor mode {}",
        config.pins, config.sensor_mode
    );

    let gpio = {
        #[cfg(feature = "hardware-gpio")]
        {
            Arc::new(LibgpiodBackend::new(config.gpio_chip.clone()))
        }
        #[cfg(not(feature = "hardware-gpio"))]
        {
            Arc::new(MockGpioBackend::default())
        }
    };
    let sysfs = Arc::new(SysfsInterface::new(config.sysfs_root.clone()));

    let daemon = Daemon::new(config, gpio, sysfs, Arc::new(SystemPower));
    signals.spawn_forwarder(daemon.trigger_sender());

    match daemon.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.startup_message());
            ExitCode::FAILURE
        }
    }
}
