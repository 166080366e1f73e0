use log::{debug, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, yield_now};
use std::time::Duration;

use libgpiod::{chip::Chip, line, line::EventClock, request};
use parking_lot::{FairMutex, RwLock};
use rustc_hash::FxHashMap;

use crate::error::DaemonError;
use crate::gpio::{
    Direction, EdgeDetect, EdgeEvent, EventHandler, GpioBackend, check_device_access,
};

const LIBGPIOD_BACKEND_EVENT_BUFFER_CAPACITY: usize = 64;
const LIBGPIOD_BACKEND_EVENT_WAIT_TIMEOUT_MS: Duration = Duration::from_millis(10);

pub struct LibgpiodBackend {
    chip: String,
    pins: RwLock<FxHashMap<u32, PinHandle>>, // keyed by line offset
}

struct PinHandle {
    _listener: Option<EdgeListener>, // stopped before the request is released
    direction: Direction,
    gpiod_handle: Arc<FairMutex<GpiodHandle>>,
}

struct GpiodHandle {
    request: request::Request,
}

impl GpiodHandle {
    fn new(chip: &str, line_cfg: &line::Config) -> Result<Self, DaemonError> {
        let chip = Self::open_chip(chip)?;
        let request = Self::request_lines(&chip, line_cfg)?;
        Ok(Self { request })
    }

    fn open_chip(path: &str) -> Result<Chip, DaemonError> {
        let p = PathBuf::from(path);
        check_device_access(&p)?;
        Chip::open(&p).map_err(|e| DaemonError::Gpio(format!("open chip {path}: {e}")))
    }

    fn request_lines(
        chip: &Chip,
        line_cfg: &line::Config,
    ) -> Result<request::Request, DaemonError> {
        let mut req_cfg = request::Config::new()
            .map_err(|e| DaemonError::Gpio(format!("request config: {e}")))?;
        req_cfg
            .set_consumer(env!("CARGO_PKG_NAME"))
            .map_err(|e| DaemonError::Gpio(format!("request consumer: {e}")))?;
        chip.request_lines(Some(&req_cfg), line_cfg)
            .map_err(|e| DaemonError::Gpio(format!("request lines: {e}")))
    }
}

struct EdgeListener {
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EdgeListener {
    fn new(
        offset: u32,
        gpiod_handle: Arc<FairMutex<GpiodHandle>>,
        handler: EventHandler,
    ) -> Result<Self, DaemonError> {
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_flag = cancel.clone();
        let mut buffer = request::Buffer::new(LIBGPIOD_BACKEND_EVENT_BUFFER_CAPACITY)
            .map_err(|e| DaemonError::Gpio(format!("event buffer: {e}")))?;

        let handle = std::thread::spawn(move || {
            while !cancel_flag.load(Ordering::Relaxed) {
                let hdl = gpiod_handle.lock();
                let req = &hdl.request;

                let has_event =
                    match req.wait_edge_events(Some(LIBGPIOD_BACKEND_EVENT_WAIT_TIMEOUT_MS)) {
                        Ok(v) => v,
                        Err(e) => {
                            warn!("wait edge events error for line {offset}: {e}");
                            yield_now();
                            continue;
                        }
                    };
                if !has_event {
                    continue;
                }

                let events = match req.read_edge_events(&mut buffer) {
                    Ok(evts) => evts,
                    Err(e) => {
                        warn!("read edge events error for line {offset}: {e}");
                        yield_now();
                        continue;
                    }
                };
                for evt in events {
                    let evt = match evt {
                        Ok(e) => e,
                        Err(_) => continue,
                    };
                    let edge = match evt.event_type() {
                        Ok(line::EdgeKind::Rising) => EdgeDetect::Rising,
                        Ok(line::EdgeKind::Falling) => EdgeDetect::Falling,
                        Err(_) => continue,
                    };

                    handler.dispatch(EdgeEvent {
                        line: offset,
                        edge,
                        timestamp_ms: evt.timestamp().as_millis() as u64,
                    });
                }
            }
        });

        Ok(Self {
            cancel,
            handle: Some(handle),
        })
    }
}

impl Drop for EdgeListener {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl LibgpiodBackend {
    pub fn new<S: Into<String>>(chip: S) -> Self {
        Self {
            chip: chip.into(),
            pins: RwLock::new(FxHashMap::default()),
        }
    }

    fn make_line_settings(direction: Direction) -> Result<line::Settings, DaemonError> {
        let mut ls = line::Settings::new()
            .map_err(|e| DaemonError::Gpio(format!("libgpiod settings: {e}")))?;

        match direction {
            Direction::Out => {
                ls.set_direction(line::Direction::Output)
                    .map_err(|e| DaemonError::Gpio(format!("set direction: {e}")))?;
                ls.set_drive(line::Drive::PushPull)
                    .map_err(|e| DaemonError::Gpio(format!("set drive: {e}")))?;
            }
            Direction::In => {
                ls.set_direction(line::Direction::Input)
                    .map_err(|e| DaemonError::Gpio(format!("set direction: {e}")))?;
                ls.set_bias(Some(line::Bias::PullUp))
                    .map_err(|e| DaemonError::Gpio(format!("set bias: {e}")))?;
                ls.set_edge_detection(Some(line::Edge::Both))
                    .map_err(|e| DaemonError::Gpio(format!("set edge detection: {e}")))?;
                ls.set_event_clock(EventClock::Realtime)
                    .map_err(|e| DaemonError::Gpio(format!("set event clock: {e}")))?;
            }
        }

        Ok(ls)
    }

    fn make_line_config(offset: u32, settings: line::Settings) -> Result<line::Config, DaemonError> {
        let mut cfg =
            line::Config::new().map_err(|e| DaemonError::Gpio(format!("line config: {e}")))?;
        cfg.add_line_settings(&[offset], settings)
            .map_err(|e| DaemonError::Gpio(format!("line config add settings: {e}")))?;
        Ok(cfg)
    }

    fn request(
        &self,
        offset: u32,
        direction: Direction,
    ) -> Result<Arc<FairMutex<GpiodHandle>>, DaemonError> {
        if self.pins.read().contains_key(&offset) {
            return Err(DaemonError::Busy(format!("line {offset} already requested")));
        }
        let line_settings = Self::make_line_settings(direction)?;
        let line_cfg = Self::make_line_config(offset, line_settings)?;
        debug!("requesting line {offset} on {} as {direction:?}", self.chip);
        let gpiod_handle = GpiodHandle::new(&self.chip, &line_cfg)?;
        Ok(Arc::new(FairMutex::new(gpiod_handle)))
    }
}

impl GpioBackend for LibgpiodBackend {
    fn watch_input(&self, offset: u32, handler: EventHandler) -> Result<(), DaemonError> {
        let gpiod_handle = self.request(offset, Direction::In)?;
        let listener = EdgeListener::new(offset, gpiod_handle.clone(), handler)?;

        self.pins.write().insert(
            offset,
            PinHandle {
                _listener: Some(listener),
                direction: Direction::In,
                gpiod_handle,
            },
        );
        Ok(())
    }

    fn drive_output(&self, offset: u32, initial: u8) -> Result<(), DaemonError> {
        let gpiod_handle = self.request(offset, Direction::Out)?;
        self.pins.write().insert(
            offset,
            PinHandle {
                _listener: None,
                direction: Direction::Out,
                gpiod_handle,
            },
        );
        self.write_value(offset, initial)
    }

    fn write_value(&self, offset: u32, value: u8) -> Result<(), DaemonError> {
        let pins = self.pins.read();
        let handle = pins
            .get(&offset)
            .ok_or_else(|| DaemonError::InvalidState(format!("line {offset} not requested")))?;

        if handle.direction != Direction::Out {
            return Err(DaemonError::InvalidState(
                "line must be in output mode to set value".into(),
            ));
        }

        handle
            .gpiod_handle
            .lock()
            .request
            .set_value(
                offset,
                match value {
                    0 => line::Value::InActive,
                    _ => line::Value::Active,
                },
            )
            .map_err(|e| DaemonError::Gpio(format!("set value: {e}")))?;
        Ok(())
    }

    fn read_value(&self, offset: u32) -> Result<u8, DaemonError> {
        let pins = self.pins.read();
        let handle = pins
            .get(&offset)
            .ok_or_else(|| DaemonError::InvalidState(format!("line {offset} not requested")))?;

        let value = handle
            .gpiod_handle
            .lock()
            .request
            .value(offset)
            .map_err(|e| DaemonError::Gpio(format!("get value: {e}")))?;
        Ok(match value {
            line::Value::InActive => 0,
            line::Value::Active => 1,
        })
    }
}
