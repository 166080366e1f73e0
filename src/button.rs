use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use crate::coordinator::{Button, ShutdownTrigger};
use crate::error::DaemonError;
use crate::gpio::{EdgeDetect, EdgeEvent, EventCallbackHandler, GpioBackend};

/// Press tracking for one pulled-up button: a falling edge starts a press,
/// a rising edge ends it.
#[derive(Debug, Clone)]
pub struct ButtonState {
    hold_time: Duration,
    pressed_since: Option<Instant>,
    fired: bool,
}

impl ButtonState {
    pub fn new(hold_time: Duration) -> Self {
        Self {
            hold_time,
            pressed_since: None,
            fired: false,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed_since.is_some()
    }

    /// Seeds the state from a sampled level; low means pressed.
    pub fn on_level(&mut self, level: u8, now: Instant) {
        let edge = match level {
            0 => EdgeDetect::Falling,
            _ => EdgeDetect::Rising,
        };
        self.on_edge(edge, now);
    }

    pub fn on_edge(&mut self, edge: EdgeDetect, now: Instant) {
        match edge {
            EdgeDetect::Falling => {
                if self.pressed_since.is_none() {
                    self.pressed_since = Some(now);
                    self.fired = false;
                }
            }
            EdgeDetect::Rising => {
                self.pressed_since = None;
                self.fired = false;
            }
            EdgeDetect::None | EdgeDetect::Both => {}
        }
    }

    /// When the current press qualifies as a hold, unless it already fired.
    pub fn deadline(&self) -> Option<Instant> {
        if self.fired {
            return None;
        }
        self.pressed_since.map(|since| since + self.hold_time)
    }

    /// True exactly once per press that lasts at least the hold time.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.pressed_since {
            Some(since) if !self.fired && now.duration_since(since) >= self.hold_time => {
                self.fired = true;
                true
            }
            _ => false,
        }
    }
}

pub struct ButtonMonitor {
    button: Button,
    line: u32,
    hold_time: Duration,
}

impl ButtonMonitor {
    pub fn new(button: Button, line: u32, hold_time: Duration) -> Self {
        Self {
            button,
            line,
            hold_time,
        }
    }

    /// Subscribes to the line's edges and reports holds as triggers. Edges
    /// are consumed by one task, so a hold is never handled twice at once.
    pub fn spawn<B>(
        self,
        backend: &B,
        triggers: mpsc::UnboundedSender<ShutdownTrigger>,
    ) -> Result<JoinHandle<()>, DaemonError>
    where
        B: GpioBackend + ?Sized,
    {
        let (edge_tx, edge_rx) = mpsc::unbounded_channel();
        let handler = Arc::new(EventCallbackHandler::new(self.line, edge_tx));
        backend.watch_input(self.line, handler)?;
        debug!("watching {} button on line {}", self.button, self.line);

        // a press already in progress counts from the moment of watching
        let mut state = ButtonState::new(self.hold_time);
        state.on_level(backend.read_value(self.line)?, Instant::now());

        Ok(tokio::spawn(self.watch(state, edge_rx, triggers)))
    }

    async fn watch(
        self,
        mut state: ButtonState,
        mut edges: mpsc::UnboundedReceiver<EdgeEvent>,
        triggers: mpsc::UnboundedSender<ShutdownTrigger>,
    ) {
        loop {
            let deadline = state.deadline();
            tokio::select! {
                edge = edges.recv() => {
                    let Some(edge) = edge else { break; };
                    debug!("line {} {:?} edge at {}ms", edge.line, edge.edge, edge.timestamp_ms);
                    state.on_edge(edge.edge, Instant::now());
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if state.poll(Instant::now()) {
                        info!("{} button held on line {}", self.button, self.line);
                        if triggers.send(ShutdownTrigger::ButtonHeld(self.button)).is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
}
