use std::sync::Arc;
use std::time::Duration;

use gpiodaemon::{
    Button, ButtonMonitor, ButtonState, EdgeDetect, HOLD_TIME, MockGpioBackend, ShutdownTrigger,
};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};

#[test]
fn short_press_never_fires() {
    let t0 = Instant::now();
    let mut state = ButtonState::new(HOLD_TIME);

    state.on_edge(EdgeDetect::Falling, t0);
    assert!(!state.poll(t0 + Duration::from_millis(1999)));
    state.on_edge(EdgeDetect::Rising, t0 + Duration::from_millis(1999));

    assert!(!state.is_pressed());
    assert_eq!(state.deadline(), None);
    assert!(!state.poll(t0 + Duration::from_secs(5)));
}

#[test]
fn hold_fires_once_per_press() {
    let t0 = Instant::now();
    let mut state = ButtonState::new(HOLD_TIME);

    state.on_edge(EdgeDetect::Falling, t0);
    assert_eq!(state.deadline(), Some(t0 + HOLD_TIME));
    assert!(state.poll(t0 + HOLD_TIME));
    assert!(!state.poll(t0 + Duration::from_secs(10)));
    assert_eq!(state.deadline(), None);

    // a bouncing falling edge mid-press does not restart the hold
    state.on_edge(EdgeDetect::Falling, t0 + Duration::from_secs(3));
    assert!(!state.poll(t0 + Duration::from_secs(6)));

    state.on_edge(EdgeDetect::Rising, t0 + Duration::from_secs(7));
    state.on_edge(EdgeDetect::Falling, t0 + Duration::from_secs(8));
    assert!(state.poll(t0 + Duration::from_secs(10)));
}

fn watched(line: u32, button: Button) -> (Arc<MockGpioBackend>, mpsc::UnboundedReceiver<ShutdownTrigger>) {
    let gpio = Arc::new(MockGpioBackend::default());
    let (tx, rx) = mpsc::unbounded_channel();
    ButtonMonitor::new(button, line, HOLD_TIME)
        .spawn(gpio.as_ref(), tx)
        .unwrap();
    assert!(gpio.is_watched(line));
    (gpio, rx)
}

#[tokio::test(start_paused = true)]
async fn monitor_reports_sustained_press() {
    let (gpio, mut rx) = watched(24, Button::Shutdown);

    gpio.set_input(24, 0).unwrap();
    sleep(Duration::from_millis(2100)).await;

    assert_eq!(rx.try_recv().unwrap(), ShutdownTrigger::ButtonHeld(Button::Shutdown));
    assert!(rx.try_recv().is_err());

    // still held: no repeat
    sleep(Duration::from_secs(5)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn monitor_ignores_short_press() {
    let (gpio, mut rx) = watched(23, Button::Reboot);

    gpio.set_input(23, 0).unwrap();
    sleep(Duration::from_secs(1)).await;
    gpio.set_input(23, 1).unwrap();
    sleep(Duration::from_secs(5)).await;

    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn monitor_reports_each_separate_hold() {
    let (gpio, mut rx) = watched(23, Button::Reboot);

    for _ in 0..2 {
        gpio.set_input(23, 0).unwrap();
        sleep(Duration::from_secs(3)).await;
        gpio.set_input(23, 1).unwrap();
        sleep(Duration::from_millis(100)).await;
    }

    assert_eq!(rx.try_recv().unwrap(), ShutdownTrigger::ButtonHeld(Button::Reboot));
    assert_eq!(rx.try_recv().unwrap(), ShutdownTrigger::ButtonHeld(Button::Reboot));
    assert!(rx.try_recv().is_err());
}

#[test]
fn second_watch_on_a_line_is_refused() {
    let gpio = MockGpioBackend::default();
    let (tx, _rx) = mpsc::unbounded_channel();
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let _guard = rt.enter();

    ButtonMonitor::new(Button::Shutdown, 24, HOLD_TIME)
        .spawn(&gpio, tx.clone())
        .unwrap();
    assert!(
        ButtonMonitor::new(Button::Reboot, 24, HOLD_TIME)
            .spawn(&gpio, tx)
            .is_err()
    );
}

#[tokio::test(start_paused = true)]
async fn button_held_before_watching_is_reported() {
    let gpio = Arc::new(MockGpioBackend::default());
    gpio.set_initial_level(24, 0).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    ButtonMonitor::new(Button::Shutdown, 24, HOLD_TIME)
        .spawn(gpio.as_ref(), tx)
        .unwrap();

    // no edge ever arrives
    sleep(Duration::from_millis(1900)).await;
    assert!(rx.try_recv().is_err());
    sleep(Duration::from_millis(200)).await;
    assert_eq!(rx.try_recv().unwrap(), ShutdownTrigger::ButtonHeld(Button::Shutdown));

    // releasing re-arms the button
    gpio.set_input(24, 1).unwrap();
    gpio.set_input(24, 0).unwrap();
    sleep(Duration::from_millis(2100)).await;
    assert_eq!(rx.try_recv().unwrap(), ShutdownTrigger::ButtonHeld(Button::Shutdown));
}

#[test]
fn sampled_level_seeds_press_state() {
    let t0 = Instant::now();
    let mut state = ButtonState::new(HOLD_TIME);

    state.on_level(1, t0);
    assert!(!state.is_pressed());

    state.on_level(0, t0);
    assert_eq!(state.deadline(), Some(t0 + HOLD_TIME));
}
