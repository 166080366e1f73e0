use std::process::Command;
use std::time::Duration;

use gpiodaemon::{ProcessSignal, ShutdownTrigger, SignalAdapter};
use tokio::sync::mpsc;
use tokio::time::timeout;

fn send_to_self(signal: &str) {
    let status = Command::new("kill")
        .args([signal, &std::process::id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());
}

// one test: both signals are process-wide
#[tokio::test]
async fn termination_signals_become_shutdown_triggers() {
    let adapter = SignalAdapter::new().unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    adapter.spawn_forwarder(tx);

    send_to_self("-TERM");
    let trigger = timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(trigger, ShutdownTrigger::Signal(ProcessSignal::Terminate));

    send_to_self("-INT");
    let trigger = timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(trigger, ShutdownTrigger::Signal(ProcessSignal::Interrupt));
}
