use std::fs;
use std::path::Path;
use std::sync::Arc;

use gpiodaemon::{
    DaemonError, Direction, EdgeDetect, LineBroker, MockSysfs, SysfsControl, SysfsInterface,
};

fn fake_sysfs(root: &Path, lines: &[u32]) {
    fs::write(root.join("export"), "").unwrap();
    fs::write(root.join("unexport"), "").unwrap();
    for line in lines {
        let dir = root.join(format!("gpio{line}"));
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("direction"), "").unwrap();
        fs::write(dir.join("edge"), "").unwrap();
    }
}

#[test]
fn sysfs_interface_writes_control_files() {
    let dir = tempfile::tempdir().unwrap();
    fake_sysfs(dir.path(), &[22]);
    let mut broker = LineBroker::new(Arc::new(SysfsInterface::new(dir.path())));

    broker.claim(22, Direction::In, EdgeDetect::Both).unwrap();

    assert_eq!(fs::read_to_string(dir.path().join("export")).unwrap(), "22");
    assert_eq!(
        fs::read_to_string(dir.path().join("gpio22/direction")).unwrap(),
        "in"
    );
    assert_eq!(fs::read_to_string(dir.path().join("gpio22/edge")).unwrap(), "both");

    broker.release(22);
    assert_eq!(fs::read_to_string(dir.path().join("unexport")).unwrap(), "22");
    assert!(broker.is_empty());
}

#[test]
fn sysfs_interface_never_creates_attributes() {
    let dir = tempfile::tempdir().unwrap();
    let sysfs = SysfsInterface::new(dir.path());

    let err = sysfs.export(17).unwrap_err();
    assert!(matches!(err, DaemonError::Gpio(_)));
    assert!(!dir.path().join("export").exists());
}

#[test]
fn failed_configuration_still_releases_exported_line() {
    let dir = tempfile::tempdir().unwrap();
    // export works but gpio17/ never appears
    fake_sysfs(dir.path(), &[]);
    let mut broker = LineBroker::new(Arc::new(SysfsInterface::new(dir.path())));

    assert!(broker.claim(17, Direction::In, EdgeDetect::Both).is_err());
    assert!(broker.is_claimed(17));

    broker.release_all();
    assert_eq!(fs::read_to_string(dir.path().join("unexport")).unwrap(), "17");
    assert!(broker.is_empty());
}

#[test]
fn claim_sets_direction_and_edge() {
    let sysfs = Arc::new(MockSysfs::default());
    let mut broker = LineBroker::new(sysfs.clone());

    broker.claim(17, Direction::In, EdgeDetect::Both).unwrap();
    broker.claim(27, Direction::Out, EdgeDetect::None).unwrap();

    assert_eq!(sysfs.exported(), vec![17, 27]);
    assert_eq!(sysfs.direction(17), Some(Direction::In));
    assert_eq!(sysfs.edge(17), Some(EdgeDetect::Both));
    assert_eq!(sysfs.direction(27), Some(Direction::Out));
    assert_eq!(sysfs.edge(27), None);

    let mut claimed: Vec<u32> = broker.claimed().map(|c| c.line).collect();
    claimed.sort_unstable();
    assert_eq!(claimed, vec![17, 27]);
}

#[test]
fn double_claim_is_rejected_without_touching_the_kernel() {
    let sysfs = Arc::new(MockSysfs::default());
    let mut broker = LineBroker::new(sysfs.clone());

    broker.claim(22, Direction::In, EdgeDetect::Both).unwrap();
    let err = broker.claim(22, Direction::In, EdgeDetect::Both).unwrap_err();

    assert!(matches!(err, DaemonError::AlreadyClaimed(22)));
    assert_eq!(sysfs.export_count(22), 1);
}

#[test]
fn output_with_edge_is_invalid() {
    let sysfs = Arc::new(MockSysfs::default());
    let mut broker = LineBroker::new(sysfs.clone());

    let err = broker.claim(18, Direction::Out, EdgeDetect::Rising).unwrap_err();

    assert!(matches!(err, DaemonError::InvalidState(_)));
    assert!(sysfs.exported().is_empty());
}

#[test]
fn privilege_error_propagates_and_claims_nothing() {
    let sysfs = Arc::new(MockSysfs::denying());
    let mut broker = LineBroker::new(sysfs.clone());

    let err = broker.claim(17, Direction::In, EdgeDetect::Both).unwrap_err();

    assert!(err.is_privilege());
    assert!(broker.is_empty());
}

#[test]
fn busy_line_is_adopted_and_released() {
    let sysfs = Arc::new(MockSysfs::default());
    sysfs.preexport(22);
    let mut broker = LineBroker::new(sysfs.clone());

    broker.claim(22, Direction::In, EdgeDetect::Both).unwrap();
    assert!(broker.is_claimed(22));
    assert_eq!(sysfs.direction(22), Some(Direction::In));

    broker.release_all();
    assert!(sysfs.exported().is_empty());
}

#[test]
fn release_is_idempotent() {
    let sysfs = Arc::new(MockSysfs::default());
    let mut broker = LineBroker::new(sysfs.clone());

    broker.claim(17, Direction::In, EdgeDetect::Both).unwrap();
    broker.release(17);
    broker.release(17);
    broker.release(99);

    assert_eq!(sysfs.unexport_count(17), 1);
    assert_eq!(sysfs.unexport_count(99), 0);
}

#[test]
fn release_all_is_safe_to_repeat() {
    let sysfs = Arc::new(MockSysfs::default());
    let mut broker = LineBroker::new(sysfs.clone());

    broker.release_all();
    broker.claim(17, Direction::In, EdgeDetect::Both).unwrap();
    broker.claim(22, Direction::In, EdgeDetect::Both).unwrap();
    broker.release_all();
    broker.release_all();

    assert!(sysfs.exported().is_empty());
    assert_eq!(sysfs.unexport_count(17), 1);
    assert_eq!(sysfs.unexport_count(22), 1);
}

#[test]
fn partial_claims_are_released_after_a_failure() {
    let sysfs = Arc::new(MockSysfs::default());
    sysfs.break_direction(22);
    let mut broker = LineBroker::new(sysfs.clone());

    broker.claim(17, Direction::In, EdgeDetect::Both).unwrap();
    assert!(broker.claim(22, Direction::In, EdgeDetect::Both).is_err());
    broker.release_all();

    assert!(sysfs.exported().is_empty());
    assert_eq!(sysfs.unexport_count(17), 1);
    assert_eq!(sysfs.unexport_count(22), 1);
}

#[test]
fn dropping_the_broker_releases_claims() {
    let sysfs = Arc::new(MockSysfs::default());
    {
        let mut broker = LineBroker::new(sysfs.clone());
        broker.claim(17, Direction::In, EdgeDetect::Both).unwrap();
        broker.claim(22, Direction::In, EdgeDetect::Both).unwrap();
    }

    assert!(sysfs.exported().is_empty());
    assert_eq!(sysfs.unexport_count(17), 1);
    assert_eq!(sysfs.unexport_count(22), 1);
}
