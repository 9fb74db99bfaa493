mod common;

use common::{init_logging, sha256, ScriptedDevice};
use sealbox::{ChannelState, EventActions, KeyRef, KeySlot, PerimeterChannel, SeError, Session};
use sealbox_core::protocol::{Command, DeviceStatus, EventClass, Response};
use sealbox_hardware_hal::soft::SoftSecureElement;
use std::thread;
use std::time::{Duration, Instant};

fn wait_commands(device: &ScriptedDevice) -> Vec<(EventClass, u32)> {
    device
        .received()
        .into_iter()
        .filter_map(|command| match command {
            Command::WaitForEvent { class, timeout_ms } => Some((class, timeout_ms)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_zero_timeout_never_blocks() {
    init_logging();
    let device = SoftSecureElement::single_key();
    let session = Session::open(&device).unwrap();

    for _ in 0..20 {
        let start = Instant::now();
        assert_eq!(session.wait_for_tap(Duration::ZERO), Err(SeError::TimedOut));
        assert!(start.elapsed() < Duration::from_millis(200));
    }
}

#[test]
fn test_zero_timeout_is_a_single_poll() {
    init_logging();
    let device = ScriptedDevice::opened(1);
    device.push(Response::Error(DeviceStatus::TimedOut));

    let session = Session::open(&device).unwrap();
    assert_eq!(session.wait_for_tap(Duration::ZERO), Err(SeError::TimedOut));
    assert_eq!(wait_commands(&device), vec![(EventClass::Tap, 0)]);
}

#[test]
fn test_event_at_deadline_is_success() {
    init_logging();
    let device = ScriptedDevice::opened(1);
    // The wait expires, but the event is pending by the time of the final poll
    device.push(Response::Error(DeviceStatus::TimedOut));
    device.push(Response::Event);

    let session = Session::open(&device).unwrap();
    assert_eq!(session.wait_for_perimeter_event(Duration::from_millis(250)), Ok(()));
    assert_eq!(
        wait_commands(&device),
        vec![(EventClass::Perimeter, 250), (EventClass::Perimeter, 0)]
    );
}

#[test]
fn test_no_event_at_deadline_times_out() {
    init_logging();
    let device = ScriptedDevice::opened(1);
    device.push(Response::Error(DeviceStatus::TimedOut));
    device.push(Response::Error(DeviceStatus::TimedOut));

    let session = Session::open(&device).unwrap();
    assert_eq!(session.wait_for_tap(Duration::from_millis(5)), Err(SeError::TimedOut));
    assert_eq!(wait_commands(&device).len(), 2);
}

#[test]
fn test_wait_errors_other_than_timeout_are_not_retried() {
    init_logging();
    let device = ScriptedDevice::opened(1);
    device.push(Response::Error(DeviceStatus::Unsupported("tap".to_string())));

    let session = Session::open(&device).unwrap();
    assert!(matches!(session.wait_for_tap(Duration::from_secs(1)), Err(SeError::Unsupported(_))));
    assert_eq!(wait_commands(&device).len(), 1);
}

#[test]
fn test_tap_wakes_blocked_wait() {
    init_logging();
    let device = SoftSecureElement::single_key();
    let session = Session::open(&device).unwrap();
    session.set_tap_sensitivity(sealbox::AccelAxis::All, 75.0).unwrap();

    let tapper = device.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        // 75 % sensitivity: 1 g threshold
        tapper.inject_tap(0, 1.2).unwrap()
    });

    let start = Instant::now();
    assert_eq!(session.wait_for_tap(Duration::from_secs(10)), Ok(()));
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(handle.join().unwrap());

    let data = session.get_accelerometer_data().unwrap();
    assert_eq!(data.x.g_force, 1.2);
}

#[test]
fn test_unobserved_taps_wake_once() {
    init_logging();
    let device = SoftSecureElement::single_key();
    let session = Session::open(&device).unwrap();

    for _ in 0..3 {
        assert!(device.inject_tap(0, 3.0).unwrap());
    }
    let results: Vec<_> = (0..4).map(|_| session.wait_for_tap(Duration::ZERO)).collect();
    assert_eq!(
        results,
        vec![Ok(()), Err(SeError::TimedOut), Err(SeError::TimedOut), Err(SeError::TimedOut)]
    );

    // The latch re-arms after being consumed
    assert!(device.inject_tap(1, -3.0).unwrap());
    assert_eq!(session.wait_for_tap(Duration::ZERO), Ok(()));
}

#[test]
fn test_breaches_on_several_channels_wake_once() {
    init_logging();
    let device = SoftSecureElement::single_key();
    let session = Session::open(&device).unwrap();
    for channel in 0..2 {
        session
            .set_perimeter_event_action(PerimeterChannel(channel), EventActions::NOTIFY_HOST)
            .unwrap();
    }

    device.breach(0).unwrap();
    device.breach(1).unwrap();
    assert_eq!(session.wait_for_perimeter_event(Duration::ZERO), Ok(()));
    assert_eq!(session.wait_for_perimeter_event(Duration::ZERO), Err(SeError::TimedOut));
    assert_eq!(session.get_perimeter_detect_info().unwrap().len(), 2);
}

#[test]
fn test_breach_wakes_only_notify_channels() {
    init_logging();
    let device = SoftSecureElement::single_key();
    let session = Session::open(&device).unwrap();
    session
        .set_perimeter_event_action(PerimeterChannel(1), EventActions::NOTIFY_HOST)
        .unwrap();

    device.breach(0).unwrap();
    assert_eq!(session.wait_for_perimeter_event(Duration::ZERO), Err(SeError::TimedOut));

    let breacher = device.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        breacher.breach(1).unwrap()
    });
    assert_eq!(session.wait_for_perimeter_event(Duration::from_secs(10)), Ok(()));
    assert!(handle.join().unwrap().notify);

    let events = session.get_perimeter_detect_info().unwrap();
    let channels: Vec<_> = events.iter().map(|e| e.channel).collect();
    assert_eq!(channels, vec![PerimeterChannel(0), PerimeterChannel(1)]);
    assert!(events[0].timestamp <= events[1].timestamp);
}

#[test]
fn test_clear_rearms_every_channel() {
    init_logging();
    let device = SoftSecureElement::single_key();
    let session = Session::open(&device).unwrap();
    for channel in 0..2 {
        session
            .set_perimeter_event_action(PerimeterChannel(channel), EventActions::NOTIFY_HOST)
            .unwrap();
    }
    assert!(session.get_perimeter_detect_info().unwrap().is_empty());

    device.breach(0).unwrap();
    device.breach(1).unwrap();
    assert_eq!(
        session.perimeter_channel_states().unwrap(),
        vec![ChannelState::Triggered, ChannelState::Triggered]
    );

    session.clear_perimeter_detect_events().unwrap();
    assert!(session.get_perimeter_detect_info().unwrap().is_empty());
    assert_eq!(
        session.perimeter_channel_states().unwrap(),
        vec![ChannelState::Armed, ChannelState::Armed]
    );
    assert_eq!(session.wait_for_perimeter_event(Duration::ZERO), Err(SeError::TimedOut));

    // A later breach is detectable again
    assert!(device.breach(0).unwrap().recorded);
    assert_eq!(session.wait_for_perimeter_event(Duration::ZERO), Ok(()));
    assert_eq!(session.get_perimeter_detect_info().unwrap().len(), 1);
}

#[test]
fn test_self_destruct_breach() {
    init_logging();
    let device = SoftSecureElement::single_key();
    let session = Session::open(&device).unwrap();
    let locked = session.lock(b"gone after breach", KeyRef::OneWay).unwrap();

    session
        .set_perimeter_event_action(
            PerimeterChannel(0),
            EventActions::NOTIFY_HOST | EventActions::SELF_DESTRUCT,
        )
        .unwrap();
    device.breach(0).unwrap();
    assert_eq!(session.wait_for_perimeter_event(Duration::from_secs(1)), Ok(()));

    let err = session.sign_digest(&sha256(b"x"), KeySlot::DEFAULT).unwrap_err();
    assert!(matches!(err, SeError::DeviceUnreachable(_)));
    assert!(err.requires_reopen());
    assert!(session.unlock(&locked, KeyRef::OneWay).is_err());
    assert!(device.is_destroyed().unwrap());
}
