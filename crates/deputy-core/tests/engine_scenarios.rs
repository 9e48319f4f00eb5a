// Deputy Engine Scenarios
//
// Drive the engine end to end through the scripted host: arrivals,
// seizure races, release key, foreign pages, degraded monitoring,
// detach, lost handles and shutdown. No hardware required.

use std::time::Duration;

use deputy_core::host::mock::{self, MockHost};
use deputy_core::{
    DeviceIdentity, Engine, EngineConfig, EngineError, HostEvent, KeyUsage, MatchLevel, Notice,
    OpenError, RegistryError, SessionId, SessionState,
};

// =========================================================================
// Test Helpers
// =========================================================================

const TICK: Duration = Duration::from_millis(0);

fn started(host: MockHost) -> Engine<MockHost> {
    started_with(host, EngineConfig::default())
}

fn started_with(host: MockHost, config: EngineConfig) -> Engine<MockHost> {
    let mut engine = Engine::new(host, config);
    engine.start().unwrap();
    engine
}

/// Queue events on the host and run one pump
fn deliver(engine: &mut Engine<MockHost>, events: Vec<HostEvent<mock::MockDevice>>) {
    for event in events {
        engine.host_mut().push(event);
    }
    engine.pump(TICK).unwrap();
}

fn only_session(engine: &Engine<MockHost>) -> SessionId {
    let sessions = engine.current_sessions();
    assert_eq!(sessions.len(), 1, "expected exactly one session");
    sessions[0].id
}

// =========================================================================
// Core scenarios
// =========================================================================

#[test]
fn test_two_keyboards_arrive_and_are_both_seized() {
    let mut engine = started(MockHost::new());

    deliver(
        &mut engine,
        vec![
            HostEvent::Arrived(mock::keyboard(1)),
            HostEvent::Arrived(mock::keyboard(2)),
        ],
    );

    assert_eq!(engine.registry().len(), 2);
    assert!(engine.host().is_open(1));
    assert!(engine.host().is_open(2));
    for session in engine.current_sessions() {
        assert_eq!(session.state, SessionState::Monitoring);
    }
}

#[test]
fn test_lost_seize_race_is_discarded_without_retry() {
    let mut host = MockHost::new();
    host.fail_open(1, OpenError::AlreadyInUse);
    let mut engine = started(host);

    deliver(&mut engine, vec![HostEvent::Arrived(mock::keyboard(1))]);
    assert!(engine.registry().is_empty());

    // The same device notified again is not retried
    deliver(&mut engine, vec![HostEvent::Arrived(mock::keyboard(1))]);
    engine.pump(TICK).unwrap();
    assert_eq!(engine.host().open_attempts(1), 1);
    assert!(engine.registry().is_empty());

    let notices = engine.drain_notices();
    assert_eq!(
        notices,
        vec![Notice::SeizeAlreadyInUse {
            identity: DeviceIdentity::new("/mock/input1")
        }]
    );
}

#[test]
fn test_release_key_releases_session() {
    let mut engine = started(MockHost::new().with_attached(mock::keyboard(1)));
    let id = only_session(&engine);

    deliver(&mut engine, vec![mock::key_report(id, 0x04, true)]);

    assert!(engine.registry().is_empty());
    assert!(!engine.registry().contains(id));
    assert_eq!(engine.host().close_count(1), 1);
    assert!(!engine.host().is_open(1));
    assert!(engine.drain_notices().contains(&Notice::Released { id }));
}

#[test]
fn test_consumer_page_report_is_dropped() {
    let mut engine = started(MockHost::new().with_attached(mock::keyboard(1)));
    let id = only_session(&engine);

    deliver(&mut engine, vec![mock::report(id, 0x0C, 0x04, true)]);

    let sessions = engine.current_sessions();
    assert_eq!(sessions[0].state, SessionState::Monitoring);
    assert_eq!(sessions[0].reports_swallowed, 0);
    assert_eq!(engine.host().close_count(1), 0);
}

#[test]
fn test_failed_report_subscription_keeps_device_held() {
    let mut host = MockHost::new();
    host.fail_report_subscription(1);
    let mut engine = started(host);

    deliver(&mut engine, vec![HostEvent::Arrived(mock::keyboard(1))]);

    let id = only_session(&engine);
    assert_eq!(
        engine.registry().get(id).unwrap().state(),
        SessionState::MonitoringFailed
    );
    assert!(engine.host().is_open(1));
    assert_eq!(engine.host().close_count(1), 0);
    assert!(engine
        .drain_notices()
        .iter()
        .any(|n| matches!(n, Notice::MonitoringFailed { id: failed, .. } if *failed == id)));

    // Reports cannot release a blind session, but an explicit release can
    deliver(&mut engine, vec![mock::key_report(id, 0x04, true)]);
    assert!(engine.registry().contains(id));
    assert!(engine.release(id).is_some());
    assert_eq!(engine.host().close_count(1), 1);
    assert_eq!(engine.host().unsubscribe_count(1), 0);
}

// =========================================================================
// Release semantics
// =========================================================================

#[test]
fn test_release_is_idempotent() {
    let mut engine = started(MockHost::new().with_attached(mock::keyboard(1)));
    let id = only_session(&engine);

    assert!(engine.release(id).is_some());
    assert!(engine.release(id).is_none());
    assert_eq!(engine.host().close_count(1), 1);
}

#[test]
fn test_repeated_release_key_closes_once() {
    let mut engine = started(MockHost::new().with_attached(mock::keyboard(1)));
    let id = only_session(&engine);

    deliver(
        &mut engine,
        vec![
            mock::key_report(id, 0x04, true),
            mock::key_report(id, 0x04, false),
            mock::key_report(id, 0x04, true),
        ],
    );

    assert!(engine.registry().is_empty());
    assert_eq!(engine.host().close_count(1), 1);
    assert_eq!(engine.host().unsubscribe_count(1), 1);
}

#[test]
fn test_release_key_up_does_not_release() {
    let mut engine = started(MockHost::new().with_attached(mock::keyboard(1)));
    let id = only_session(&engine);

    deliver(&mut engine, vec![mock::key_report(id, 0x04, false)]);
    assert!(engine.registry().contains(id));
    assert_eq!(engine.current_sessions()[0].reports_swallowed, 1);
}

#[test]
fn test_other_keys_are_swallowed_and_counted() {
    let mut engine = started(MockHost::new().with_attached(mock::keyboard(1)));
    let id = only_session(&engine);

    // An injected "r" + Enter, as a rubber ducky would type
    deliver(
        &mut engine,
        vec![
            mock::key_report(id, 0x15, true),
            mock::key_report(id, 0x15, false),
            mock::key_report(id, 0x28, true),
            mock::key_report(id, 0x28, false),
            // Reserved and out-of-range usages are not keys
            mock::key_report(id, 0x01, true),
            mock::key_report(id, 0xE8, true),
        ],
    );

    let session = &engine.current_sessions()[0];
    assert_eq!(session.state, SessionState::Monitoring);
    assert_eq!(session.reports_swallowed, 4);
}

#[test]
fn test_custom_release_key() {
    let config = EngineConfig {
        release_key: KeyUsage(0x45), // F12
        ..EngineConfig::default()
    };
    let mut engine = started_with(MockHost::new().with_attached(mock::keyboard(1)), config);
    let id = only_session(&engine);

    deliver(&mut engine, vec![mock::key_report(id, 0x04, true)]);
    assert!(engine.registry().contains(id));

    deliver(&mut engine, vec![mock::key_report(id, 0x45, true)]);
    assert!(!engine.registry().contains(id));
}

#[test]
fn test_release_only_affects_its_own_session() {
    let host = MockHost::new()
        .with_attached(mock::keyboard(1))
        .with_attached(mock::keyboard(2));
    let mut engine = started(host);
    let ids: Vec<_> = engine.current_sessions().iter().map(|s| s.id).collect();

    deliver(&mut engine, vec![mock::key_report(ids[0], 0x04, true)]);

    assert!(!engine.registry().contains(ids[0]));
    assert!(engine.registry().contains(ids[1]));
    assert!(engine.host().is_open(2));
}

#[test]
fn test_teardown_failure_still_removes_session() {
    let mut host = MockHost::new().with_attached(mock::keyboard(1));
    host.fail_unsubscribe(1);
    let mut engine = started(host);
    let id = only_session(&engine);

    deliver(&mut engine, vec![mock::key_report(id, 0x04, true)]);

    assert!(engine.registry().is_empty());
    // Close is still attempted after the unsubscribe error
    assert_eq!(engine.host().close_count(1), 1);
    assert!(engine
        .drain_notices()
        .iter()
        .any(|n| matches!(n, Notice::ReleaseTeardownFailed { .. })));
}

#[test]
fn test_close_failure_is_reported() {
    let mut host = MockHost::new().with_attached(mock::keyboard(1));
    host.fail_close(1);
    let mut engine = started(host);
    let id = only_session(&engine);

    assert!(engine.release(id).is_some());
    assert!(!engine.registry().contains(id));
    let notices = engine.drain_notices();
    assert!(notices.iter().any(|n| n.is_warning()));
}

// =========================================================================
// Discovery
// =========================================================================

#[test]
fn test_replayed_and_live_devices_share_one_path() {
    let host = MockHost::new()
        .with_attached(mock::keyboard(1))
        .with_attached(mock::mouse(2))
        .with_attached(mock::hub(3));
    let mut engine = started(host);

    assert_eq!(engine.registry().len(), 1);
    assert_eq!(engine.host().open_attempts(2), 0);
    assert_eq!(engine.host().open_attempts(3), 0);

    deliver(
        &mut engine,
        vec![
            HostEvent::Arrived(mock::mouse(4)),
            HostEvent::Arrived(mock::keyboard(5)),
        ],
    );
    assert_eq!(engine.registry().len(), 2);
    assert_eq!(engine.host().open_attempts(4), 0);
}

#[test]
fn test_duplicate_notification_is_ignored() {
    let mut engine = started(MockHost::new().with_attached(mock::keyboard(1)));

    deliver(&mut engine, vec![HostEvent::Arrived(mock::keyboard(1))]);

    assert_eq!(engine.registry().len(), 1);
    assert_eq!(engine.host().open_attempts(1), 1);
}

#[test]
fn test_released_device_is_not_seized_again() {
    let mut engine = started(MockHost::new().with_attached(mock::keyboard(1)));
    let id = only_session(&engine);
    engine.release(id);

    // A late duplicate notification for the confirmed device
    deliver(&mut engine, vec![HostEvent::Arrived(mock::keyboard(1))]);
    assert!(engine.registry().is_empty());
    assert_eq!(engine.host().open_attempts(1), 1);
}

#[test]
fn test_interface_level_matching() {
    let config = EngineConfig {
        match_level: MatchLevel::Interface,
        ..EngineConfig::default()
    };
    let host = MockHost::new()
        .with_attached(mock::keyboard(1))
        .with_attached(mock::mouse(2));
    let engine = started_with(host, config);

    assert_eq!(engine.registry().len(), 1);
    assert!(engine.host().is_open(1));
}

#[test]
fn test_discovery_failure_is_fatal() {
    let host = MockHost::new()
        .with_attached(mock::keyboard(1))
        .fail_discovery("udev unavailable");
    let mut engine = Engine::new(host, EngineConfig::default());

    assert!(matches!(
        engine.start(),
        Err(EngineError::DiscoverySubscriptionFailed(_))
    ));
    assert!(!engine.is_running());
    assert_eq!(engine.host().open_attempts(1), 0);
}

#[test]
fn test_other_seize_failure_skips_candidate() {
    let mut host = MockHost::new()
        .with_attached(mock::keyboard(1))
        .with_attached(mock::keyboard(2));
    host.fail_open(1, OpenError::Other("permission denied".into()));
    let engine = started(host);

    assert_eq!(engine.registry().len(), 1);
    assert!(engine.host().is_open(2));
}

// =========================================================================
// Detach and capacity
// =========================================================================

#[test]
fn test_detach_evicts_session() {
    let mut engine = started(MockHost::new().with_attached(mock::keyboard(1)));
    let id = only_session(&engine);

    deliver(
        &mut engine,
        vec![HostEvent::Detached(DeviceIdentity::new("/mock/input1"))],
    );

    assert!(engine.registry().is_empty());
    assert_eq!(engine.host().close_count(1), 1);
    assert!(engine.drain_notices().contains(&Notice::Evicted {
        id,
        identity: DeviceIdentity::new("/mock/input1"),
    }));
}

#[test]
fn test_reattached_device_gets_new_session() {
    let mut engine = started(MockHost::new().with_attached(mock::keyboard(1)));
    let first = only_session(&engine);

    deliver(
        &mut engine,
        vec![
            HostEvent::Detached(DeviceIdentity::new("/mock/input1")),
            HostEvent::Arrived(mock::keyboard_at(7, "/mock/input1")),
        ],
    );

    let second = only_session(&engine);
    assert_ne!(first, second);
    assert!(second > first);
    assert!(engine.host().is_open(7));
}

#[test]
fn test_stale_loss_after_replug_keeps_new_session() {
    let mut engine = started(MockHost::new().with_attached(mock::keyboard(1)));
    let first = only_session(&engine);

    // Discovery reports the unplug and the replug before the old node's
    // failure is read in the same wakeup
    deliver(
        &mut engine,
        vec![
            HostEvent::Detached(DeviceIdentity::new("/mock/input1")),
            HostEvent::Arrived(mock::keyboard_at(7, "/mock/input1")),
            HostEvent::Lost(first),
        ],
    );

    assert_eq!(engine.registry().len(), 1);
    let second = only_session(&engine);
    assert_ne!(first, second);
    assert!(engine.host().is_open(7));
    assert_eq!(engine.host().open_attempts(7), 1);
    assert_eq!(engine.host().close_count(7), 0);
}

#[test]
fn test_lost_handle_evicts_only_its_session() {
    let host = MockHost::new()
        .with_attached(mock::keyboard(1))
        .with_attached(mock::keyboard(2));
    let mut engine = started(host);
    let lost = engine
        .current_sessions()
        .iter()
        .find(|s| s.location == DeviceIdentity::new("/mock/input1"))
        .map(|s| s.id)
        .unwrap();
    engine.drain_notices();

    deliver(&mut engine, vec![HostEvent::Lost(lost)]);

    assert_eq!(engine.registry().len(), 1);
    assert!(!engine.registry().contains(lost));
    assert!(engine.host().is_open(2));
    assert_eq!(engine.host().close_count(1), 1);
    assert_eq!(
        engine.drain_notices(),
        vec![Notice::Evicted {
            id: lost,
            identity: DeviceIdentity::new("/mock/input1"),
        }]
    );

    // A repeated loss for the same session changes nothing
    deliver(&mut engine, vec![HostEvent::Lost(lost)]);
    assert_eq!(engine.registry().len(), 1);
    assert_eq!(engine.host().close_count(1), 1);
    assert!(engine.drain_notices().is_empty());
}

#[test]
fn test_detach_of_unknown_device_is_ignored() {
    let mut engine = started(MockHost::new().with_attached(mock::keyboard(1)));

    deliver(
        &mut engine,
        vec![HostEvent::Detached(DeviceIdentity::new("/mock/input9"))],
    );
    assert_eq!(engine.registry().len(), 1);
}

#[test]
fn test_single_device_capacity() {
    let config = EngineConfig {
        max_sessions: Some(1),
        ..EngineConfig::default()
    };
    let mut engine = started_with(MockHost::new().with_attached(mock::keyboard(1)), config);
    engine.drain_notices();

    deliver(&mut engine, vec![HostEvent::Arrived(mock::keyboard(2))]);

    assert_eq!(engine.registry().len(), 1);
    assert!(!engine.host().is_open(2));
    assert_eq!(engine.host().close_count(2), 1);
    assert!(engine.drain_notices().iter().any(|n| matches!(
        n,
        Notice::SeizeRejected {
            reason: RegistryError::CapacityReached { limit: 1 },
            ..
        }
    )));

    // Once the first is released there is room again
    let id = only_session(&engine);
    engine.release(id);
    deliver(&mut engine, vec![HostEvent::Arrived(mock::keyboard(3))]);
    assert!(engine.host().is_open(3));
}

// =========================================================================
// Lifecycle
// =========================================================================

#[test]
fn test_shutdown_closes_everything() {
    let host = MockHost::new()
        .with_attached(mock::keyboard(1))
        .with_attached(mock::keyboard(2));
    let mut engine = started(host);
    let watch = engine.watch();
    assert_eq!(watch.len(), 2);

    engine.shutdown();
    engine.shutdown();

    assert!(engine.registry().is_empty());
    assert_eq!(engine.host().open_handle_count(), 0);
    assert_eq!(engine.host().close_count(1), 1);
    assert_eq!(engine.host().close_count(2), 1);
    assert!(watch.is_empty());
    assert!(matches!(engine.pump(TICK), Err(EngineError::NotRunning)));
}

#[test]
fn test_shutdown_drops_pending_release() {
    let mut engine = started(MockHost::new().with_attached(mock::keyboard(1)));
    let id = only_session(&engine);

    engine.dispatch(mock::key_report(id, 0x04, true));
    assert_eq!(engine.pending_tasks(), 1);
    engine.shutdown();
    engine.run_deferred();

    assert_eq!(engine.pending_tasks(), 0);
    assert_eq!(engine.host().close_count(1), 1);
}

#[test]
fn test_run_loop_failure_keeps_sessions() {
    let mut engine = started(MockHost::new().with_attached(mock::keyboard(1)));
    engine.host_mut().fail_next_wait("poll failed");

    assert!(matches!(engine.pump(TICK), Err(EngineError::RunLoop(_))));
    assert_eq!(engine.registry().len(), 1);
    assert!(engine.host().is_open(1));

    // The next wait succeeds again
    assert_eq!(engine.pump(TICK).unwrap(), 0);
}

#[test]
fn test_watch_is_readable_from_another_thread() {
    let mut engine = started(MockHost::new().with_attached(mock::keyboard(1)));
    let watch = engine.watch();

    let reader = std::thread::spawn(move || watch.snapshot());
    let snapshot = reader.join().unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].vendor_id, Some(0x1001));
    assert_eq!(snapshot[0].name.as_deref(), Some("Mock Keyboard 1"));

    engine.shutdown();
}
