//! Session → discovery → telemetry flow against a recording publisher.
//!
//! The task is driven step by step; the returned delays are checked but
//! never slept.

use std::sync::Arc;
use std::time::Duration;

use saltlevel::app::discovery::DiscoveryPublisher;
use saltlevel::app::events::{AppEvent, SessionEvent};
use saltlevel::app::ports::QoS;
use saltlevel::app::session::SessionManager;
use saltlevel::app::telemetry::{TelemetryPhase, TelemetryTask, TelemetryTiming};
use saltlevel::config::SystemConfig;
use saltlevel::error::{PublishError, SensorError, SessionError};

use crate::mock_hw::{RecordingPublisher, RecordingSink, ScriptedSensor};

type Task = TelemetryTask<ScriptedSensor, RecordingPublisher, RecordingSink>;

const NODE: &str = "salt_level_monitor";
const POLL: Duration = Duration::from_secs(1);
const PERIOD: Duration = Duration::from_secs(60);

fn timing() -> TelemetryTiming {
    TelemetryTiming {
        poll: POLL,
        settle: Duration::from_secs(2),
        period: PERIOD,
    }
}

fn rig(sensor: ScriptedSensor) -> (Task, Arc<SessionManager>) {
    let session = Arc::new(SessionManager::new());
    let task = TelemetryTask::new(
        sensor,
        RecordingPublisher::new(),
        RecordingSink::default(),
        session.clone(),
        DiscoveryPublisher::new(NODE, "test").unwrap(),
        100.0,
        timing(),
    );
    (task, session)
}

/// Connect and step through settle + discovery into `Running`.
fn bring_up(task: &mut Task, session: &SessionManager) {
    session.handle_event(SessionEvent::Connected);
    assert_eq!(task.step(), Duration::from_secs(2));
    assert_eq!(task.step(), Duration::ZERO);
    assert_eq!(task.phase(), TelemetryPhase::Running);
}

/// Step through one full period. The measurement cycle runs on the first
/// step, the rest are poll wake-ups.
fn one_period(task: &mut Task) {
    let mut slept = Duration::ZERO;
    while slept < PERIOD {
        let delay = task.step();
        assert!(!delay.is_zero(), "running task must always sleep");
        slept += delay;
    }
    assert_eq!(slept, PERIOD);
}

#[test]
fn connect_drop_reconnect_cycle() {
    let (mut task, session) = rig(ScriptedSensor::constant(25.0));

    // Connect → two discovery messages, then telemetry.
    bring_up(&mut task, &session);
    assert_eq!(task.publisher().discovery().len(), 2);
    one_period(&mut task);
    assert_eq!(task.publisher().states().len(), 1);

    // Drop → skip, nothing reaches the client.
    session.handle_event(SessionEvent::Disconnected);
    let before = task.publisher().records.len();
    one_period(&mut task);
    assert_eq!(task.publisher().records.len(), before);
    assert_eq!(
        task.sink().count(|e| matches!(e, AppEvent::PublishSkipped { .. })),
        1
    );

    // Reconnect → two more discovery messages and telemetry resumes.
    session.handle_event(SessionEvent::Connected);
    one_period(&mut task);
    assert_eq!(task.publisher().discovery().len(), 4);
    assert_eq!(task.publisher().states().len(), 2);
    assert_eq!(
        task.sink()
            .count(|e| matches!(e, AppEvent::DiscoveryPublished { records: 2, .. })),
        2
    );

    // Steady state: no further discovery.
    one_period(&mut task);
    one_period(&mut task);
    assert_eq!(task.publisher().discovery().len(), 4);
    assert_eq!(task.publisher().states().len(), 4);
}

#[test]
fn reconnect_is_announced_within_one_poll() {
    let (mut task, session) = rig(ScriptedSensor::constant(25.0));
    bring_up(&mut task, &session);
    assert_eq!(task.step(), POLL);
    assert_eq!(task.publisher().states().len(), 1);

    session.handle_event(SessionEvent::Disconnected);
    session.handle_event(SessionEvent::Connected);

    // Mid-period: discovery goes out on the next wake-up, no extra reading.
    assert_eq!(task.step(), POLL);
    assert_eq!(task.publisher().discovery().len(), 4);
    assert_eq!(task.publisher().states().len(), 1);
}

#[test]
fn discovery_records_are_retained_qos1_and_state_is_qos0() {
    let (mut task, session) = rig(ScriptedSensor::constant(25.0));
    bring_up(&mut task, &session);
    task.step();

    for r in task.publisher().discovery() {
        assert_eq!(r.qos, QoS::AtLeastOnce);
        assert!(r.retain);
    }
    let state = task.publisher().states()[0];
    assert_eq!(state.topic, format!("homeassistant/sensor/{NODE}/state"));
    assert_eq!(state.qos, QoS::AtMostOnce);
    assert!(!state.retain);
    assert_eq!(state.payload, r#"{"distance":25.0,"percentage":75.0}"#);
}

#[test]
fn never_publishes_while_session_is_down() {
    let (mut task, session) = rig(ScriptedSensor::constant(40.0));

    for _ in 0..5 {
        assert_eq!(task.step(), POLL);
    }
    assert_eq!(task.phase(), TelemetryPhase::AwaitingSession);

    // A session error alone never counts as connected.
    session.handle_event(SessionEvent::Error(SessionError::Refused { code: 5 }));
    task.step();
    assert!(task.publisher().records.is_empty());
    assert_eq!(session.error_counts(), (0, 1));
}

#[test]
fn fill_percentage_scenarios_for_100cm_tank() {
    let (mut task, session) = rig(ScriptedSensor::script(
        vec![Ok(25.0), Ok(150.0), Ok(-10.0)],
        50.0,
    ));
    bring_up(&mut task, &session);

    let mut got = Vec::new();
    for _ in 0..4 {
        one_period(&mut task);
        got.push(task.publisher().last_state_json()["percentage"].as_f64().unwrap());
    }
    assert_eq!(got, vec![75.0, 0.0, 100.0, 50.0]);
}

#[test]
fn sensor_failure_skips_cycle_and_loop_continues() {
    let (mut task, session) = rig(ScriptedSensor::script(
        vec![Err(SensorError::NoEcho), Ok(30.0)],
        30.0,
    ));
    bring_up(&mut task, &session);

    one_period(&mut task);
    assert!(task.publisher().states().is_empty());
    assert_eq!(
        task.sink()
            .count(|e| matches!(e, AppEvent::SensorFailed(SensorError::NoEcho))),
        1
    );

    one_period(&mut task);
    assert_eq!(task.publisher().states().len(), 1);
    // The failed read did not consume a sequence number.
    assert!(task.sink().events.iter().any(|e| matches!(
        e,
        AppEvent::Published { sequence: 0, .. }
    )));
}

#[test]
fn non_finite_readings_are_not_published() {
    let (mut task, session) = rig(ScriptedSensor::script(
        vec![Ok(f32::NAN), Ok(f32::INFINITY), Ok(f32::NEG_INFINITY)],
        30.0,
    ));
    bring_up(&mut task, &session);

    for _ in 0..3 {
        one_period(&mut task);
    }
    assert!(task.publisher().states().is_empty());
    assert_eq!(
        task.sink()
            .count(|e| matches!(e, AppEvent::SensorFailed(SensorError::InvalidReading))),
        3
    );

    one_period(&mut task);
    let state = task.publisher().states()[0];
    assert_eq!(state.payload, r#"{"distance":30.0,"percentage":70.0}"#);
}

#[test]
fn rejected_publish_is_reported_and_next_cycle_retries() {
    let (mut task, session) = rig(ScriptedSensor::constant(10.0));
    bring_up(&mut task, &session);

    task.publisher_mut().reject_next = 1;
    one_period(&mut task);
    assert!(task.publisher().states().is_empty());
    assert_eq!(
        task.sink().count(|e| matches!(
            e,
            AppEvent::PublishFailed { sequence: 0, error: PublishError::Rejected(-1) }
        )),
        1
    );

    // A fresh reading goes out on the next period.
    one_period(&mut task);
    assert_eq!(task.publisher().states().len(), 1);
    assert!(task.sink().events.iter().any(|e| matches!(
        e,
        AppEvent::Published { sequence: 1, .. }
    )));
}

#[test]
fn discovery_failure_is_not_retried_within_the_same_session() {
    let session = Arc::new(SessionManager::new());
    let mut publisher = RecordingPublisher::new();
    publisher.reject_next = 1;
    let mut task = TelemetryTask::new(
        ScriptedSensor::constant(50.0),
        publisher,
        RecordingSink::default(),
        session.clone(),
        DiscoveryPublisher::new(NODE, "test").unwrap(),
        100.0,
        timing(),
    );

    bring_up(&mut task, &session);
    assert!(task.publisher().discovery().is_empty());
    assert_eq!(
        task.sink().count(|e| matches!(
            e,
            AppEvent::DiscoveryFailed { generation: 1, error: PublishError::Rejected(_) }
        )),
        1
    );

    one_period(&mut task);
    one_period(&mut task);
    assert!(task.publisher().discovery().is_empty());
    assert_eq!(task.publisher().states().len(), 2);

    // The next session establishment announces again.
    session.handle_event(SessionEvent::Disconnected);
    session.handle_event(SessionEvent::Connected);
    task.step();
    assert_eq!(task.publisher().discovery().len(), 2);
}

#[test]
fn session_lost_during_settle_defers_discovery_to_reconnect() {
    let (mut task, session) = rig(ScriptedSensor::constant(50.0));

    session.handle_event(SessionEvent::Connected);
    assert_eq!(task.step(), Duration::from_secs(2));
    session.handle_event(SessionEvent::Disconnected);

    assert_eq!(task.step(), Duration::ZERO);
    assert_eq!(task.phase(), TelemetryPhase::Running);
    assert_eq!(task.sink().count(|e| matches!(e, AppEvent::DiscoverySkipped)), 1);
    assert!(task.publisher().records.is_empty());

    session.handle_event(SessionEvent::Connected);
    task.step();
    assert_eq!(task.publisher().discovery().len(), 2);
    assert_eq!(task.publisher().states().len(), 1);
}

#[test]
fn out_of_range_boot_config_is_repaired_before_use() {
    let mut config = SystemConfig {
        wifi_ssid: "HomeNet".into(),
        reading_interval_secs: 0,
        tank_height_cm: 0.0,
        ..SystemConfig::default()
    };
    config.repair();
    assert!(config.validate().is_ok());

    let session = Arc::new(SessionManager::new());
    let mut task = TelemetryTask::new(
        ScriptedSensor::constant(25.0),
        RecordingPublisher::new(),
        RecordingSink::default(),
        session.clone(),
        DiscoveryPublisher::new(NODE, "test").unwrap(),
        config.tank_height_cm,
        TelemetryTiming::from(&config),
    );
    bring_up(&mut task, &session);

    // Running always sleeps, and the converter sees a real tank height.
    for _ in 0..3 {
        assert!(task.step() > Duration::ZERO);
    }
    assert_eq!(task.publisher().last_state_json()["percentage"].as_f64(), Some(75.0));
}
