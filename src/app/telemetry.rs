//! Telemetry task — waits for the broker session, announces discovery, then
//! measures and publishes on a fixed period.
//!
//! ```text
//!  AwaitingSession ──(connected)──▶ PublishingDiscovery ──▶ Running ◀─┐
//!        │ poll                          (after settle)        │     │
//!        └──◀──                                                └─ P ─┘
//! ```
//!
//! The task is a step machine: [`TelemetryTask::step`] does one unit of work
//! and returns how long to sleep before the next step. The runtime supplies
//! the sleeping ([`TelemetryTask::run`]), tests call `step()` directly.
//!
//! While running, the task wakes at the poll interval so a reconnect is
//! announced within one poll, not one period.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use serde::{Serialize, Serializer};

use crate::config::SystemConfig;
use crate::error::{PublishError, SensorError};
use crate::sensors::fill_percentage;

use super::discovery::DiscoveryPublisher;
use super::events::AppEvent;
use super::ports::{DistanceSensor, EventSink, PublishPort, QoS};
use super::session::SessionManager;

// ── Measurement ───────────────────────────────────────────────

/// One cycle's reading. Immutable once taken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Measurement {
    #[serde(rename = "distance", serialize_with = "one_decimal")]
    pub distance_cm: f32,
    #[serde(serialize_with = "one_decimal")]
    pub percentage: f32,
    #[serde(skip)]
    pub sequence: u32,
}

impl Measurement {
    pub fn new(distance_cm: f32, tank_height_cm: f32, sequence: u32) -> Self {
        Self {
            distance_cm,
            percentage: fill_percentage(distance_cm, tank_height_cm),
            sequence,
        }
    }

    /// State payload: `{"distance":<1dp>,"percentage":<1dp>}`.
    pub fn to_payload(&self) -> Result<Vec<u8>, PublishError> {
        serde_json::to_vec(self).map_err(|_| PublishError::Encode)
    }
}

fn one_decimal<S: Serializer>(value: &f32, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f32((value * 10.0).round() / 10.0)
}

// ── Timing ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryTiming {
    /// Readiness poll interval while awaiting the session; also the
    /// discovery check interval while running.
    pub poll: Duration,
    /// Delay between the first Connected observation and discovery.
    pub settle: Duration,
    /// Measurement period P.
    pub period: Duration,
}

impl From<&SystemConfig> for TelemetryTiming {
    fn from(cfg: &SystemConfig) -> Self {
        Self {
            poll: Duration::from_millis(u64::from(cfg.session_poll_interval_ms)),
            settle: Duration::from_millis(u64::from(cfg.session_settle_ms)),
            period: Duration::from_secs(u64::from(cfg.reading_interval_secs)),
        }
    }
}

// ── Task ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryPhase {
    AwaitingSession,
    PublishingDiscovery,
    Running,
}

pub struct TelemetryTask<S, P, E> {
    sensor: S,
    publisher: P,
    sink: E,
    session: Arc<SessionManager>,
    discovery: DiscoveryPublisher,
    tank_height_cm: f32,
    timing: TelemetryTiming,
    phase: TelemetryPhase,
    next_sequence: u32,
    /// Time left before the next measurement cycle.
    until_cycle: Duration,
}

impl<S, P, E> TelemetryTask<S, P, E>
where
    S: DistanceSensor,
    P: PublishPort,
    E: EventSink,
{
    pub fn new(
        sensor: S,
        publisher: P,
        sink: E,
        session: Arc<SessionManager>,
        discovery: DiscoveryPublisher,
        tank_height_cm: f32,
        timing: TelemetryTiming,
    ) -> Self {
        Self {
            sensor,
            publisher,
            sink,
            session,
            discovery,
            tank_height_cm,
            timing,
            phase: TelemetryPhase::AwaitingSession,
            next_sequence: 0,
            until_cycle: Duration::ZERO,
        }
    }

    pub fn phase(&self) -> TelemetryPhase {
        self.phase
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut P {
        &mut self.publisher
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }

    /// Run one step and return the delay before the next one.
    pub fn step(&mut self) -> Duration {
        match self.phase {
            TelemetryPhase::AwaitingSession => {
                if !self.session.is_connected() {
                    return self.timing.poll;
                }
                info!(
                    "Telemetry: session up, settling for {} ms",
                    self.timing.settle.as_millis()
                );
                self.phase = TelemetryPhase::PublishingDiscovery;
                self.timing.settle
            }
            TelemetryPhase::PublishingDiscovery => {
                self.service_discovery(true);
                self.phase = TelemetryPhase::Running;
                info!("Telemetry: running every {} s", self.timing.period.as_secs());
                Duration::ZERO
            }
            TelemetryPhase::Running => {
                self.service_discovery(false);
                if self.until_cycle.is_zero() {
                    self.cycle();
                    self.until_cycle = self.timing.period;
                }
                let delay = self.until_cycle.min(self.timing.poll);
                self.until_cycle -= delay;
                delay
            }
        }
    }

    /// Drive the task forever, sleeping between steps.
    pub async fn run(mut self) {
        loop {
            let delay = self.step();
            if !delay.is_zero() {
                async_io_mini::Timer::after(delay).await;
            }
        }
    }

    /// Publish discovery if the session has an unserved request.
    ///
    /// `announce_skip` reports a skip when the session is down; used for the
    /// initial attempt only, reconnects are picked up silently.
    fn service_discovery(&mut self, announce_skip: bool) {
        if !self.session.is_connected() {
            if announce_skip {
                self.sink.emit(&AppEvent::DiscoverySkipped);
            }
            return;
        }
        let Some(generation) = self.session.take_discovery_request() else {
            return;
        };
        let event = match self.discovery.publish(&self.session, &mut self.publisher) {
            Ok(records) => AppEvent::DiscoveryPublished { generation, records },
            Err(PublishError::NotConnected) => AppEvent::DiscoverySkipped,
            Err(error) => AppEvent::DiscoveryFailed { generation, error },
        };
        self.sink.emit(&event);
    }

    /// read → convert → publish (or skip).
    fn cycle(&mut self) {
        // A non-finite value cannot be rendered as a one-decimal number.
        let reading = self
            .sensor
            .read_distance_cm()
            .and_then(|d| if d.is_finite() { Ok(d) } else { Err(SensorError::InvalidReading) });
        let distance_cm = match reading {
            Ok(d) => d,
            Err(e) => {
                self.sink.emit(&AppEvent::SensorFailed(e));
                return;
            }
        };

        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        let m = Measurement::new(distance_cm, self.tank_height_cm, sequence);
        self.sink.emit(&AppEvent::Measured(m));

        if !self.session.is_connected() {
            self.sink.emit(&AppEvent::PublishSkipped { sequence });
            return;
        }

        let result = m.to_payload().and_then(|payload| {
            self.publisher.publish(
                self.discovery.state_topic(),
                &payload,
                QoS::AtMostOnce,
                false,
            )
        });
        let event = match result {
            Ok(message_id) => AppEvent::Published { sequence, message_id },
            Err(PublishError::NotConnected) => AppEvent::PublishSkipped { sequence },
            Err(error) => {
                warn!("Telemetry: publish #{} failed: {}", sequence, error);
                AppEvent::PublishFailed { sequence, error }
            }
        };
        self.sink.emit(&event);
    }
}
