//! Mock adapters for integration tests.
//!
//! Records every broker publish and every emitted event so tests can
//! assert on the full history without a radio, broker or transducer.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use saltlevel::app::events::{AppEvent, LinkEvent};
use saltlevel::app::link::LinkManager;
use saltlevel::app::ports::{DistanceSensor, EventSink, MessageId, PublishPort, QoS, StationPort};
use saltlevel::error::{LinkError, PublishError, SensorError};

// ── Publisher ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct PublishRecord {
    pub topic: String,
    pub payload: String,
    pub qos: QoS,
    pub retain: bool,
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub records: Vec<PublishRecord>,
    /// Reject this many upcoming publishes with `Rejected(-1)`.
    pub reject_next: u32,
    next_id: MessageId,
}

#[allow(dead_code)]
impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn discovery(&self) -> Vec<&PublishRecord> {
        self.records.iter().filter(|r| r.topic.ends_with("/config")).collect()
    }

    pub fn states(&self) -> Vec<&PublishRecord> {
        self.records.iter().filter(|r| r.topic.ends_with("/state")).collect()
    }

    pub fn last_state_json(&self) -> serde_json::Value {
        let last = self.states().last().map(|r| r.payload.clone()).unwrap_or_default();
        serde_json::from_str(&last).unwrap_or(serde_json::Value::Null)
    }
}

impl PublishPort for RecordingPublisher {
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<MessageId, PublishError> {
        if self.reject_next > 0 {
            self.reject_next -= 1;
            return Err(PublishError::Rejected(-1));
        }
        self.next_id += 1;
        self.records.push(PublishRecord {
            topic: topic.to_owned(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            qos,
            retain,
        });
        Ok(self.next_id)
    }
}

// ── Sensor ────────────────────────────────────────────────────

/// Replays scripted readings, then repeats `fallback`.
pub struct ScriptedSensor {
    readings: VecDeque<Result<f32, SensorError>>,
    fallback: f32,
}

#[allow(dead_code)]
impl ScriptedSensor {
    pub fn constant(cm: f32) -> Self {
        Self {
            readings: VecDeque::new(),
            fallback: cm,
        }
    }

    pub fn script(readings: Vec<Result<f32, SensorError>>, fallback: f32) -> Self {
        Self {
            readings: readings.into(),
            fallback,
        }
    }
}

impl DistanceSensor for ScriptedSensor {
    fn read_distance_cm(&mut self) -> Result<f32, SensorError> {
        self.readings.pop_front().unwrap_or(Ok(self.fallback))
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Station ───────────────────────────────────────────────────

/// Counts driver calls; used as the radio on the dispatcher thread.
#[derive(Default)]
pub struct CountingRadio {
    pub connects: u32,
}

impl StationPort for CountingRadio {
    fn start(&mut self) -> Result<(), LinkError> {
        Ok(())
    }

    fn connect(&mut self) -> Result<(), LinkError> {
        self.connects += 1;
        Ok(())
    }
}

/// Station whose `start()` launches a dispatcher thread that replays a
/// fixed event script into the link manager, `gap` apart.
pub struct ScriptedStation {
    link: Arc<LinkManager>,
    script: Vec<LinkEvent>,
    gap: Duration,
    pub starts: u32,
}

#[allow(dead_code)]
impl ScriptedStation {
    pub fn new(link: Arc<LinkManager>, script: Vec<LinkEvent>) -> Self {
        Self {
            link,
            script,
            gap: Duration::from_millis(5),
            starts: 0,
        }
    }
}

impl StationPort for ScriptedStation {
    fn start(&mut self) -> Result<(), LinkError> {
        self.starts += 1;
        let link = self.link.clone();
        let script = self.script.clone();
        let gap = self.gap;
        std::thread::spawn(move || {
            let mut radio = CountingRadio::default();
            for event in script {
                std::thread::sleep(gap);
                link.handle_event(event, &mut radio);
            }
        });
        Ok(())
    }

    fn connect(&mut self) -> Result<(), LinkError> {
        Ok(())
    }
}
