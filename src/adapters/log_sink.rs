//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the logger (UART / USB-CDC on the device, stderr in simulation).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Measured(m) => {
                info!(
                    "TELEM | #{} | distance={:.1}cm | fill={:.1}%",
                    m.sequence, m.distance_cm, m.percentage
                );
            }
            AppEvent::Published { sequence, message_id } => {
                info!("TELEM | #{} published (msg_id={})", sequence, message_id);
            }
            AppEvent::PublishSkipped { sequence } => {
                warn!("SKIP | #{} MQTT not connected, skipping publish", sequence);
            }
            AppEvent::PublishFailed { sequence, error } => {
                warn!("SKIP | #{} publish failed: {}", sequence, error);
            }
            AppEvent::DiscoveryPublished { generation, records } => {
                info!("DISCOVERY | generation={} | {} records sent", generation, records);
            }
            AppEvent::DiscoverySkipped => {
                warn!("DISCOVERY | MQTT not connected, skipping discovery");
            }
            AppEvent::DiscoveryFailed { generation, error } => {
                warn!("DISCOVERY | generation={} failed: {}", generation, error);
            }
            AppEvent::SensorFailed(e) => {
                warn!("SENSOR | read failed ({}), skipping cycle", e);
            }
        }
    }
}
