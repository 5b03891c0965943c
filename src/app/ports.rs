//! Port traits — the hexagonal boundary between the connectivity core and
//! the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ LinkManager / SessionManager / TelemetryTask
//! ```
//!
//! Driven adapters (Wi-Fi station, MQTT client, distance sensor, NVS,
//! event sinks) implement these traits. The core consumes them via
//! generics, so nothing under `app` touches ESP-IDF directly.

use crate::config::SystemConfig;
use crate::error::{LinkError, PublishError, SensorError};

// ───────────────────────────────────────────────────────────────
// Station port (driven adapter: link manager → Wi-Fi driver)
// ───────────────────────────────────────────────────────────────

/// Station-mode network transport.
///
/// Both calls only *initiate* work; the outcome arrives later as a
/// [`LinkEvent`](super::events::LinkEvent) on the system event dispatcher.
pub trait StationPort {
    /// Start the station interface. A `StationStarted` event follows.
    fn start(&mut self) -> Result<(), LinkError>;

    /// Issue one association attempt with the configured access point.
    fn connect(&mut self) -> Result<(), LinkError>;
}

// ───────────────────────────────────────────────────────────────
// Publish port (driven adapter: core → broker client)
// ───────────────────────────────────────────────────────────────

/// MQTT delivery guarantee, reduced to the two levels this firmware uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    /// QoS 0: latest value only, no backlog.
    AtMostOnce,
    /// QoS 1: survives broker restart when combined with retain.
    AtLeastOnce,
}

/// Identifier the client assigns to an enqueued message.
pub type MessageId = u32;

/// Non-blocking best-effort publish.
///
/// Implementations must tolerate being called after the session dropped:
/// they return an error, they never block waiting for acknowledgment and
/// never corrupt client state.
pub trait PublishPort {
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<MessageId, PublishError>;
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → core)
// ───────────────────────────────────────────────────────────────

/// Produces one distance reading in centimetres on demand.
///
/// The value is not validated against tank physics; the converter clamps.
pub trait DistanceSensor {
    fn read_distance_cm(&mut self) -> Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: core → logging)
// ───────────────────────────────────────────────────────────────

/// The telemetry task emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: core ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate before persisting and reject invalid
/// ranges with [`ConfigError::ValidationFailed`].
pub trait ConfigPort {
    /// Load configuration. Returns the build defaults when nothing is stored.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
