//! Events flowing into and out of the connectivity core.
//!
//! Inbound: [`LinkEvent`] and [`SessionEvent`] are delivered by the system
//! event dispatcher (Wi-Fi/IP events, MQTT client callbacks).
//!
//! Outbound: [`AppEvent`] is emitted by the telemetry task through the
//! [`EventSink`](super::ports::EventSink) port.

use core::net::Ipv4Addr;

use crate::error::{PublishError, SensorError, SessionError};

use super::telemetry::Measurement;

/// Station transport events, in the order the driver raises them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Station interface is up; an association attempt may be issued.
    StationStarted,
    /// Association lost or an attempt failed.
    StationDisconnected,
    /// DHCP assigned an address.
    GotAddress(Ipv4Addr),
}

/// Broker session events from the MQTT client callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    Error(SessionError),
}

/// Structured events emitted by the telemetry task.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A measurement was taken this cycle.
    Measured(Measurement),

    /// The state payload was handed to the client.
    Published { sequence: u32, message_id: u32 },

    /// Session not connected; the cycle's publish was skipped.
    PublishSkipped { sequence: u32 },

    /// The client refused the state payload.
    PublishFailed { sequence: u32, error: PublishError },

    /// Discovery records were sent for a session generation.
    DiscoveryPublished { generation: u32, records: usize },

    /// Discovery was requested while the session was down.
    DiscoverySkipped,

    /// Discovery publish failed part-way; the next reconnect retries it.
    DiscoveryFailed { generation: u32, error: PublishError },

    /// The distance sensor failed; no measurement this cycle.
    SensorFailed(SensorError),
}
