//! Broker session manager — connection-state tracking and the
//! "session ready" condition.
//!
//! The MQTT client owns transport reconnection. This manager only observes
//! its callback events and keeps three pieces of state, all written from the
//! client's event context and read from the telemetry task:
//!
//! | Event        | connected | generation | discovery_pending |
//! |--------------|-----------|------------|-------------------|
//! | Connected    | `true`    | `+1` on a Disconnected→Connected edge | set on the same edge |
//! | Disconnected | `false`   | —          | —                 |
//! | Error        | —         | —          | — (counted, logged) |
//!
//! The telemetry task drains `discovery_pending` with
//! [`SessionManager::take_discovery_request`], so each session
//! establishment yields at most one discovery burst.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use log::{debug, error, info, warn};

use crate::config::SystemConfig;
use crate::error::{Error, SessionError};

use super::events::SessionEvent;

/// Broker session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
}

/// Parameters for starting the broker client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub broker_url: String,
    pub client_id: String,
    /// `None` ⇒ anonymous.
    pub username: Option<String>,
    pub password: Option<String>,
}

impl SessionConfig {
    /// Build from system config with an already-resolved client identity.
    /// Empty username/password become `None`.
    pub fn new(config: &SystemConfig, client_id: &str) -> Result<Self, Error> {
        if config.broker_url.is_empty() {
            return Err(Error::Config("broker URL is required"));
        }
        if client_id.is_empty() {
            return Err(Error::Config("client identity is required"));
        }
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_owned());
        Ok(Self {
            broker_url: config.broker_url.clone(),
            client_id: client_id.to_owned(),
            username: non_empty(&config.mqtt_username),
            password: non_empty(&config.mqtt_password),
        })
    }

    /// Log the connection parameters. The password is never printed, only
    /// its length.
    pub fn log_summary(&self) {
        info!("MQTT broker: {}", self.broker_url);
        info!("MQTT client id: {}", self.client_id);
        match &self.username {
            Some(u) => info!("MQTT username: {}", u),
            None => warn!("No MQTT username configured (anonymous)"),
        }
        match &self.password {
            Some(p) => info!("MQTT password: {} chars", p.len()),
            None => warn!("No MQTT password configured"),
        }
    }
}

#[derive(Default)]
pub struct SessionManager {
    connected: AtomicBool,
    generation: AtomicU32,
    discovery_pending: AtomicBool,
    transport_errors: AtomicU32,
    refusals: AtomicU32,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        if self.is_connected() {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        }
    }

    /// "Session ready" condition.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Number of Disconnected→Connected transitions observed.
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// `(transport errors, connection refusals)` since boot.
    pub fn error_counts(&self) -> (u32, u32) {
        (
            self.transport_errors.load(Ordering::Relaxed),
            self.refusals.load(Ordering::Relaxed),
        )
    }

    /// Apply one client callback event.
    pub fn handle_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Connected => {
                if self.connected.swap(true, Ordering::AcqRel) {
                    debug!("Session: duplicate Connected ignored");
                    return;
                }
                let generation = self.generation.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
                self.discovery_pending.store(true, Ordering::Release);
                info!("Session: connected to broker (generation {})", generation);
            }
            SessionEvent::Disconnected => {
                if self.connected.swap(false, Ordering::AcqRel) {
                    warn!("Session: disconnected from broker");
                }
            }
            SessionEvent::Error(e) => {
                match e {
                    SessionError::Transport { .. } => {
                        self.transport_errors.fetch_add(1, Ordering::Relaxed);
                    }
                    SessionError::Refused { .. } => {
                        self.refusals.fetch_add(1, Ordering::Relaxed);
                    }
                    SessionError::Setup(_) => {}
                }
                error!("Session: {}", e);
            }
        }
    }

    /// Consume the pending discovery request for the current session.
    ///
    /// Returns the generation to publish for, or `None` when discovery was
    /// already sent for it. Only drained while connected; a request raised
    /// by a session that dropped before it was served carries over to the
    /// next one.
    pub fn take_discovery_request(&self) -> Option<u32> {
        if !self.is_connected() {
            return None;
        }
        self.discovery_pending
            .swap(false, Ordering::AcqRel)
            .then(|| self.generation())
    }
}
