//! System configuration parameters
//!
//! All tunable parameters for the salt level monitor. Defaults are baked in
//! at build time from environment variables (see `build.rs`) and can be
//! overridden by a validated blob stored in NVS.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Fallbacks used when the build environment leaves a value unset.
const DEFAULT_BROKER_URL: &str = "mqtt://homeassistant.local:1883";
const DEFAULT_CLIENT_ID: &str = "salt_level_monitor";
const DEFAULT_MAX_RETRY: u8 = 5;
const DEFAULT_TANK_HEIGHT_CM: f32 = 100.0;
const DEFAULT_READING_INTERVAL_SECS: u32 = 60;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Wi-Fi ---
    /// Access point SSID
    pub wifi_ssid: String,
    /// Access point passphrase (empty for open networks)
    pub wifi_password: String,
    /// Consecutive disconnects tolerated before the link latches `Failed`
    pub wifi_max_retries: u8,
    /// Upper bound on the boot-time wait for an address (seconds)
    pub link_timeout_secs: u32,

    // --- Broker ---
    /// Broker URI, e.g. `mqtt://192.168.1.10:1883`
    pub broker_url: String,
    /// MQTT client identity; also the discovery node id. Empty = MAC-derived.
    pub client_id: String,
    /// Broker username (empty = anonymous)
    pub mqtt_username: String,
    /// Broker password (empty = none)
    pub mqtt_password: String,

    // --- Tank ---
    /// Distance from the sensor face to the tank floor (cm)
    pub tank_height_cm: f32,

    // --- Timing ---
    /// Telemetry period P (seconds)
    pub reading_interval_secs: u32,
    /// Session readiness poll interval while awaiting the broker (ms)
    pub session_poll_interval_ms: u32,
    /// Extra delay after the session first reports connected (ms)
    pub session_settle_ms: u32,
    /// Status heartbeat interval (seconds)
    pub status_interval_secs: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_password: String::new(),
            wifi_max_retries: DEFAULT_MAX_RETRY,
            link_timeout_secs: 120,

            broker_url: DEFAULT_BROKER_URL.into(),
            client_id: DEFAULT_CLIENT_ID.into(),
            mqtt_username: String::new(),
            mqtt_password: String::new(),

            tank_height_cm: DEFAULT_TANK_HEIGHT_CM,

            reading_interval_secs: DEFAULT_READING_INTERVAL_SECS,
            session_poll_interval_ms: 1000,
            session_settle_ms: 2000,
            status_interval_secs: 300,
        }
    }
}

impl SystemConfig {
    /// Build the default configuration from build-time environment values.
    ///
    /// Numeric values that fail to parse fall back to the compiled default.
    pub fn from_build_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = option_env!("WIFI_SSID") {
            cfg.wifi_ssid = v.into();
        }
        if let Some(v) = option_env!("WIFI_PASSWORD") {
            cfg.wifi_password = v.into();
        }
        if let Some(v) = option_env!("MQTT_BROKER_URL") {
            cfg.broker_url = v.into();
        }
        if let Some(v) = option_env!("MQTT_CLIENT_ID") {
            cfg.client_id = v.into();
        }
        if let Some(v) = option_env!("MQTT_USERNAME") {
            cfg.mqtt_username = v.into();
        }
        if let Some(v) = option_env!("MQTT_PASSWORD") {
            cfg.mqtt_password = v.into();
        }
        cfg.wifi_max_retries = parse_or(option_env!("WIFI_MAX_RETRY"), DEFAULT_MAX_RETRY);
        cfg.tank_height_cm = parse_or(option_env!("TANK_HEIGHT_CM"), DEFAULT_TANK_HEIGHT_CM);
        cfg.reading_interval_secs = parse_or(
            option_env!("READING_INTERVAL_SEC"),
            DEFAULT_READING_INTERVAL_SECS,
        );
        cfg
    }

    /// Range-check every field. Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_ssid(&self.wifi_ssid)?;
        validate_wifi_password(&self.wifi_password)?;
        if self.link_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed("link_timeout_secs must be > 0"));
        }
        validate_broker_url(&self.broker_url)?;
        // Empty client id is allowed here; the MAC-derived identity fills it in.
        if !self.client_id.is_empty() {
            validate_client_id(&self.client_id)?;
        }
        if !self.tank_height_cm.is_finite() || self.tank_height_cm <= 0.0 {
            return Err(ConfigError::ValidationFailed(
                "tank_height_cm must be a finite value > 0",
            ));
        }
        if !(1..=86_400).contains(&self.reading_interval_secs) {
            return Err(ConfigError::ValidationFailed(
                "reading_interval_secs must be 1–86400",
            ));
        }
        if !(10..=60_000).contains(&self.session_poll_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "session_poll_interval_ms must be 10–60000",
            ));
        }
        if self.session_settle_ms > 60_000 {
            return Err(ConfigError::ValidationFailed(
                "session_settle_ms must be ≤ 60000",
            ));
        }
        if self.status_interval_secs == 0 {
            return Err(ConfigError::ValidationFailed("status_interval_secs must be > 0"));
        }
        Ok(())
    }

    /// Reset every out-of-range field to its compiled default and return
    /// the names of the fields that were reset.
    ///
    /// Wi-Fi credentials have no usable default and are left as they are;
    /// an invalid client id is cleared so the MAC-derived identity is used.
    pub fn repair(&mut self) -> Vec<&'static str> {
        let defaults = Self::default();
        let mut reset = Vec::new();

        if self.link_timeout_secs == 0 {
            self.link_timeout_secs = defaults.link_timeout_secs;
            reset.push("link_timeout_secs");
        }
        if validate_broker_url(&self.broker_url).is_err() {
            self.broker_url = defaults.broker_url;
            reset.push("broker_url");
        }
        if !self.client_id.is_empty() && validate_client_id(&self.client_id).is_err() {
            self.client_id.clear();
            reset.push("client_id");
        }
        if !self.tank_height_cm.is_finite() || self.tank_height_cm <= 0.0 {
            self.tank_height_cm = defaults.tank_height_cm;
            reset.push("tank_height_cm");
        }
        if !(1..=86_400).contains(&self.reading_interval_secs) {
            self.reading_interval_secs = defaults.reading_interval_secs;
            reset.push("reading_interval_secs");
        }
        if !(10..=60_000).contains(&self.session_poll_interval_ms) {
            self.session_poll_interval_ms = defaults.session_poll_interval_ms;
            reset.push("session_poll_interval_ms");
        }
        if self.session_settle_ms > 60_000 {
            self.session_settle_ms = defaults.session_settle_ms;
            reset.push("session_settle_ms");
        }
        if self.status_interval_secs == 0 {
            self.status_interval_secs = defaults.status_interval_secs;
            reset.push("status_interval_secs");
        }

        for field in &reset {
            warn!("Config: {} out of range, using compiled default", field);
        }
        reset
    }
}

fn parse_or<T: core::str::FromStr>(raw: Option<&str>, fallback: T) -> T {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(fallback)
}

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// SSID must be 1–32 printable ASCII bytes.
pub fn validate_ssid(ssid: &str) -> Result<(), ConfigError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConfigError::ValidationFailed(
            "wifi_ssid must be 1–32 printable ASCII bytes",
        ));
    }
    Ok(())
}

/// WPA2 passphrase must be 8–64 bytes; empty means an open network.
pub fn validate_wifi_password(password: &str) -> Result<(), ConfigError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConfigError::ValidationFailed(
            "wifi_password must be empty or 8–64 bytes",
        ));
    }
    Ok(())
}

fn validate_broker_url(url: &str) -> Result<(), ConfigError> {
    const SCHEMES: [&str; 4] = ["mqtt://", "mqtts://", "ws://", "wss://"];
    match SCHEMES.iter().find(|s| url.starts_with(**s)) {
        Some(scheme) if url.len() > scheme.len() => Ok(()),
        _ => Err(ConfigError::ValidationFailed(
            "broker_url must be mqtt://, mqtts://, ws:// or wss:// with a host",
        )),
    }
}

/// Client id is embedded in topic levels, so it must not contain MQTT
/// separators or wildcards.
pub fn validate_client_id(id: &str) -> Result<(), ConfigError> {
    if id.is_empty() || id.len() > 64 {
        return Err(ConfigError::ValidationFailed("client_id must be 1–64 bytes"));
    }
    if !is_printable_ascii(id) || id.contains(['/', '+', '#', ' ']) {
        return Err(ConfigError::ValidationFailed(
            "client_id must be printable ASCII without '/', '+', '#' or spaces",
        ));
    }
    Ok(())
}
