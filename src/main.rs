//! Salt Level Monitor Firmware — Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  WifiAdapter     MqttSession    NvsAdapter    Hcsr04           │
//! │  (StationPort)   (PublishPort)  (ConfigPort)  (DistanceSensor) │
//! │  LogEventSink    Esp32TimeAdapter                              │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  LinkManager → SessionManager → Discovery → Telemetry  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Event task: link + session callbacks                          │
//! │  Telemetry thread: TelemetryTask + StatusReporter              │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! On non-ESP targets the same wiring runs against simulated adapters.
#![deny(unused_must_use)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use log::{error, info, warn};

use saltlevel::adapters::device_id;
use saltlevel::adapters::log_sink::LogEventSink;
use saltlevel::adapters::mqtt::MqttSession;
use saltlevel::adapters::nvs::NvsAdapter;
use saltlevel::adapters::time::Esp32TimeAdapter;
use saltlevel::app::discovery::DiscoveryPublisher;
use saltlevel::app::link::LinkManager;
use saltlevel::app::ports::ConfigPort;
use saltlevel::app::session::{SessionConfig, SessionManager};
use saltlevel::app::telemetry::{TelemetryTask, TelemetryTiming};
use saltlevel::config::SystemConfig;
use saltlevel::error::{Error, LinkError};
use saltlevel::tasks::{self, StatusReporter};

// ── Platform bring-up ─────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn init_logging() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
fn init_logging() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    Ok(())
}

/// The simulation has no access point to name; give it one so the
/// credential checks pass.
#[cfg(not(target_os = "espidf"))]
fn platform_defaults(mut config: SystemConfig) -> SystemConfig {
    if config.wifi_ssid.is_empty() {
        config.wifi_ssid = "sim-ap".into();
    }
    config
}

#[cfg(target_os = "espidf")]
fn platform_defaults(config: SystemConfig) -> SystemConfig {
    config
}

fn load_config(nvs: &NvsAdapter) -> SystemConfig {
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Config: stored config rejected ({}), using build defaults", e);
            SystemConfig::from_build_env()
        }
    };
    let mut config = platform_defaults(config);
    config.repair();
    if let Err(e) = config.validate() {
        error!("Config: {}", e);
    }
    config
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. Bootstrap ──────────────────────────────────────────
    init_logging()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Salt Level Monitor v{}            ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Persistent store (boot-fatal) ──────────────────────
    let nvs = NvsAdapter::new().map_err(|_| Error::Init("persistent store"))?;
    let config = load_config(&nvs);
    info!(
        "Tank height {:.1} cm, reading every {} s",
        config.tank_height_cm, config.reading_interval_secs
    );

    // ── 3. Identity ───────────────────────────────────────────
    let client_id = device_id::resolve_client_id(&config.client_id);
    info!("Client id: {}", client_id);

    // ── 4. Network link ───────────────────────────────────────
    let link = Arc::new(LinkManager::new(config.wifi_max_retries));
    let time = Esp32TimeAdapter::new();

    #[cfg(target_os = "espidf")]
    let (mut station, sensor) = {
        use esp_idf_svc::eventloop::EspSystemEventLoop;
        use esp_idf_svc::hal::delay::Ets;
        use esp_idf_svc::hal::gpio::{AnyInputPin, AnyOutputPin, PinDriver};
        use esp_idf_svc::hal::peripherals::Peripherals;
        use saltlevel::adapters::wifi::WifiAdapter;
        use saltlevel::pins;
        use saltlevel::sensors::ultrasonic::Hcsr04;

        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;
        let station = WifiAdapter::new(
            peripherals.modem,
            sysloop,
            Some(nvs.partition()),
            &config.wifi_ssid,
            &config.wifi_password,
            link.clone(),
        )?;

        // SAFETY: the pin numbers come from `pins` and are used by nothing else.
        let trigger = PinDriver::output(unsafe { AnyOutputPin::new(pins::TRIGGER_GPIO) })?;
        let echo = PinDriver::input(unsafe { AnyInputPin::new(pins::ECHO_GPIO) })?;
        (station, Hcsr04::new(trigger, echo, Ets, time))
    };

    #[cfg(not(target_os = "espidf"))]
    let (mut station, sensor) = (
        saltlevel::adapters::wifi::SimStation::new(link.clone()),
        saltlevel::sensors::SimulatedSensor::new(),
    );

    let link_timeout = Duration::from_secs(u64::from(config.link_timeout_secs));
    match link.connect(&mut station, link_timeout) {
        Ok(ip) => info!("Network ready ({})", ip),
        Err(LinkError::RetryExhausted) => {
            warn!(
                "Connect to the AP failed after {} retries, continuing without network",
                config.wifi_max_retries
            );
        }
        Err(e) => return Err(Error::from(e)).context("waiting for network link"),
    }

    // ── 5. Broker session ─────────────────────────────────────
    let session = Arc::new(SessionManager::new());
    let session_config = SessionConfig::new(&config, &client_id)?;
    let mqtt = MqttSession::start(&session_config, session.clone())?;

    // ── 6. Telemetry ──────────────────────────────────────────
    let discovery = DiscoveryPublisher::new(&client_id, env!("CARGO_PKG_VERSION"))?;
    let telemetry = TelemetryTask::new(
        sensor,
        mqtt,
        LogEventSink::new(),
        session.clone(),
        discovery,
        config.tank_height_cm,
        TelemetryTiming::from(&config),
    );
    let status = StatusReporter::new(
        link.clone(),
        session,
        time,
        Duration::from_secs(u64::from(config.status_interval_secs)),
    );

    let handle = tasks::spawn_telemetry(telemetry, status).context("spawning telemetry thread")?;
    info!("System ready.");

    // The station must outlive the telemetry thread, which never returns.
    handle
        .join()
        .map_err(|_| anyhow!("telemetry thread panicked"))?;
    drop(station);
    Ok(())
}
