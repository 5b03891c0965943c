//! Runtime tasks: the core-pinned telemetry thread and the status heartbeat.
//!
//! ```text
//!  telemetry thread (APP core)
//!  └─ futures_lite::block_on
//!     └─ edge_executor::LocalExecutor
//!        ├─ TelemetryTask::run    step(), then async_io_mini::Timer
//!        └─ StatusReporter::run   every status_interval_secs
//! ```
//!
//! Link and session callbacks stay on the system event task; this thread
//! only reads their state.

use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::info;

use crate::adapters::time::Esp32TimeAdapter;
use crate::app::link::LinkManager;
use crate::app::ports::{DistanceSensor, EventSink, PublishPort};
use crate::app::session::SessionManager;
use crate::app::telemetry::TelemetryTask;

// ── Core pinning ──────────────────────────────────────────────

/// CPU core identifiers for the ESP32 dual-core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// Core 0 (PRO_CPU): Wi-Fi, lwIP and the MQTT client task.
    Pro = 0,
    /// Core 1 (APP_CPU): application logic.
    App = 1,
}

/// Spawn a thread pinned to `core` with explicit priority and stack size.
///
/// `esp_pthread_set_cfg()` configures the *next* `pthread_create()` from
/// the calling thread, so the config→spawn pair must not interleave with
/// other thread creation. `name` must be NUL-terminated (e.g. `"telemetry\0"`).
#[cfg(target_os = "espidf")]
pub fn spawn_on_core(
    core: Core,
    priority: u8,
    stack_kb: usize,
    name: &'static str,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    use esp_idf_svc::sys;

    // SAFETY: the config struct lives across the call; `name` is 'static
    // and NUL-terminated.
    let ret = unsafe {
        let mut cfg = sys::esp_create_default_pthread_config();
        cfg.pin_to_core = core as i32;
        cfg.prio = i32::from(priority);
        cfg.stack_size = (stack_kb * 1024) as _;
        cfg.thread_name = name.as_ptr().cast();
        sys::esp_pthread_set_cfg(&cfg)
    };
    if ret != sys::ESP_OK as i32 {
        return Err(io::Error::other(format!("esp_pthread_set_cfg failed: {ret}")));
    }

    let display_name = name.trim_end_matches('\0');
    info!(
        "Spawning '{}' on {:?} (pri={}, stack={}KB)",
        display_name, core, priority, stack_kb
    );
    std::thread::Builder::new().name(display_name.into()).spawn(f)
}

/// Simulation fallback. Ignores core affinity and priority.
#[cfg(not(target_os = "espidf"))]
pub fn spawn_on_core(
    _core: Core,
    _priority: u8,
    stack_kb: usize,
    name: &'static str,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    let display_name = name.trim_end_matches('\0');
    info!("Spawning '{}' (sim, stack={}KB)", display_name, stack_kb);
    std::thread::Builder::new()
        .name(display_name.into())
        .stack_size(stack_kb * 1024)
        .spawn(f)
}

// ── Status heartbeat ──────────────────────────────────────────

/// Periodic one-line summary of link and session health.
pub struct StatusReporter {
    link: Arc<LinkManager>,
    session: Arc<SessionManager>,
    clock: Esp32TimeAdapter,
    interval: Duration,
}

impl StatusReporter {
    pub fn new(
        link: Arc<LinkManager>,
        session: Arc<SessionManager>,
        clock: Esp32TimeAdapter,
        interval: Duration,
    ) -> Self {
        Self {
            link,
            session,
            clock,
            interval,
        }
    }

    pub fn report(&self) {
        let (transport, refused) = self.session.error_counts();
        let address = self
            .link
            .address()
            .map_or_else(|| "-".to_owned(), |ip| ip.to_string());
        info!(
            "STATUS | up={}s | link={:?} ip={} retries={}/{} | session={:?} gen={} | errors transport={} refused={}",
            self.clock.uptime_secs(),
            self.link.state(),
            address,
            self.link.retry_count(),
            self.link.max_retries(),
            self.session.state(),
            self.session.generation(),
            transport,
            refused,
        );
    }

    pub async fn run(self) {
        loop {
            async_io_mini::Timer::after(self.interval).await;
            self.report();
        }
    }
}

// ── Telemetry thread ──────────────────────────────────────────

const TELEMETRY_PRIORITY: u8 = 5;
const TELEMETRY_STACK_KB: usize = 8;

/// Run the telemetry task and the status heartbeat on one executor in a
/// dedicated thread. Neither future completes.
pub fn spawn_telemetry<S, P, E>(
    telemetry: TelemetryTask<S, P, E>,
    status: StatusReporter,
) -> io::Result<JoinHandle<()>>
where
    S: DistanceSensor + Send + 'static,
    P: PublishPort + Send + 'static,
    E: EventSink + Send + 'static,
{
    spawn_on_core(
        Core::App,
        TELEMETRY_PRIORITY,
        TELEMETRY_STACK_KB,
        "telemetry\0",
        move || {
            let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();
            executor.spawn(telemetry.run()).detach();
            executor.spawn(status.run()).detach();
            info!("Telemetry task started");
            futures_lite::future::block_on(executor.run(core::future::pending::<()>()));
        },
    )
}
