//! Wi-Fi station-mode adapter.
//!
//! Implements [`StationPort`], the hexagonal boundary between the
//! [`LinkManager`] and the radio. Retry policy lives in the link manager;
//! this adapter only starts the interface, issues association attempts and
//! forwards driver events.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspWifi` plus system event loop
//!   subscriptions. `WifiEvent::StaStarted`/`StaDisconnected` and
//!   `IpEvent::DhcpIpAssigned` are translated to [`LinkEvent`]s and handed
//!   to the link manager on the event task. Retries from that context go
//!   through [`StationHandle`], which calls the driver directly.
//! - **all other targets**: [`SimStation`], which runs a dispatcher thread
//!   that answers each attempt after a short latency, failing a scripted
//!   number of times first.

use std::sync::Arc;

use log::info;

use crate::app::events::LinkEvent;
use crate::app::link::LinkManager;
use crate::app::ports::StationPort;
use crate::error::LinkError;

// ───────────────────────────────────────────────────────────────
// ESP-IDF station
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::{StationHandle, WifiAdapter};

#[cfg(target_os = "espidf")]
mod esp {
    use super::*;

    use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
    use esp_idf_svc::hal::modem::Modem;
    use esp_idf_svc::netif::IpEvent;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::sys::{EspError, esp, esp_wifi_connect, esp_wifi_start};
    use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi, WifiEvent};

    fn driver_error(e: EspError) -> LinkError {
        LinkError::Driver(e.code())
    }

    /// Zero-sized handle used from the event task, where the owning
    /// [`WifiAdapter`] is not reachable.
    pub struct StationHandle;

    impl StationPort for StationHandle {
        fn start(&mut self) -> Result<(), LinkError> {
            // SAFETY: the driver was initialised by `WifiAdapter::new` and
            // outlives the event subscriptions that hold this handle.
            esp!(unsafe { esp_wifi_start() }).map_err(driver_error)
        }

        fn connect(&mut self) -> Result<(), LinkError> {
            // SAFETY: as above.
            esp!(unsafe { esp_wifi_connect() }).map_err(driver_error)
        }
    }

    pub struct WifiAdapter {
        wifi: EspWifi<'static>,
        _wifi_events: EspSubscription<'static, System>,
        _ip_events: EspSubscription<'static, System>,
    }

    impl WifiAdapter {
        /// Configure the station and wire driver events into `link`.
        /// The radio stays idle until [`StationPort::start`].
        pub fn new(
            modem: Modem,
            sysloop: EspSystemEventLoop,
            nvs: Option<EspDefaultNvsPartition>,
            ssid: &str,
            password: &str,
            link: Arc<LinkManager>,
        ) -> Result<Self, LinkError> {
            let mut wifi = EspWifi::new(modem, sysloop.clone(), nvs).map_err(driver_error)?;

            let auth_method = if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            };
            let client = ClientConfiguration {
                ssid: ssid.try_into().map_err(|_| LinkError::Driver(-1))?,
                password: password.try_into().map_err(|_| LinkError::Driver(-1))?,
                auth_method,
                ..Default::default()
            };
            wifi.set_configuration(&Configuration::Client(client))
                .map_err(driver_error)?;

            let wifi_link = link.clone();
            let wifi_events = sysloop
                .subscribe::<WifiEvent, _>(move |event| {
                    let event = match event {
                        WifiEvent::StaStarted { .. } => LinkEvent::StationStarted,
                        WifiEvent::StaDisconnected { .. } => LinkEvent::StationDisconnected,
                        _ => return,
                    };
                    wifi_link.handle_event(event, &mut StationHandle);
                })
                .map_err(driver_error)?;

            let ip_events = sysloop
                .subscribe::<IpEvent, _>(move |event| {
                    if let IpEvent::DhcpIpAssigned(assignment) = event {
                        link.handle_event(LinkEvent::GotAddress(assignment.ip()), &mut StationHandle);
                    }
                })
                .map_err(driver_error)?;

            info!("WiFi: station configured for '{}'", ssid);
            Ok(Self {
                wifi,
                _wifi_events: wifi_events,
                _ip_events: ip_events,
            })
        }
    }

    impl StationPort for WifiAdapter {
        fn start(&mut self) -> Result<(), LinkError> {
            info!("WiFi: starting station");
            self.wifi.start().map_err(driver_error)
        }

        fn connect(&mut self) -> Result<(), LinkError> {
            self.wifi.connect().map_err(driver_error)
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Simulated station
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub use sim::SimStation;

#[cfg(not(target_os = "espidf"))]
mod sim {
    use super::*;

    use core::net::Ipv4Addr;
    use std::sync::mpsc::{self, Sender};
    use std::time::Duration;

    /// Radio handle seen by the link manager on the dispatcher thread.
    /// Each `connect()` queues one association attempt.
    struct SimRadio(Sender<()>);

    impl StationPort for SimRadio {
        fn start(&mut self) -> Result<(), LinkError> {
            Ok(())
        }

        fn connect(&mut self) -> Result<(), LinkError> {
            self.0.send(()).map_err(|_| LinkError::Driver(-1))
        }
    }

    pub struct SimStation {
        link: Arc<LinkManager>,
        failures: u32,
        address: Ipv4Addr,
        latency: Duration,
    }

    impl SimStation {
        /// Station that associates on the first attempt.
        pub fn new(link: Arc<LinkManager>) -> Self {
            Self {
                link,
                failures: 0,
                address: Ipv4Addr::new(192, 168, 4, 2),
                latency: Duration::from_millis(100),
            }
        }

        /// Fail the first `n` association attempts.
        #[must_use]
        pub fn failing(mut self, n: u32) -> Self {
            self.failures = n;
            self
        }

        #[must_use]
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }
    }

    impl StationPort for SimStation {
        /// Spawns the dispatcher thread, which raises `StationStarted` and
        /// then answers attempts until an address is assigned or the link
        /// gives up.
        fn start(&mut self) -> Result<(), LinkError> {
            let link = self.link.clone();
            let mut failures = self.failures;
            let address = self.address;
            let latency = self.latency;

            std::thread::Builder::new()
                .name("sim-dispatch".into())
                .spawn(move || {
                    let (tx, rx) = mpsc::channel();
                    let mut radio = SimRadio(tx);
                    link.handle_event(LinkEvent::StationStarted, &mut radio);

                    while rx.recv_timeout(latency * 4).is_ok() {
                        std::thread::sleep(latency);
                        if failures > 0 {
                            failures -= 1;
                            info!("WiFi(sim): association failed");
                            link.handle_event(LinkEvent::StationDisconnected, &mut radio);
                        } else {
                            info!("WiFi(sim): associated");
                            link.handle_event(LinkEvent::GotAddress(address), &mut radio);
                            break;
                        }
                    }
                })
                .map_err(|_| LinkError::Driver(-1))?;
            Ok(())
        }

        /// Attempts are issued by the dispatcher thread.
        fn connect(&mut self) -> Result<(), LinkError> {
            Ok(())
        }
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;
    use crate::app::link::LinkState;
    use std::time::Duration;

    #[test]
    fn sim_station_connects_first_time() {
        let link = Arc::new(LinkManager::new(3));
        let mut sta = SimStation::new(link.clone()).with_latency(Duration::from_millis(5));
        let ip = link.connect(&mut sta, Duration::from_secs(2)).unwrap();
        assert_eq!(Some(ip), link.address());
        assert_eq!(link.retry_count(), 0);
    }

    #[test]
    fn sim_station_recovers_within_retry_budget() {
        let link = Arc::new(LinkManager::new(3));
        let mut sta = SimStation::new(link.clone())
            .failing(3)
            .with_latency(Duration::from_millis(5));
        assert!(link.connect(&mut sta, Duration::from_secs(2)).is_ok());
        assert_eq!(link.state(), LinkState::Connected);
    }

    #[test]
    fn sim_station_exhausts_retries() {
        let link = Arc::new(LinkManager::new(2));
        let mut sta = SimStation::new(link.clone())
            .failing(10)
            .with_latency(Duration::from_millis(5));
        assert_eq!(
            link.connect(&mut sta, Duration::from_secs(2)),
            Err(LinkError::RetryExhausted)
        );
        assert_eq!(link.state(), LinkState::Failed);
    }
}
