//! Network link manager — station lifecycle and bounded retry policy.
//!
//! Transition table (driven by [`LinkEvent`]s from the event dispatcher):
//!
//! ```text
//!  state         event                 guard               next        side effect
//!  ───────────── ───────────────────── ─────────────────── ─────────── ─────────────────────
//!  !Failed       StationStarted                            Connecting  station.connect()
//!  !Failed       StationDisconnected   retries < max       Connecting  retries += 1, connect()
//!  !Failed       StationDisconnected   retries == max      Failed      raise "failed" (once)
//!  !Failed       GotAddress(ip)                            Connected   retries = 0, raise "ready"
//!  Failed        *                                         Failed      (ignored until reset)
//! ```
//!
//! The dispatcher is the only writer. Readers go through [`LinkManager::state`]
//! and [`LinkManager::is_ready`], or block in [`LinkManager::connect`].

use core::net::Ipv4Addr;
use core::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use core::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::{debug, error, info, warn};

use crate::error::LinkError;

use super::events::LinkEvent;
use super::ports::StationPort;

/// Station link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    /// Terminal until [`LinkManager::reset`].
    Failed = 3,
}

impl LinkState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Disconnected,
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Failed,
        }
    }
}

/// Latched result observed by [`LinkManager::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Ready(Ipv4Addr),
    Failed,
}

pub struct LinkManager {
    state: AtomicU8,
    retries: AtomicU8,
    max_retries: u8,
    address: AtomicU32,
    outcome: Signal<CriticalSectionRawMutex, LinkOutcome>,
}

impl LinkManager {
    pub fn new(max_retries: u8) -> Self {
        Self {
            state: AtomicU8::new(LinkState::Disconnected as u8),
            retries: AtomicU8::new(0),
            max_retries,
            address: AtomicU32::new(0),
            outcome: Signal::new(),
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> LinkState {
        LinkState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// "Link ready" condition: true from `GotAddress` until the next disconnect.
    pub fn is_ready(&self) -> bool {
        self.state() == LinkState::Connected
    }

    pub fn retry_count(&self) -> u8 {
        self.retries.load(Ordering::Acquire)
    }

    pub fn max_retries(&self) -> u8 {
        self.max_retries
    }

    /// Last address acquired, if the link is currently up.
    pub fn address(&self) -> Option<Ipv4Addr> {
        self.is_ready()
            .then(|| Ipv4Addr::from(self.address.load(Ordering::Acquire)))
    }

    // ── Event handling (dispatcher context) ───────────────────

    /// Apply one transport event.
    ///
    /// Returns the outcome when this event raised the "ready" or "failed"
    /// signal, `None` otherwise. "Failed" is raised exactly once per reset.
    pub fn handle_event(
        &self,
        event: LinkEvent,
        station: &mut impl StationPort,
    ) -> Option<LinkOutcome> {
        if self.state() == LinkState::Failed {
            debug!("Link: {:?} ignored while Failed", event);
            return None;
        }

        match event {
            LinkEvent::StationStarted => {
                self.set_state(LinkState::Connecting);
                Self::attempt(station);
                None
            }
            LinkEvent::StationDisconnected => {
                if self.state() == LinkState::Connected {
                    warn!("Link: association lost");
                }
                let retries = self.retries.load(Ordering::Acquire);
                if retries < self.max_retries {
                    self.retries.store(retries + 1, Ordering::Release);
                    self.set_state(LinkState::Connecting);
                    info!("Link: retry {}/{} to connect to the AP", retries + 1, self.max_retries);
                    Self::attempt(station);
                    None
                } else {
                    let prev = self.state.swap(LinkState::Failed as u8, Ordering::AcqRel);
                    if prev == LinkState::Failed as u8 {
                        return None;
                    }
                    error!("Link: failed after {} retries, giving up", self.max_retries);
                    self.outcome.signal(LinkOutcome::Failed);
                    Some(LinkOutcome::Failed)
                }
            }
            LinkEvent::GotAddress(ip) => {
                self.retries.store(0, Ordering::Release);
                self.address.store(u32::from(ip), Ordering::Release);
                self.set_state(LinkState::Connected);
                info!("Link: got address {}", ip);
                self.outcome.signal(LinkOutcome::Ready(ip));
                Some(LinkOutcome::Ready(ip))
            }
        }
    }

    // ── Boot-time wait ────────────────────────────────────────

    /// Start the station and block until the link is ready or has failed.
    ///
    /// The wait is a signal await raced against `timeout`; it never spins.
    pub fn connect(
        &self,
        station: &mut impl StationPort,
        timeout: Duration,
    ) -> Result<Ipv4Addr, LinkError> {
        match self.state() {
            LinkState::Connected => {
                if let Some(ip) = self.address() {
                    return Ok(ip);
                }
            }
            LinkState::Failed => return Err(LinkError::RetryExhausted),
            _ => {}
        }

        self.outcome.reset();
        station.start()?;
        info!("Link: station started, waiting up to {}s for an address", timeout.as_secs());

        let ready = async { Some(self.outcome.wait().await) };
        let deadline = async {
            async_io_mini::Timer::after(timeout).await;
            None
        };

        match futures_lite::future::block_on(futures_lite::future::or(ready, deadline)) {
            Some(LinkOutcome::Ready(ip)) => Ok(ip),
            Some(LinkOutcome::Failed) => Err(LinkError::RetryExhausted),
            None => {
                warn!("Link: no outcome within {}s", timeout.as_secs());
                Err(LinkError::Timeout)
            }
        }
    }

    /// Explicit reset out of `Failed` (or any state) back to `Disconnected`.
    pub fn reset(&self) {
        self.retries.store(0, Ordering::Release);
        self.set_state(LinkState::Disconnected);
        self.outcome.reset();
        info!("Link: reset");
    }

    // ── Internal ──────────────────────────────────────────────

    fn set_state(&self, next: LinkState) {
        self.state.store(next as u8, Ordering::Release);
    }

    fn attempt(station: &mut impl StationPort) {
        if let Err(e) = station.connect() {
            warn!("Link: connect attempt not issued: {}", e);
        }
    }
}
