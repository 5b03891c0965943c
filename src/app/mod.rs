//! Application core — connectivity and telemetry state machines, zero I/O.
//!
//! Components, leaves first: [`link`] (station lifecycle and retry policy),
//! [`session`] (broker connection state), [`discovery`] (registration
//! records) and [`telemetry`] (the measure-and-publish loop). All contact
//! with the radio, broker client and sensor goes through the **port traits**
//! in [`ports`], so this layer is testable without real peripherals.

pub mod discovery;
pub mod events;
pub mod link;
pub mod ports;
pub mod session;
pub mod telemetry;
