//! Salt level monitor firmware library.
//!
//! Exposes the connectivity core and adapters for the binary and for
//! integration tests. ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module; host builds get
//! simulation backends in the same places.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod pins;
pub mod sensors;
pub mod tasks;
