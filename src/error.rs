//! Unified error types for the salt level monitor firmware.
//!
//! A single `Error` enum that every subsystem converts into. All variants
//! are `Copy` so they can be handed between the event-dispatcher context
//! and the telemetry task without allocation.
//!
//! Only boot failures ever leave `main`: persistent store bring-up, the
//! link timeout and broker client setup. Everything else is logged where
//! it happens.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Boot-fatal peripheral or storage initialisation failure.
    Init(&'static str),
    /// Station link could not be established.
    Link(LinkError),
    /// Broker session reported an error.
    Session(SessionError),
    /// A publish was skipped or refused by the client.
    Publish(PublishError),
    /// The distance sensor could not be read.
    Sensor(SensorError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Session(e) => write!(f, "session: {e}"),
            Self::Publish(e) => write!(f, "publish: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Link errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// MaxRetries consecutive disconnects without an address. Latched.
    RetryExhausted,
    /// Neither "ready" nor "failed" was observed within the boot timeout.
    Timeout,
    /// The station driver rejected a start/connect call (raw `esp_err_t`).
    Driver(i32),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetryExhausted => write!(f, "retries exhausted"),
            Self::Timeout => write!(f, "timed out waiting for address"),
            Self::Driver(rc) => write!(f, "station driver error (rc={rc})"),
        }
    }
}

impl std::error::Error for LinkError {}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

/// Broker session error, as classified from the client's error event.
/// Neither kind is fatal; the client keeps reconnecting on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// Transport-level failure (socket/TLS), carrying the raw error code.
    Transport { code: i32 },
    /// The broker rejected the CONNECT, carrying its return code.
    Refused { code: u32 },
    /// The client could not be created from the given configuration.
    Setup(i32),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { code } => write!(f, "transport error 0x{code:x}"),
            Self::Refused { code } => write!(f, "connection refused 0x{code:x}"),
            Self::Setup(rc) => write!(f, "client setup failed (rc={rc})"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<SessionError> for Error {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

// ---------------------------------------------------------------------------
// Publish errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    /// Session not connected; nothing was handed to the client.
    NotConnected,
    /// The client refused to enqueue the message (raw error code).
    Rejected(i32),
    /// Payload could not be serialised.
    Encode,
    /// Topic did not fit the fixed-size topic buffer.
    TopicTooLong,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "session not connected"),
            Self::Rejected(rc) => write!(f, "client rejected message (rc={rc})"),
            Self::Encode => write!(f, "payload encoding failed"),
            Self::TopicTooLong => write!(f, "topic too long"),
        }
    }
}

impl std::error::Error for PublishError {}

impl From<PublishError> for Error {
    fn from(e: PublishError) -> Self {
        Self::Publish(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Echo line never went high after the trigger pulse.
    NoEcho,
    /// Echo line stayed high past the maximum range window.
    EchoTimeout,
    /// GPIO read or write returned an error.
    GpioFailed,
    /// The reading was NaN or infinite.
    InvalidReading,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoEcho => write!(f, "no echo"),
            Self::EchoTimeout => write!(f, "echo timeout"),
            Self::GpioFailed => write!(f, "GPIO access failed"),
            Self::InvalidReading => write!(f, "non-finite reading"),
        }
    }
}

impl std::error::Error for SensorError {}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
