//! GPIO pin assignments for the salt level monitor board.
//!
//! Single source of truth; `main` builds the pin drivers from these numbers.

// ---------------------------------------------------------------------------
// HC-SR04 ultrasonic range finder (mounted in the brine tank lid)
// ---------------------------------------------------------------------------

/// Digital output: 10 µs HIGH pulse starts a ping.
pub const TRIGGER_GPIO: i32 = 5;
/// Digital input: HIGH for the echo round-trip time.
/// The HC-SR04 drives 5 V; a divider brings it down to 3.3 V.
pub const ECHO_GPIO: i32 = 18;
