//! Sensor subsystem — the distance-to-fill converter and the distance
//! sensor implementations.
//!
//! - [`ultrasonic`]: HC-SR04 pulse-timing driver (real hardware).
//! - [`SimulatedSensor`]: deterministic sawtooth used by the host
//!   simulation and when no transducer is fitted.

pub mod ultrasonic;

use crate::app::ports::DistanceSensor;
use crate::error::SensorError;

/// Convert a distance reading into a tank fill percentage.
///
/// `distance_cm` is measured from the sensor face down to the salt surface,
/// so 0 cm means full and `tank_height_cm` means empty. The result is
/// clamped to `[0, 100]`. Readings outside the tank are not rejected: a
/// negative distance clamps to 100 %, one beyond the floor to 0 %, and NaN
/// maps to 0 %.
///
/// `tank_height_cm` must be > 0 (enforced by config validation).
pub fn fill_percentage(distance_cm: f32, tank_height_cm: f32) -> f32 {
    let pct = (tank_height_cm - distance_cm) / tank_height_cm * 100.0;
    if pct.is_nan() {
        return 0.0;
    }
    pct.clamp(0.0, 100.0)
}

// ── Simulated sensor ──────────────────────────────────────────

/// Sawtooth distance source: 10 cm + (n mod 50) × 1.5 cm, n = read count.
///
/// Sweeps 10.0 → 83.5 cm and wraps, so a 100 cm tank cycles through
/// 90 % → 16.5 %.
#[derive(Debug, Default)]
pub struct SimulatedSensor {
    reads: u32,
}

impl SimulatedSensor {
    pub const BASE_CM: f32 = 10.0;
    pub const STEP_CM: f32 = 1.5;
    pub const STEPS: u32 = 50;

    pub fn new() -> Self {
        Self::default()
    }
}

impl DistanceSensor for SimulatedSensor {
    fn read_distance_cm(&mut self) -> Result<f32, SensorError> {
        let d = Self::BASE_CM + (self.reads % Self::STEPS) as f32 * Self::STEP_CM;
        self.reads = self.reads.wrapping_add(1);
        Ok(d)
    }
}
