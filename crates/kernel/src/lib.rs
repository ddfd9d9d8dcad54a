//! Vehicle kernel: car state, motor-controller setpoints, kinematic integration.
//!
//! # Invariants
//! - The car pose is mutated only by `Car::integrate`; accessors return copies.
//! - Setpoints are clamped against the motor limits at write time.
//! - A diverged integration step is never committed.

mod car;

pub use car::{Car, CarState, ChassisParams, KernelError, MotorLimits, Vesc};

pub fn crate_info() -> &'static str {
    "roadsim-kernel v0.1.0"
}
