//! Simulation loop: owns simulated time, orchestrates per-tick physics
//! integration and rendering, and double-buffers frame output.
//!
//! # Invariants
//! - `step` performs only deterministic computation; wall-clock pacing lives
//!   exclusively in the blocking `run` driver.
//! - A failed step leaves the scene exactly as it was before the call.
//! - The frame returned to a consumer lags the most recent step by one tick.

mod sim_loop;

pub use sim_loop::{FrameSink, SimError, SimLoop};

pub fn crate_info() -> &'static str {
    "roadsim-sim v0.1.0"
}
