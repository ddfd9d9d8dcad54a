//! Shared spatial types for the roadsim engine.
//!
//! # Invariants
//! - Pose components are finite and scale is positive once validated.
//! - All types are plain values; no component keeps references into another.

mod types;

pub use types::{CameraConfig, Pose, PoseError};

pub fn crate_info() -> &'static str {
    "roadsim-common v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("common"));
    }
}
