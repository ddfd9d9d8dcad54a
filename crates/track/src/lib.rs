//! Track centerline geometry and arclength path sampling.
//!
//! # Invariants
//! - A constructed track is immutable; all queries are pure.
//! - Consecutive segments share their joining control point.
//! - Sampled paths start exactly at the first control point and land exactly
//!   on the track end (or closure) point.

mod path;

pub use path::{Segment, Track, TrackError};

pub fn crate_info() -> &'static str {
    "roadsim-track v0.1.0"
}
