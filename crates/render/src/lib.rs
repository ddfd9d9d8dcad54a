//! Camera rendering: renderer-agnostic interface with a deterministic CPU
//! backend.
//!
//! # Invariants
//! - Rendering never mutates simulation state.
//! - A returned frame buffer is an owned snapshot, never an alias into live
//!   simulator state.
//! - The same pose, geometry and configuration produce byte-identical output.
//!
//! The shipped backend projects scene geometry points through a pinhole
//! camera and splats them into a grayscale buffer. The camera is a sensor
//! transform, not a rasterizer; the trait is the seam where a heavier
//! backend could be swapped in without changing consumers.

mod framebuffer;
mod renderer;

pub use framebuffer::FrameBuffer;
pub use renderer::{PointSplatRenderer, RenderError, Renderer, SceneGeometry, validate_config};

pub fn crate_info() -> &'static str {
    "roadsim-render v0.1.0"
}
