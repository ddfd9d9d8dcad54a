//! Scene composition: car, track and items loaded from a stored description,
//! plus process-wide settings.
//!
//! # Invariants
//! - A Scene is constructed only by loading a complete, valid description;
//!   no partially constructed Scene is observable.
//! - The track is immutable once loaded; external callers mutate the scene
//!   only through the car's setpoints, camera config and the paused flag.

mod scene;
mod settings;

pub use scene::{Item, ItemId, ItemKind, Scene, SceneError, SCENE_SCHEMA_VERSION};
pub use settings::{Settings, SettingsError};

pub fn crate_info() -> &'static str {
    "roadsim-scene v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("scene"));
    }
}
