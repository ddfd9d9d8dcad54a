use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Errors from validating spatial types.
#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    #[error("pose contains non-finite components")]
    NonFinite,
    #[error("pose scale must be positive, got {0}")]
    NonPositiveScale(f32),
}

/// Spatial pose of a simulated body: position, orientation, uniform scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
    #[serde(default = "default_scale")]
    pub scale: f32,
}

fn default_scale() -> f32 {
    1.0
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: 1.0,
        }
    }
}

impl Pose {
    /// Pose at the given position with identity rotation and unit scale.
    pub fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: Vec3::new(x, y, z),
            ..Self::default()
        }
    }

    /// Whether every component is finite.
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }

    /// Check the pose invariants: finite components, positive scale.
    pub fn validate(&self) -> Result<(), PoseError> {
        if !self.is_finite() {
            return Err(PoseError::NonFinite);
        }
        if self.scale <= 0.0 {
            return Err(PoseError::NonPositiveScale(self.scale));
        }
        Ok(())
    }

    /// The TRS matrix of this pose (uniform scale).
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            self.rotation,
            self.position,
        )
    }
}

/// Configuration of the car's main camera.
///
/// `mount` is the camera pose relative to the car body. The defaults place
/// the sensor 0.26 m above and 0.11 m ahead of the rear-axle reference point,
/// pitched 12 degrees towards the ground.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub image_width: u32,
    pub image_height: u32,
    /// Vertical field of view in radians.
    pub fov: f32,
    #[serde(default = "default_mount")]
    pub mount: Pose,
}

fn default_mount() -> Pose {
    Pose {
        position: Vec3::new(0.11, 0.26, 0.0),
        rotation: Quat::from_rotation_z(-12.0_f32.to_radians()),
        scale: 1.0,
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            image_width: 2064,
            image_height: 1544,
            fov: std::f32::consts::FRAC_PI_2,
            mount: default_mount(),
        }
    }
}

impl CameraConfig {
    pub fn aspect_ratio(&self) -> f32 {
        self.image_width as f32 / self.image_height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose_default_is_identity() {
        let p = Pose::default();
        assert_eq!(p.position, Vec3::ZERO);
        assert_eq!(p.rotation, Quat::IDENTITY);
        assert_eq!(p.scale, 1.0);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn pose_rejects_non_finite() {
        let p = Pose {
            position: Vec3::new(f32::NAN, 0.0, 0.0),
            ..Pose::default()
        };
        assert!(matches!(p.validate(), Err(PoseError::NonFinite)));
    }

    #[test]
    fn pose_rejects_non_positive_scale() {
        let p = Pose {
            scale: 0.0,
            ..Pose::default()
        };
        assert!(matches!(p.validate(), Err(PoseError::NonPositiveScale(_))));
    }

    #[test]
    fn pose_matrix_translates() {
        let p = Pose::from_xyz(1.0, 2.0, 3.0);
        let v = p.matrix().transform_point3(Vec3::ZERO);
        assert!((v - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-6);
    }

    #[test]
    fn camera_config_defaults() {
        let c = CameraConfig::default();
        assert_eq!(c.image_width, 2064);
        assert_eq!(c.image_height, 1544);
        assert!(c.fov > 0.0);
        assert!((c.aspect_ratio() - 2064.0 / 1544.0).abs() < 1e-6);
    }

    #[test]
    fn camera_mount_sits_above_body() {
        let c = CameraConfig::default();
        assert!(c.mount.position.y > 0.0);
        assert!(c.mount.validate().is_ok());
    }
}
