use crate::FrameBuffer;
use glam::{Mat4, Vec3};
use roadsim_common::{CameraConfig, Pose};

/// Errors from camera configuration and rendering.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("camera image dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("camera field of view must be positive, got {0}")]
    InvalidFov(f32),
}

/// Check a camera configuration against the render constraints.
pub fn validate_config(config: &CameraConfig) -> Result<(), RenderError> {
    if config.image_width == 0 || config.image_height == 0 {
        return Err(RenderError::InvalidDimensions {
            width: config.image_width,
            height: config.image_height,
        });
    }
    if config.fov <= 0.0 || config.fov.is_nan() {
        return Err(RenderError::InvalidFov(config.fov));
    }
    Ok(())
}

/// World-space points the camera can observe.
///
/// Produced by the scene layer from the track centerline, lane boundaries
/// and item markers; the renderer treats it as opaque geometry.
#[derive(Debug, Clone, Default)]
pub struct SceneGeometry {
    pub points: Vec<Vec3>,
}

/// Renderer-agnostic interface. All renderers implement this trait.
///
/// The renderer reads a body pose, geometry and camera configuration, then
/// produces output. It never mutates simulation state.
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    /// Render one frame as seen from the camera mounted on `body_pose`.
    fn render(
        &self,
        body_pose: &Pose,
        geometry: &SceneGeometry,
        config: &CameraConfig,
    ) -> Result<Self::Output, RenderError>;
}

/// Deterministic CPU renderer: projects every geometry point through a
/// pinhole camera and splats hits into a grayscale buffer.
#[derive(Debug, Clone, Copy)]
pub struct PointSplatRenderer {
    pub near: f32,
    pub far: f32,
}

impl Default for PointSplatRenderer {
    fn default() -> Self {
        Self {
            near: 0.05,
            far: 100.0,
        }
    }
}

impl PointSplatRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for PointSplatRenderer {
    type Output = FrameBuffer;

    fn render(
        &self,
        body_pose: &Pose,
        geometry: &SceneGeometry,
        config: &CameraConfig,
    ) -> Result<FrameBuffer, RenderError> {
        validate_config(config)?;

        // Camera frame in world space: body pose composed with the mount.
        // Camera-local forward is +X, up is +Y.
        let cam = body_pose.matrix() * config.mount.matrix();
        let eye = cam.transform_point3(Vec3::ZERO);
        let forward = cam.transform_vector3(Vec3::X).normalize();
        let up = cam.transform_vector3(Vec3::Y).normalize();

        let view = Mat4::look_at_rh(eye, eye + forward, up);
        let proj = Mat4::perspective_rh(config.fov, config.aspect_ratio(), self.near, self.far);
        let view_proj = proj * view;

        let width = config.image_width;
        let height = config.image_height;
        let mut frame = FrameBuffer::zeroed(width, height);

        for point in &geometry.points {
            let clip = view_proj * point.extend(1.0);
            if clip.w <= 0.0 {
                continue;
            }
            let ndc = clip.truncate() / clip.w;
            if ndc.x < -1.0
                || ndc.x > 1.0
                || ndc.y < -1.0
                || ndc.y > 1.0
                || ndc.z < 0.0
                || ndc.z > 1.0
            {
                continue;
            }
            let px = (((ndc.x + 1.0) * 0.5) * width as f32) as u32;
            let py = (((1.0 - ndc.y) * 0.5) * height as f32) as u32;
            frame.set(px.min(width - 1), py.min(height - 1), u8::MAX);
        }

        tracing::trace!(lit = frame.lit_count(), "rendered frame");
        Ok(frame)
    }
}
