use glam::{Vec2, Vec3};
use roadsim_common::{CameraConfig, Pose, PoseError};
use roadsim_kernel::{Car, ChassisParams, MotorLimits};
use roadsim_render::SceneGeometry;
use roadsim_track::{Segment, Track, TrackError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Current schema version of the scene description file.
pub const SCENE_SCHEMA_VERSION: u32 = 1;

/// Arclength spacing used when turning the track into camera geometry.
const GEOMETRY_INTERVAL: f32 = 0.05;

/// Errors from loading a scene description.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("failed to read scene file: {0}")]
    Load(#[from] std::io::Error),
    #[error("malformed scene description: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("scene schema version mismatch: file has v{file_version}, expected v{expected_version}")]
    Version {
        file_version: u32,
        expected_version: u32,
    },
    #[error("invalid track in scene description: {0}")]
    Track(#[from] TrackError),
    #[error("invalid pose in scene description: {0}")]
    Pose(#[from] PoseError),
}

/// Unique identifier for an item in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

/// What kind of object an item represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Obstacle,
    StartLine,
    Crosswalk,
}

/// An item is everything in the scene that is not the car or the track:
/// obstacles, ground markings and the like.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub kind: ItemKind,
    pub name: String,
    pub pose: Pose,
}

/// Serialized form of the scene, as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SceneDescription {
    version: u32,
    #[serde(default)]
    paused: bool,
    #[serde(default)]
    car: CarDescription,
    track: TrackDescription,
    #[serde(default)]
    items: Vec<ItemDescription>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CarDescription {
    #[serde(default)]
    pose: Pose,
    #[serde(default)]
    limits: MotorLimits,
    #[serde(default)]
    chassis: ChassisParams,
    #[serde(default)]
    camera: CameraConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TrackDescription {
    #[serde(default = "default_track_width")]
    width: f32,
    #[serde(default)]
    control_points: Vec<Vec2>,
    #[serde(default)]
    segments: Vec<Segment>,
}

fn default_track_width() -> f32 {
    0.8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ItemDescription {
    kind: ItemKind,
    #[serde(default)]
    name: String,
    #[serde(default)]
    pose: Pose,
}

/// The complete simulated world state: one car, one track, items and the
/// paused flag.
///
/// External callers mutate a scene only through the car's setpoints, the
/// camera configuration and `paused`; the pose itself is advanced solely by
/// the simulation loop.
#[derive(Debug, Clone)]
pub struct Scene {
    /// While set, physics integration is skipped; rendering and track
    /// queries keep working.
    pub paused: bool,
    car: Car,
    track: Track,
    items: Vec<Item>,
}

impl Scene {
    /// Load a scene from a description file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading scene");
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Build a scene from the JSON text of a description.
    pub fn from_json(text: &str) -> Result<Self, SceneError> {
        let desc: SceneDescription = serde_json::from_str(text)?;
        if desc.version != SCENE_SCHEMA_VERSION {
            return Err(SceneError::Version {
                file_version: desc.version,
                expected_version: SCENE_SCHEMA_VERSION,
            });
        }

        desc.car.pose.validate()?;
        let track = Track::new(
            desc.track.control_points,
            desc.track.segments,
            desc.track.width,
        )?;

        let mut items = Vec::with_capacity(desc.items.len());
        for item in desc.items {
            item.pose.validate()?;
            items.push(Item {
                id: ItemId::new(),
                kind: item.kind,
                name: item.name,
                pose: item.pose,
            });
        }

        let car = Car::new(desc.car.pose, desc.car.limits, desc.car.chassis, desc.car.camera);

        tracing::debug!(
            segments = track.segment_count(),
            items = items.len(),
            "scene ready"
        );
        Ok(Self {
            paused: desc.paused,
            car,
            track,
            items,
        })
    }

    pub fn car(&self) -> &Car {
        &self.car
    }

    pub fn car_mut(&mut self) -> &mut Car {
        &mut self.car
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Sample the track centerline as discrete 2D points spaced at most
    /// `interval` apart. Independent of the simulation loop.
    pub fn path_through_track(&self, interval: f32) -> Result<Vec<Vec2>, TrackError> {
        self.track.sample_path(interval)
    }

    /// World-space geometry observed by the car camera: track centerline,
    /// lane boundaries and item markers.
    pub fn geometry(&self) -> SceneGeometry {
        // GEOMETRY_INTERVAL is a positive constant, so sampling cannot fail.
        let centerline = self
            .track
            .sample_path(GEOMETRY_INTERVAL)
            .unwrap_or_default();
        let half_width = self.track.width() * 0.5;

        let mut points = Vec::with_capacity(centerline.len() * 3 + self.items.len());
        for (i, p) in centerline.iter().enumerate() {
            points.push(ground_to_world(*p));

            // lane boundaries, offset along the local normal
            let dir = if i + 1 < centerline.len() {
                centerline[i + 1] - *p
            } else if i > 0 {
                *p - centerline[i - 1]
            } else {
                Vec2::ZERO
            };
            if dir.length_squared() > 0.0 {
                let normal = Vec2::new(-dir.y, dir.x).normalize();
                points.push(ground_to_world(*p + normal * half_width));
                points.push(ground_to_world(*p - normal * half_width));
            }
        }
        for item in &self.items {
            points.push(item.pose.position);
        }

        SceneGeometry { points }
    }
}

/// Map a ground-plane point into world space (y up).
fn ground_to_world(p: Vec2) -> Vec3 {
    Vec3::new(p.x, 0.0, p.y)
}
