use glam::{Quat, Vec3};
use roadsim_common::{CameraConfig, Pose};
use serde::{Deserialize, Serialize};

/// Below this yaw rate (rad/s) the motion is integrated as a straight line.
const YAW_RATE_EPS: f64 = 1e-9;

/// Errors from advancing the vehicle state.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("car state diverged to a non-finite value (x={x}, y={y}, heading={heading})")]
    NumericDivergence { x: f64, y: f64, heading: f64 },
}

/// Physical limits enforced on the motor-controller setpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorLimits {
    /// Maximum velocity magnitude in m/s.
    #[serde(default = "default_max_velocity")]
    pub max_velocity: f64,
    /// Maximum steering angle magnitude in radians.
    #[serde(default = "default_max_steering_angle")]
    pub max_steering_angle: f64,
}

fn default_max_velocity() -> f64 {
    10.0
}

fn default_max_steering_angle() -> f64 {
    0.35
}

impl Default for MotorLimits {
    fn default() -> Self {
        Self {
            max_velocity: default_max_velocity(),
            max_steering_angle: default_max_steering_angle(),
        }
    }
}

/// Chassis geometry consumed by the motion model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChassisParams {
    /// Distance between front and rear axle in meters.
    #[serde(default = "default_wheelbase")]
    pub wheelbase: f64,
}

fn default_wheelbase() -> f64 {
    0.225
}

impl Default for ChassisParams {
    fn default() -> Self {
        Self {
            wheelbase: default_wheelbase(),
        }
    }
}

/// Motor-controller setpoints.
///
/// Writes clamp against the configured limits and have no immediate effect on
/// the pose; the values are consumed by the next `Car::integrate` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vesc {
    velocity: f64,
    steering_angle: f64,
    limits: MotorLimits,
}

impl Vesc {
    pub fn new(limits: MotorLimits) -> Self {
        Self {
            velocity: 0.0,
            steering_angle: 0.0,
            limits,
        }
    }

    /// Current velocity setpoint in m/s.
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Current steering-angle setpoint in radians.
    pub fn steering_angle(&self) -> f64 {
        self.steering_angle
    }

    pub fn limits(&self) -> MotorLimits {
        self.limits
    }

    /// Set the velocity setpoint, clamped to the velocity bound.
    pub fn set_velocity(&mut self, velocity: f64) {
        self.velocity = velocity.clamp(-self.limits.max_velocity, self.limits.max_velocity);
    }

    /// Set the steering-angle setpoint, clamped to the steering bound.
    pub fn set_steering_angle(&mut self, angle: f64) {
        self.steering_angle =
            angle.clamp(-self.limits.max_steering_angle, self.limits.max_steering_angle);
    }
}

/// Planar simulator state of the car in ground-plane coordinates.
///
/// Carried in f64 separately from the f32 render pose, so that long runs do
/// not accumulate single-precision drift.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CarState {
    pub x: f64,
    pub y: f64,
    /// Heading angle in radians; 0 points along +x, positive turns left.
    pub heading: f64,
}

/// The simulated vehicle: planar state, derived pose, motor controller and
/// main camera configuration.
#[derive(Debug, Clone)]
pub struct Car {
    state: CarState,
    pose: Pose,
    vesc: Vesc,
    params: ChassisParams,
    /// Main camera configuration; mutable at any time, consumed at render time.
    pub main_camera: CameraConfig,
}

impl Car {
    /// Create a car at the given initial pose.
    ///
    /// The planar state is derived from the pose's position and yaw; the
    /// pose's y component is kept for the render pose but does not take part
    /// in the planar motion model.
    pub fn new(
        initial_pose: Pose,
        limits: MotorLimits,
        params: ChassisParams,
        main_camera: CameraConfig,
    ) -> Self {
        let forward = initial_pose.rotation * Vec3::X;
        let state = CarState {
            x: initial_pose.position.x as f64,
            y: initial_pose.position.z as f64,
            heading: f64::atan2(forward.z as f64, forward.x as f64),
        };
        let mut car = Self {
            state,
            pose: initial_pose,
            vesc: Vesc::new(limits),
            params,
            main_camera,
        };
        car.sync_pose();
        car
    }

    /// A copy of the current pose.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// A copy of the planar simulator state.
    pub fn state(&self) -> CarState {
        self.state
    }

    pub fn vesc(&self) -> &Vesc {
        &self.vesc
    }

    pub fn vesc_mut(&mut self) -> &mut Vesc {
        &mut self.vesc
    }

    pub fn params(&self) -> ChassisParams {
        self.params
    }

    /// Advance the car by `dt` seconds under the current setpoints.
    ///
    /// Kinematic bicycle model with rear-axle reference and closed-form
    /// circular-arc update. Because the update is the exact solution of the
    /// constant-input dynamics, integrating `dt` in one call agrees with
    /// integrating the same total time across any number of sub-steps.
    ///
    /// The candidate state is committed only if all components are finite;
    /// on divergence the previous state is kept and an error is returned.
    pub fn integrate(&mut self, dt: f64) -> Result<(), KernelError> {
        let v = self.vesc.velocity;
        let delta = self.vesc.steering_angle;
        let s = self.state;

        let yaw_rate = v * delta.tan() / self.params.wheelbase;

        let next = if yaw_rate.abs() < YAW_RATE_EPS {
            CarState {
                x: s.x + v * dt * s.heading.cos(),
                y: s.y + v * dt * s.heading.sin(),
                heading: s.heading,
            }
        } else {
            let radius = v / yaw_rate;
            let heading = s.heading + yaw_rate * dt;
            CarState {
                x: s.x + radius * (heading.sin() - s.heading.sin()),
                y: s.y - radius * (heading.cos() - s.heading.cos()),
                heading,
            }
        };

        if !(next.x.is_finite() && next.y.is_finite() && next.heading.is_finite()) {
            tracing::warn!(
                x = next.x,
                y = next.y,
                heading = next.heading,
                "integration diverged, keeping previous state"
            );
            return Err(KernelError::NumericDivergence {
                x: next.x,
                y: next.y,
                heading: next.heading,
            });
        }

        self.state = next;
        self.sync_pose();
        Ok(())
    }

    /// Rebuild the render pose from the planar state.
    fn sync_pose(&mut self) {
        self.pose.position.x = self.state.x as f32;
        self.pose.position.z = self.state.y as f32;
        self.pose.rotation = Quat::from_rotation_y(-self.state.heading as f32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_car() -> Car {
        Car::new(
            Pose::default(),
            MotorLimits::default(),
            ChassisParams::default(),
            CameraConfig::default(),
        )
    }

    #[test]
    fn setpoints_are_clamped() {
        let mut car = test_car();
        car.vesc_mut().set_velocity(100.0);
        assert_eq!(car.vesc().velocity(), 10.0);
        car.vesc_mut().set_velocity(-100.0);
        assert_eq!(car.vesc().velocity(), -10.0);
        car.vesc_mut().set_steering_angle(1.0);
        assert_eq!(car.vesc().steering_angle(), 0.35);
        car.vesc_mut().set_steering_angle(-1.0);
        assert_eq!(car.vesc().steering_angle(), -0.35);
    }

    #[test]
    fn setpoint_write_does_not_move_pose() {
        let mut car = test_car();
        let before = car.pose();
        car.vesc_mut().set_velocity(1.0);
        car.vesc_mut().set_steering_angle(0.2);
        assert_eq!(car.pose(), before);
    }

    #[test]
    fn straight_drive_covers_velocity_times_time() {
        let mut car = test_car();
        car.vesc_mut().set_velocity(1.0);
        car.integrate(1.0).unwrap();
        let s = car.state();
        assert!((s.x - 1.0).abs() < 1e-9);
        assert!(s.y.abs() < 1e-9);
        assert!(s.heading.abs() < 1e-9);
    }

    #[test]
    fn substep_invariance() {
        for n in [1u32, 2, 5, 10] {
            let mut single = test_car();
            single.vesc_mut().set_velocity(1.0);
            single.vesc_mut().set_steering_angle(0.3);
            single.integrate(2.0).unwrap();

            let mut split = test_car();
            split.vesc_mut().set_velocity(1.0);
            split.vesc_mut().set_steering_angle(0.3);
            for _ in 0..n {
                split.integrate(2.0 / n as f64).unwrap();
            }

            let a = single.state();
            let b = split.state();
            assert!((a.x - b.x).abs() < 1e-9, "x mismatch at n={n}");
            assert!((a.y - b.y).abs() < 1e-9, "y mismatch at n={n}");
            assert!((a.heading - b.heading).abs() < 1e-9, "heading mismatch at n={n}");
        }
    }

    #[test]
    fn full_turning_circle_returns_to_start() {
        let mut car = test_car();
        car.vesc_mut().set_velocity(1.0);
        car.vesc_mut().set_steering_angle(0.3);

        let yaw_rate = 1.0 * 0.3f64.tan() / car.params().wheelbase;
        let period = std::f64::consts::TAU / yaw_rate;
        car.integrate(period).unwrap();

        let s = car.state();
        assert!(s.x.abs() < 1e-6);
        assert!(s.y.abs() < 1e-6);
    }

    #[test]
    fn divergence_is_reported_and_state_kept() {
        let mut car = test_car();
        car.vesc_mut().set_velocity(1.0);
        car.integrate(0.5).unwrap();
        let before = car.state();

        let err = car.integrate(f64::INFINITY).unwrap_err();
        assert!(matches!(err, KernelError::NumericDivergence { .. }));
        assert_eq!(car.state(), before);
        assert!(car.pose().is_finite());
    }

    #[test]
    fn pose_accessor_returns_independent_copy() {
        let mut car = test_car();
        let mut copy = car.pose();
        copy.position.x = 99.0;
        assert_eq!(car.pose().position.x, 0.0);

        car.vesc_mut().set_velocity(1.0);
        car.integrate(1.0).unwrap();
        assert_eq!(copy.position.x, 99.0);
    }

    #[test]
    fn initial_heading_derived_from_pose() {
        let yaw = 0.7f32;
        let pose = Pose {
            rotation: Quat::from_rotation_y(-yaw),
            ..Pose::default()
        };
        let car = Car::new(
            pose,
            MotorLimits::default(),
            ChassisParams::default(),
            CameraConfig::default(),
        );
        assert!((car.state().heading - yaw as f64).abs() < 1e-6);
    }

    #[test]
    fn reverse_drive_moves_backwards() {
        let mut car = test_car();
        car.vesc_mut().set_velocity(-1.0);
        car.integrate(1.0).unwrap();
        assert!((car.state().x + 1.0).abs() < 1e-9);
    }
}
