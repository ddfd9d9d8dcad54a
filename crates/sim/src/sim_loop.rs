use roadsim_kernel::KernelError;
use roadsim_render::{FrameBuffer, PointSplatRenderer, RenderError, Renderer, validate_config};
use roadsim_scene::{Scene, Settings};
use std::time::Instant;

/// Upper bound on physics sub-steps per `step` call. Larger time steps are
/// integrated with proportionally longer sub-steps, which stays exact for
/// the closed-form motion model.
const MAX_SUBSTEPS: u64 = 10_000;

/// Errors from constructing or advancing the simulation loop.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("time step must be non-negative and finite, got {0}")]
    InvalidDelta(f64),
    #[error("viewport dimensions must be positive, got {width}x{height}")]
    InvalidViewport { width: u32, height: u32 },
    #[error("update delta time must be positive and finite, got {0}")]
    InvalidUpdateDelta(f64),
    #[error("simulation speed must be non-negative and finite, got {0}")]
    InvalidSimulationSpeed(f64),
    #[error(transparent)]
    Config(#[from] RenderError),
    #[error(transparent)]
    Diverged(#[from] KernelError),
}

/// Consumer seam for the blocking run driver.
///
/// A display subsystem implements this to receive finished frames and to
/// signal termination; the stop flag is observed between iterations, never
/// mid-step.
pub trait FrameSink {
    /// Present the most recent completed (previous) frame.
    fn present(&mut self, frame: &FrameBuffer);

    /// Whether the loop should terminate before the next iteration.
    fn should_stop(&self) -> bool;
}

/// The simulation loop.
///
/// Owns simulated time and the double-buffered frame output: every `step`
/// renders into the "current" slot and moves the prior current frame into
/// the "previous" slot, which is what consumers retrieve. Settings are
/// consumed by value at construction; later mutation of a `Settings` value
/// has no effect on an existing loop.
#[derive(Debug)]
pub struct SimLoop {
    viewport_width: u32,
    viewport_height: u32,
    simulation_speed: f64,
    update_delta_time: f64,
    renderer: PointSplatRenderer,
    /// Frame rendered by the most recent step.
    front: Option<FrameBuffer>,
    /// Frame rendered by the step before that; what consumers see.
    back: Option<FrameBuffer>,
    tick: u64,
    sim_time: f64,
}

impl SimLoop {
    /// Create a loop with the given viewport dimensions and settings.
    pub fn new(width: u32, height: u32, settings: Settings) -> Result<Self, SimError> {
        if width == 0 || height == 0 {
            return Err(SimError::InvalidViewport { width, height });
        }
        if settings.update_delta_time <= 0.0 || !settings.update_delta_time.is_finite() {
            return Err(SimError::InvalidUpdateDelta(settings.update_delta_time));
        }
        if settings.simulation_speed < 0.0 || !settings.simulation_speed.is_finite() {
            return Err(SimError::InvalidSimulationSpeed(settings.simulation_speed));
        }
        Ok(Self {
            viewport_width: width,
            viewport_height: height,
            simulation_speed: settings.simulation_speed,
            update_delta_time: settings.update_delta_time,
            renderer: PointSplatRenderer::new(),
            front: None,
            back: None,
            tick: 0,
            sim_time: 0.0,
        })
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.viewport_width, self.viewport_height)
    }

    /// Number of completed steps.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Accumulated simulated time in seconds.
    pub fn time(&self) -> f64 {
        self.sim_time
    }

    /// Advance the simulation by `dt` seconds and render a new frame.
    ///
    /// Requires `dt >= 0` and finite. When the scene is paused, physics
    /// integration is skipped but a frame is still rendered. On any failure
    /// the scene is restored to its state at entry; the frame buffers are
    /// only swapped on success.
    pub fn step(&mut self, scene: &mut Scene, dt: f64) -> Result<(), SimError> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(SimError::InvalidDelta(dt));
        }

        let entry_car = scene.car().clone();
        match self.advance_and_render(scene, dt) {
            Ok(frame) => {
                self.back = self.front.take();
                self.front = Some(frame);
                self.tick += 1;
                self.sim_time += dt;
                tracing::trace!(tick = self.tick, sim_time = self.sim_time, "step complete");
                Ok(())
            }
            Err(err) => {
                *scene.car_mut() = entry_car;
                Err(err)
            }
        }
    }

    fn advance_and_render(&self, scene: &mut Scene, dt: f64) -> Result<FrameBuffer, SimError> {
        if !scene.paused && dt > 0.0 {
            let h = self.update_delta_time;
            let whole = (dt / h).floor();
            let (count, step_len) = if whole >= MAX_SUBSTEPS as f64 {
                (MAX_SUBSTEPS, dt / MAX_SUBSTEPS as f64)
            } else {
                (whole as u64, h)
            };
            for _ in 0..count {
                scene.car_mut().integrate(step_len)?;
            }
            let remainder = dt - step_len * count as f64;
            if remainder > 0.0 {
                scene.car_mut().integrate(remainder)?;
            }
        }

        let frame = self.renderer.render(
            &scene.car().pose(),
            &scene.geometry(),
            &scene.car().main_camera,
        )?;
        Ok(frame)
    }

    /// A copy of the frame produced by the step before the most recent one.
    ///
    /// The one-tick lag decouples rendering cost from retrieval and lets a
    /// consumer read a fully formed frame while the next one is produced.
    /// Before any step, and after exactly one step, this is an all-zero
    /// buffer sized per the scene's camera configuration.
    pub fn previous_frame(&self, scene: &Scene) -> Result<FrameBuffer, SimError> {
        match &self.back {
            Some(frame) => Ok(frame.clone()),
            None => {
                let config = &scene.car().main_camera;
                validate_config(config)?;
                Ok(FrameBuffer::zeroed(config.image_width, config.image_height))
            }
        }
    }

    /// Blocking convenience driver over `step` and `previous_frame`.
    ///
    /// Derives `dt` from the wall clock scaled by the configured simulation
    /// speed, presents each completed frame to the sink, and returns once
    /// the sink signals stop. Monotonic clock, so `dt` is never negative.
    pub fn run(&mut self, scene: &mut Scene, sink: &mut dyn FrameSink) -> Result<(), SimError> {
        let mut last = Instant::now();
        while !sink.should_stop() {
            let now = Instant::now();
            let dt = now.duration_since(last).as_secs_f64() * self.simulation_speed;
            last = now;

            self.step(scene, dt)?;
            let frame = self.previous_frame(scene)?;
            sink.present(&frame);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SCENE: &str = r#"{
        "version": 1,
        "car": {
            "camera": { "image_width": 32, "image_height": 24, "fov": 1.5707964 }
        },
        "track": {
            "control_points": [[0.0, 0.0], [10.0, 0.0]],
            "segments": [{ "type": "line", "start": 0, "end": 1 }]
        }
    }"#;

    fn test_scene() -> Scene {
        Scene::from_json(TEST_SCENE).unwrap()
    }

    fn test_loop() -> SimLoop {
        SimLoop::new(800, 600, Settings::default()).unwrap()
    }

    #[test]
    fn zero_viewport_is_rejected() {
        let err = SimLoop::new(0, 600, Settings::default()).unwrap_err();
        assert!(matches!(err, SimError::InvalidViewport { .. }));
    }

    #[test]
    fn bad_update_delta_is_rejected() {
        let settings = Settings {
            update_delta_time: 0.0,
            ..Settings::default()
        };
        let err = SimLoop::new(800, 600, settings).unwrap_err();
        assert!(matches!(err, SimError::InvalidUpdateDelta(_)));
    }

    #[test]
    fn frame_lags_one_tick() {
        let mut sim = test_loop();
        let mut scene = test_scene();
        scene.car_mut().vesc_mut().set_velocity(1.0);

        // before any step: all zeros, sized per the camera config
        let f0 = sim.previous_frame(&scene).unwrap();
        assert_eq!((f0.width(), f0.height()), (32, 24));
        assert!(f0.is_blank());

        // after exactly one step: still all zeros
        sim.step(&mut scene, 0.1).unwrap();
        assert!(sim.previous_frame(&scene).unwrap().is_blank());

        // after a second step with dt = 0 the state is unchanged, so the
        // lagged frame must equal a direct deterministic re-render
        sim.step(&mut scene, 0.0).unwrap();
        let expected = PointSplatRenderer::new()
            .render(
                &scene.car().pose(),
                &scene.geometry(),
                &scene.car().main_camera,
            )
            .unwrap();
        let lagged = sim.previous_frame(&scene).unwrap();
        assert!(!lagged.is_blank());
        assert_eq!(lagged, expected);
    }

    #[test]
    fn negative_or_non_finite_dt_is_rejected() {
        let mut sim = test_loop();
        let mut scene = test_scene();
        for dt in [-1.0, f64::NAN, f64::INFINITY] {
            let err = sim.step(&mut scene, dt).unwrap_err();
            assert!(matches!(err, SimError::InvalidDelta(_)));
        }
        assert_eq!(sim.tick(), 0);
    }

    #[test]
    fn paused_scene_skips_physics_but_renders() {
        let mut sim = test_loop();
        let mut scene = test_scene();
        scene.car_mut().vesc_mut().set_velocity(1.0);
        scene.paused = true;

        let before = scene.car().state();
        sim.step(&mut scene, 1.0).unwrap();
        sim.step(&mut scene, 1.0).unwrap();
        assert_eq!(scene.car().state(), before);
        // rendering still happened
        assert!(!sim.previous_frame(&scene).unwrap().is_blank());
    }

    #[test]
    fn step_advances_by_velocity() {
        let mut sim = test_loop();
        let mut scene = test_scene();
        scene.car_mut().vesc_mut().set_velocity(1.0);
        sim.step(&mut scene, 1.0).unwrap();
        assert!((scene.car().state().x - 1.0).abs() < 1e-9);
        assert_eq!(sim.tick(), 1);
        assert!((sim.time() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn stepping_in_pieces_matches_one_call() {
        let mut a = test_loop();
        let mut scene_a = test_scene();
        scene_a.car_mut().vesc_mut().set_velocity(1.0);
        scene_a.car_mut().vesc_mut().set_steering_angle(0.3);
        a.step(&mut scene_a, 1.0).unwrap();

        let mut b = test_loop();
        let mut scene_b = test_scene();
        scene_b.car_mut().vesc_mut().set_velocity(1.0);
        scene_b.car_mut().vesc_mut().set_steering_angle(0.3);
        for _ in 0..10 {
            b.step(&mut scene_b, 0.1).unwrap();
        }

        let sa = scene_a.car().state();
        let sb = scene_b.car().state();
        assert!((sa.x - sb.x).abs() < 1e-9);
        assert!((sa.y - sb.y).abs() < 1e-9);
        assert!((sa.heading - sb.heading).abs() < 1e-9);
    }

    #[test]
    fn config_error_surfaces_and_scene_is_untouched() {
        let mut sim = test_loop();
        let mut scene = test_scene();
        scene.car_mut().vesc_mut().set_velocity(1.0);
        scene.car_mut().main_camera.image_width = 0;

        let before = scene.car().state();
        let err = sim.step(&mut scene, 1.0).unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
        assert_eq!(scene.car().state(), before);
        assert_eq!(sim.tick(), 0);

        // the zero-sized previous frame cannot be synthesized either
        assert!(matches!(
            sim.previous_frame(&scene),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn divergence_stops_the_scene_and_restores_state() {
        let mut sim = test_loop();
        let mut scene = test_scene();
        scene.car_mut().vesc_mut().set_velocity(10.0);

        sim.step(&mut scene, 0.5).unwrap();
        let before = scene.car().state();

        // a time step this large overflows the position mid-integration
        let err = sim.step(&mut scene, 1.0e308).unwrap_err();
        assert!(matches!(err, SimError::Diverged(_)));
        assert_eq!(scene.car().state(), before);
        assert_eq!(sim.tick(), 1);
    }

    struct CountingSink {
        frames: usize,
        limit: usize,
        last_dims: (u32, u32),
    }

    impl FrameSink for CountingSink {
        fn present(&mut self, frame: &FrameBuffer) {
            self.frames += 1;
            self.last_dims = (frame.width(), frame.height());
        }

        fn should_stop(&self) -> bool {
            self.frames >= self.limit
        }
    }

    #[test]
    fn run_terminates_on_stop_signal() {
        let mut sim = test_loop();
        let mut scene = test_scene();
        scene.car_mut().vesc_mut().set_velocity(1.0);

        let mut sink = CountingSink {
            frames: 0,
            limit: 3,
            last_dims: (0, 0),
        };
        sim.run(&mut scene, &mut sink).unwrap();
        assert_eq!(sink.frames, 3);
        assert_eq!(sink.last_dims, (32, 24));
        assert_eq!(sim.tick(), 3);
    }
}
