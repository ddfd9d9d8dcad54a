use clap::{Parser, Subcommand};
use roadsim_render::FrameBuffer;
use roadsim_scene::{Scene, Settings, SettingsError};
use roadsim_sim::{FrameSink, SimLoop};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "roadsim-cli", about = "Headless driver for the roadsim engine")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Settings file (defaults to the per-user location, then built-in defaults)
    #[arg(long)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print engine version and crate info
    Info,
    /// Write a starter scene description to the given path
    Init {
        /// Output path for the scene file
        #[arg(default_value = "scene.json")]
        path: PathBuf,
    },
    /// Sample a scene's track as discrete 2D points
    SampleTrack {
        /// Scene description file
        scene: PathBuf,
        /// Arclength interval between samples in meters
        #[arg(short, long, default_value = "0.5")]
        interval: f32,
    },
    /// Drive the car headless with fixed setpoints
    Drive {
        /// Scene description file
        scene: PathBuf,
        /// Simulated duration in seconds
        #[arg(short, long, default_value = "5.0")]
        duration: f64,
        /// Fixed time step per tick in seconds
        #[arg(long, default_value = "0.0166666")]
        dt: f64,
        /// Velocity setpoint in m/s
        #[arg(short, long, default_value = "1.0")]
        velocity: f64,
        /// Steering-angle setpoint in radians
        #[arg(short, long, default_value = "0.0")]
        steering: f64,
        /// Write the final camera frame as a binary PGM image
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run the blocking real-time driver for a number of frames
    Run {
        /// Scene description file
        scene: PathBuf,
        /// Number of frames to present before stopping
        #[arg(short, long, default_value = "120")]
        frames: usize,
    },
}

const STARTER_SCENE: &str = r#"{
    "version": 1,
    "paused": false,
    "car": {
        "pose": { "position": [0.0, 0.0, 0.0], "rotation": [0.0, 0.0, 0.0, 1.0] },
        "limits": { "max_velocity": 10.0, "max_steering_angle": 0.35 },
        "chassis": { "wheelbase": 0.225 },
        "camera": { "image_width": 400, "image_height": 300, "fov": 1.5707964 }
    },
    "track": {
        "width": 0.8,
        "control_points": [[0.0, 0.0], [4.0, 0.0], [4.0, 2.0], [0.0, 2.0]],
        "segments": [
            { "type": "line", "start": 0, "end": 1 },
            { "type": "arc", "start": 1, "end": 2, "center": [4.0, 1.0], "radius": 1.0, "right": false },
            { "type": "line", "start": 2, "end": 3 },
            { "type": "arc", "start": 3, "end": 0, "center": [0.0, 1.0], "radius": 1.0, "right": false }
        ]
    },
    "items": [
        { "kind": "obstacle", "name": "box", "pose": { "position": [2.0, 0.0, 0.5], "rotation": [0.0, 0.0, 0.0, 1.0] } }
    ]
}
"#;

/// Sink that presents frames to the terminal as a running line of stats.
struct ConsoleSink {
    presented: usize,
    limit: usize,
}

impl FrameSink for ConsoleSink {
    fn present(&mut self, frame: &FrameBuffer) {
        self.presented += 1;
        if self.presented % 30 == 0 {
            println!(
                "frame {:>5}: {}x{}, {} lit pixels",
                self.presented,
                frame.width(),
                frame.height(),
                frame.lit_count()
            );
        }
    }

    fn should_stop(&self) -> bool {
        self.presented >= self.limit
    }
}

fn load_settings(path: &Option<PathBuf>) -> anyhow::Result<Settings> {
    match path {
        Some(p) => Ok(Settings::load_from(p)?),
        // a missing per-user file falls back to defaults; a malformed one
        // is still an error
        None => match Settings::load() {
            Ok(settings) => Ok(settings),
            Err(SettingsError::Load(_)) => Ok(Settings::default()),
            Err(err) => Err(err.into()),
        },
    }
}

fn write_pgm(path: &PathBuf, frame: &FrameBuffer) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    write!(file, "P5\n{} {}\n255\n", frame.width(), frame.height())?;
    file.write_all(frame.pixels())?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("roadsim-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", roadsim_common::crate_info());
            println!("kernel: {}", roadsim_kernel::crate_info());
            println!("track:  {}", roadsim_track::crate_info());
            println!("render: {}", roadsim_render::crate_info());
            println!("scene:  {}", roadsim_scene::crate_info());
            println!("sim:    {}", roadsim_sim::crate_info());
        }
        Commands::Init { path } => {
            std::fs::write(&path, STARTER_SCENE)?;
            println!("wrote starter scene to {}", path.display());
        }
        Commands::SampleTrack { scene, interval } => {
            let scene = Scene::load(&scene)?;
            let path = scene.path_through_track(interval)?;
            println!(
                "track length {:.3} m, {} samples at interval {}",
                scene.track().total_length(),
                path.len(),
                interval
            );
            for (i, p) in path.iter().enumerate() {
                println!("{i:>4}: ({:.4}, {:.4})", p.x, p.y);
            }
        }
        Commands::Drive {
            scene,
            duration,
            dt,
            velocity,
            steering,
            output,
        } => {
            if dt <= 0.0 {
                anyhow::bail!("--dt must be positive");
            }
            let settings = load_settings(&cli.settings)?;
            let mut sim = SimLoop::new(settings.window_width, settings.window_height, settings)?;
            let mut scene = Scene::load(&scene)?;

            scene.car_mut().vesc_mut().set_velocity(velocity);
            scene.car_mut().vesc_mut().set_steering_angle(steering);

            while sim.time() < duration {
                sim.step(&mut scene, dt)?;
            }

            let state = scene.car().state();
            println!(
                "drove {:.2} s in {} ticks: position ({:.3}, {:.3}), heading {:.3} rad",
                sim.time(),
                sim.tick(),
                state.x,
                state.y,
                state.heading
            );

            if let Some(path) = output {
                let frame = sim.previous_frame(&scene)?;
                write_pgm(&path, &frame)?;
                println!(
                    "wrote {}x{} frame ({} lit pixels) to {}",
                    frame.width(),
                    frame.height(),
                    frame.lit_count(),
                    path.display()
                );
            }
        }
        Commands::Run { scene, frames } => {
            let settings = load_settings(&cli.settings)?;
            let mut sim = SimLoop::new(settings.window_width, settings.window_height, settings)?;
            let mut scene = Scene::load(&scene)?;

            // drive in a circle so the run has something to show
            scene.car_mut().vesc_mut().set_velocity(1.0);
            scene.car_mut().vesc_mut().set_steering_angle(0.3);

            let mut sink = ConsoleSink {
                presented: 0,
                limit: frames,
            };
            sim.run(&mut scene, &mut sink)?;
            println!("presented {} frames, simulated {:.2} s", sink.presented, sim.time());
        }
    }

    Ok(())
}
