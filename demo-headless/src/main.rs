use clap::{Parser, ValueEnum};
use constellation_core::{Background, DensityPreset, FieldConfig, ManualHost, SurfaceHandle};
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Headless constellation background run
#[derive(Parser, Debug)]
#[command(name = "constellation-demo")]
#[command(about = "Drive a constellation background without a window", long_about = None)]
struct Args {
    /// Density preset
    #[arg(short, long, value_enum, default_value_t = Preset::Medium)]
    preset: Preset,

    /// Number of frames to run
    #[arg(short, long, default_value_t = 600)]
    frames: u64,

    /// Seed for a reproducible layout
    #[arg(short, long)]
    seed: Option<u64>,

    /// Viewport width in pixels
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Sweep a synthetic pointer across the viewport
    #[arg(long)]
    sweep: bool,

    /// Frames between report lines
    #[arg(short, long, default_value_t = 60)]
    report_interval: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Preset {
    Low,
    Medium,
    High,
}

impl From<Preset> for DensityPreset {
    fn from(preset: Preset) -> Self {
        match preset {
            Preset::Low => Self::Low,
            Preset::Medium => Self::Medium,
            Preset::High => Self::High,
        }
    }
}

/// Refresh interval of the simulated display.
const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    println!("=== Constellation Headless Demo ===\n");

    let config = FieldConfig {
        seed: args.seed,
        ..FieldConfig::from_preset(args.preset.into())
    };
    println!(
        "Preset {:?}: {} particles, connect below {:.1}, cap {} edges ({})",
        args.preset,
        config.particle_count,
        config.connection_distance,
        config.connection_capacity,
        if config.uses_spatial_index() {
            "grid index"
        } else {
            "brute force"
        }
    );

    let mut background = match Background::new(config, ManualHost::new()) {
        Ok(background) => background,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    background.mount(SurfaceHandle::Headless {
        width: args.width,
        height: args.height,
    });
    if let Some(e) = background.surface_error() {
        warn!("Background degraded: {}", e);
    }

    println!("Running {} frames at {}x{}...\n", args.frames, args.width, args.height);
    println!("Frame  | Edges | Saturated | Strength | Build(ms) | Avg(ms)");
    println!("-------|-------|-----------|----------|-----------|--------");

    let mut peak_edges = 0;
    let mut saturated_frames = 0u64;
    let mut now = Duration::ZERO;

    for frame in 0..args.frames {
        if args.sweep {
            let (x, y) = sweep_position(frame, args.width, args.height);
            background.on_pointer_move(x, y);
        }

        if background.host_mut().take_frame().is_none() {
            break;
        }
        let Some(stats) = background.tick(now) else {
            break;
        };
        now += FRAME_INTERVAL;

        peak_edges = peak_edges.max(stats.edges);
        if stats.saturated {
            saturated_frames += 1;
        }

        if args.report_interval > 0 && stats.frame % args.report_interval == 0 {
            println!(
                "{:6} | {:5} | {:9} | {:8.3} | {:9.3} | {:7.3}",
                stats.frame,
                stats.edges,
                if stats.saturated { "yes" } else { "no" },
                stats.strength,
                stats.build_time.as_secs_f64() * 1000.0,
                background.build_timer().average_ms()
            );
        }
    }

    if args.sweep {
        background.on_pointer_leave();
    }

    println!("\n=== Run Complete ===");
    println!("Simulated time: {:.2}s", now.as_secs_f64());
    println!("Peak edges: {}", peak_edges);
    println!("Saturated frames: {}", saturated_frames);
    println!(
        "Average edge build: {:.3} ms",
        background.build_timer().average_ms()
    );

    background.unmount();
    println!("Live resources after unmount: {}", background.ledger().live().len());
}

/// Lissajous path across the viewport so every region sees the pointer.
fn sweep_position(frame: u64, width: u32, height: u32) -> (f32, f32) {
    let t = frame as f32 * 0.02;
    let x = (t.sin() * 0.5 + 0.5) * width as f32;
    let y = ((t * 1.3).cos() * 0.5 + 0.5) * height as f32;
    (x, y)
}
