use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use flock::{Flock, FlockConfig};
use spatial::IndexKind;
use tracing::info;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt};

/// Runs a headless flocking simulation and logs its progress.
#[derive(Parser)]
struct Args {
    /// The configuration file. Written with defaults if it does not exist.
    #[clap(short, long, default_value = "flock.toml")]
    config: PathBuf,
    /// Number of frames to simulate.
    #[clap(short, long, default_value_t = 600)]
    frames: u64,
    /// Overrides the configured boid count.
    #[clap(short = 'n', long)]
    count: Option<usize>,
    /// Overrides the configured index.
    #[clap(short, long, value_enum)]
    index: Option<IndexKind>,
    /// Seconds per frame.
    #[clap(long, default_value_t = 1.0 / 60.0)]
    dt: f32,
}

fn setup_logging() -> anyhow::Result<()> {
    tracing::subscriber::set_global_default(
        Registry::default()
            .with(EnvFilter::from_default_env())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(true)
                    .with_line_number(true),
            ),
    )
    .context("setup tracing subscribers")
}

fn main() -> anyhow::Result<()> {
    // it is not an error if a .env file is missing
    drop(dotenvy::dotenv());

    setup_logging()?;

    let Args {
        config,
        frames,
        count,
        index,
        dt,
    } = Args::parse();

    let mut settings = FlockConfig::load(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?;

    if let Some(count) = count {
        settings.count = count;
    }
    if let Some(kind) = index {
        settings.index.kind = kind;
    }

    settings
        .validate()
        .context("invalid configuration after overrides")?;

    let mut flock = Flock::populated(&settings);
    info!(
        boids = flock.len(),
        index = ?settings.index.kind,
        parallel = settings.parallel,
        "starting simulation"
    );

    let report_every = frames.div_ceil(10).max(1);

    for frame in 0..frames {
        flock.step(dt);

        if frame % report_every == 0 || frame + 1 == frames {
            info!(
                frame = flock.frame(),
                centroid = %flock.centroid().unwrap_or_default(),
                mean_speed = flock.mean_speed(),
                leaves = flock.leaf_bounds().len(),
                "progress"
            );
        }
    }

    info!(frames, "simulation finished");
    Ok(())
}
