//! gravwell - run the gravity particle simulation headless.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gravwell_cli::{BackendKind, DriverConfig, SimContext, TransferMode, WindowSize};
use gravwell_kernels::Gravity;
use gravwell_runtime::Executor;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gravwell")]
#[command(about = "Particles pulled toward a pointer, simulated on a shared compute/graphics device", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation
    Run {
        /// Number of particles
        #[arg(short, long, default_value = "100000")]
        particles: usize,

        /// Stop after this many frames (runs until interrupted if omitted)
        #[arg(short, long)]
        frames: Option<u64>,

        /// Target frames per second
        #[arg(long, default_value = "30")]
        fps: u32,

        #[arg(long, value_enum, default_value_t = BackendKind::Wgpu)]
        backend: BackendKind,

        /// How velocities reach the device
        #[arg(long, value_enum, default_value_t = TransferMode::ZeroCopy)]
        transfer: TransferMode,

        /// Seed for the initial particle layout
        #[arg(long)]
        seed: Option<u64>,

        /// Window size pointer coordinates refer to (format: WIDTHxHEIGHT)
        #[arg(long, default_value = "768x768")]
        window: WindowSize,

        /// Move the pointer along a scripted orbit
        #[arg(long)]
        orbit: bool,

        /// Log statistics every N frames (0 disables)
        #[arg(long, default_value = "30")]
        report_every: u64,
    },
    /// Show the selected device and the program build log
    Info {
        #[arg(long, value_enum, default_value_t = BackendKind::Wgpu)]
        backend: BackendKind,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gravwell=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            particles,
            frames,
            fps,
            backend,
            transfer,
            seed,
            window,
            orbit,
            report_every,
        } => {
            let config = DriverConfig {
                particles,
                frames,
                fps,
                window,
                backend,
                transfer,
                seed,
                orbit,
                report_every,
            };
            cmd_run(&config)?;
        }
        Commands::Info { backend } => {
            cmd_info(backend)?;
        }
    }

    Ok(())
}

fn cmd_run(config: &DriverConfig) -> Result<()> {
    let gfx = pollster::block_on(gravwell_cli::graphics_context(config.backend))
        .context("Failed to create graphics context")?;
    let mut ctx = SimContext::new(&gfx, config).context("Failed to set up simulation")?;
    let summary = gravwell_cli::run(&mut ctx, config)?;

    println!("Frames:     {}", summary.frames);
    println!("Skipped:    {}", summary.skipped);
    println!("Overruns:   {}", summary.overruns);
    if let Some(last) = summary.last {
        let [x, y, z, _] = last.centroid.to_array();
        println!("Centroid:   ({x:.4}, {y:.4}, {z:.4})");
        println!("Spread:     {:.4}", last.spread);
    }
    Ok(())
}

fn cmd_info(backend: BackendKind) -> Result<()> {
    let gfx = pollster::block_on(gravwell_cli::graphics_context(backend))
        .context("Failed to create graphics context")?;
    let executor = Executor::new(&gfx.share(), Gravity::default())
        .context("Failed to build the gravity program")?;

    let bundle = executor.bundle();
    println!("Backend:    {}", gfx.backend().name());
    println!("Platform:   {}", bundle.platform_name());
    println!("Device:     {} (index {})", bundle.device_name(), bundle.device_index());
    println!("Entry:      {}", bundle.kernel().entry());
    println!("Build:      {}", bundle.build_info().status);
    println!("Options:    {}", bundle.build_info().options);
    if !bundle.build_info().log.is_empty() {
        println!("Log:\n{}", bundle.build_info().log);
    }
    Ok(())
}
