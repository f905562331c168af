//! The headless frame driver.
//!
//! A [`SimContext`] owns the gravity executor and its payload. Each frame runs
//! the kernel, then reads the position buffer back through the graphics side
//! the way a rasterizer would consume it.

use crate::config::{BackendKind, DriverConfig, WindowSize};
use crate::seed::seed_particles;
use gravwell_core::{Float4, Result};
use gravwell_kernels::{Gravity, GravityPayload};
use gravwell_runtime::{Executor, GraphicsContext};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::f32::consts::TAU;
use std::time::{Duration, Instant};

/// Frames per pointer orbit when the orbit script is on.
const ORBIT_PERIOD: u64 = 240;
/// The scripted pointer clicks the middle button this often.
const ORBIT_FLIP_EVERY: u64 = 300;

/// Pointer button that produced an input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// Create the graphics context for `backend`.
pub async fn graphics_context(backend: BackendKind) -> Result<GraphicsContext> {
    match backend {
        BackendKind::Host => Ok(GraphicsContext::host().0),
        BackendKind::Wgpu => GraphicsContext::wgpu().await,
    }
}

/// Summary of one rendered frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub frame: u64,
    /// `false` when the simulation step failed and the buffers are stale.
    pub simulated: bool,
    pub centroid: Float4,
    /// Mean distance of the particles from the centroid.
    pub spread: f32,
}

impl FrameStats {
    fn measure(frame: u64, simulated: bool, positions: &[Float4]) -> Self {
        let n = positions.len().max(1) as f32;
        let xyz = |p: &Float4| Float4::new(p.x, p.y, p.z, 0.0);
        let centroid = positions
            .iter()
            .fold(Float4::ZERO, |acc, p| acc + xyz(p))
            * (1.0 / n);
        let spread = positions
            .iter()
            .map(|p| (xyz(p) - centroid).length())
            .sum::<f32>()
            / n;
        Self {
            frame,
            simulated,
            centroid,
            spread,
        }
    }
}

/// Totals of a [`run`].
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub frames: u64,
    pub skipped: u64,
    pub overruns: u64,
    pub last: Option<FrameStats>,
}

/// Simulation state shared by the input handlers and the frame loop.
#[derive(Debug)]
pub struct SimContext {
    executor: Executor<Gravity>,
    payload: GravityPayload,
    window: WindowSize,
    frame: u64,
}

impl SimContext {
    /// Seed particles, build the gravity executor and load the payload.
    ///
    /// # Errors
    /// Device selection, program build and load failures.
    pub fn new(gfx: &GraphicsContext, config: &DriverConfig) -> Result<Self> {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let particles = seed_particles(config.particles, &mut rng);

        let module = Gravity::with_transfer(config.transfer.into());
        let mut executor = Executor::new(&gfx.share(), module)?;
        let mut payload = GravityPayload::new(
            gfx,
            &particles.positions,
            particles.velocities,
            &particles.colors,
        )?;
        executor.load(&mut payload)?;

        tracing::info!(
            particles = payload.len(),
            window = %config.window,
            device = executor.bundle().device_name(),
            "simulation ready"
        );
        Ok(Self {
            executor,
            payload,
            window: config.window,
            frame: 0,
        })
    }

    pub fn payload(&self) -> &GravityPayload {
        &self.payload
    }

    pub fn executor(&self) -> &Executor<Gravity> {
        &self.executor
    }

    /// Frames rendered so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Route a pointer event at window position `(x, y)`.
    ///
    /// The position maps to `[-1, 1]^2` with y pointing up. A middle click
    /// additionally mirrors the pointer through the z = 0 plane.
    pub fn pointer(&mut self, button: MouseButton, x: f32, y: f32) {
        let pointer = &mut self.payload.pointer;
        pointer.x = 2.0 * (x / self.window.width as f32 - 0.5);
        pointer.y = -2.0 * (y / self.window.height as f32 - 0.5);
        if button == MouseButton::Middle {
            pointer.z = -pointer.z;
        }
        tracing::debug!(x = pointer.x, y = pointer.y, z = pointer.z, ?button, "pointer");
    }

    /// Advance the simulation one step and consume the result.
    ///
    /// A failed step is logged and skipped; the frame is still rendered from
    /// the previous buffer contents.
    ///
    /// # Errors
    /// Reading the position buffer back failed.
    pub fn render_frame(&mut self) -> Result<FrameStats> {
        let simulated = match self.executor.exec(&mut self.payload) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(frame = self.frame, error = %e, "simulation step skipped");
                false
            }
        };
        let positions = self.payload.positions().read()?;
        let stats = FrameStats::measure(self.frame, simulated, &positions);
        self.frame += 1;
        Ok(stats)
    }
}

/// Window position of the scripted pointer at `frame`.
pub fn orbit_position(window: WindowSize, frame: u64) -> (f32, f32) {
    let angle = TAU * (frame % ORBIT_PERIOD) as f32 / ORBIT_PERIOD as f32;
    let (w, h) = (window.width as f32, window.height as f32);
    (w * (0.5 + 0.3 * angle.cos()), h * (0.5 + 0.3 * angle.sin()))
}

/// Sleep needed to fill `budget` after a frame took `elapsed`; `None` on overrun.
pub fn frame_slack(elapsed: Duration, budget: Duration) -> Option<Duration> {
    budget.checked_sub(elapsed)
}

/// Run the frame loop at `config.fps` until `config.frames` frames are done.
pub fn run(ctx: &mut SimContext, config: &DriverConfig) -> Result<RunSummary> {
    let budget = Duration::from_secs(1) / config.fps.max(1);
    let mut summary = RunSummary::default();

    while config.frames.is_none_or(|limit| summary.frames < limit) {
        let start = Instant::now();

        if config.orbit {
            let button = if ctx.frame() > 0 && ctx.frame() % ORBIT_FLIP_EVERY == 0 {
                MouseButton::Middle
            } else {
                MouseButton::Left
            };
            let (x, y) = orbit_position(config.window, ctx.frame());
            ctx.pointer(button, x, y);
        }

        let stats = ctx.render_frame()?;
        summary.frames += 1;
        if !stats.simulated {
            summary.skipped += 1;
        }
        if config.report_every > 0 && stats.frame % config.report_every == 0 {
            tracing::info!(
                frame = stats.frame,
                centroid = ?stats.centroid.to_array(),
                spread = stats.spread,
                "frame"
            );
        }
        summary.last = Some(stats);

        match frame_slack(start.elapsed(), budget) {
            Some(slack) => std::thread::sleep(slack),
            None => {
                summary.overruns += 1;
                tracing::warn!(
                    frame = stats.frame,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    budget_ms = budget.as_millis() as u64,
                    "frame overran its budget"
                );
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_slack() {
        let budget = Duration::from_millis(33);
        assert_eq!(
            frame_slack(Duration::from_millis(10), budget),
            Some(Duration::from_millis(23))
        );
        assert_eq!(frame_slack(Duration::from_millis(40), budget), None);
    }

    #[test]
    fn test_orbit_stays_inside_window() {
        let window = WindowSize::default();
        for frame in 0..ORBIT_PERIOD {
            let (x, y) = orbit_position(window, frame);
            assert!((0.0..768.0).contains(&x) && (0.0..768.0).contains(&y));
        }
        assert_eq!(orbit_position(window, 0), orbit_position(window, ORBIT_PERIOD));
    }

    #[test]
    fn test_stats_of_symmetric_cloud() {
        let positions = [
            Float4::point(1.0, 0.0, 0.0),
            Float4::point(-1.0, 0.0, 0.0),
            Float4::point(0.0, 1.0, 0.0),
            Float4::point(0.0, -1.0, 0.0),
        ];
        let stats = FrameStats::measure(3, true, &positions);
        assert!(stats.centroid.length() < 1e-6);
        assert!((stats.spread - 1.0).abs() < 1e-6);
        assert_eq!(stats.frame, 3);
    }
}
