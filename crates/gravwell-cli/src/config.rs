//! Driver configuration.

use anyhow::{Context, bail};
use gravwell_kernels::TransferPolicy;
use std::fmt;
use std::str::FromStr;

/// Window size in pixels. Pointer input is expressed in these coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSize {
    fn default() -> Self {
        Self {
            width: 768,
            height: 768,
        }
    }
}

impl FromStr for WindowSize {
    type Err = anyhow::Error;

    /// Parse `WIDTHxHEIGHT`, e.g. `1024x768`.
    fn from_str(s: &str) -> anyhow::Result<Self> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .with_context(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
        let width: u32 = w.trim().parse().with_context(|| format!("bad width '{w}'"))?;
        let height: u32 = h.trim().parse().with_context(|| format!("bad height '{h}'"))?;
        if width == 0 || height == 0 {
            bail!("window size must be non-zero, got {width}x{height}");
        }
        Ok(Self { width, height })
    }
}

impl fmt::Display for WindowSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Device the driver runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum BackendKind {
    /// Reference device executing kernels on the host
    Host,
    /// First wgpu adapter
    #[default]
    Wgpu,
}

/// How particle velocities reach the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TransferMode {
    #[default]
    ZeroCopy,
    Upload,
}

impl From<TransferMode> for TransferPolicy {
    fn from(mode: TransferMode) -> Self {
        match mode {
            TransferMode::ZeroCopy => TransferPolicy::ZeroCopy,
            TransferMode::Upload => TransferPolicy::Upload,
        }
    }
}

/// Everything the frame driver needs to know.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub particles: usize,
    /// Stop after this many frames; `None` runs until interrupted.
    pub frames: Option<u64>,
    pub fps: u32,
    pub window: WindowSize,
    pub backend: BackendKind,
    pub transfer: TransferMode,
    pub seed: Option<u64>,
    /// Drive the pointer along a scripted orbit instead of leaving it idle.
    pub orbit: bool,
    /// Log frame statistics every this many frames.
    pub report_every: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            particles: 100_000,
            frames: None,
            fps: 30,
            window: WindowSize::default(),
            backend: BackendKind::default(),
            transfer: TransferMode::default(),
            seed: None,
            orbit: false,
            report_every: 30,
        }
    }
}
