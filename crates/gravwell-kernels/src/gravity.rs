//! Gravity particle simulation.
//!
//! Every particle is pulled toward a pointer (attractor) position. Positions
//! and colors live in shared vertex buffers the rasterizer draws from;
//! velocities live in a host vector that is either aliased by the device
//! (zero-copy) or uploaded once at load.

use crate::shaders;
use gravwell_core::{
    Error, ErrorCode, Float4, FrameEvents, HostArgs, HostEntry, HostVec, MemAccess,
    ProgramSource, Result,
};
use gravwell_runtime::{
    BufferInit, ComputeBuffer, DeviceBundle, GraphicsContext, KernelModule, SharedBuffer,
};

/// Parameter slot of the position buffer.
pub const POSITION: u32 = 0;
/// Parameter slot of the velocity buffer.
pub const VELOCITY: u32 = 1;
/// Parameter slot of the color buffer.
pub const COLOR: u32 = 2;
/// Parameter slot of the pointer value.
pub const POINTER: u32 = 3;

/// Pointer position before any input arrives.
pub const DEFAULT_POINTER: Float4 = Float4::new(0.0, 0.0, -1.0, 1.0);

/// Constants of the simulation step. The WGSL program hard-codes the same
/// values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GravityParams {
    /// Velocity retained per step.
    pub friction: f32,
    /// Acceleration toward the pointer at zero distance.
    pub pull: f32,
    /// Cap on the normalized distance.
    pub max_distance: f32,
}

impl GravityParams {
    pub const DEFAULT: GravityParams = GravityParams {
        friction: 0.99,
        pull: 0.000918,
        max_distance: 0.9,
    };
}

impl Default for GravityParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// One particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Float4,
    pub velocity: Float4,
    pub color: Float4,
}

impl GravityParams {
    /// Advance one particle by one step.
    pub fn step(&self, particle: Particle, pointer: Float4) -> Particle {
        let d = pointer - particle.position;
        // 2.0 is the largest distance inside [-1, 1]^2
        let l = (d.length() / 2.0).min(self.max_distance);
        let dn = d.normalize_or_zero();

        let mut velocity = particle.velocity * self.friction;
        velocity = velocity + dn * (self.pull * (1.0 - l * l));

        let mut position = particle.position + velocity;
        position.w = 1.0;

        let mut color = particle.color;
        color.x = (2.0 + position.z) * 0.5;

        Particle {
            position,
            velocity,
            color,
        }
    }
}

fn gravity_host(gid: usize, args: &mut HostArgs) -> Result<()> {
    let pointer: Float4 = args.value(POINTER as usize)?;
    let particle = Particle {
        position: args.load(POSITION as usize, gid)?,
        velocity: args.load(VELOCITY as usize, gid)?,
        color: args.load(COLOR as usize, gid)?,
    };
    let next = GravityParams::DEFAULT.step(particle, pointer);
    args.store(POSITION as usize, gid, next.position)?;
    args.store(VELOCITY as usize, gid, next.velocity)?;
    args.store(COLOR as usize, gid, next.color)
}

const SOURCE: ProgramSource = ProgramSource {
    label: "gravity",
    text: shaders::GRAVITY,
    host: &[HostEntry {
        name: "gravity",
        params: 4,
        func: gravity_host,
    }],
};

/// How the velocity vector reaches the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferPolicy {
    /// The device buffer references the host vector directly; no upload event.
    #[default]
    ZeroCopy,
    /// A plain device buffer plus one asynchronous upload at load.
    Upload,
}

/// The gravity kernel module.
#[derive(Debug, Clone, Copy)]
pub struct Gravity {
    pub transfer: TransferPolicy,
    pub workgroup_size: u32,
}

impl Default for Gravity {
    fn default() -> Self {
        Self {
            transfer: TransferPolicy::default(),
            workgroup_size: shaders::DEFAULT_WORKGROUP_SIZE,
        }
    }
}

impl Gravity {
    pub fn with_transfer(transfer: TransferPolicy) -> Self {
        Self {
            transfer,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
struct Views {
    positions: ComputeBuffer,
    /// Bound to the kernel at load; only held so the buffer outlives it.
    _velocities: ComputeBuffer,
    colors: ComputeBuffer,
    count: usize,
}

/// Per-instance data of the gravity module.
#[derive(Debug)]
pub struct GravityPayload {
    positions: SharedBuffer<Float4>,
    colors: SharedBuffer<Float4>,
    velocities: HostVec<Float4>,
    /// Attractor position, mutated by input handlers between frames.
    pub pointer: Float4,
    events: FrameEvents,
    views: Option<Views>,
}

impl GravityPayload {
    /// Create the shared buffers from initial data.
    ///
    /// `velocities` is shared with the caller: both sides see the same
    /// memory. It must not be written while a frame is in flight.
    ///
    /// # Errors
    /// `INVALID_BUFFER_SIZE` if the three inputs differ in length or are empty.
    pub fn new(
        gfx: &GraphicsContext,
        positions: &[Float4],
        velocities: HostVec<Float4>,
        colors: &[Float4],
    ) -> Result<Self> {
        if positions.len() != colors.len() || velocities.len() != colors.len() {
            return Err(Error::device("gravity_payload", ErrorCode::InvalidBufferSize));
        }
        Ok(Self {
            positions: SharedBuffer::new(gfx, "gravity_positions", positions)?,
            colors: SharedBuffer::new(gfx, "gravity_colors", colors)?,
            velocities,
            pointer: DEFAULT_POINTER,
            events: FrameEvents::default(),
            views: None,
        })
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn positions(&self) -> &SharedBuffer<Float4> {
        &self.positions
    }

    pub fn colors(&self) -> &SharedBuffer<Float4> {
        &self.colors
    }

    pub fn velocities(&self) -> &HostVec<Float4> {
        &self.velocities
    }

    /// Events of the last load and frame.
    pub fn events(&self) -> &FrameEvents {
        &self.events
    }

    pub fn is_loaded(&self) -> bool {
        self.views.is_some()
    }
}

impl KernelModule for Gravity {
    type Payload = GravityPayload;

    fn source(&self) -> ProgramSource {
        SOURCE
    }

    fn build_options(&self) -> String {
        shaders::workgroup_options(self.workgroup_size)
    }

    fn entry_point(&self) -> &'static str {
        "gravity"
    }

    fn load(&self, bundle: &mut DeviceBundle, payload: &mut GravityPayload) -> Result<()> {
        payload.views = None;
        payload.events = FrameEvents::default();

        bundle.graphics_finish()?;
        bundle.queue().finish()?;

        let positions = bundle.create_from_graphics(&payload.positions, MemAccess::ReadWrite)?;
        let colors = bundle.create_from_graphics(&payload.colors, MemAccess::ReadWrite)?;

        let bytes = payload.velocities.len() * std::mem::size_of::<Float4>();
        let velocities = match self.transfer {
            TransferPolicy::ZeroCopy => bundle.create_buffer(
                bytes,
                MemAccess::ReadWrite,
                BufferInit::UseHost(payload.velocities.region()),
            )?,
            TransferPolicy::Upload => {
                let buffer = bundle.create_buffer(bytes, MemAccess::ReadWrite, BufferInit::Empty)?;
                let transfer = bundle.queue().write(
                    buffer.id(),
                    bytemuck::cast_slice(payload.velocities.read().as_slice()),
                    &[],
                )?;
                payload.events.transfer = Some(transfer);
                buffer
            }
        };

        let kernel = bundle.kernel();
        kernel.set_buffer(POSITION, &positions)?;
        kernel.set_buffer(VELOCITY, &velocities)?;
        kernel.set_buffer(COLOR, &colors)?;

        let count = payload.colors.len();
        tracing::info!(particles = count, transfer = ?self.transfer, "gravity payload loaded");
        payload.views = Some(Views {
            positions,
            _velocities: velocities,
            colors,
            count,
        });
        Ok(())
    }

    fn exec(&self, bundle: &mut DeviceBundle, payload: &mut GravityPayload) -> Result<()> {
        let views = payload.views.as_ref().ok_or(Error::NotLoaded("gravity"))?;
        payload.events.begin_frame();

        bundle.graphics_finish()?;

        let kernel = bundle.kernel();
        kernel.set_value(POINTER, &payload.pointer)?;

        let queue = bundle.queue();
        let acquired = queue.acquire(&[views.positions.id(), views.colors.id()], &[])?;
        payload.events.acquire = Some(acquired.event());
        queue.wait(&[acquired.event()])?;

        let exec = queue.dispatch(kernel.id(), views.count, &payload.events.dispatch_wait_list())?;
        payload.events.exec = Some(exec);

        let release = acquired.release(&[exec])?;
        payload.events.release = Some(release);
        queue.flush()?;
        queue.wait(&[release])?;

        tracing::debug!(
            particles = views.count,
            pointer = ?payload.pointer.to_array(),
            "gravity frame complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_pulls_toward_pointer() {
        let particle = Particle {
            position: Float4::point(0.5, 0.0, 0.0),
            velocity: Float4::ZERO,
            color: Float4::new(1.0, 0.0, 0.0, 1.0),
        };
        let next = GravityParams::DEFAULT.step(particle, Float4::point(0.0, 0.0, 0.0));

        // d = (-0.5, 0, 0, 0), l = 0.25
        let expected = 0.000918 * (1.0 - 0.25 * 0.25);
        assert!((next.velocity.x + expected).abs() < 1e-9);
        assert!((next.position.x - (0.5 - expected)).abs() < 1e-7);
        assert_eq!(next.position.w, 1.0);
        assert_eq!(next.color.x, 1.0);
    }

    #[test]
    fn test_step_at_pointer_keeps_position() {
        let particle = Particle {
            position: Float4::point(0.1, 0.2, 0.3),
            velocity: Float4::ZERO,
            color: Float4::ZERO,
        };
        let next = GravityParams::DEFAULT.step(particle, particle.position);
        assert_eq!(next.position, particle.position);
        assert!((next.color.x - 1.15).abs() < 1e-6);
    }

    #[test]
    fn test_distance_is_capped() {
        let particle = Particle {
            position: Float4::point(-1.0, -1.0, 0.0),
            velocity: Float4::ZERO,
            color: Float4::ZERO,
        };
        let next = GravityParams::DEFAULT.step(particle, Float4::point(1.0, 1.0, 1.0));
        // l = min(3 / 2, 0.9) = 0.9
        let speed = next.velocity.length();
        assert!((speed - 0.000918 * (1.0 - 0.81)).abs() < 1e-8);
    }

    #[test]
    fn test_shader_matches_params() {
        let params = GravityParams::DEFAULT;
        for literal in [params.friction, params.pull, params.max_distance] {
            assert!(shaders::GRAVITY.contains(&format!("{literal}")));
        }
    }

    #[test]
    fn test_build_options() {
        assert_eq!(Gravity::default().build_options(), "-D WORKGROUP_SIZE=64");
    }
}
