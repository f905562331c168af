//! Parameter echo module: writes its parameter into a shared buffer.
//!
//! Writes its by-value parameter into every element of a shared buffer, with
//! the element index in `w`. Reading the buffer back after a frame shows
//! exactly which parameter value that frame's dispatch observed.

use crate::shaders;
use gravwell_core::{Error, Float4, FrameEvents, HostArgs, HostEntry, MemAccess, ProgramSource, Result};
use gravwell_runtime::{ComputeBuffer, DeviceBundle, GraphicsContext, KernelModule, SharedBuffer};

fn echo_host(gid: usize, args: &mut HostArgs) -> Result<()> {
    let param: Float4 = args.value(1)?;
    args.store(0, gid, Float4::new(param.x, param.y, param.z, gid as f32))
}

const SOURCE: ProgramSource = ProgramSource {
    label: "echo",
    text: shaders::ECHO,
    host: &[HostEntry {
        name: "echo",
        params: 2,
        func: echo_host,
    }],
};

#[derive(Debug, Clone, Copy, Default)]
pub struct Echo;

#[derive(Debug)]
pub struct EchoPayload {
    values: SharedBuffer<Float4>,
    pub param: Float4,
    events: FrameEvents,
    view: Option<ComputeBuffer>,
}

impl EchoPayload {
    pub fn new(gfx: &GraphicsContext, len: usize) -> Result<Self> {
        Ok(Self {
            values: SharedBuffer::new(gfx, "echo_values", &vec![Float4::ZERO; len])?,
            param: Float4::ZERO,
            events: FrameEvents::default(),
            view: None,
        })
    }

    pub fn values(&self) -> &SharedBuffer<Float4> {
        &self.values
    }

    pub fn events(&self) -> &FrameEvents {
        &self.events
    }
}

impl KernelModule for Echo {
    type Payload = EchoPayload;

    fn source(&self) -> ProgramSource {
        SOURCE
    }

    fn build_options(&self) -> String {
        shaders::workgroup_options(shaders::DEFAULT_WORKGROUP_SIZE)
    }

    fn entry_point(&self) -> &'static str {
        "echo"
    }

    fn load(&self, bundle: &mut DeviceBundle, payload: &mut EchoPayload) -> Result<()> {
        payload.view = None;
        bundle.graphics_finish()?;
        bundle.queue().finish()?;
        let view = bundle.create_from_graphics(&payload.values, MemAccess::WriteOnly)?;
        bundle.kernel().set_buffer(0, &view)?;
        payload.view = Some(view);
        Ok(())
    }

    fn exec(&self, bundle: &mut DeviceBundle, payload: &mut EchoPayload) -> Result<()> {
        let view = payload.view.as_ref().ok_or(Error::NotLoaded("echo"))?;
        payload.events.begin_frame();
        bundle.graphics_finish()?;
        bundle.kernel().set_value(1, &payload.param)?;

        let queue = bundle.queue();
        let acquired = queue.acquire(&[view.id()], &[])?;
        payload.events.acquire = Some(acquired.event());
        queue.wait(&[acquired.event()])?;
        let exec = queue.dispatch(
            bundle.kernel().id(),
            payload.values.len(),
            &payload.events.dispatch_wait_list(),
        )?;
        payload.events.exec = Some(exec);
        let release = acquired.release(&[exec])?;
        payload.events.release = Some(release);
        queue.flush()?;
        queue.wait(&[release])
    }
}
