//! wgpu backend.
//!
//! One wgpu device serves both sides: vertex buffers are created with
//! `STORAGE` usage so compute views bind them directly. wgpu has no explicit
//! interop acquire, so acquire and release flip the buffer's ownership epoch
//! in queue order and the device's single in-order queue provides the
//! ordering. Commands are submitted as they are enqueued; an event completes
//! with the submission it maps to.

use crate::backend::{Backend, BufferInit, DeviceClass, DeviceInfo, KernelArg, PlatformInfo};
use gravwell_core::{
    BuildInfo, BuildOptions, BuildStatus, DefineValue, Error, ErrorCode, Event, EventKind,
    EventStatus, KernelId, MemAccess, MemId, NativeBuffer, Owner, ProgramId, ProgramSource,
    Result,
};
use naga_oil::compose::{Composer, NagaModuleDescriptor, ShaderDefValue};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct GraphicsBuffer {
    buffer: Arc<wgpu::Buffer>,
    len: u64,
    owner: Owner,
}

#[derive(Debug)]
struct MemObject {
    buffer: Arc<wgpu::Buffer>,
    len: u64,
    access: MemAccess,
    shared: Option<NativeBuffer>,
}

#[derive(Debug)]
struct Program {
    label: String,
    module: naga::Module,
    shader: wgpu::ShaderModule,
}

/// Parameter slot shape, reflected from the program's bindings.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Storage { read_only: bool },
    Uniform { size: usize },
}

#[derive(Debug)]
enum BoundArg {
    Mem(MemId),
    Value(Vec<u8>),
}

#[derive(Debug)]
struct Kernel {
    entry: String,
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    slots: Vec<Option<Slot>>,
    args: Vec<Option<BoundArg>>,
    workgroup_size: u32,
}

#[derive(Debug, Clone, Copy)]
struct EventRecord {
    kind: EventKind,
    seq: u64,
}

#[derive(Debug, Default)]
struct State {
    next_id: u32,
    next_event: u64,
    graphics: HashMap<NativeBuffer, GraphicsBuffer>,
    mems: HashMap<MemId, MemObject>,
    programs: HashMap<ProgramId, Program>,
    kernels: HashMap<KernelId, Kernel>,
    /// Events whose submission has not completed. Any other id up to
    /// `next_event` is complete.
    events: HashMap<u64, EventRecord>,
    submissions: HashMap<u64, wgpu::SubmissionIndex>,
    last_seq: u64,
    completed_seq: u64,
}

impl State {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn check_wait_list(&self, op: &'static str, wait: &[Event]) -> Result<()> {
        if wait.iter().any(|e| !self.known(e.id())) {
            return Err(Error::device(op, ErrorCode::InvalidEventWaitList));
        }
        Ok(())
    }

    fn known(&self, id: u64) -> bool {
        (1..=self.next_event).contains(&id)
    }

    /// Submission `event` waits for, or `None` once it has completed.
    fn pending_seq(&self, op: &'static str, event: Event) -> Result<Option<u64>> {
        match self.events.get(&event.id()) {
            Some(record) => {
                debug_assert_eq!(record.kind, event.kind());
                Ok((record.seq > self.completed_seq).then_some(record.seq))
            }
            None if self.known(event.id()) => Ok(None),
            None => Err(Error::device(op, ErrorCode::InvalidEvent)),
        }
    }

    fn record(&mut self, kind: EventKind) -> Event {
        self.next_event += 1;
        let event = Event::new(self.next_event, kind);
        if self.last_seq > self.completed_seq {
            self.events.insert(
                event.id(),
                EventRecord {
                    kind,
                    seq: self.last_seq,
                },
            );
        }
        tracing::trace!(%event, seq = self.last_seq, "enqueued");
        event
    }

    /// Mark every submission up to `seq` complete and forget its events.
    fn complete_through(&mut self, seq: u64) {
        self.completed_seq = self.completed_seq.max(seq);
        let done = self.completed_seq;
        self.submissions.retain(|s, _| *s > done);
        self.events.retain(|_, record| record.seq > done);
    }

    fn shared_buffers(&self, op: &'static str, mems: &[MemId]) -> Result<Vec<NativeBuffer>> {
        mems.iter()
            .map(|mem| match self.mems.get(mem) {
                Some(MemObject { shared: Some(buffer), .. }) => Ok(*buffer),
                Some(_) => Err(Error::device(op, ErrorCode::InvalidGraphicsObject)),
                None => Err(Error::device(op, ErrorCode::InvalidMemObject)),
            })
            .collect()
    }

    /// Apply an ownership step to every buffer, or to none of them.
    fn transition(
        &mut self,
        op: &'static str,
        buffers: &[NativeBuffer],
        step: fn(&mut Owner) -> Result<()>,
    ) -> Result<()> {
        let mut owners = Vec::with_capacity(buffers.len());
        for buffer in buffers {
            let gfx = self
                .graphics
                .get(buffer)
                .ok_or(Error::device(op, ErrorCode::InvalidGraphicsObject))?;
            let mut owner = gfx.owner;
            step(&mut owner).map_err(|_| Error::device(op, ErrorCode::InvalidGraphicsObject))?;
            owners.push(owner);
        }
        for (buffer, owner) in buffers.iter().zip(owners) {
            if let Some(gfx) = self.graphics.get_mut(buffer) {
                gfx.owner = owner;
            }
        }
        Ok(())
    }
}

/// Joint compute/graphics device on wgpu.
#[derive(Debug)]
pub struct WgpuDevice {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    adapter_info: wgpu::AdapterInfo,
    state: Mutex<State>,
}

impl WgpuDevice {
    /// Open the default high-performance adapter.
    ///
    /// # Errors
    /// [`Error::Platform`] if no adapter is found, [`Error::Backend`] if the
    /// device cannot be created.
    pub async fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| Error::Platform(format!("no suitable adapter: {e}")))?;

        Self::with_adapter(&adapter).await
    }

    pub async fn with_adapter(adapter: &wgpu::Adapter) -> Result<Self> {
        let adapter_info = adapter.get_info();
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await
            .map_err(|e| Error::Backend(format!("failed to create device: {e}")))?;

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_info,
            state: Mutex::new(State::default()),
        })
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn submit(&self, state: &mut State, commands: Option<wgpu::CommandBuffer>) {
        let index = self.queue.submit(commands);
        state.last_seq += 1;
        state.submissions.insert(state.last_seq, index);
    }

    fn poll(&self, index: Option<wgpu::SubmissionIndex>) -> Result<()> {
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: index,
                timeout: None,
            })
            .map_err(|e| Error::Backend(format!("GPU poll failed: {e:?}")))?;
        Ok(())
    }

    fn drain(&self, state: &mut State) -> Result<()> {
        self.poll(None)?;
        let last = state.last_seq;
        state.complete_through(last);
        Ok(())
    }

    fn download(&self, buffer: &wgpu::Buffer, len: u64) -> Result<Vec<u8>> {
        let size = padded(len);
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gravwell_readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("gravwell_readback_copy"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.poll(None)?;

        receiver
            .recv()
            .map_err(|e| Error::Backend(format!("map recv failed: {e}")))?
            .map_err(|e| Error::Backend(format!("map failed: {e}")))?;

        let mut data = slice.get_mapped_range().to_vec();
        staging.unmap();
        data.truncate(len as usize);
        Ok(data)
    }
}

/// wgpu copies and writes work in 4-byte units.
fn padded(len: u64) -> u64 {
    len.div_ceil(wgpu::COPY_BUFFER_ALIGNMENT) * wgpu::COPY_BUFFER_ALIGNMENT
}

fn padded_bytes(data: &[u8]) -> Cow<'_, [u8]> {
    let len = padded(data.len() as u64) as usize;
    if len == data.len() {
        Cow::Borrowed(data)
    } else {
        let mut owned = data.to_vec();
        owned.resize(len, 0);
        Cow::Owned(owned)
    }
}

fn shader_defs(options: &BuildOptions) -> HashMap<String, ShaderDefValue> {
    options
        .iter()
        .map(|(name, value)| {
            let value = match value {
                DefineValue::Bool(v) => ShaderDefValue::Bool(v),
                DefineValue::Int(v) => ShaderDefValue::Int(v),
                DefineValue::UInt(v) => ShaderDefValue::UInt(v),
            };
            (name.to_string(), value)
        })
        .collect()
}

fn build_error(source: &ProgramSource, log: String) -> Error {
    Error::Build {
        program: source.label.to_string(),
        log,
    }
}

impl Backend for WgpuDevice {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn platforms(&self) -> Result<Vec<PlatformInfo>> {
        let class = match self.adapter_info.device_type {
            wgpu::DeviceType::DiscreteGpu
            | wgpu::DeviceType::IntegratedGpu
            | wgpu::DeviceType::VirtualGpu => DeviceClass::Gpu,
            wgpu::DeviceType::Cpu => DeviceClass::Cpu,
            wgpu::DeviceType::Other => DeviceClass::Other,
        };
        Ok(vec![PlatformInfo {
            name: format!("wgpu/{:?}", self.adapter_info.backend),
            devices: vec![DeviceInfo {
                name: self.adapter_info.name.clone(),
                class,
            }],
        }])
    }

    fn create_graphics_buffer(&self, label: &str, contents: &[u8]) -> Result<NativeBuffer> {
        if contents.is_empty() {
            return Err(Error::device("create_graphics_buffer", ErrorCode::InvalidBufferSize));
        }
        let data = padded_bytes(contents);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: data.len() as u64,
            usage: wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue.write_buffer(&buffer, 0, &data);

        let mut state = self.lock();
        let handle = NativeBuffer(state.next_id());
        state.graphics.insert(
            handle,
            GraphicsBuffer {
                buffer: Arc::new(buffer),
                len: contents.len() as u64,
                owner: Owner::Graphics,
            },
        );
        Ok(handle)
    }

    fn destroy_graphics_buffer(&self, buffer: NativeBuffer) {
        self.lock().graphics.remove(&buffer);
    }

    fn read_graphics_buffer(&self, buffer: NativeBuffer) -> Result<Vec<u8>> {
        let (gpu_buffer, len) = {
            let state = self.lock();
            let gfx = state
                .graphics
                .get(&buffer)
                .ok_or(Error::device("read_graphics_buffer", ErrorCode::InvalidGraphicsObject))?;
            gfx.owner.check_graphics("read_graphics_buffer")?;
            (Arc::clone(&gfx.buffer), gfx.len)
        };
        self.download(&gpu_buffer, len)
    }

    fn graphics_finish(&self) -> Result<()> {
        let mut state = self.lock();
        self.drain(&mut state)
    }

    fn build_program(
        &self,
        source: &ProgramSource,
        options: &BuildOptions,
    ) -> Result<(ProgramId, BuildInfo)> {
        let mut composer = Composer::default().with_capabilities(naga::valid::Capabilities::all());
        let module = composer
            .make_naga_module(NagaModuleDescriptor {
                source: source.text,
                file_path: source.label,
                shader_defs: shader_defs(options),
                ..Default::default()
            })
            .map_err(|e| build_error(source, e.emit_to_string(&composer)))?;

        let info = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .map_err(|e| build_error(source, format!("validation failed: {e:?}")))?;

        let wgsl = naga::back::wgsl::write_string(
            &module,
            &info,
            naga::back::wgsl::WriterFlags::empty(),
        )
        .map_err(|e| build_error(source, format!("WGSL emission failed: {e}")))?;

        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(source.label),
                source: wgpu::ShaderSource::Wgsl(Cow::Owned(wgsl)),
            });

        let log = module
            .entry_points
            .iter()
            .map(|ep| {
                let [x, y, z] = ep.workgroup_size;
                format!("{:?} entry point '{}' workgroup_size({x}, {y}, {z})", ep.stage, ep.name)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let mut state = self.lock();
        let id = ProgramId(state.next_id());
        state.programs.insert(
            id,
            Program {
                label: source.label.to_string(),
                module,
                shader,
            },
        );
        Ok((
            id,
            BuildInfo {
                status: BuildStatus::Success,
                options: options.to_string(),
                log,
            },
        ))
    }

    fn create_kernel(&self, program: ProgramId, entry: &str) -> Result<KernelId> {
        let mut state = self.lock();
        let program = state
            .programs
            .get(&program)
            .ok_or(Error::device("create_kernel", ErrorCode::InvalidProgram))?;
        let module = &program.module;
        let ep = module
            .entry_points
            .iter()
            .find(|ep| ep.name == entry && ep.stage == naga::ShaderStage::Compute)
            .ok_or(Error::device("create_kernel", ErrorCode::InvalidKernelName))?;

        let mut slots: Vec<Option<Slot>> = Vec::new();
        for (handle, var) in module.global_variables.iter() {
            let Some(binding) = var.binding.as_ref() else {
                continue;
            };
            if binding.group != 0 {
                continue;
            }
            let used = ep.function.expressions.iter().any(
                |(_, expr)| matches!(expr, naga::Expression::GlobalVariable(h) if *h == handle),
            );
            if !used {
                continue;
            }
            let slot = match var.space {
                naga::AddressSpace::Storage { access } => Slot::Storage {
                    read_only: !access.contains(naga::StorageAccess::STORE),
                },
                naga::AddressSpace::Uniform => Slot::Uniform {
                    size: module.types[var.ty].inner.size(module.to_ctx()) as usize,
                },
                _ => continue,
            };
            let index = binding.binding as usize;
            if slots.len() <= index {
                slots.resize(index + 1, None);
            }
            slots[index] = Some(slot);
        }

        let entries: Vec<wgpu::BindGroupLayoutEntry> = slots
            .iter()
            .enumerate()
            .filter_map(|(binding, slot)| {
                let ty = match (*slot)? {
                    Slot::Storage { read_only } => wgpu::BufferBindingType::Storage { read_only },
                    Slot::Uniform { .. } => wgpu::BufferBindingType::Uniform,
                };
                Some(wgpu::BindGroupLayoutEntry {
                    binding: binding as u32,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                })
            })
            .collect();

        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("{}_layout", program.label)),
                entries: &entries,
            });
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{}_pipeline_layout", program.label)),
                bind_group_layouts: &[&layout],
                immediate_size: 0,
            });
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry),
                layout: Some(&pipeline_layout),
                module: &program.shader,
                entry_point: Some(entry),
                compilation_options: Default::default(),
                cache: None,
            });

        let workgroup_size = ep.workgroup_size[0].max(1);
        let args = slots.iter().map(|_| None).collect();
        let id = KernelId(state.next_id());
        state.kernels.insert(
            id,
            Kernel {
                entry: entry.to_string(),
                pipeline,
                layout,
                slots,
                args,
                workgroup_size,
            },
        );
        Ok(id)
    }

    fn create_from_graphics(&self, buffer: NativeBuffer, access: MemAccess) -> Result<MemId> {
        let mut state = self.lock();
        let gfx = state
            .graphics
            .get(&buffer)
            .ok_or(Error::device("create_from_graphics", ErrorCode::InvalidGraphicsObject))?;
        let object = MemObject {
            buffer: Arc::clone(&gfx.buffer),
            len: gfx.len,
            access,
            shared: Some(buffer),
        };
        let id = MemId(state.next_id());
        state.mems.insert(id, object);
        Ok(id)
    }

    fn create_buffer(&self, size: usize, access: MemAccess, init: BufferInit) -> Result<MemId> {
        if size == 0 {
            return Err(Error::device("create_buffer", ErrorCode::InvalidBufferSize));
        }
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gravwell_compute"),
            size: padded(size as u64),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if let BufferInit::UseHost(region) = init {
            let bytes = region.read_bytes();
            if bytes.len() < size {
                return Err(Error::device("create_buffer", ErrorCode::InvalidHostPtr));
            }
            self.queue.write_buffer(&buffer, 0, &padded_bytes(&bytes[..size]));
        }

        let mut state = self.lock();
        let id = MemId(state.next_id());
        state.mems.insert(
            id,
            MemObject {
                buffer: Arc::new(buffer),
                len: size as u64,
                access,
                shared: None,
            },
        );
        Ok(id)
    }

    fn release_mem(&self, mem: MemId) {
        self.lock().mems.remove(&mem);
    }

    fn set_arg(&self, kernel: KernelId, index: u32, arg: KernelArg<'_>) -> Result<()> {
        let mut state = self.lock();
        let mem_access = match arg {
            KernelArg::Mem(mem) => Some(
                state
                    .mems
                    .get(&mem)
                    .map(|m| m.access)
                    .ok_or(Error::device("set_arg", ErrorCode::InvalidMemObject))?,
            ),
            KernelArg::Value(_) => None,
        };
        let kernel = state
            .kernels
            .get_mut(&kernel)
            .ok_or(Error::device("set_arg", ErrorCode::InvalidKernel))?;
        let slot = kernel
            .slots
            .get(index as usize)
            .copied()
            .flatten()
            .ok_or(Error::device("set_arg", ErrorCode::InvalidArgIndex))?;

        let bound = match (slot, arg, mem_access) {
            (Slot::Storage { read_only }, KernelArg::Mem(mem), Some(access)) => {
                if !read_only && !access.writable() {
                    return Err(Error::device("set_arg", ErrorCode::InvalidArgValue));
                }
                BoundArg::Mem(mem)
            }
            (Slot::Uniform { size }, KernelArg::Value(bytes), _) => {
                if bytes.len() != size {
                    return Err(Error::device("set_arg", ErrorCode::InvalidArgSize));
                }
                BoundArg::Value(bytes.to_vec())
            }
            _ => return Err(Error::device("set_arg", ErrorCode::InvalidArgValue)),
        };
        kernel.args[index as usize] = Some(bound);
        Ok(())
    }

    fn enqueue_write(&self, mem: MemId, data: &[u8], wait: &[Event]) -> Result<Event> {
        let mut state = self.lock();
        state.check_wait_list("enqueue_write", wait)?;
        let object = state
            .mems
            .get(&mem)
            .ok_or(Error::device("enqueue_write", ErrorCode::InvalidMemObject))?;
        if object.shared.is_some() {
            return Err(Error::device("enqueue_write", ErrorCode::InvalidOperation));
        }
        if data.len() as u64 != object.len {
            return Err(Error::device("enqueue_write", ErrorCode::InvalidBufferSize));
        }
        self.queue.write_buffer(&object.buffer, 0, &padded_bytes(data));
        self.submit(&mut state, None);
        Ok(state.record(EventKind::Transfer))
    }

    fn enqueue_acquire(&self, mems: &[MemId], wait: &[Event]) -> Result<Event> {
        let mut state = self.lock();
        state.check_wait_list("enqueue_acquire", wait)?;
        let buffers = state.shared_buffers("enqueue_acquire", mems)?;
        state.transition("enqueue_acquire", &buffers, Owner::acquire)?;
        Ok(state.record(EventKind::Acquire))
    }

    fn enqueue_dispatch(&self, kernel: KernelId, global: usize, wait: &[Event]) -> Result<Event> {
        let mut state = self.lock();
        state.check_wait_list("enqueue_dispatch", wait)?;
        let k = state
            .kernels
            .get(&kernel)
            .ok_or(Error::device("enqueue_dispatch", ErrorCode::InvalidKernel))?;

        let groups = (global as u64).div_ceil(u64::from(k.workgroup_size));
        let limit = u64::from(self.device.limits().max_compute_workgroups_per_dimension);
        if global == 0 || groups > limit {
            return Err(Error::device("enqueue_dispatch", ErrorCode::InvalidWorkSize));
        }

        let mut bound: Vec<(u32, Arc<wgpu::Buffer>)> = Vec::new();
        for (index, (slot, arg)) in k.slots.iter().zip(&k.args).enumerate() {
            if slot.is_none() {
                continue;
            }
            let buffer = match arg {
                None => return Err(Error::device("enqueue_dispatch", ErrorCode::KernelArgsNotSet)),
                Some(BoundArg::Mem(mem)) => {
                    let object = state
                        .mems
                        .get(mem)
                        .ok_or(Error::device("enqueue_dispatch", ErrorCode::InvalidMemObject))?;
                    if let Some(shared) = object.shared {
                        state
                            .graphics
                            .get(&shared)
                            .ok_or(Error::device("enqueue_dispatch", ErrorCode::InvalidGraphicsObject))?
                            .owner
                            .check_compute("enqueue_dispatch")?;
                    }
                    Arc::clone(&object.buffer)
                }
                Some(BoundArg::Value(bytes)) => {
                    let data = padded_bytes(bytes);
                    let uniform = self.device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some("gravwell_kernel_value"),
                        size: (data.len() as u64).max(16),
                        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                        mapped_at_creation: false,
                    });
                    self.queue.write_buffer(&uniform, 0, &data);
                    Arc::new(uniform)
                }
            };
            bound.push((index as u32, buffer));
        }

        let entries: Vec<wgpu::BindGroupEntry> = bound
            .iter()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{}_bind_group", k.entry)),
            layout: &k.layout,
            entries: &entries,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(&k.entry),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(&k.entry),
                timestamp_writes: None,
            });
            pass.set_pipeline(&k.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups as u32, 1, 1);
        }

        self.submit(&mut state, Some(encoder.finish()));
        Ok(state.record(EventKind::Exec))
    }

    fn enqueue_release(&self, mems: &[MemId], wait: &[Event]) -> Result<Event> {
        let mut state = self.lock();
        state.check_wait_list("enqueue_release", wait)?;
        let buffers = state.shared_buffers("enqueue_release", mems)?;
        state.transition("enqueue_release", &buffers, Owner::release)?;
        Ok(state.record(EventKind::Release))
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        let mut state = self.lock();
        self.drain(&mut state)
    }

    fn wait(&self, events: &[Event]) -> Result<()> {
        let mut state = self.lock();
        let mut target = None;
        for event in events {
            target = target.max(state.pending_seq("wait", *event)?);
        }
        let Some(target) = target else {
            return Ok(());
        };
        let index = state.submissions.get(&target).cloned();
        self.poll(index)?;
        state.complete_through(target);
        Ok(())
    }

    fn event_status(&self, event: Event) -> Result<EventStatus> {
        match self.lock().pending_seq("event_status", event)? {
            Some(_) => Ok(EventStatus::Submitted),
            None => Ok(EventStatus::Complete),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gravwell_core::{Float4, HostEntry};

    const COPY: ProgramSource = ProgramSource {
        label: "scale",
        text: r#"
@group(0) @binding(0) var<storage, read_write> values: array<vec4<f32>>;
@group(0) @binding(1) var<uniform> factor: vec4<f32>;

@compute @workgroup_size(#{WORKGROUP_SIZE})
fn scale(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= arrayLength(&values)) {
        return;
    }
    values[gid.x] = values[gid.x] * factor;
}
"#,
        host: &[] as &[HostEntry],
    };

    #[test]
    fn test_padding() {
        assert_eq!(padded(1), 4);
        assert_eq!(padded(16), 16);
        assert_eq!(padded_bytes(&[1, 2, 3]).len(), 4);
    }

    #[test]
    fn test_completed_events_are_forgotten() {
        let mut state = State::default();
        let mut events = Vec::new();
        for _ in 0..1000 {
            state.last_seq += 1;
            events.push(state.record(EventKind::Exec));
        }
        assert_eq!(state.events.len(), 1000);

        state.complete_through(600);
        assert_eq!(state.events.len(), 400);
        assert_eq!(state.pending_seq("wait", events[0]).unwrap(), None);
        assert_eq!(state.pending_seq("wait", events[999]).unwrap(), Some(1000));
        state.check_wait_list("dispatch", &[events[0], events[999]]).unwrap();

        let last = state.last_seq;
        state.complete_through(last);
        assert!(state.events.is_empty());
        // Nothing is pending, so new events are complete from the start
        let fresh = state.record(EventKind::Acquire);
        assert!(state.events.is_empty());
        assert_eq!(state.pending_seq("wait", fresh).unwrap(), None);

        let bogus = Event::new(5000, EventKind::Exec);
        let err = state.check_wait_list("dispatch", &[bogus]).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidEventWaitList));
        let err = state.pending_seq("wait", bogus).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidEvent));
    }

    #[pollster::test]
    #[ignore] // Requires GPU
    async fn test_acquire_dispatch_release_roundtrip() {
        let gpu = WgpuDevice::new().await.expect("GPU should be available");
        println!("GPU: {} ({:?})", gpu.adapter_info().name, gpu.adapter_info().backend);

        let options = BuildOptions::parse("-D WORKGROUP_SIZE=64").unwrap();
        let (program, info) = gpu.build_program(&COPY, &options).expect("build should succeed");
        assert!(info.log.contains("scale"));
        let kernel = gpu.create_kernel(program, "scale").unwrap();

        let points = [Float4::point(1.0, 2.0, 3.0), Float4::point(-1.0, 0.5, 0.0)];
        let gfx = gpu.create_graphics_buffer("values", bytemuck::cast_slice(&points)).unwrap();
        let mem = gpu.create_from_graphics(gfx, MemAccess::ReadWrite).unwrap();
        gpu.set_arg(kernel, 0, KernelArg::Mem(mem)).unwrap();
        let factor = Float4::new(2.0, 2.0, 2.0, 1.0);
        gpu.set_arg(kernel, 1, KernelArg::Value(bytemuck::bytes_of(&factor))).unwrap();

        let acquire = gpu.enqueue_acquire(&[mem], &[]).unwrap();
        assert!(gpu.read_graphics_buffer(gfx).is_err());
        let exec = gpu.enqueue_dispatch(kernel, points.len(), &[acquire]).unwrap();
        let release = gpu.enqueue_release(&[mem], &[exec]).unwrap();
        gpu.wait(&[release]).unwrap();
        assert_eq!(gpu.event_status(release).unwrap(), EventStatus::Complete);

        let out: Vec<Float4> = bytemuck::pod_collect_to_vec(&gpu.read_graphics_buffer(gfx).unwrap());
        assert_eq!(out[0], Float4::point(2.0, 4.0, 6.0));
    }

    #[pollster::test]
    #[ignore] // Requires GPU
    async fn test_build_failure_carries_log() {
        let gpu = WgpuDevice::new().await.expect("GPU should be available");
        let broken = ProgramSource {
            label: "broken",
            text: "@compute @workgroup_size(1) fn main() { let x = undefined_name; }",
            host: &[],
        };
        let err = gpu
            .build_program(&broken, &BuildOptions::default())
            .expect_err("build should fail");
        assert!(matches!(err, Error::Build { .. }));
        assert!(err.to_string().contains("broken"));
    }
}
