//! Reference host backend.
//!
//! Runs kernels through their host implementations and models the device
//! queue faithfully: commands are `Queued` when enqueued, `Submitted` on
//! flush, and execute strictly in order when finished or waited on. Executed
//! commands are appended to a timeline that tests can inspect; only the most
//! recent ones are kept.

use crate::backend::{Backend, BufferInit, DeviceClass, DeviceInfo, KernelArg, PlatformInfo};
use gravwell_core::{
    BuildInfo, BuildOptions, BuildStatus, Error, ErrorCode, Event, EventKind, EventStatus,
    HostArg, HostArgs, HostEntry, HostRegion, KernelId, MemAccess, MemId, NativeBuffer, Owner,
    ProgramId, ProgramSource, Result,
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A command as it was enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Write { mem: MemId, len: usize },
    Acquire { mems: Vec<MemId> },
    Dispatch { kernel: KernelId, global: usize },
    Release { mems: Vec<MemId> },
}

/// One executed command.
#[derive(Debug, Clone)]
pub struct Executed {
    pub event: Event,
    pub command: Command,
    pub wait_list: Vec<Event>,
    /// `Some` when the command failed on the device.
    pub failure: Option<ErrorCode>,
}

#[derive(Debug)]
struct GraphicsBuffer {
    label: String,
    data: Vec<u8>,
    owner: Owner,
}

#[derive(Debug)]
enum Storage {
    Shared(NativeBuffer),
    Device(Vec<u8>),
    Host(Arc<dyn HostRegion>),
}

#[derive(Debug)]
struct MemObject {
    storage: Storage,
    access: MemAccess,
}

#[derive(Debug, Clone)]
enum BoundArg {
    Mem(MemId),
    Value(Vec<u8>),
}

#[derive(Debug)]
struct HostKernel {
    entry: HostEntry,
    args: Vec<Option<BoundArg>>,
}

#[derive(Debug)]
enum Pending {
    Write { mem: MemId, data: Vec<u8> },
    Acquire { mems: Vec<MemId> },
    Dispatch { kernel: KernelId, entry: HostEntry, args: Vec<Option<BoundArg>>, global: usize },
    Release { mems: Vec<MemId> },
}

impl Pending {
    fn command(&self) -> Command {
        match self {
            Pending::Write { mem, data } => Command::Write { mem: *mem, len: data.len() },
            Pending::Acquire { mems } => Command::Acquire { mems: mems.clone() },
            Pending::Dispatch { kernel, global, .. } => Command::Dispatch {
                kernel: *kernel,
                global: *global,
            },
            Pending::Release { mems } => Command::Release { mems: mems.clone() },
        }
    }
}

#[derive(Debug)]
struct Queued {
    event: Event,
    wait: Vec<Event>,
    pending: Pending,
}

#[derive(Debug, Default)]
struct State {
    next_id: u32,
    next_event: u64,
    graphics: HashMap<NativeBuffer, GraphicsBuffer>,
    mems: HashMap<MemId, MemObject>,
    programs: HashMap<ProgramId, ProgramSource>,
    kernels: HashMap<KernelId, HostKernel>,
    queue: VecDeque<Queued>,
    /// Events that have not completed yet. Any other id up to `next_event` is complete.
    statuses: HashMap<u64, EventStatus>,
    failures: BTreeMap<u64, ErrorCode>,
    timeline: VecDeque<Executed>,
    history: usize,
    graphics_syncs: usize,
    max_work_items: usize,
    platforms: Option<Vec<PlatformInfo>>,
}

/// Reference device that executes everything on the calling thread.
#[derive(Debug)]
pub struct HostDevice {
    state: Mutex<State>,
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HostDevice {
    pub const PLATFORM: &'static str = "gravwell host";
    pub const DEVICE: &'static str = "host reference device";
    /// Executed commands and failure codes kept by default.
    pub const DEFAULT_HISTORY: usize = 1024;

    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                max_work_items: 1 << 24,
                history: Self::DEFAULT_HISTORY,
                ..Default::default()
            }),
        }
    }

    /// Reject dispatches with more than `max` work items.
    pub fn with_max_work_items(self, max: usize) -> Self {
        self.lock().max_work_items = max;
        self
    }

    /// Report `platforms` from enumeration instead of the single host GPU.
    pub fn with_platforms(self, platforms: Vec<PlatformInfo>) -> Self {
        self.lock().platforms = Some(platforms);
        self
    }

    /// Keep at most `n` executed commands and failure codes.
    ///
    /// A failure older than that no longer fails the commands that wait on it.
    pub fn with_history(self, n: usize) -> Self {
        self.lock().history = n.max(1);
        self
    }

    /// The most recently executed commands, in execution order.
    pub fn timeline(&self) -> Vec<Executed> {
        self.lock().timeline.iter().cloned().collect()
    }

    /// Number of events still tracked individually, i.e. not yet complete.
    pub fn tracked_events(&self) -> usize {
        self.lock().statuses.len()
    }

    /// Number of commands enqueued but not yet executed.
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    /// How many times graphics was synchronized with `graphics_finish`.
    pub fn graphics_syncs(&self) -> usize {
        self.lock().graphics_syncs
    }

    /// Current owner of a graphics buffer.
    pub fn owner(&self, buffer: NativeBuffer) -> Option<Owner> {
        self.lock().graphics.get(&buffer).map(|b| b.owner)
    }

    /// Number of live compute memory objects.
    pub fn live_mems(&self) -> usize {
        self.lock().mems.len()
    }

    /// Number of live graphics buffers.
    pub fn live_graphics_buffers(&self) -> usize {
        self.lock().graphics.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl State {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Whether `id` was handed out by this device.
    fn known(&self, id: u64) -> bool {
        (1..=self.next_event).contains(&id)
    }

    fn status(&self, id: u64) -> Option<EventStatus> {
        match self.statuses.get(&id) {
            Some(status) => Some(*status),
            None if self.known(id) => Some(EventStatus::Complete),
            None => None,
        }
    }

    fn enqueue(
        &mut self,
        op: &'static str,
        kind: EventKind,
        wait: &[Event],
        pending: Pending,
    ) -> Result<Event> {
        if wait.iter().any(|e| !self.known(e.id())) {
            return Err(Error::device(op, ErrorCode::InvalidEventWaitList));
        }
        self.next_event += 1;
        let event = Event::new(self.next_event, kind);
        self.statuses.insert(event.id(), EventStatus::Queued);
        self.queue.push_back(Queued {
            event,
            wait: wait.to_vec(),
            pending,
        });
        tracing::trace!(%event, waits = wait.len(), "enqueued");
        Ok(event)
    }

    fn flush(&mut self) {
        for queued in &self.queue {
            self.statuses.insert(queued.event.id(), EventStatus::Submitted);
        }
    }

    /// Execute queued commands in order up to and including `until`.
    fn drain(&mut self, until: Option<u64>) {
        self.flush();
        while let Some(front) = self.queue.front() {
            if until.is_some_and(|id| front.event.id() > id) {
                break;
            }
            let Some(queued) = self.queue.pop_front() else {
                break;
            };
            let command = queued.pending.command();
            let failure = if queued.wait.iter().any(|e| self.failures.contains_key(&e.id())) {
                Some(ErrorCode::ExecutionFailure)
            } else {
                self.execute(queued.pending).err()
            };
            if let Some(code) = failure {
                tracing::debug!(event = %queued.event, %code, "command failed");
                self.failures.insert(queued.event.id(), code);
                while self.failures.len() > self.history {
                    self.failures.pop_first();
                }
            }
            self.statuses.remove(&queued.event.id());
            self.timeline.push_back(Executed {
                event: queued.event,
                command,
                wait_list: queued.wait,
                failure,
            });
            while self.timeline.len() > self.history {
                self.timeline.pop_front();
            }
        }
    }

    fn execute(&mut self, pending: Pending) -> std::result::Result<(), ErrorCode> {
        match pending {
            Pending::Write { mem, data } => self.write_mem(mem, &data),
            Pending::Acquire { mems } => self.transition(&mems, Owner::acquire),
            Pending::Release { mems } => self.transition(&mems, Owner::release),
            Pending::Dispatch { entry, args, global, .. } => self.dispatch(entry, args, global),
        }
    }

    fn transition(
        &mut self,
        mems: &[MemId],
        step: fn(&mut Owner) -> Result<()>,
    ) -> std::result::Result<(), ErrorCode> {
        // All or nothing: nothing changes hands unless every buffer can.
        let mut next = Vec::with_capacity(mems.len());
        for mem in mems {
            let buffer = match self.mems.get(mem).map(|m| &m.storage) {
                Some(Storage::Shared(buffer)) => *buffer,
                Some(_) => return Err(ErrorCode::InvalidGraphicsObject),
                None => return Err(ErrorCode::InvalidMemObject),
            };
            let mut owner = self
                .graphics
                .get(&buffer)
                .ok_or(ErrorCode::InvalidGraphicsObject)?
                .owner;
            step(&mut owner).map_err(|e| e.code().unwrap_or(ErrorCode::InvalidOperation))?;
            next.push((buffer, owner));
        }
        for (buffer, owner) in next {
            if let Some(gfx) = self.graphics.get_mut(&buffer) {
                gfx.owner = owner;
            }
        }
        Ok(())
    }

    fn write_mem(&mut self, mem: MemId, data: &[u8]) -> std::result::Result<(), ErrorCode> {
        let object = self.mems.get_mut(&mem).ok_or(ErrorCode::InvalidMemObject)?;
        match &mut object.storage {
            Storage::Device(bytes) => {
                if bytes.len() != data.len() {
                    return Err(ErrorCode::InvalidBufferSize);
                }
                bytes.copy_from_slice(data);
                Ok(())
            }
            Storage::Host(region) => region
                .write_bytes(data)
                .map_err(|_| ErrorCode::InvalidHostPtr),
            Storage::Shared(_) => Err(ErrorCode::InvalidOperation),
        }
    }

    fn read_mem(&self, mem: MemId) -> std::result::Result<Vec<u8>, ErrorCode> {
        let object = self.mems.get(&mem).ok_or(ErrorCode::InvalidMemObject)?;
        match &object.storage {
            Storage::Device(bytes) => Ok(bytes.clone()),
            Storage::Host(region) => Ok(region.read_bytes()),
            Storage::Shared(buffer) => {
                let gfx = self
                    .graphics
                    .get(buffer)
                    .ok_or(ErrorCode::InvalidGraphicsObject)?;
                if gfx.owner != Owner::Compute {
                    return Err(ErrorCode::InvalidGraphicsObject);
                }
                Ok(gfx.data.clone())
            }
        }
    }

    fn store_mem(&mut self, mem: MemId, data: Vec<u8>) -> std::result::Result<(), ErrorCode> {
        let object = self.mems.get_mut(&mem).ok_or(ErrorCode::InvalidMemObject)?;
        match &mut object.storage {
            Storage::Device(bytes) => *bytes = data,
            Storage::Host(region) => {
                region
                    .write_bytes(&data)
                    .map_err(|_| ErrorCode::InvalidHostPtr)?;
            }
            Storage::Shared(buffer) => {
                let gfx = self
                    .graphics
                    .get_mut(buffer)
                    .ok_or(ErrorCode::InvalidGraphicsObject)?;
                gfx.data = data;
            }
        }
        Ok(())
    }

    fn dispatch(
        &mut self,
        entry: HostEntry,
        args: Vec<Option<BoundArg>>,
        global: usize,
    ) -> std::result::Result<(), ErrorCode> {
        let mut slots = Vec::with_capacity(args.len());
        for arg in &args {
            slots.push(match arg {
                None => return Err(ErrorCode::KernelArgsNotSet),
                Some(BoundArg::Mem(mem)) => Some(HostArg::Buffer(self.read_mem(*mem)?)),
                Some(BoundArg::Value(bytes)) => Some(HostArg::Value(bytes.clone())),
            });
        }

        let mut host_args = HostArgs::new(slots);
        for gid in 0..global {
            (entry.func)(gid, &mut host_args)
                .map_err(|e| e.code().unwrap_or(ErrorCode::ExecutionFailure))?;
        }

        for (arg, slot) in args.iter().zip(host_args.into_slots()) {
            if let (Some(BoundArg::Mem(mem)), Some(HostArg::Buffer(bytes))) = (arg, slot) {
                let writable = self.mems.get(mem).is_some_and(|m| m.access.writable());
                if writable {
                    self.store_mem(*mem, bytes)?;
                }
            }
        }
        Ok(())
    }
}

impl Backend for HostDevice {
    fn name(&self) -> &'static str {
        "host"
    }

    fn platforms(&self) -> Result<Vec<PlatformInfo>> {
        if let Some(platforms) = &self.lock().platforms {
            return Ok(platforms.clone());
        }
        Ok(vec![PlatformInfo {
            name: Self::PLATFORM.to_string(),
            devices: vec![DeviceInfo {
                name: Self::DEVICE.to_string(),
                class: DeviceClass::Gpu,
            }],
        }])
    }

    fn create_graphics_buffer(&self, label: &str, contents: &[u8]) -> Result<NativeBuffer> {
        if contents.is_empty() {
            return Err(Error::device("create_graphics_buffer", ErrorCode::InvalidBufferSize));
        }
        let mut state = self.lock();
        let handle = NativeBuffer(state.next_id());
        state.graphics.insert(
            handle,
            GraphicsBuffer {
                label: label.to_string(),
                data: contents.to_vec(),
                owner: Owner::Graphics,
            },
        );
        Ok(handle)
    }

    fn destroy_graphics_buffer(&self, buffer: NativeBuffer) {
        if let Some(gfx) = self.lock().graphics.remove(&buffer) {
            tracing::trace!(%buffer, label = %gfx.label, "graphics buffer destroyed");
        }
    }

    fn read_graphics_buffer(&self, buffer: NativeBuffer) -> Result<Vec<u8>> {
        let state = self.lock();
        let gfx = state
            .graphics
            .get(&buffer)
            .ok_or(Error::device("read_graphics_buffer", ErrorCode::InvalidGraphicsObject))?;
        gfx.owner.check_graphics("read_graphics_buffer")?;
        Ok(gfx.data.clone())
    }

    fn graphics_finish(&self) -> Result<()> {
        self.lock().graphics_syncs += 1;
        Ok(())
    }

    fn build_program(
        &self,
        source: &ProgramSource,
        options: &BuildOptions,
    ) -> Result<(ProgramId, BuildInfo)> {
        if source.host.is_empty() {
            return Err(Error::Build {
                program: source.label.to_string(),
                log: format!("program '{}' has no host implementation", source.label),
            });
        }
        let mut state = self.lock();
        let id = ProgramId(state.next_id());
        state.programs.insert(id, *source);
        let names: Vec<&str> = source.host.iter().map(|e| e.name).collect();
        Ok((
            id,
            BuildInfo {
                status: BuildStatus::Success,
                options: options.to_string(),
                log: format!("host entry points: {}", names.join(", ")),
            },
        ))
    }

    fn create_kernel(&self, program: ProgramId, entry: &str) -> Result<KernelId> {
        let mut state = self.lock();
        let source = state
            .programs
            .get(&program)
            .ok_or(Error::device("create_kernel", ErrorCode::InvalidProgram))?;
        let entry = source
            .host_entry(entry)
            .ok_or(Error::device("create_kernel", ErrorCode::InvalidKernelName))?;
        let id = KernelId(state.next_id());
        state.kernels.insert(
            id,
            HostKernel {
                entry,
                args: vec![None; entry.params as usize],
            },
        );
        Ok(id)
    }

    fn create_from_graphics(&self, buffer: NativeBuffer, access: MemAccess) -> Result<MemId> {
        let mut state = self.lock();
        if !state.graphics.contains_key(&buffer) {
            return Err(Error::device("create_from_graphics", ErrorCode::InvalidGraphicsObject));
        }
        let id = MemId(state.next_id());
        state.mems.insert(
            id,
            MemObject {
                storage: Storage::Shared(buffer),
                access,
            },
        );
        Ok(id)
    }

    fn create_buffer(&self, size: usize, access: MemAccess, init: BufferInit) -> Result<MemId> {
        if size == 0 {
            return Err(Error::device("create_buffer", ErrorCode::InvalidBufferSize));
        }
        let storage = match init {
            BufferInit::Empty => Storage::Device(vec![0; size]),
            BufferInit::UseHost(region) => {
                if region.byte_len() < size {
                    return Err(Error::device("create_buffer", ErrorCode::InvalidHostPtr));
                }
                Storage::Host(region)
            }
        };
        let mut state = self.lock();
        let id = MemId(state.next_id());
        state.mems.insert(id, MemObject { storage, access });
        Ok(id)
    }

    fn release_mem(&self, mem: MemId) {
        self.lock().mems.remove(&mem);
    }

    fn set_arg(&self, kernel: KernelId, index: u32, arg: KernelArg<'_>) -> Result<()> {
        let mut state = self.lock();
        let bound = match arg {
            KernelArg::Mem(mem) => {
                if !state.mems.contains_key(&mem) {
                    return Err(Error::device("set_arg", ErrorCode::InvalidMemObject));
                }
                BoundArg::Mem(mem)
            }
            KernelArg::Value(bytes) => BoundArg::Value(bytes.to_vec()),
        };
        let kernel = state
            .kernels
            .get_mut(&kernel)
            .ok_or(Error::device("set_arg", ErrorCode::InvalidKernel))?;
        let slot = kernel
            .args
            .get_mut(index as usize)
            .ok_or(Error::device("set_arg", ErrorCode::InvalidArgIndex))?;
        *slot = Some(bound);
        Ok(())
    }

    fn enqueue_write(&self, mem: MemId, data: &[u8], wait: &[Event]) -> Result<Event> {
        let mut state = self.lock();
        if !state.mems.contains_key(&mem) {
            return Err(Error::device("enqueue_write", ErrorCode::InvalidMemObject));
        }
        state.enqueue(
            "enqueue_write",
            EventKind::Transfer,
            wait,
            Pending::Write {
                mem,
                data: data.to_vec(),
            },
        )
    }

    fn enqueue_acquire(&self, mems: &[MemId], wait: &[Event]) -> Result<Event> {
        let mut state = self.lock();
        check_shared(&state, "enqueue_acquire", mems)?;
        state.enqueue(
            "enqueue_acquire",
            EventKind::Acquire,
            wait,
            Pending::Acquire { mems: mems.to_vec() },
        )
    }

    fn enqueue_dispatch(&self, kernel: KernelId, global: usize, wait: &[Event]) -> Result<Event> {
        let mut state = self.lock();
        if global == 0 || global > state.max_work_items {
            return Err(Error::device("enqueue_dispatch", ErrorCode::InvalidWorkSize));
        }
        let host_kernel = state
            .kernels
            .get(&kernel)
            .ok_or(Error::device("enqueue_dispatch", ErrorCode::InvalidKernel))?;
        if host_kernel.args.iter().any(Option::is_none) {
            return Err(Error::device("enqueue_dispatch", ErrorCode::KernelArgsNotSet));
        }
        let pending = Pending::Dispatch {
            kernel,
            entry: host_kernel.entry,
            args: host_kernel.args.clone(),
            global,
        };
        state.enqueue("enqueue_dispatch", EventKind::Exec, wait, pending)
    }

    fn enqueue_release(&self, mems: &[MemId], wait: &[Event]) -> Result<Event> {
        let mut state = self.lock();
        check_shared(&state, "enqueue_release", mems)?;
        state.enqueue(
            "enqueue_release",
            EventKind::Release,
            wait,
            Pending::Release { mems: mems.to_vec() },
        )
    }

    fn flush(&self) -> Result<()> {
        self.lock().flush();
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        self.lock().drain(None);
        Ok(())
    }

    fn wait(&self, events: &[Event]) -> Result<()> {
        let mut state = self.lock();
        if events.iter().any(|e| !state.known(e.id())) {
            return Err(Error::device("wait", ErrorCode::InvalidEvent));
        }
        if let Some(last) = events.iter().map(Event::id).max() {
            state.drain(Some(last));
        }
        match events.iter().find_map(|e| state.failures.get(&e.id())) {
            Some(code) => Err(Error::device("wait", *code)),
            None => Ok(()),
        }
    }

    fn event_status(&self, event: Event) -> Result<EventStatus> {
        self.lock()
            .status(event.id())
            .ok_or(Error::device("event_status", ErrorCode::InvalidEvent))
    }
}

fn check_shared(state: &State, op: &'static str, mems: &[MemId]) -> Result<()> {
    for mem in mems {
        match state.mems.get(mem).map(|m| &m.storage) {
            Some(Storage::Shared(_)) => {}
            Some(_) => return Err(Error::device(op, ErrorCode::InvalidGraphicsObject)),
            None => return Err(Error::device(op, ErrorCode::InvalidMemObject)),
        }
    }
    Ok(())
}
