//! Strategy-driven execution.

use crate::bundle::DeviceBundle;
use crate::graphics::ContextShare;
use crate::module::KernelModule;
use gravwell_core::Result;

/// Drives one kernel module on its own device bundle.
///
/// The executor holds no payload state: `load` and `exec` forward the bundle
/// and the payload to the module's strategies, so one executor can drive
/// several payloads one at a time.
///
/// Kernel arguments are bound by `load` and live in the bundle's kernel, so
/// only the most recently loaded payload may be executed. Switching to
/// another payload means running `load` on it again first.
///
/// # Example
/// ```no_run
/// # use gravwell_runtime::{Executor, GraphicsContext, KernelModule};
/// # fn demo<K: KernelModule>(module: K, payload: &mut K::Payload) -> gravwell_core::Result<()> {
/// let (gfx, _host) = GraphicsContext::host();
/// let mut executor = Executor::new(&gfx.share(), module)?;
/// executor.load(payload)?;
/// executor.exec(payload)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Executor<K> {
    module: K,
    bundle: DeviceBundle,
}

impl<K: KernelModule> Executor<K> {
    /// Build the device bundle for `module`.
    ///
    /// # Errors
    /// Device selection and program build failures; all of them are fatal.
    #[tracing::instrument(skip_all, fields(entry = module.entry_point()))]
    pub fn new(share: &ContextShare, module: K) -> Result<Self> {
        let bundle = DeviceBundle::build(share, &module)?;
        Ok(Self { module, bundle })
    }

    /// Run the module's load strategy on `payload`.
    #[tracing::instrument(skip_all, fields(entry = self.module.entry_point()))]
    pub fn load(&mut self, payload: &mut K::Payload) -> Result<()> {
        self.module
            .load(&mut self.bundle, payload)
            .inspect_err(|e| log_failure("load", e))
    }

    /// Run the module's exec strategy on `payload`.
    #[tracing::instrument(skip_all, fields(entry = self.module.entry_point()))]
    pub fn exec(&mut self, payload: &mut K::Payload) -> Result<()> {
        self.module
            .exec(&mut self.bundle, payload)
            .inspect_err(|e| log_failure("exec", e))
    }

    /// The device bundle the module runs on.
    pub fn bundle(&self) -> &DeviceBundle {
        &self.bundle
    }

    /// The module this executor drives.
    pub fn module(&self) -> &K {
        &self.module
    }
}

fn log_failure(strategy: &'static str, error: &gravwell_core::Error) {
    match error.code() {
        Some(code) => tracing::error!(strategy, code = code.name(), "{error}"),
        None => tracing::error!(strategy, "{error}"),
    }
}
