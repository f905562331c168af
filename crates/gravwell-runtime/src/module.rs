//! The kernel module contract.

use crate::bundle::DeviceBundle;
use gravwell_core::{ProgramSource, Result};

/// Compute program source, build configuration and the load / exec
/// strategies for one behavior.
///
/// A module is stateless; everything that changes between frames lives in its
/// [`KernelModule::Payload`].
pub trait KernelModule {
    /// Per-instance data the strategies operate on.
    type Payload;

    /// Program text plus host implementations of its entry points.
    fn source(&self) -> ProgramSource;

    /// Build option string, e.g. `-D WORKGROUP_SIZE=64`.
    fn build_options(&self) -> String {
        String::new()
    }

    /// Entry point the bundle resolves into its kernel.
    fn entry_point(&self) -> &'static str;

    /// Runs once: create compute views and bind fixed arguments.
    fn load(&self, bundle: &mut DeviceBundle, payload: &mut Self::Payload) -> Result<()>;

    /// Runs once per frame: the acquire / dispatch / release protocol.
    fn exec(&self, bundle: &mut DeviceBundle, payload: &mut Self::Payload) -> Result<()>;
}
