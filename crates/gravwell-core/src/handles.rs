//! Opaque handles into backend-owned objects.
//!
//! Handles are plain ids; the backend that issued a handle is the only one
//! that can resolve it.

use std::fmt;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

handle!(
    /// Native graphics buffer name (the vertex buffer the rasterizer draws from).
    NativeBuffer,
    "gfx"
);
handle!(
    /// Compute-side memory object: a view over a shared buffer or a plain buffer.
    MemId,
    "mem"
);
handle!(
    /// A program built for one device.
    ProgramId,
    "program"
);
handle!(
    /// A kernel resolved from a built program by entry-point name.
    KernelId,
    "kernel"
);

/// Access the compute side requests on a memory object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemAccess {
    ReadOnly,
    WriteOnly,
    #[default]
    ReadWrite,
}

impl MemAccess {
    pub fn writable(self) -> bool {
        !matches!(self, MemAccess::ReadOnly)
    }
}
