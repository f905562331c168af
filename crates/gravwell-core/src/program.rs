//! Program sources and build results.

use crate::host::HostKernelFn;
use std::fmt;

/// Host implementation of one entry point.
#[derive(Clone, Copy)]
pub struct HostEntry {
    pub name: &'static str,
    /// Number of parameter slots the kernel takes.
    pub params: u32,
    pub func: HostKernelFn,
}

impl fmt::Debug for HostEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostEntry")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Everything a backend needs to build a kernel module's program.
///
/// `text` is WGSL for GPU backends. `host` lists host implementations keyed by
/// entry-point name; the reference host backend runs those instead of
/// compiling `text`.
#[derive(Debug, Clone, Copy)]
pub struct ProgramSource {
    pub label: &'static str,
    pub text: &'static str,
    pub host: &'static [HostEntry],
}

impl ProgramSource {
    /// Host implementation for `entry`, if the module provides one.
    pub fn host_entry(&self, entry: &str) -> Option<HostEntry> {
        self.host.iter().find(|e| e.name == entry).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Success,
    Error,
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStatus::Success => f.write_str("success"),
            BuildStatus::Error => f.write_str("error"),
        }
    }
}

/// Outcome of building a program, kept for diagnostics.
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub status: BuildStatus,
    pub options: String,
    pub log: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HostArgs, Result};

    fn noop(_gid: usize, _args: &mut HostArgs) -> Result<()> {
        Ok(())
    }

    const SOURCE: ProgramSource = ProgramSource {
        label: "noop",
        text: "",
        host: &[HostEntry {
            name: "noop",
            params: 2,
            func: noop,
        }],
    };

    #[test]
    fn test_host_entry_lookup() {
        assert_eq!(SOURCE.host_entry("noop").map(|e| e.params), Some(2));
        assert!(SOURCE.host_entry("missing").is_none());
    }

    #[test]
    fn test_build_status_display() {
        assert_eq!(BuildStatus::Success.to_string(), "success");
        assert_eq!(BuildStatus::Error.to_string(), "error");
    }
}
