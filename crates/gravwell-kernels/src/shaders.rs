//! Embedded WGSL programs.
//!
//! Sources stay raw: `#{WORKGROUP_SIZE}` is substituted at build time from
//! the module's build options.

/// Work-group width every module uses unless configured otherwise.
pub const DEFAULT_WORKGROUP_SIZE: u32 = 64;

pub const GRAVITY: &str = include_str!("../shaders/gravity.wgsl");
pub const ECHO: &str = include_str!("../shaders/echo.wgsl");

/// Build options selecting the work-group width.
pub fn workgroup_options(size: u32) -> String {
    format!("-D WORKGROUP_SIZE={size}")
}
