//! Error types shared by every gravwell crate.
//!
//! Device failures carry an [`ErrorCode`] so that the strategy boundary can log
//! a decoded, human-readable reason instead of a bare number.

use std::fmt;
use thiserror::Error;

/// Result type using the gravwell error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure codes reported by a device backend for a single operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    DeviceNotFound,
    BuildProgramFailure,
    InvalidBuildOptions,
    InvalidProgram,
    InvalidKernelName,
    InvalidKernel,
    InvalidArgIndex,
    InvalidArgValue,
    InvalidArgSize,
    KernelArgsNotSet,
    InvalidMemObject,
    InvalidBufferSize,
    InvalidHostPtr,
    InvalidGraphicsObject,
    InvalidEvent,
    InvalidEventWaitList,
    InvalidWorkSize,
    InvalidOperation,
    ExecutionFailure,
}

impl ErrorCode {
    /// Symbolic name of the code.
    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::DeviceNotFound => "DEVICE_NOT_FOUND",
            ErrorCode::BuildProgramFailure => "BUILD_PROGRAM_FAILURE",
            ErrorCode::InvalidBuildOptions => "INVALID_BUILD_OPTIONS",
            ErrorCode::InvalidProgram => "INVALID_PROGRAM",
            ErrorCode::InvalidKernelName => "INVALID_KERNEL_NAME",
            ErrorCode::InvalidKernel => "INVALID_KERNEL",
            ErrorCode::InvalidArgIndex => "INVALID_ARG_INDEX",
            ErrorCode::InvalidArgValue => "INVALID_ARG_VALUE",
            ErrorCode::InvalidArgSize => "INVALID_ARG_SIZE",
            ErrorCode::KernelArgsNotSet => "KERNEL_ARGS_NOT_SET",
            ErrorCode::InvalidMemObject => "INVALID_MEM_OBJECT",
            ErrorCode::InvalidBufferSize => "INVALID_BUFFER_SIZE",
            ErrorCode::InvalidHostPtr => "INVALID_HOST_PTR",
            ErrorCode::InvalidGraphicsObject => "INVALID_GRAPHICS_OBJECT",
            ErrorCode::InvalidEvent => "INVALID_EVENT",
            ErrorCode::InvalidEventWaitList => "INVALID_EVENT_WAIT_LIST",
            ErrorCode::InvalidWorkSize => "INVALID_WORK_SIZE",
            ErrorCode::InvalidOperation => "INVALID_OPERATION",
            ErrorCode::ExecutionFailure => "EXECUTION_FAILURE",
        }
    }

    /// Human-readable explanation of the code.
    pub fn describe(self) -> &'static str {
        match self {
            ErrorCode::DeviceNotFound => "no device matched the requested class",
            ErrorCode::BuildProgramFailure => "program failed to build for the device",
            ErrorCode::InvalidBuildOptions => "build options could not be parsed",
            ErrorCode::InvalidProgram => "program handle is not a built program",
            ErrorCode::InvalidKernelName => "entry point not found in the program",
            ErrorCode::InvalidKernel => "kernel handle is not valid",
            ErrorCode::InvalidArgIndex => "kernel has no parameter at this index",
            ErrorCode::InvalidArgValue => "argument does not fit the parameter slot",
            ErrorCode::InvalidArgSize => "argument size does not match the parameter",
            ErrorCode::KernelArgsNotSet => "kernel dispatched with unbound parameters",
            ErrorCode::InvalidMemObject => "memory object is not valid",
            ErrorCode::InvalidBufferSize => "buffer size is zero or misaligned",
            ErrorCode::InvalidHostPtr => "host memory is missing or too small",
            ErrorCode::InvalidGraphicsObject => {
                "shared buffer accessed outside its ownership window"
            }
            ErrorCode::InvalidEvent => "event is not known to the queue",
            ErrorCode::InvalidEventWaitList => "wait list names an unknown event",
            ErrorCode::InvalidWorkSize => "global work size is zero or too large",
            ErrorCode::InvalidOperation => "operation not valid in the current state",
            ErrorCode::ExecutionFailure => "command failed while executing on the device",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.describe())
    }
}

/// Unified error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Platform enumeration failed.
    #[error("platform enumeration failed: {0}")]
    Platform(String),

    /// The first platform exposes no GPU-class device.
    #[error("no GPU device available on platform '{platform}'")]
    NoDevice { platform: String },

    /// Program build failed; `log` holds the full build log.
    #[error("program '{program}' failed to build:\n{log}")]
    Build { program: String, log: String },

    /// A single device operation failed.
    #[error("{op} failed: {code}")]
    Device { op: &'static str, code: ErrorCode },

    /// `exec` was called on a payload whose `load` never completed.
    #[error("payload '{0}' is not loaded")]
    NotLoaded(&'static str),

    /// Build option string could not be parsed.
    #[error("invalid build options: {0}")]
    InvalidOptions(String),

    /// Backend-specific failure without a device code.
    #[error("backend error: {0}")]
    Backend(String),
}

impl Error {
    /// Shorthand for [`Error::Device`].
    pub fn device(op: &'static str, code: ErrorCode) -> Self {
        Error::Device { op, code }
    }

    /// Device code carried by this error, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Error::Device { code, .. } => Some(*code),
            Error::Build { .. } => Some(ErrorCode::BuildProgramFailure),
            Error::NoDevice { .. } => Some(ErrorCode::DeviceNotFound),
            Error::InvalidOptions(_) => Some(ErrorCode::InvalidBuildOptions),
            _ => None,
        }
    }

    /// True for failures that must abort startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Platform(_) | Error::NoDevice { .. } | Error::Build { .. } | Error::InvalidOptions(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_decodes_code() {
        let err = Error::device("enqueue_acquire", ErrorCode::InvalidGraphicsObject);
        let text = err.to_string();
        assert!(text.starts_with("enqueue_acquire failed: INVALID_GRAPHICS_OBJECT"));
        assert!(text.contains("ownership window"));
        assert_eq!(err.code(), Some(ErrorCode::InvalidGraphicsObject));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_build_error_is_fatal_and_keeps_log() {
        let err = Error::Build {
            program: "gravity".into(),
            log: "error: unknown identifier `foo`".into(),
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("unknown identifier"));
        assert_eq!(err.code(), Some(ErrorCode::BuildProgramFailure));
    }
}
