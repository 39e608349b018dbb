//! # Render Error Types
//!
//! All errors that can occur between the simulation and core threads.

use dyad_core::CoreError;
use thiserror::Error;

/// Errors that can occur in the render sync layer.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A core primitive failed (gate, id space, thread role).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The GPU backend ran out of memory for a resource.
    #[error("out of GPU memory: requested {requested} bytes, {available} available")]
    OutOfGpuMemory {
        /// Bytes requested.
        requested: u64,
        /// Bytes still available in the budget.
        available: u64,
    },

    /// A backend resource handle was not found.
    #[error("unknown GPU resource: {0}")]
    UnknownResource(u64),

    /// A buffer write ran past the end of the buffer.
    #[error("write to GPU buffer {resource} ends at byte {end}, buffer is {size} bytes")]
    BufferOverrun {
        /// Raw backend handle.
        resource: u64,
        /// End offset of the write.
        end: u64,
        /// Buffer size.
        size: u64,
    },

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to read a configuration file.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a configuration file.
    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// The core thread could not be started.
    #[error("failed to spawn core thread: {0}")]
    CoreThreadSpawn(String),
}

/// Result type for render sync operations.
pub type RenderResult<T> = Result<T, RenderError>;
