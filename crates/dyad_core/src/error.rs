//! # Core Error Types
//!
//! Errors raised by the handshake primitives. Most of these end up as fatal
//! assertions at the call site; they are still values here so that the
//! non-panicking observations (`InitGate::wait`, `BoundedCounter::allocate`)
//! can hand them back.

use thiserror::Error;

/// Errors that can occur in the core primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The back object could not be realized on the core thread.
    #[error("construction of {kind} failed: {reason}")]
    ConstructionFailed {
        /// Kind of object that failed.
        kind: &'static str,
        /// Human readable reason.
        reason: String,
    },

    /// The core thread is gone; the command will never run.
    #[error("core thread is not running")]
    CoreUnavailable,

    /// A bounded identifier category ran out of ids.
    #[error("identifier space exhausted for {category}: all {bits}-bit ids are in use")]
    IdExhausted {
        /// Category name (sampler, blend, ...).
        category: &'static str,
        /// Declared bit width of the category.
        bits: u32,
    },

    /// The operation was invoked from a thread that is not allowed to run it.
    #[error("{operation} called from the wrong thread")]
    WrongThread {
        /// The offending operation.
        operation: &'static str,
    },
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
