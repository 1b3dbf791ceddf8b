//! Error types for the benchmark driver.

use thiserror::Error;

use super::KernelError;
use crate::dtype::DType;
use crate::kernels::KernelFamily;

/// Errors that end a benchmark sweep.
#[derive(Error, Debug)]
pub enum BenchmarkError {
    #[error("No {family} kernel registered for dtype {dtype}")]
    NoKernelForDtype { dtype: DType, family: KernelFamily },

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error("Failed to parse configuration file '{path}': {source}")]
    ConfigParseError {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration validation error for field '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error(
        "Kernel {kernel} output diverges from the reference at index {index}: expected {expected}, got {actual}"
    )]
    VerificationFailed {
        kernel: String,
        index: usize,
        expected: f32,
        actual: f32,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
