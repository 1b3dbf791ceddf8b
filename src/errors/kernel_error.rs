//! Error types raised by kernel instances and device buffers.

use thiserror::Error;

use crate::dtype::DType;
use crate::kernels::KernelFamily;

/// Errors that can occur while preparing or launching a kernel.
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("Kernel {kernel} does not support m={m} n={n} k={k}")]
    Unsupported {
        kernel: String,
        m: usize,
        n: usize,
        k: usize,
    },

    #[error("Kernel {kernel} expects {expected_family} operands in {expected_dtype}, got {actual_family} in {actual_dtype}")]
    OperandMismatch {
        kernel: String,
        expected_family: KernelFamily,
        expected_dtype: DType,
        actual_family: KernelFamily,
        actual_dtype: DType,
    },

    #[error("Buffer '{buffer}' holds {actual} elements, expected {expected}")]
    BufferSizeMismatch {
        buffer: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid problem shape m={m} n={n} k={k}: every dimension must be greater than 0")]
    InvalidShape { m: usize, n: usize, k: usize },

    #[error("Worker thread panicked while running kernel {kernel}")]
    ThreadPanicked { kernel: String },
}
