//! Error types for the benchmark driver and the kernels it launches.
//!
//! Every failure is a concrete `thiserror` enum; nothing is boxed into a
//! generic error so callers can match on the variant that stopped a sweep.

mod benchmark_error;
mod kernel_error;

pub use benchmark_error::BenchmarkError;
pub use kernel_error::KernelError;

/// Result type alias for kernel launches and device transfers.
pub type KernelResult<T> = std::result::Result<T, KernelError>;

/// Result type alias for driver operations.
pub type BenchmarkResult<T> = std::result::Result<T, BenchmarkError>;
