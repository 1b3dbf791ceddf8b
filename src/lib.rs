//! Microbenchmarks for matrix multiplication with 4-bit block-quantized
//! weights and floating-point activations.
//!
//! The crate pairs a small native kernel layer (CPU instances behind the
//! [`kernels::Kernel`] trait, registered per dtype and family) with a
//! benchmark driver that sweeps problem sizes, times each kernel and reports
//! its effective bandwidth.

pub mod benchmarks;
pub mod device;
pub mod dtype;
pub mod errors;
pub mod kernels;
pub mod problem;

pub use benchmarks::{BandwidthMetric, BenchmarkRunner, SweepConfig};
pub use dtype::{DType, Element};
pub use errors::{BenchmarkError, BenchmarkResult, KernelError, KernelResult};
pub use kernels::{Kernel, KernelFamily, KernelId, KernelRegistry};
pub use problem::ProblemShape;
