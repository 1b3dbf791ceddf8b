//! Benchmark driver for the quantized matmul kernels.
//!
//! For each requested problem size and dtype the driver generates
//! deterministic inputs, resolves the matching kernels from a
//! [`KernelRegistry`](crate::kernels::KernelRegistry), profiles each one and
//! prints a bandwidth line per kernel.

pub mod benchmark_runner;
pub mod config;
pub mod inputs;
pub mod metrics;

pub use benchmark_runner::{BenchmarkRunner, verification_tolerance};
pub use config::{ConfigLoader, SweepConfig};
pub use inputs::{DEFAULT_SEED, HostBuffers, HostInputs, HostWeight, generate_inputs};
pub use metrics::{BandwidthMetric, BenchmarkScope};
