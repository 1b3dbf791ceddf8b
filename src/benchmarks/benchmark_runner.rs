//! Core benchmark execution logic.

use std::io::Write;

use log::{debug, info, warn};

use super::config::SweepConfig;
use super::inputs::{DEFAULT_SEED, HostInputs, generate_inputs};
use super::metrics::{BandwidthMetric, BenchmarkScope};
use crate::dtype::DType;
use crate::errors::{BenchmarkError, BenchmarkResult};
use crate::kernels::{Kernel, KernelFamily, KernelHandle, KernelOp, KernelRegistry, ProfileOptions};
use crate::problem::ProblemShape;

/// Relative tolerance for comparing a kernel output against the reference.
pub fn verification_tolerance(dtype: DType) -> f32 {
    match dtype {
        DType::Float16 => 2e-2,
        DType::Float32 => 1e-3,
    }
}

/// Drives kernels from a registry through generate, upload, profile and
/// report.
pub struct BenchmarkRunner {
    registry: KernelRegistry,
    profile: ProfileOptions,
    seed: u64,
    include_baseline: bool,
    verify: bool,
}

impl BenchmarkRunner {
    pub fn new(registry: KernelRegistry) -> Self {
        Self {
            registry,
            profile: ProfileOptions::default(),
            seed: DEFAULT_SEED,
            include_baseline: false,
            verify: false,
        }
    }

    /// Takes seed, baseline and profiling settings from a sweep config.
    pub fn from_config(registry: KernelRegistry, config: &SweepConfig) -> Self {
        Self::new(registry)
            .with_profile(config.profile)
            .with_seed(config.seed)
            .with_baseline(config.include_baseline)
    }

    pub fn with_profile(mut self, profile: ProfileOptions) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_baseline(mut self, include_baseline: bool) -> Self {
        self.include_baseline = include_baseline;
        self
    }

    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn registry(&self) -> &KernelRegistry {
        &self.registry
    }

    /// Kernel families measured for every group.
    pub fn families(&self) -> Vec<KernelFamily> {
        if self.include_baseline {
            vec![KernelFamily::FpInt4, KernelFamily::Gemm]
        } else {
            vec![KernelFamily::FpInt4]
        }
    }

    pub fn resolve_kernels(
        &self,
        dtype: DType,
        family: KernelFamily,
    ) -> BenchmarkResult<&[KernelHandle]> {
        self.registry.resolve(dtype, family)
    }

    /// Uploads `inputs`, profiles `kernel` on them and returns the mean
    /// duration in microseconds.
    pub fn run_once(
        &self,
        kernel: &dyn Kernel,
        inputs: &HostInputs,
        shape: ProblemShape,
    ) -> BenchmarkResult<f64> {
        let mut op = KernelOp::new(kernel, inputs.upload(), shape);

        if self.verify {
            op.run()?;
            verify_output(kernel, inputs, &shape, &op.operands().output_f32())?;
        }

        Ok(op.profile(&self.profile)?)
    }

    /// Measures every kernel for one size/dtype group and writes the report.
    pub fn profile_with_args<W: Write>(
        &self,
        shape: ProblemShape,
        dtype: DType,
        sort: bool,
        out: &mut W,
    ) -> BenchmarkResult<Vec<BandwidthMetric>> {
        shape.validate()?;
        let families = self.families();
        let mut groups = Vec::with_capacity(families.len());
        for family in families {
            groups.push((family, self.resolve_kernels(dtype, family)?));
        }

        info!("Profiling {} {}", dtype, shape);
        let mut scope = BenchmarkScope::new(out, sort);
        for (family, kernels) in groups {
            for kernel in kernels {
                if !kernel.supports(&shape) {
                    warn!("{} does not support {}, skipping", kernel.id(), shape);
                    continue;
                }

                let inputs = generate_inputs(&shape, dtype, family, self.seed);
                let duration_us = self.run_once(kernel.as_ref(), &inputs, shape)?;
                scope.record(BandwidthMetric::new(
                    kernel.id().name(),
                    dtype,
                    duration_us,
                    shape,
                ));
            }
        }

        Ok(scope.finish()?)
    }

    /// Runs every group of `config`, in dtype, m, n, k order, with a blank
    /// line after each group.
    pub fn sweep<W: Write>(
        &self,
        config: &SweepConfig,
        out: &mut W,
    ) -> BenchmarkResult<Vec<BandwidthMetric>> {
        config.validate()?;
        info!("Starting sweep over {} groups", config.group_count());

        let mut results = Vec::new();
        for &dtype in &config.dtypes {
            for &m in &config.dims_m {
                for &n in &config.dims_n {
                    for &k in &config.dims_k {
                        let shape = ProblemShape::new(m, n, k)?;
                        results.extend(self.profile_with_args(shape, dtype, config.sort, out)?);
                        writeln!(out)?;
                    }
                }
            }
        }

        info!("Sweep completed: {} measurements", results.len());
        Ok(results)
    }

    /// Prints every registered kernel.
    pub fn list_kernels<W: Write>(&self, out: &mut W) -> BenchmarkResult<()> {
        writeln!(out, "Available kernels:")?;
        for kernel in self.registry.iter() {
            writeln!(out, "  {}", kernel.id())?;
        }
        Ok(())
    }
}

fn verify_output(
    kernel: &dyn Kernel,
    inputs: &HostInputs,
    shape: &ProblemShape,
    actual: &[f32],
) -> BenchmarkResult<()> {
    let expected = inputs.reference_output(shape);
    let tolerance = verification_tolerance(inputs.dtype());

    for (index, (&want, &got)) in expected.iter().zip(actual).enumerate() {
        if (want - got).abs() > tolerance * want.abs().max(1.0) {
            return Err(BenchmarkError::VerificationFailed {
                kernel: kernel.id().name().to_string(),
                index,
                expected: want,
                actual: got,
            });
        }
    }

    debug!("{} matches the reference on {}", kernel.id(), shape);
    Ok(())
}
