use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use fpint4_bench::benchmarks::{BenchmarkRunner, SweepConfig};
use fpint4_bench::kernels::{KernelId, Operands, ProfileOptions};
use fpint4_bench::{
    BenchmarkError, DType, Kernel, KernelError, KernelFamily, KernelRegistry, KernelResult,
    ProblemShape,
};

const FAST_PROFILE: ProfileOptions = ProfileOptions {
    warmup: 0,
    repeats: 1,
};

/// Kernel double that leaves the output untouched.
struct StubKernel {
    id: KernelId,
    supported: bool,
    fail: bool,
    launches: AtomicUsize,
}

impl StubKernel {
    fn new(family: KernelFamily, dtype: DType, variant: &str) -> Self {
        Self {
            id: KernelId::new(family, dtype, variant),
            supported: true,
            fail: false,
            launches: AtomicUsize::new(0),
        }
    }

    fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl Kernel for StubKernel {
    fn id(&self) -> &KernelId {
        &self.id
    }

    fn supports(&self, _shape: &ProblemShape) -> bool {
        self.supported
    }

    fn launch(&self, _operands: &mut Operands, shape: &ProblemShape) -> KernelResult<()> {
        self.launches.fetch_add(1, Ordering::Relaxed);
        if self.fail {
            return Err(KernelError::InvalidShape {
                m: shape.m,
                n: shape.n,
                k: shape.k,
            });
        }
        Ok(())
    }
}

fn runner(registry: KernelRegistry) -> BenchmarkRunner {
    BenchmarkRunner::new(registry).with_profile(FAST_PROFILE)
}

fn output_lines(out: &[u8]) -> Vec<String> {
    String::from_utf8(out.to_vec())
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn duration_of(line: &str) -> f64 {
    line.split_whitespace().next().unwrap().parse().unwrap()
}

#[test]
fn test_preset_sweep_prints_one_group_and_blank_line() {
    let mut registry = KernelRegistry::new();
    registry.register(Arc::new(StubKernel::new(KernelFamily::FpInt4, DType::Float16, "A")));
    registry.register(Arc::new(StubKernel::new(KernelFamily::FpInt4, DType::Float16, "B")));
    let config = SweepConfig {
        profile: FAST_PROFILE,
        ..SweepConfig::default()
    };

    let mut out = Vec::new();
    let results = BenchmarkRunner::from_config(registry, &config)
        .sweep(&config, &mut out)
        .unwrap();

    assert_eq!(results.len(), 2);
    let lines = output_lines(&out);
    assert_eq!(lines.len(), 3);
    assert!(lines[..2].iter().all(|l| l.contains("float16 m=1 n=4096 k=4096")));
    assert!(lines[2].is_empty());
    assert!(results.iter().all(|r| r.total_bytes == 33_570_816));
}

#[test]
fn test_explicit_problem_is_sorted_and_single_group() {
    let runner = runner(KernelRegistry::with_native_kernels());
    let shape = ProblemShape::new(2, 8, 64).unwrap();

    let mut out = Vec::new();
    let results = runner
        .profile_with_args(shape, DType::Float16, true, &mut out)
        .unwrap();

    let lines = output_lines(&out);
    assert_eq!(lines.len(), results.len());
    assert!(!lines.is_empty());
    assert!(lines.iter().all(|l| l.contains("float16 m=2 n=8 k=64 MatrixFloatInt4_half_")));

    let durations: Vec<f64> = lines.iter().map(|l| duration_of(l)).collect();
    assert!(durations.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_sweep_iterates_dtype_then_sizes() {
    let mut registry = KernelRegistry::new();
    for dtype in DType::ALL {
        registry.register(Arc::new(StubKernel::new(KernelFamily::FpInt4, dtype, "Stub")));
    }
    let config = SweepConfig {
        dims_m: vec![1, 2],
        dims_n: vec![8],
        dims_k: vec![32, 64],
        dtypes: vec![DType::Float32, DType::Float16],
        sort: false,
        profile: FAST_PROFILE,
        ..SweepConfig::default()
    };

    let mut out = Vec::new();
    let results = runner(registry).sweep(&config, &mut out).unwrap();

    let order: Vec<(DType, usize, usize)> = results
        .iter()
        .map(|r| (r.dtype, r.shape.m, r.shape.k))
        .collect();
    assert_eq!(
        order,
        vec![
            (DType::Float32, 1, 32),
            (DType::Float32, 1, 64),
            (DType::Float32, 2, 32),
            (DType::Float32, 2, 64),
            (DType::Float16, 1, 32),
            (DType::Float16, 1, 64),
            (DType::Float16, 2, 32),
            (DType::Float16, 2, 64),
        ]
    );
    assert_eq!(output_lines(&out).iter().filter(|l| l.is_empty()).count(), 8);
}

#[test]
fn test_missing_kernels_fail_before_any_output() {
    let mut registry = KernelRegistry::new();
    registry.register(Arc::new(StubKernel::new(KernelFamily::FpInt4, DType::Float16, "Only")));
    let shape = ProblemShape::new(1, 8, 32).unwrap();

    let mut out = Vec::new();
    let result = runner(registry).profile_with_args(shape, DType::Float32, true, &mut out);

    assert!(matches!(
        result,
        Err(BenchmarkError::NoKernelForDtype {
            dtype: DType::Float32,
            family: KernelFamily::FpInt4,
        })
    ));
    assert!(out.is_empty());
}

#[test]
fn test_unsupported_kernels_are_skipped() {
    let declined = Arc::new(StubKernel::new(KernelFamily::FpInt4, DType::Float32, "Declined").unsupported());
    let mut registry = KernelRegistry::new();
    registry.register(declined.clone());
    registry.register(Arc::new(StubKernel::new(KernelFamily::FpInt4, DType::Float32, "Kept")));

    let mut out = Vec::new();
    let results = runner(registry)
        .profile_with_args(ProblemShape::new(1, 4, 32).unwrap(), DType::Float32, false, &mut out)
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "MatrixFloatInt4_float_Kept");
    assert_eq!(declined.launches.load(Ordering::Relaxed), 0);
}

#[test]
fn test_zero_dimension_shape_is_rejected_before_launch() {
    let shape = ProblemShape { m: 1, n: 0, k: 32 };
    let mut out = Vec::new();
    let result = runner(KernelRegistry::with_native_kernels())
        .with_baseline(true)
        .profile_with_args(shape, DType::Float32, true, &mut out);

    assert!(matches!(
        result,
        Err(BenchmarkError::Kernel(KernelError::InvalidShape { n: 0, .. }))
    ));
    assert!(out.is_empty());
}

#[test]
fn test_kernel_failure_propagates() {
    let mut registry = KernelRegistry::new();
    registry.register(Arc::new(StubKernel::new(KernelFamily::FpInt4, DType::Float16, "Broken").failing()));

    let mut out = Vec::new();
    let result = runner(registry).profile_with_args(
        ProblemShape::new(1, 4, 32).unwrap(),
        DType::Float16,
        false,
        &mut out,
    );

    assert!(matches!(result, Err(BenchmarkError::Kernel(KernelError::InvalidShape { .. }))));
    assert!(out.is_empty());
}

#[test]
fn test_baseline_adds_gemm_kernels() {
    let shape = ProblemShape::new(1, 8, 64).unwrap();
    let mut out = Vec::new();
    let results = runner(KernelRegistry::with_native_kernels())
        .with_baseline(true)
        .profile_with_args(shape, DType::Float32, false, &mut out)
        .unwrap();

    assert!(results.iter().any(|r| r.name.starts_with("GemmBenchmark_float_")));
    assert!(results.iter().any(|r| r.name.starts_with("MatrixFloatInt4_float_")));
    // Without sorting, quantized kernels come first.
    let first_gemm = results.iter().position(|r| r.name.starts_with("GemmBenchmark")).unwrap();
    assert!(results[..first_gemm].iter().all(|r| r.name.starts_with("MatrixFloatInt4")));
}

#[test]
fn test_verification_passes_for_native_kernels() {
    let runner = runner(KernelRegistry::with_native_kernels())
        .with_baseline(true)
        .with_verification(true);

    for dtype in DType::ALL {
        let mut out = Vec::new();
        runner
            .profile_with_args(ProblemShape::new(3, 5, 70).unwrap(), dtype, true, &mut out)
            .unwrap();
    }
}

#[test]
fn test_verification_catches_wrong_output() {
    let mut registry = KernelRegistry::new();
    registry.register(Arc::new(StubKernel::new(KernelFamily::FpInt4, DType::Float32, "Noop")));

    let mut out = Vec::new();
    let result = runner(registry)
        .with_verification(true)
        .profile_with_args(ProblemShape::new(2, 8, 64).unwrap(), DType::Float32, false, &mut out);

    assert!(matches!(result, Err(BenchmarkError::VerificationFailed { .. })));
}

#[test]
fn test_invalid_sweep_config_is_rejected() {
    let config = SweepConfig {
        dims_n: vec![],
        ..SweepConfig::default()
    };
    let mut out = Vec::new();
    let result = runner(KernelRegistry::with_native_kernels()).sweep(&config, &mut out);
    assert!(matches!(result, Err(BenchmarkError::ConfigValidationError { .. })));
}

#[test]
fn test_list_kernels() {
    let mut out = Vec::new();
    runner(KernelRegistry::with_native_kernels())
        .list_kernels(&mut out)
        .unwrap();
    let lines = output_lines(&out);
    assert_eq!(lines[0], "Available kernels:");
    assert!(lines.iter().any(|l| l.trim() == "MatrixFloatInt4_half_Scalar"));
    assert!(lines.iter().any(|l| l.trim() == "GemmBenchmark_float_Naive"));
}
