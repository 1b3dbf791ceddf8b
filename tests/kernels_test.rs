use std::sync::Arc;

use fpint4_bench::benchmarks::{generate_inputs, verification_tolerance};
use fpint4_bench::kernels::dot::DotEngine;
use fpint4_bench::kernels::fp_int4::{BlockDequantFpInt4, ScalarFpInt4, ThreadedFpInt4, TiledFpInt4};
use fpint4_bench::kernels::gemm::{NaiveGemm, ThreadedGemm};
use fpint4_bench::kernels::{KernelOp, ProfileOptions};
use fpint4_bench::{DType, Kernel, KernelError, KernelFamily, KernelRegistry, ProblemShape};

const SHAPES: [(usize, usize, usize); 4] = [(1, 8, 64), (3, 5, 70), (2, 16, 32), (4, 3, 17)];

fn assert_matches_reference(kernel: &dyn Kernel, dtype: DType, family: KernelFamily) {
    for (m, n, k) in SHAPES {
        let shape = ProblemShape::new(m, n, k).unwrap();
        if !kernel.supports(&shape) {
            continue;
        }
        let inputs = generate_inputs(&shape, dtype, family, 0);
        let expected = inputs.reference_output(&shape);

        let mut op = KernelOp::new(kernel, inputs.upload(), shape);
        op.run().unwrap();
        let actual = op.operands().output_f32();

        let tolerance = verification_tolerance(dtype);
        for (index, (want, got)) in expected.iter().zip(&actual).enumerate() {
            assert!(
                (want - got).abs() <= tolerance * want.abs().max(1.0),
                "{} {}: index {} expected {} got {}",
                kernel.id(),
                shape,
                index,
                want,
                got
            );
        }
    }
}

#[test]
fn test_fp_int4_instances_match_reference() {
    let kernels: Vec<(Box<dyn Kernel>, DType)> = vec![
        (Box::new(ScalarFpInt4::<f32>::new()), DType::Float32),
        (Box::new(ScalarFpInt4::<half::f16>::new()), DType::Float16),
        (Box::new(BlockDequantFpInt4::<f32>::new()), DType::Float32),
        (Box::new(BlockDequantFpInt4::<half::f16>::new()), DType::Float16),
        (Box::new(ThreadedFpInt4::<f32>::new(3, DotEngine::Scalar)), DType::Float32),
        (Box::new(ThreadedFpInt4::<half::f16>::new(3, DotEngine::detect())), DType::Float16),
        (Box::new(TiledFpInt4::<f32>::new("Tiled", DotEngine::Scalar)), DType::Float32),
        (Box::new(TiledFpInt4::<f32>::new("Tiled", DotEngine::detect())), DType::Float32),
        (Box::new(TiledFpInt4::<half::f16>::new("Tiled", DotEngine::detect())), DType::Float16),
    ];

    for (kernel, dtype) in &kernels {
        assert_matches_reference(kernel.as_ref(), *dtype, KernelFamily::FpInt4);
    }
}

#[test]
fn test_gemm_instances_match_reference() {
    assert_matches_reference(&NaiveGemm::<f32>::new(), DType::Float32, KernelFamily::Gemm);
    assert_matches_reference(&NaiveGemm::<half::f16>::new(), DType::Float16, KernelFamily::Gemm);
    assert_matches_reference(
        &ThreadedGemm::<f32>::new(4, DotEngine::detect()),
        DType::Float32,
        KernelFamily::Gemm,
    );
}

#[test]
fn test_every_registered_kernel_matches_reference() {
    let registry = KernelRegistry::with_native_kernels();
    for kernel in registry.iter() {
        assert_matches_reference(kernel.as_ref(), kernel.id().dtype(), kernel.id().family());
    }
}

#[test]
fn test_more_threads_than_columns() {
    let kernel = ThreadedFpInt4::<f32>::new(64, DotEngine::detect());
    let shape = ProblemShape::new(2, 3, 32).unwrap();
    let inputs = generate_inputs(&shape, DType::Float32, KernelFamily::FpInt4, 0);
    let mut op = KernelOp::new(&kernel, inputs.upload(), shape);

    op.run().unwrap();
    let expected = inputs.reference_output(&shape);
    for (want, got) in expected.iter().zip(op.operands().output_f32()) {
        assert!((want - got).abs() <= 1e-3 * want.abs().max(1.0));
    }
}

#[test]
fn test_wrong_dtype_operands_are_rejected() {
    let kernel = ScalarFpInt4::<f32>::new();
    let shape = ProblemShape::new(1, 4, 32).unwrap();
    let inputs = generate_inputs(&shape, DType::Float16, KernelFamily::FpInt4, 0);
    let mut op = KernelOp::new(&kernel, inputs.upload(), shape);

    assert!(matches!(
        op.run(),
        Err(KernelError::OperandMismatch {
            expected_dtype: DType::Float32,
            actual_dtype: DType::Float16,
            ..
        })
    ));
}

#[test]
fn test_dense_operands_are_rejected_by_quantized_kernel() {
    let kernel = BlockDequantFpInt4::<f32>::new();
    let shape = ProblemShape::new(1, 4, 32).unwrap();
    let inputs = generate_inputs(&shape, DType::Float32, KernelFamily::Gemm, 0);
    let mut op = KernelOp::new(&kernel, inputs.upload(), shape);

    assert!(matches!(op.run(), Err(KernelError::OperandMismatch { .. })));
}

#[test]
fn test_profile_returns_positive_duration() {
    let registry = KernelRegistry::with_native_kernels();
    let kernel = Arc::clone(&registry.resolve(DType::Float32, KernelFamily::FpInt4).unwrap()[0]);
    let shape = ProblemShape::new(1, 64, 256).unwrap();
    let inputs = generate_inputs(&shape, DType::Float32, KernelFamily::FpInt4, 0);
    let mut op = KernelOp::new(kernel.as_ref(), inputs.upload(), shape);

    let duration = op
        .profile(&ProfileOptions {
            warmup: 1,
            repeats: 2,
        })
        .unwrap();
    assert!(duration > 0.0);
}

#[test]
fn test_profile_declines_unsupported_shape() {
    let kernel = TiledFpInt4::<f32>::new("Tiled", DotEngine::detect());
    let shape = ProblemShape::new(1, 4, 40).unwrap();
    let inputs = generate_inputs(&shape, DType::Float32, KernelFamily::FpInt4, 0);
    let mut op = KernelOp::new(&kernel, inputs.upload(), shape);

    assert!(!op.is_supported());
    assert!(matches!(
        op.profile(&ProfileOptions::default()),
        Err(KernelError::Unsupported { k: 40, .. })
    ));
}

#[test]
fn test_threaded_launch_rejects_zero_columns() {
    let kernel = ThreadedFpInt4::<f32>::new(4, DotEngine::detect());
    let valid = ProblemShape::new(1, 4, 32).unwrap();
    let inputs = generate_inputs(&valid, DType::Float32, KernelFamily::FpInt4, 0);
    let mut operands = inputs.upload();

    let empty = ProblemShape { m: 1, n: 0, k: 32 };
    assert!(matches!(
        kernel.launch(&mut operands, &empty),
        Err(KernelError::InvalidShape { n: 0, .. })
    ));
}
