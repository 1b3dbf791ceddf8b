//! Native kernel layer.
//!
//! The driver only talks to kernels through the [`Kernel`] trait: it resolves
//! handles from a [`KernelRegistry`], hands them [`Operands`] that already live
//! on the device, and times them with [`KernelOp`]. The CPU instances in
//! [`fp_int4`] and [`gemm`] are what the registry exposes by default.

use std::fmt;
use std::sync::Arc;

use half::f16;

use crate::device::DeviceArray;
use crate::dtype::{DType, Element};
use crate::errors::{KernelError, KernelResult};
use crate::problem::ProblemShape;

pub mod dot;
pub mod fp_int4;
pub mod gemm;
pub mod profiler;
pub mod reference;
pub mod registry;

pub use profiler::{KernelOp, ProfileOptions};
pub use registry::KernelRegistry;

/// Kernel families the driver knows how to feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KernelFamily {
    /// 4-bit block-quantized weights, floating-point activations.
    FpInt4,
    /// Dense floating-point baseline.
    Gemm,
}

impl KernelFamily {
    /// Prefix every identifier of the family starts with.
    pub fn marker(self) -> &'static str {
        match self {
            KernelFamily::FpInt4 => "MatrixFloatInt4",
            KernelFamily::Gemm => "GemmBenchmark",
        }
    }
}

impl fmt::Display for KernelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// Identifier of one kernel instance, e.g. `MatrixFloatInt4_half_Scalar`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KernelId {
    family: KernelFamily,
    dtype: DType,
    name: String,
}

impl KernelId {
    pub fn new(family: KernelFamily, dtype: DType, variant: &str) -> Self {
        let name = format!("{}_{}_{}", family.marker(), dtype.kernel_suffix(), variant);
        Self {
            family,
            dtype,
            name,
        }
    }

    pub fn family(&self) -> KernelFamily {
        self.family
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for KernelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A device-executed matrix multiplication entry point.
pub trait Kernel: Send + Sync {
    fn id(&self) -> &KernelId;

    /// Whether this instance can run the given shape. Unsupported shapes are
    /// skipped by the driver rather than treated as failures.
    fn supports(&self, _shape: &ProblemShape) -> bool {
        true
    }

    /// Runs the kernel once, writing the product into the output operand.
    fn launch(&self, operands: &mut Operands, shape: &ProblemShape) -> KernelResult<()>;
}

/// Shared handle to a registered kernel.
pub type KernelHandle = Arc<dyn Kernel>;

/// Right-hand operand of the product, stored `n x k` (or its packed form).
#[derive(Debug, Clone)]
pub enum Weight<T: Element> {
    Quantized {
        packed: DeviceArray<u8>,
        scales: DeviceArray<T>,
    },
    Dense(DeviceArray<T>),
}

/// Device buffers for one launch in a single element type.
#[derive(Debug, Clone)]
pub struct TypedOperands<T: Element> {
    pub output: DeviceArray<T>,
    pub a: DeviceArray<T>,
    pub weight: Weight<T>,
}

impl<T: Element> TypedOperands<T> {
    pub fn family(&self) -> KernelFamily {
        match self.weight {
            Weight::Quantized { .. } => KernelFamily::FpInt4,
            Weight::Dense(_) => KernelFamily::Gemm,
        }
    }
}

/// Device buffers for one launch, tagged with their dtype.
#[derive(Debug, Clone)]
pub enum Operands {
    Half(TypedOperands<f16>),
    Float(TypedOperands<f32>),
}

impl Operands {
    pub fn dtype(&self) -> DType {
        match self {
            Operands::Half(_) => DType::Float16,
            Operands::Float(_) => DType::Float32,
        }
    }

    pub fn family(&self) -> KernelFamily {
        match self {
            Operands::Half(ops) => ops.family(),
            Operands::Float(ops) => ops.family(),
        }
    }

    /// Downloads the output buffer, widened to `f32`.
    pub fn output_f32(&self) -> Vec<f32> {
        match self {
            Operands::Half(ops) => ops.output.as_slice().iter().map(|v| v.to_f32()).collect(),
            Operands::Float(ops) => ops.output.download(),
        }
    }
}

/// Element types whose operands can be pulled out of [`Operands`].
pub trait OperandElement: Element {
    fn typed_mut(operands: &mut Operands) -> Option<&mut TypedOperands<Self>>;
}

impl OperandElement for f16 {
    fn typed_mut(operands: &mut Operands) -> Option<&mut TypedOperands<Self>> {
        match operands {
            Operands::Half(ops) => Some(ops),
            Operands::Float(_) => None,
        }
    }
}

impl OperandElement for f32 {
    fn typed_mut(operands: &mut Operands) -> Option<&mut TypedOperands<Self>> {
        match operands {
            Operands::Float(ops) => Some(ops),
            Operands::Half(_) => None,
        }
    }
}

/// Borrowed views over quantized-matmul operands, validated against a shape.
pub(crate) struct FpInt4Views<'a, T> {
    pub a: &'a [T],
    pub packed: &'a [u8],
    pub scales: &'a [T],
    pub output: &'a mut [T],
}

/// Borrowed views over dense-matmul operands, validated against a shape.
pub(crate) struct GemmViews<'a, T> {
    pub a: &'a [T],
    pub b: &'a [T],
    pub output: &'a mut [T],
}

fn operand_mismatch(id: &KernelId, operands: &Operands) -> KernelError {
    KernelError::OperandMismatch {
        kernel: id.name().to_string(),
        expected_family: id.family(),
        expected_dtype: id.dtype(),
        actual_family: operands.family(),
        actual_dtype: operands.dtype(),
    }
}

fn check_len(buffer: &'static str, expected: usize, actual: usize) -> KernelResult<()> {
    if expected != actual {
        return Err(KernelError::BufferSizeMismatch {
            buffer,
            expected,
            actual,
        });
    }
    Ok(())
}

pub(crate) fn fp_int4_views<'a, T: OperandElement>(
    id: &KernelId,
    operands: &'a mut Operands,
    shape: &ProblemShape,
) -> KernelResult<FpInt4Views<'a, T>> {
    shape.validate()?;
    let mismatch = operand_mismatch(id, operands);
    let Some(TypedOperands { output, a, weight }) = T::typed_mut(operands) else {
        return Err(mismatch);
    };
    let Weight::Quantized { packed, scales } = weight else {
        return Err(mismatch);
    };

    check_len("a", shape.activation_len(), a.len())?;
    check_len("packed", shape.quantized_weight_len(), packed.len())?;
    check_len("scales", shape.scale_len(), scales.len())?;
    check_len("output", shape.output_len(), output.len())?;

    Ok(FpInt4Views {
        a: a.as_slice(),
        packed: packed.as_slice(),
        scales: scales.as_slice(),
        output: output.as_mut_slice(),
    })
}

pub(crate) fn gemm_views<'a, T: OperandElement>(
    id: &KernelId,
    operands: &'a mut Operands,
    shape: &ProblemShape,
) -> KernelResult<GemmViews<'a, T>> {
    shape.validate()?;
    let mismatch = operand_mismatch(id, operands);
    let Some(TypedOperands { output, a, weight }) = T::typed_mut(operands) else {
        return Err(mismatch);
    };
    let Weight::Dense(b) = weight else {
        return Err(mismatch);
    };

    check_len("a", shape.activation_len(), a.len())?;
    check_len("b", shape.dense_weight_len(), b.len())?;
    check_len("output", shape.output_len(), output.len())?;

    Ok(GemmViews {
        a: a.as_slice(),
        b: b.as_slice(),
        output: output.as_mut_slice(),
    })
}

/// Threads the parallel instances split work across.
pub(crate) fn default_thread_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Widens a typed slice to `f32`.
pub(crate) fn widen<T: Element>(values: &[T]) -> Vec<f32> {
    values.iter().map(|&v| v.to_f32()).collect()
}
