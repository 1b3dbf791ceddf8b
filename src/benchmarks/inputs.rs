//! Deterministic input generation for one benchmark launch.

use half::f16;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::device::DeviceArray;
use crate::dtype::{DType, Element};
use crate::kernels::{KernelFamily, Operands, TypedOperands, Weight, reference};
use crate::problem::ProblemShape;

/// Seed used when the configuration does not provide one.
pub const DEFAULT_SEED: u64 = 0;

/// Packed weight bytes are drawn from `[0, PACKED_BYTE_UPPER)`.
pub const PACKED_BYTE_UPPER: u8 = 127;

#[derive(Debug, Clone, PartialEq)]
pub enum HostWeight<T> {
    Quantized { packed: Vec<u8>, scales: Vec<T> },
    Dense(Vec<T>),
}

/// Host copies of every operand of one launch.
#[derive(Debug, Clone, PartialEq)]
pub struct HostBuffers<T> {
    pub output: Vec<T>,
    pub a: Vec<T>,
    pub weight: HostWeight<T>,
}

impl<T: Element> HostBuffers<T> {
    fn upload(&self) -> TypedOperands<T> {
        let weight = match &self.weight {
            HostWeight::Quantized { packed, scales } => Weight::Quantized {
                packed: DeviceArray::upload(packed),
                scales: DeviceArray::upload(scales),
            },
            HostWeight::Dense(b) => Weight::Dense(DeviceArray::upload(b)),
        };
        TypedOperands {
            output: DeviceArray::upload(&self.output),
            a: DeviceArray::upload(&self.a),
            weight,
        }
    }

    fn reference_output(&self, shape: &ProblemShape) -> Vec<f32> {
        match &self.weight {
            HostWeight::Quantized { packed, scales } => {
                reference::fp_int4_matmul(&self.a, packed, scales, shape)
            }
            HostWeight::Dense(b) => reference::gemm(&self.a, b, shape),
        }
    }
}

/// Host inputs tagged with their dtype.
#[derive(Debug, Clone, PartialEq)]
pub enum HostInputs {
    Half(HostBuffers<f16>),
    Float(HostBuffers<f32>),
}

impl HostInputs {
    pub fn dtype(&self) -> DType {
        match self {
            HostInputs::Half(_) => DType::Float16,
            HostInputs::Float(_) => DType::Float32,
        }
    }

    /// Packed weight bytes, present only for quantized inputs.
    pub fn packed_weights(&self) -> Option<&[u8]> {
        match self {
            HostInputs::Half(buffers) => packed_bytes(&buffers.weight),
            HostInputs::Float(buffers) => packed_bytes(&buffers.weight),
        }
    }

    /// Number of per-block scales, present only for quantized inputs.
    pub fn scale_count(&self) -> Option<usize> {
        match self {
            HostInputs::Half(buffers) => scale_count(&buffers.weight),
            HostInputs::Float(buffers) => scale_count(&buffers.weight),
        }
    }

    /// Copies every buffer into device-resident storage.
    pub fn upload(&self) -> Operands {
        match self {
            HostInputs::Half(buffers) => Operands::Half(buffers.upload()),
            HostInputs::Float(buffers) => Operands::Float(buffers.upload()),
        }
    }

    /// Expected output computed on the host.
    pub fn reference_output(&self, shape: &ProblemShape) -> Vec<f32> {
        match self {
            HostInputs::Half(buffers) => buffers.reference_output(shape),
            HostInputs::Float(buffers) => buffers.reference_output(shape),
        }
    }
}

fn packed_bytes<T>(weight: &HostWeight<T>) -> Option<&[u8]> {
    match weight {
        HostWeight::Quantized { packed, .. } => Some(packed),
        HostWeight::Dense(_) => None,
    }
}

fn scale_count<T>(weight: &HostWeight<T>) -> Option<usize> {
    match weight {
        HostWeight::Quantized { scales, .. } => Some(scales.len()),
        HostWeight::Dense(_) => None,
    }
}

/// Generates the inputs of one launch from a freshly seeded generator.
///
/// Draw order is output, activation, then weights (packed bytes before
/// scales), so equal arguments always yield identical buffers.
pub fn generate_inputs(
    shape: &ProblemShape,
    dtype: DType,
    family: KernelFamily,
    seed: u64,
) -> HostInputs {
    let mut rng = StdRng::seed_from_u64(seed);
    match dtype {
        DType::Float16 => HostInputs::Half(generate_buffers(&mut rng, shape, family)),
        DType::Float32 => HostInputs::Float(generate_buffers(&mut rng, shape, family)),
    }
}

fn generate_buffers<T: Element>(
    rng: &mut StdRng,
    shape: &ProblemShape,
    family: KernelFamily,
) -> HostBuffers<T> {
    let output = uniform(rng, shape.output_len());
    let a = uniform(rng, shape.activation_len());
    let weight = match family {
        KernelFamily::FpInt4 => {
            let packed = (0..shape.quantized_weight_len())
                .map(|_| rng.gen_range(0..PACKED_BYTE_UPPER))
                .collect();
            let scales = uniform(rng, shape.scale_len());
            HostWeight::Quantized { packed, scales }
        }
        KernelFamily::Gemm => HostWeight::Dense(uniform(rng, shape.dense_weight_len())),
    };

    HostBuffers { output, a, weight }
}

fn uniform<T: Element>(rng: &mut StdRng, len: usize) -> Vec<T> {
    (0..len).map(|_| T::from_f32(rng.gen_range(0.0f32..1.0))).collect()
}
