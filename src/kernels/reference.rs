//! Straightforward host implementations used to check kernel outputs.

use crate::dtype::Element;
use crate::problem::{ProblemShape, QUANT_BLOCK_BYTES, QUANT_BLOCK_SIZE, QUANT_ZERO_POINT};

use super::fp_int4::unpack_nibble;

/// Quantized product accumulated in `f64`, returned row-major `m x n`.
pub fn fp_int4_matmul<T: Element>(
    a: &[T],
    packed: &[u8],
    scales: &[T],
    shape: &ProblemShape,
) -> Vec<f32> {
    let blocks = shape.blocks_per_row();
    let mut output = vec![0.0f32; shape.output_len()];

    for i in 0..shape.m {
        for j in 0..shape.n {
            let mut sum = 0.0f64;
            for kk in 0..shape.k {
                let block_index = j * blocks + kk / QUANT_BLOCK_SIZE;
                let block = &packed[block_index * QUANT_BLOCK_BYTES..][..QUANT_BLOCK_BYTES];
                let q = unpack_nibble(block, kk % QUANT_BLOCK_SIZE) - QUANT_ZERO_POINT;
                let w = q as f64 * scales[block_index].to_f32() as f64;
                sum += a[i * shape.k + kk].to_f32() as f64 * w;
            }
            output[i * shape.n + j] = sum as f32;
        }
    }

    output
}

/// Dense product `a * b^T` accumulated in `f64`.
pub fn gemm<T: Element>(a: &[T], b: &[T], shape: &ProblemShape) -> Vec<f32> {
    let mut output = vec![0.0f32; shape.output_len()];

    for i in 0..shape.m {
        for j in 0..shape.n {
            let sum: f64 = (0..shape.k)
                .map(|kk| a[i * shape.k + kk].to_f32() as f64 * b[j * shape.k + kk].to_f32() as f64)
                .sum();
            output[i * shape.n + j] = sum as f32;
        }
    }

    output
}
