//! Matrix multiplication problem sizes and block-quantization geometry.

use std::fmt;

use crate::dtype::DType;
use crate::errors::{KernelError, KernelResult};

/// Number of weights sharing one scale along the contraction dimension.
pub const QUANT_BLOCK_SIZE: usize = 32;

/// Bytes needed to pack one block of 4-bit weights.
pub const QUANT_BLOCK_BYTES: usize = QUANT_BLOCK_SIZE / 2;

/// Offset subtracted from every 4-bit value before scaling.
pub const QUANT_ZERO_POINT: i32 = 8;

/// Shape of `output[m, n] = a[m, k] * weight[n, k]^T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProblemShape {
    pub m: usize,
    pub n: usize,
    pub k: usize,
}

impl ProblemShape {
    pub fn new(m: usize, n: usize, k: usize) -> KernelResult<Self> {
        let shape = Self { m, n, k };
        shape.validate()?;
        Ok(shape)
    }

    /// Rejects shapes with a zero dimension, including ones built as struct
    /// literals.
    pub fn validate(&self) -> KernelResult<()> {
        if self.m == 0 || self.n == 0 || self.k == 0 {
            return Err(KernelError::InvalidShape {
                m: self.m,
                n: self.n,
                k: self.k,
            });
        }
        Ok(())
    }

    /// Quantization blocks per weight row, `ceil(k / 32)`.
    pub fn blocks_per_row(&self) -> usize {
        self.k.div_ceil(QUANT_BLOCK_SIZE)
    }

    /// Length in bytes of the packed weight buffer.
    pub fn quantized_weight_len(&self) -> usize {
        self.n * self.blocks_per_row() * QUANT_BLOCK_BYTES
    }

    /// Number of per-block scales.
    pub fn scale_len(&self) -> usize {
        self.n * self.blocks_per_row()
    }

    pub fn activation_len(&self) -> usize {
        self.m * self.k
    }

    pub fn dense_weight_len(&self) -> usize {
        self.n * self.k
    }

    pub fn output_len(&self) -> usize {
        self.m * self.n
    }

    /// Bytes read and written by one launch, counting every operand at the
    /// width of `dtype`.
    pub fn total_bytes(&self, dtype: DType) -> usize {
        (self.m * self.k + self.n * self.k + self.m * self.n) * dtype.byte_width()
    }
}

impl fmt::Display for ProblemShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m={} n={} k={}", self.m, self.n, self.k)
    }
}
