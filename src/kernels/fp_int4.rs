//! Quantized matmul instances: `output[m, n] = a[m, k] * dequant(b)[n, k]^T`.
//!
//! Weights are stored row by row (`n` rows), each row split into
//! `ceil(k / 32)` blocks of 16 bytes. Element `2i` of a block is the low
//! nibble of byte `i`, element `2i + 1` the high nibble, and every block
//! shares one scale: `w = (q - 8) * scale`.

use std::marker::PhantomData;
use std::thread;

use log::debug;

use super::dot::{DotEngine, dot};
use super::{Kernel, KernelFamily, KernelId, OperandElement, Operands, fp_int4_views, widen};
use crate::dtype::Element;
use crate::errors::{KernelError, KernelResult};
use crate::problem::{ProblemShape, QUANT_BLOCK_BYTES, QUANT_BLOCK_SIZE, QUANT_ZERO_POINT};

/// Decodes element `index` of a packed block.
#[inline(always)]
pub fn unpack_nibble(block: &[u8], index: usize) -> i32 {
    let byte = block[index / 2];
    let nibble = if index % 2 == 0 { byte & 0x0F } else { byte >> 4 };
    nibble as i32
}

/// Dequantizes the first `k` weights of one packed row into `out`.
pub fn dequantize_row<T: Element>(packed_row: &[u8], scales_row: &[T], k: usize, out: &mut [f32]) {
    for (block_index, (block, &scale)) in packed_row
        .chunks_exact(QUANT_BLOCK_BYTES)
        .zip(scales_row)
        .enumerate()
    {
        let scale = scale.to_f32();
        let start = block_index * QUANT_BLOCK_SIZE;
        let valid = QUANT_BLOCK_SIZE.min(k - start);
        for (offset, slot) in out[start..start + valid].iter_mut().enumerate() {
            *slot = (unpack_nibble(block, offset) - QUANT_ZERO_POINT) as f32 * scale;
        }
    }
}

/// Decodes every weight inside the inner loop. Handles any `k`.
pub struct ScalarFpInt4<T> {
    id: KernelId,
    _element: PhantomData<T>,
}

impl<T: Element> ScalarFpInt4<T> {
    pub fn new() -> Self {
        Self {
            id: KernelId::new(KernelFamily::FpInt4, T::DTYPE, "Scalar"),
            _element: PhantomData,
        }
    }
}

impl<T: Element> Default for ScalarFpInt4<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: OperandElement> Kernel for ScalarFpInt4<T> {
    fn id(&self) -> &KernelId {
        &self.id
    }

    fn launch(&self, operands: &mut Operands, shape: &ProblemShape) -> KernelResult<()> {
        let views = fp_int4_views::<T>(&self.id, operands, shape)?;
        let (m, n, k) = (shape.m, shape.n, shape.k);
        let blocks = shape.blocks_per_row();
        let row_bytes = blocks * QUANT_BLOCK_BYTES;

        for i in 0..m {
            let a_row = &views.a[i * k..(i + 1) * k];
            for j in 0..n {
                let packed_row = &views.packed[j * row_bytes..(j + 1) * row_bytes];
                let scales_row = &views.scales[j * blocks..(j + 1) * blocks];
                let mut sum = 0.0f32;
                for (kk, &av) in a_row.iter().enumerate() {
                    let block = &packed_row[(kk / QUANT_BLOCK_SIZE) * QUANT_BLOCK_BYTES..];
                    let q = unpack_nibble(block, kk % QUANT_BLOCK_SIZE) - QUANT_ZERO_POINT;
                    let w = q as f32 * scales_row[kk / QUANT_BLOCK_SIZE].to_f32();
                    sum += av.to_f32() * w;
                }
                views.output[i * n + j] = T::from_f32(sum);
            }
        }

        Ok(())
    }
}

/// Dequantizes one weight row, then reuses it for every row of `a`.
pub struct BlockDequantFpInt4<T> {
    id: KernelId,
    _element: PhantomData<T>,
}

impl<T: Element> BlockDequantFpInt4<T> {
    pub fn new() -> Self {
        Self {
            id: KernelId::new(KernelFamily::FpInt4, T::DTYPE, "BlockDequant"),
            _element: PhantomData,
        }
    }
}

impl<T: Element> Default for BlockDequantFpInt4<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: OperandElement> Kernel for BlockDequantFpInt4<T> {
    fn id(&self) -> &KernelId {
        &self.id
    }

    fn launch(&self, operands: &mut Operands, shape: &ProblemShape) -> KernelResult<()> {
        let views = fp_int4_views::<T>(&self.id, operands, shape)?;
        let a = widen(views.a);
        let columns = fp_int4_columns(
            &a,
            views.packed,
            views.scales,
            shape,
            0..shape.n,
            DotEngine::Scalar,
        );
        scatter_columns(&columns, views.output, shape.n, 0..shape.n);
        Ok(())
    }
}

/// Walks `k` one quantization block at a time. Each block is decoded once
/// into a 32-wide tile of centered integers, dotted against the matching
/// slice of every row of `a`, and scaled once per tile. Only whole tiles are
/// handled.
pub struct TiledFpInt4<T> {
    id: KernelId,
    engine: DotEngine,
    _element: PhantomData<T>,
}

impl<T: Element> TiledFpInt4<T> {
    pub fn new(variant: &str, engine: DotEngine) -> Self {
        Self {
            id: KernelId::new(KernelFamily::FpInt4, T::DTYPE, variant),
            engine,
            _element: PhantomData,
        }
    }
}

impl<T: OperandElement> Kernel for TiledFpInt4<T> {
    fn id(&self) -> &KernelId {
        &self.id
    }

    fn supports(&self, shape: &ProblemShape) -> bool {
        shape.k.is_multiple_of(QUANT_BLOCK_SIZE)
    }

    fn launch(&self, operands: &mut Operands, shape: &ProblemShape) -> KernelResult<()> {
        if !self.supports(shape) {
            return Err(unsupported(&self.id, shape));
        }
        let views = fp_int4_views::<T>(&self.id, operands, shape)?;
        let a = widen(views.a);
        let (m, n, k) = (shape.m, shape.n, shape.k);
        let blocks = shape.blocks_per_row();
        let row_bytes = blocks * QUANT_BLOCK_BYTES;

        let mut tile = [0.0f32; QUANT_BLOCK_SIZE];
        let mut sums = vec![0.0f32; m];
        for j in 0..n {
            sums.fill(0.0);
            let packed_row = &views.packed[j * row_bytes..(j + 1) * row_bytes];
            let scales_row = &views.scales[j * blocks..(j + 1) * blocks];

            for (block_index, (block, &scale)) in packed_row
                .chunks_exact(QUANT_BLOCK_BYTES)
                .zip(scales_row)
                .enumerate()
            {
                for (offset, slot) in tile.iter_mut().enumerate() {
                    *slot = (unpack_nibble(block, offset) - QUANT_ZERO_POINT) as f32;
                }
                let scale = scale.to_f32();
                let offset = block_index * QUANT_BLOCK_SIZE;
                for (i, sum) in sums.iter_mut().enumerate() {
                    let start = i * k + offset;
                    *sum += scale * dot(self.engine, &a[start..start + QUANT_BLOCK_SIZE], &tile);
                }
            }

            for (i, &sum) in sums.iter().enumerate() {
                views.output[i * n + j] = T::from_f32(sum);
            }
        }

        Ok(())
    }
}

/// Splits the `n` weight rows across scoped worker threads.
pub struct ThreadedFpInt4<T> {
    id: KernelId,
    threads: usize,
    engine: DotEngine,
    _element: PhantomData<T>,
}

impl<T: Element> ThreadedFpInt4<T> {
    pub fn new(threads: usize, engine: DotEngine) -> Self {
        Self {
            id: KernelId::new(KernelFamily::FpInt4, T::DTYPE, "Threaded"),
            threads: threads.max(1),
            engine,
            _element: PhantomData,
        }
    }
}

impl<T: OperandElement> Kernel for ThreadedFpInt4<T> {
    fn id(&self) -> &KernelId {
        &self.id
    }

    fn launch(&self, operands: &mut Operands, shape: &ProblemShape) -> KernelResult<()> {
        let views = fp_int4_views::<T>(&self.id, operands, shape)?;
        let a = widen(views.a);
        let (packed, scales) = (views.packed, views.scales);
        let engine = self.engine;
        let chunk = shape.n.div_ceil(self.threads);
        debug!("{}: {} threads, {} columns each", self.id, self.threads, chunk);

        thread::scope(|scope| -> KernelResult<()> {
            let a = a.as_slice();
            let handles: Vec<_> = (0..shape.n)
                .step_by(chunk)
                .map(|start| {
                    let range = start..(start + chunk).min(shape.n);
                    scope.spawn(move || {
                        let columns = fp_int4_columns(a, packed, scales, shape, range.clone(), engine);
                        (range, columns)
                    })
                })
                .collect();

            for handle in handles {
                let (range, columns) = handle.join().map_err(|_| KernelError::ThreadPanicked {
                    kernel: self.id.name().to_string(),
                })?;
                scatter_columns(&columns, views.output, shape.n, range);
            }
            Ok(())
        })
    }
}

pub(crate) fn unsupported(id: &KernelId, shape: &ProblemShape) -> KernelError {
    KernelError::Unsupported {
        kernel: id.name().to_string(),
        m: shape.m,
        n: shape.n,
        k: shape.k,
    }
}

/// Computes output columns `columns` for every row of `a`, returned
/// column-major (`columns.len() x m`).
fn fp_int4_columns<T: Element>(
    a: &[f32],
    packed: &[u8],
    scales: &[T],
    shape: &ProblemShape,
    columns: std::ops::Range<usize>,
    engine: DotEngine,
) -> Vec<f32> {
    let (m, k) = (shape.m, shape.k);
    let blocks = shape.blocks_per_row();
    let row_bytes = blocks * QUANT_BLOCK_BYTES;
    let mut weights = vec![0.0f32; k];
    let mut result = Vec::with_capacity(columns.len() * m);

    for j in columns {
        dequantize_row(
            &packed[j * row_bytes..(j + 1) * row_bytes],
            &scales[j * blocks..(j + 1) * blocks],
            k,
            &mut weights,
        );
        for i in 0..m {
            result.push(dot(engine, &a[i * k..(i + 1) * k], &weights));
        }
    }

    result
}

/// Writes column-major results for `columns` into the row-major output.
pub(crate) fn scatter_columns<T: Element>(
    columns_major: &[f32],
    output: &mut [T],
    n: usize,
    columns: std::ops::Range<usize>,
) {
    let m = output.len() / n;
    for (offset, j) in columns.enumerate() {
        for i in 0..m {
            output[i * n + j] = T::from_f32(columns_major[offset * m + i]);
        }
    }
}
