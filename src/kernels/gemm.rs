//! Dense baseline instances: `output[m, n] = a[m, k] * b[n, k]^T`.

use std::marker::PhantomData;
use std::thread;

use super::dot::{DotEngine, dot};
use super::fp_int4::scatter_columns;
use super::{Kernel, KernelFamily, KernelId, OperandElement, Operands, gemm_views, widen};
use crate::dtype::Element;
use crate::errors::{KernelError, KernelResult};
use crate::problem::ProblemShape;

/// Triple loop straight over the typed buffers.
pub struct NaiveGemm<T> {
    id: KernelId,
    _element: PhantomData<T>,
}

impl<T: Element> NaiveGemm<T> {
    pub fn new() -> Self {
        Self {
            id: KernelId::new(KernelFamily::Gemm, T::DTYPE, "Naive"),
            _element: PhantomData,
        }
    }
}

impl<T: Element> Default for NaiveGemm<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: OperandElement> Kernel for NaiveGemm<T> {
    fn id(&self) -> &KernelId {
        &self.id
    }

    fn launch(&self, operands: &mut Operands, shape: &ProblemShape) -> KernelResult<()> {
        let views = gemm_views::<T>(&self.id, operands, shape)?;
        let (m, n, k) = (shape.m, shape.n, shape.k);

        for i in 0..m {
            let a_row = &views.a[i * k..(i + 1) * k];
            for j in 0..n {
                let b_row = &views.b[j * k..(j + 1) * k];
                let sum: f32 = a_row
                    .iter()
                    .zip(b_row)
                    .map(|(&x, &y)| x.to_f32() * y.to_f32())
                    .sum();
                views.output[i * n + j] = T::from_f32(sum);
            }
        }

        Ok(())
    }
}

/// Widens both operands once, then splits `n` across scoped threads.
pub struct ThreadedGemm<T> {
    id: KernelId,
    threads: usize,
    engine: DotEngine,
    _element: PhantomData<T>,
}

impl<T: Element> ThreadedGemm<T> {
    pub fn new(threads: usize, engine: DotEngine) -> Self {
        Self {
            id: KernelId::new(KernelFamily::Gemm, T::DTYPE, "Threaded"),
            threads: threads.max(1),
            engine,
            _element: PhantomData,
        }
    }
}

impl<T: OperandElement> Kernel for ThreadedGemm<T> {
    fn id(&self) -> &KernelId {
        &self.id
    }

    fn launch(&self, operands: &mut Operands, shape: &ProblemShape) -> KernelResult<()> {
        let views = gemm_views::<T>(&self.id, operands, shape)?;
        let a = widen(views.a);
        let b = widen(views.b);
        let (m, n, k) = (shape.m, shape.n, shape.k);
        let chunk = n.div_ceil(self.threads);
        let engine = self.engine;

        thread::scope(|scope| -> KernelResult<()> {
            let (a, b) = (a.as_slice(), b.as_slice());
            let handles: Vec<_> = (0..n)
                .step_by(chunk)
                .map(|start| {
                    let range = start..(start + chunk).min(n);
                    scope.spawn(move || {
                        let mut columns = Vec::with_capacity(range.len() * m);
                        for j in range.clone() {
                            let b_row = &b[j * k..(j + 1) * k];
                            for i in 0..m {
                                columns.push(dot(engine, &a[i * k..(i + 1) * k], b_row));
                            }
                        }
                        (range, columns)
                    })
                })
                .collect();

            for handle in handles {
                let (range, columns) = handle.join().map_err(|_| KernelError::ThreadPanicked {
                    kernel: self.id.name().to_string(),
                })?;
                scatter_columns(&columns, views.output, n, range);
            }
            Ok(())
        })
    }
}
