//! Registry mapping `(dtype, family)` to the kernel instances available at
//! runtime.

use std::collections::BTreeMap;
use std::sync::Arc;

use half::f16;
use log::debug;

use super::dot::DotEngine;
use super::fp_int4::{BlockDequantFpInt4, ScalarFpInt4, ThreadedFpInt4, TiledFpInt4};
use super::gemm::{NaiveGemm, ThreadedGemm};
use super::{Kernel, KernelFamily, KernelHandle, OperandElement, default_thread_count};
use crate::dtype::DType;
use crate::errors::{BenchmarkError, BenchmarkResult};

#[derive(Clone, Default)]
pub struct KernelRegistry {
    entries: BTreeMap<(DType, KernelFamily), Vec<KernelHandle>>,
}

impl KernelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every native instance the running CPU can
    /// execute.
    pub fn with_native_kernels() -> Self {
        let mut registry = Self::new();
        let threads = default_thread_count();
        let engine = DotEngine::detect();
        debug!("Registering native kernels: {threads} threads, {engine:?} dot engine");

        register_native::<f16>(&mut registry, threads, engine);
        register_native::<f32>(&mut registry, threads, engine);
        registry
    }

    /// Adds a kernel under the dtype and family of its identifier.
    pub fn register(&mut self, kernel: KernelHandle) {
        let key = (kernel.id().dtype(), kernel.id().family());
        self.entries.entry(key).or_default().push(kernel);
    }

    /// Returns the kernels for `(dtype, family)` in registration order.
    pub fn resolve(&self, dtype: DType, family: KernelFamily) -> BenchmarkResult<&[KernelHandle]> {
        match self.entries.get(&(dtype, family)) {
            Some(kernels) if !kernels.is_empty() => Ok(kernels),
            _ => Err(BenchmarkError::NoKernelForDtype { dtype, family }),
        }
    }

    /// Iterates every registered kernel grouped by dtype, then family.
    pub fn iter(&self) -> impl Iterator<Item = &KernelHandle> {
        self.entries.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn register_native<T: OperandElement>(registry: &mut KernelRegistry, threads: usize, engine: DotEngine) {
    registry.register(Arc::new(ScalarFpInt4::<T>::new()));
    registry.register(Arc::new(BlockDequantFpInt4::<T>::new()));
    registry.register(Arc::new(ThreadedFpInt4::<T>::new(threads, engine)));
    if engine.is_simd() {
        registry.register(Arc::new(TiledFpInt4::<T>::new("Avx2Tiled", engine)));
    }

    registry.register(Arc::new(NaiveGemm::<T>::new()));
    registry.register(Arc::new(ThreadedGemm::<T>::new(threads, engine)));
}
