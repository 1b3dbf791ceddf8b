//! Launch-and-time wrapper around a kernel and its device operands.

use std::time::Instant;

use log::debug;
use serde::{Deserialize, Serialize};

use super::fp_int4::unsupported;
use super::{Kernel, Operands};
use crate::errors::KernelResult;
use crate::problem::ProblemShape;

/// How many launches to discard and how many to average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOptions {
    pub warmup: u32,
    pub repeats: u32,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            warmup: 2,
            repeats: 10,
        }
    }
}

/// One kernel bound to its operands and shape, ready to launch.
pub struct KernelOp<'k> {
    kernel: &'k dyn Kernel,
    operands: Operands,
    shape: ProblemShape,
}

impl<'k> KernelOp<'k> {
    pub fn new(kernel: &'k dyn Kernel, operands: Operands, shape: ProblemShape) -> Self {
        Self {
            kernel,
            operands,
            shape,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.kernel.supports(&self.shape)
    }

    /// Launches the kernel once.
    pub fn run(&mut self) -> KernelResult<()> {
        if !self.is_supported() {
            return Err(unsupported(self.kernel.id(), &self.shape));
        }
        self.kernel.launch(&mut self.operands, &self.shape)
    }

    /// Runs the warm-up launches, then returns the mean duration of the
    /// timed launches in microseconds.
    pub fn profile(&mut self, options: &ProfileOptions) -> KernelResult<f64> {
        for _ in 0..options.warmup {
            self.run()?;
        }

        let repeats = options.repeats.max(1);
        let start = Instant::now();
        for _ in 0..repeats {
            self.run()?;
        }
        let elapsed = start.elapsed();

        let duration_us = elapsed.as_secs_f64() * 1e6 / repeats as f64;
        debug!(
            "{} {}: {:.2} us over {} launches",
            self.kernel.id(),
            self.shape,
            duration_us,
            repeats
        );
        Ok(duration_us)
    }

    pub fn operands(&self) -> &Operands {
        &self.operands
    }
}
