//! Data type tags and the element types stored in device buffers.

use std::fmt;

use clap::ValueEnum;
use half::f16;
use serde::{Deserialize, Serialize};

/// Floating-point type of activations, scales and outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    #[value(name = "float16")]
    Float16,
    #[value(name = "float32")]
    Float32,
}

impl DType {
    pub const ALL: [DType; 2] = [DType::Float16, DType::Float32];

    /// Name used on the command line and in report lines.
    pub fn name(self) -> &'static str {
        match self {
            DType::Float16 => "float16",
            DType::Float32 => "float32",
        }
    }

    /// Suffix embedded in kernel identifiers.
    pub fn kernel_suffix(self) -> &'static str {
        match self {
            DType::Float16 => "half",
            DType::Float32 => "float",
        }
    }

    pub fn byte_width(self) -> usize {
        match self {
            DType::Float16 => std::mem::size_of::<f16>(),
            DType::Float32 => std::mem::size_of::<f32>(),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A scalar type that can live in a device buffer.
///
/// Kernels accumulate in `f32`, so every element converts to and from it.
pub trait Element: bytemuck::Pod + Send + Sync + fmt::Debug + 'static {
    const DTYPE: DType;

    fn from_f32(value: f32) -> Self;

    fn to_f32(self) -> f32;
}

impl Element for f32 {
    const DTYPE: DType = DType::Float32;

    #[inline(always)]
    fn from_f32(value: f32) -> Self {
        value
    }

    #[inline(always)]
    fn to_f32(self) -> f32 {
        self
    }
}

impl Element for f16 {
    const DTYPE: DType = DType::Float16;

    #[inline(always)]
    fn from_f32(value: f32) -> Self {
        f16::from_f32(value)
    }

    #[inline(always)]
    fn to_f32(self) -> f32 {
        f16::to_f32(self)
    }
}
