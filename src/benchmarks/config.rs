//! Sweep configuration and its JSON loader.

use std::fs;

use log::warn;
use serde::{Deserialize, Serialize};

use super::inputs::DEFAULT_SEED;
use crate::dtype::DType;
use crate::errors::{BenchmarkError, BenchmarkResult};
use crate::kernels::ProfileOptions;

/// Cross-product of problem sizes and dtypes to benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub dims_m: Vec<usize>,
    pub dims_n: Vec<usize>,
    pub dims_k: Vec<usize>,
    pub dtypes: Vec<DType>,
    pub sort: bool,
    pub include_baseline: bool,
    pub seed: u64,
    pub profile: ProfileOptions,
}

impl Default for SweepConfig {
    /// The preset sweep: a single decode-shaped problem in float16.
    fn default() -> Self {
        Self {
            dims_m: vec![1],
            dims_n: vec![4096],
            dims_k: vec![4096],
            dtypes: vec![DType::Float16],
            sort: true,
            include_baseline: false,
            seed: DEFAULT_SEED,
            profile: ProfileOptions::default(),
        }
    }
}

impl SweepConfig {
    /// Number of size/dtype groups the sweep will run.
    pub fn group_count(&self) -> usize {
        self.dtypes.len() * self.dims_m.len() * self.dims_n.len() * self.dims_k.len()
    }

    pub fn validate(&self) -> BenchmarkResult<()> {
        for (field, dims) in [
            ("dims_m", &self.dims_m),
            ("dims_n", &self.dims_n),
            ("dims_k", &self.dims_k),
        ] {
            if dims.is_empty() {
                return Err(BenchmarkError::ConfigValidationError {
                    field: field.to_string(),
                    message: "At least one dimension is required".to_string(),
                });
            }
            if dims.contains(&0) {
                return Err(BenchmarkError::ConfigValidationError {
                    field: field.to_string(),
                    message: "Dimensions must be greater than 0".to_string(),
                });
            }
        }

        if self.dtypes.is_empty() {
            return Err(BenchmarkError::ConfigValidationError {
                field: "dtypes".to_string(),
                message: "At least one dtype is required".to_string(),
            });
        }

        if self.profile.repeats == 0 {
            return Err(BenchmarkError::ConfigValidationError {
                field: "profile.repeats".to_string(),
                message: "Repeats must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Loads sweep configurations from JSON files, falling back to the preset.
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load_sweep_config(path: &str) -> BenchmarkResult<SweepConfig> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse_sweep_config(path, &content),
            Err(_) => {
                warn!("Config file '{}' not found, using the preset sweep", path);
                Ok(SweepConfig::default())
            }
        }
    }

    pub fn parse_sweep_config(path: &str, content: &str) -> BenchmarkResult<SweepConfig> {
        serde_json::from_str(content).map_err(|e| BenchmarkError::ConfigParseError {
            path: path.to_string(),
            source: e,
        })
    }
}
