//! Bandwidth records and the scope that prints one group of them.

use std::io::Write;

use crate::dtype::DType;
use crate::problem::ProblemShape;

/// Result of timing one kernel on one problem.
#[derive(Debug, Clone, PartialEq)]
pub struct BandwidthMetric {
    pub name: String,
    pub dtype: DType,
    pub duration_us: f64,
    pub total_bytes: usize,
    pub shape: ProblemShape,
}

impl BandwidthMetric {
    pub fn new(name: impl Into<String>, dtype: DType, duration_us: f64, shape: ProblemShape) -> Self {
        Self {
            name: name.into(),
            dtype,
            duration_us,
            total_bytes: shape.total_bytes(dtype),
            shape,
        }
    }

    /// Throughput in GB/s.
    pub fn gbps(&self) -> f64 {
        self.total_bytes as f64 / (self.duration_us * 1e3)
    }

    /// Formats the metric as a single report line.
    pub fn report(&self) -> String {
        format!(
            "{:6.2} us {:5.2} GB/s {} m={} n={} k={} {}",
            self.duration_us,
            self.gbps(),
            self.dtype,
            self.shape.m,
            self.shape.n,
            self.shape.k,
            self.name
        )
    }
}

/// Collects the metrics of one size/dtype group and prints them together,
/// optionally fastest first.
pub struct BenchmarkScope<'w, W: Write> {
    writer: &'w mut W,
    sort: bool,
    metrics: Vec<BandwidthMetric>,
}

impl<'w, W: Write> BenchmarkScope<'w, W> {
    pub fn new(writer: &'w mut W, sort: bool) -> Self {
        Self {
            writer,
            sort,
            metrics: Vec::new(),
        }
    }

    pub fn record(&mut self, metric: BandwidthMetric) {
        self.metrics.push(metric);
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Writes every recorded line and returns the metrics in printed order.
    pub fn finish(mut self) -> std::io::Result<Vec<BandwidthMetric>> {
        if self.sort {
            self.metrics
                .sort_by(|a, b| a.duration_us.total_cmp(&b.duration_us));
        }
        for metric in &self.metrics {
            writeln!(self.writer, "{}", metric.report())?;
        }
        self.writer.flush()?;
        Ok(self.metrics)
    }
}
