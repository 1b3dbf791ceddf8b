//! Main benchmark CLI executable.
//!
//! With no positional arguments the preset sweep runs (or the sweep described
//! by `--config`). With `m n k dtype` a single group is profiled.

use std::io;

use clap::Parser;
use fpint4_bench::benchmarks::{BenchmarkRunner, ConfigLoader, SweepConfig};
use fpint4_bench::{BenchmarkResult, DType, KernelRegistry, ProblemShape};
use log::error;

#[derive(Parser, Debug)]
#[command(
    name = "fpint4_bench",
    about = "Profile 4-bit weight / float activation matmul kernels"
)]
struct Cli {
    /// Rows of the activation and output matrices
    #[arg(requires_all = ["n", "k", "dtype"])]
    m: Option<usize>,

    /// Columns of the output (rows of the weight matrix)
    #[arg(requires_all = ["m", "k", "dtype"])]
    n: Option<usize>,

    /// Contraction dimension
    #[arg(requires_all = ["m", "n", "dtype"])]
    k: Option<usize>,

    /// Activation, scale and output type
    #[arg(value_enum, requires_all = ["m", "n", "k"])]
    dtype: Option<DType>,

    /// Print each group fastest first
    #[arg(long)]
    sort: bool,

    /// Also profile the dense baseline kernels
    #[arg(long)]
    baseline: bool,

    /// Check every kernel output against the host reference before timing
    #[arg(long)]
    verify: bool,

    /// Untimed launches before measuring
    #[arg(long)]
    warmup: Option<u32>,

    /// Timed launches averaged per measurement
    #[arg(long)]
    repeats: Option<u32>,

    /// JSON sweep configuration used when no size is given
    #[arg(long)]
    config: Option<String>,

    /// List registered kernels and exit
    #[arg(long)]
    list: bool,
}

impl Cli {
    fn single_run(&self) -> Option<(usize, usize, usize, DType)> {
        Some((self.m?, self.n?, self.k?, self.dtype?))
    }

    fn sweep_config(&self) -> BenchmarkResult<SweepConfig> {
        let mut config = match &self.config {
            Some(path) => ConfigLoader::load_sweep_config(path)?,
            None => SweepConfig::default(),
        };
        config.sort |= self.sort;
        config.include_baseline |= self.baseline;
        if let Some(warmup) = self.warmup {
            config.profile.warmup = warmup;
        }
        if let Some(repeats) = self.repeats {
            config.profile.repeats = repeats;
        }
        Ok(config)
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        error!("Benchmark execution failed: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> BenchmarkResult<()> {
    let config = cli.sweep_config()?;
    config.validate()?;

    let runner = BenchmarkRunner::from_config(KernelRegistry::with_native_kernels(), &config)
        .with_verification(cli.verify);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if cli.list {
        return runner.list_kernels(&mut out);
    }

    match cli.single_run() {
        Some((m, n, k, dtype)) => {
            let shape = ProblemShape::new(m, n, k)?;
            runner.profile_with_args(shape, dtype, cli.sort, &mut out)?;
        }
        None => {
            runner.sweep(&config, &mut out)?;
        }
    }

    Ok(())
}
