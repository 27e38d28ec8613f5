//! Command-line argument parsing
//!
//! The single execution mode this crate supports (no service/coordinator
//! modes), built around the one mandated flag, `--quick <drive-root>`, plus
//! additive flags for everything `Plan`/`WorkloadSpec` need.

use crate::config::{AccessPattern, EngineKind, Plan, WorkloadSpec};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "diskbench")]
#[command(version, about = "Disk I/O micro-benchmark engine", long_about = None)]
pub struct Cli {
    /// Run the default quick benchmark against `<drive-root>/DiskBench.tmp`:
    /// 3 trials, 5s warmup, 30s measured, at block sizes 4 KiB/64 KiB/1 MiB,
    /// queue depth 32. A complete, self-sufficient invocation.
    #[arg(long, value_name = "DRIVE_ROOT")]
    pub quick: Option<PathBuf>,

    /// Load a `Plan` from a TOML file instead of building one from flags.
    #[arg(long, value_name = "PATH", conflicts_with = "quick")]
    pub config: Option<PathBuf>,

    /// Target file path (required unless --quick or --config is given).
    #[arg(value_name = "PATH")]
    pub target: Option<PathBuf>,

    /// Block size in bytes (e.g. 4096, 65536).
    #[arg(short = 'b', long, default_value_t = 4096)]
    pub block_size: u32,

    /// Queue depth (outstanding operations).
    #[arg(short = 'q', long, default_value_t = 32)]
    pub queue_depth: usize,

    /// Access pattern.
    #[arg(long, value_enum, default_value_t = CliAccessPattern::Random)]
    pub access_pattern: CliAccessPattern,

    /// Write percentage (0-100); the remainder is reads.
    #[arg(long, default_value_t = 50)]
    pub write_percent: u8,

    /// Target file size in bytes.
    #[arg(short = 's', long, default_value_t = 1 << 30)]
    pub file_size: u64,

    /// I/O engine backend.
    #[arg(long, value_enum, default_value_t = CliEngineKind::Sync)]
    pub engine: CliEngineKind,

    /// Warmup duration before measurement begins, in seconds.
    #[arg(long, default_value_t = 5)]
    pub warmup_secs: u64,

    /// Measured duration, in seconds.
    #[arg(long, default_value_t = 30)]
    pub measured_secs: u64,

    /// Number of trials per workload.
    #[arg(long, default_value_t = 3)]
    pub trials: usize,

    /// Bootstrap resample count for confidence intervals (0 disables CIs).
    #[arg(long, default_value_t = 2000)]
    pub bootstrap_iterations: usize,

    /// RNG seed (base seed; per-trial seeds are derived from it).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write the assembled results as JSON to this path.
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Write the assembled results as CSV to this path.
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,

    /// Delete the target file after the run completes.
    #[arg(long)]
    pub delete_on_completion: bool,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliAccessPattern {
    Sequential,
    Random,
}

impl From<CliAccessPattern> for AccessPattern {
    fn from(value: CliAccessPattern) -> Self {
        match value {
            CliAccessPattern::Sequential => AccessPattern::Sequential,
            CliAccessPattern::Random => AccessPattern::Random,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliEngineKind {
    Sync,
    IoUring,
    Mock,
}

impl From<CliEngineKind> for EngineKind {
    fn from(value: CliEngineKind) -> Self {
        match value {
            CliEngineKind::Sync => EngineKind::Sync,
            CliEngineKind::IoUring => EngineKind::IoUring,
            CliEngineKind::Mock => EngineKind::Mock,
        }
    }
}

impl Cli {
    /// `log::LevelFilter` implied by repeated `-v` flags.
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }

    /// Build the `Plan` this invocation describes: `--config` takes a TOML
    /// file verbatim, `--quick` builds the canned plan, otherwise every flag
    /// is read individually into a single-workload `Plan`.
    pub fn build_plan(&self) -> anyhow::Result<Plan> {
        if let Some(config_path) = &self.config {
            let text = std::fs::read_to_string(config_path)?;
            return Ok(toml::from_str(&text)?);
        }

        if let Some(drive_root) = &self.quick {
            return Ok(Plan::quick(drive_root, EngineKind::Sync, 1 << 30));
        }

        let target = self
            .target
            .clone()
            .ok_or_else(|| anyhow::anyhow!("a target path is required unless --quick or --config is given"))?;

        let workload = WorkloadSpec {
            access_pattern: self.access_pattern.into(),
            write_percent: self.write_percent,
            block_size: self.block_size,
            queue_depth: self.queue_depth,
            file_path: target,
            file_size: self.file_size,
            seed: self.seed,
            engine: self.engine.into(),
        };
        workload.validate().map_err(|e| anyhow::anyhow!(e))?;

        Ok(Plan {
            workloads: vec![workload],
            trials_per_workload: self.trials,
            warmup: Duration::from_secs(self.warmup_secs),
            measured: Duration::from_secs(self.measured_secs),
            bootstrap_iterations: self.bootstrap_iterations,
            compute_cis: self.bootstrap_iterations > 0,
            reuse_existing_files: true,
            delete_on_completion: self.delete_on_completion,
            seed: self.seed.unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_flag_builds_three_workloads() {
        let cli = Cli::parse_from(["diskbench", "--quick", "/mnt/test"]);
        let plan = cli.build_plan().unwrap();
        assert_eq!(plan.workloads.len(), 3);
    }

    #[test]
    fn explicit_target_builds_single_workload() {
        let cli = Cli::parse_from(["diskbench", "/tmp/bench.dat", "--block-size", "8192"]);
        let plan = cli.build_plan().unwrap();
        assert_eq!(plan.workloads.len(), 1);
        assert_eq!(plan.workloads[0].block_size, 8192);
    }

    #[test]
    fn missing_target_without_quick_is_an_error() {
        let cli = Cli::parse_from(["diskbench"]);
        assert!(cli.build_plan().is_err());
    }

    #[test]
    fn verbose_count_maps_to_log_level() {
        let cli = Cli::parse_from(["diskbench", "--quick", "/mnt/test", "-vv"]);
        assert_eq!(cli.log_level(), log::LevelFilter::Debug);
    }
}
