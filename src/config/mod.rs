//! Benchmark configuration and data model
//!
//! Defines the immutable inputs a trial runs from (`WorkloadSpec`,
//! `TrialSpec`), the set of trials a full run executes (`Plan`), and the
//! small read-only types the engine surfaces about the host (`DriveDetails`).
//! A layered-config idiom, narrowed to the fields the duration-bounded
//! trial model actually uses.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How I/O offsets are chosen within the target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessPattern {
    Sequential,
    Random,
}

impl std::fmt::Display for AccessPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessPattern::Sequential => write!(f, "sequential"),
            AccessPattern::Random => write!(f, "random"),
        }
    }
}

/// Which `IOEngine` backend a trial runs against: only the backends this
/// crate actually implements, plus the `Mock` test double fake-engine
/// scenarios need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineKind {
    Sync,
    IoUring,
    Mock,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Sync => write!(f, "sync"),
            EngineKind::IoUring => write!(f, "io_uring"),
            EngineKind::Mock => write!(f, "mock"),
        }
    }
}

/// Immutable description of one access pattern to measure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadSpec {
    pub access_pattern: AccessPattern,
    /// 0–100: percentage of operations that are writes.
    pub write_percent: u8,
    pub block_size: u32,
    pub queue_depth: usize,
    pub file_path: PathBuf,
    pub file_size: u64,
    pub seed: Option<u64>,
    pub engine: EngineKind,
}

impl WorkloadSpec {
    pub fn validate(&self) -> Result<(), String> {
        if self.write_percent > 100 {
            return Err(format!("write_percent {} exceeds 100", self.write_percent));
        }
        if self.block_size == 0 {
            return Err("block_size must be nonzero".into());
        }
        if self.queue_depth == 0 {
            return Err("queue_depth must be at least 1".into());
        }
        if self.file_size < self.block_size as u64 * self.queue_depth as u64 {
            return Err(format!(
                "file_size {} must be at least block_size ({}) * queue_depth ({})",
                self.file_size, self.block_size, self.queue_depth
            ));
        }
        Ok(())
    }
}

/// One trial: a workload plus its timing and measurement flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialSpec {
    pub workload: WorkloadSpec,
    pub warmup: std::time::Duration,
    pub measured: std::time::Duration,
    pub trial_index: usize,
    pub collect_time_series: bool,
    pub track_allocations: bool,
}

/// An ordered set of trials to run and how to assemble their results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub workloads: Vec<WorkloadSpec>,
    pub trials_per_workload: usize,
    pub warmup: std::time::Duration,
    pub measured: std::time::Duration,
    pub bootstrap_iterations: usize,
    pub compute_cis: bool,
    pub reuse_existing_files: bool,
    pub delete_on_completion: bool,
    pub seed: u64,
}

impl Plan {
    /// The default `--quick` plan: 3 trials per block size, 30s measured,
    /// 5s warmup, {4 KiB, 64 KiB, 1 MiB} block sizes, queue depth 32.
    pub fn quick(drive_root: &std::path::Path, engine: EngineKind, file_size: u64) -> Self {
        let file_path = drive_root.join("DiskBench.tmp");
        let block_sizes = [4 * 1024u32, 64 * 1024, 1024 * 1024];
        let workloads = block_sizes
            .iter()
            .map(|&block_size| WorkloadSpec {
                access_pattern: AccessPattern::Random,
                write_percent: 50,
                block_size,
                queue_depth: 32,
                file_path: file_path.clone(),
                file_size,
                seed: None,
                engine,
            })
            .collect();
        Self {
            workloads,
            trials_per_workload: 3,
            warmup: std::time::Duration::from_secs(5),
            measured: std::time::Duration::from_secs(30),
            bootstrap_iterations: 2000,
            compute_cis: true,
            reuse_existing_files: true,
            delete_on_completion: false,
            seed: 0,
        }
    }

    /// Expand into one `TrialSpec` per (workload, trial index) pair.
    pub fn trial_specs(&self) -> Vec<TrialSpec> {
        let mut specs = Vec::with_capacity(self.workloads.len() * self.trials_per_workload);
        for workload in &self.workloads {
            for trial_index in 0..self.trials_per_workload {
                let mut workload = workload.clone();
                if workload.seed.is_none() {
                    workload.seed = Some(self.seed ^ trial_index as u64);
                }
                specs.push(TrialSpec {
                    workload,
                    warmup: self.warmup,
                    measured: self.measured,
                    trial_index,
                    collect_time_series: false,
                    track_allocations: false,
                });
            }
        }
        specs
    }
}

/// Read-only description of a storage device, surfaced but never
/// persisted or mutated by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveDetails {
    pub label: String,
    pub bus_type: String,
    pub free_space_bytes: u64,
    pub sector_size: u64,
}

/// Interface contract with the out-of-scope shell-extension collaborator.
/// The engine writes this but never reads it back — see `SOFTWARE\DiskBench\ShellExtension`
/// in the original Windows-oriented design; on this crate's Linux target it
/// is realized as an ini-style file under `$XDG_CONFIG_HOME`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellExtensionSettings {
    pub exe_path: PathBuf,
    pub diagnostics_enabled: bool,
    pub log_path: Option<PathBuf>,
}

impl ShellExtensionSettings {
    /// Build the settings this process's invocation implies: its own
    /// executable path, and diagnostics enabled whenever verbose logging is.
    pub fn from_current_process(diagnostics_enabled: bool, log_path: Option<PathBuf>) -> std::io::Result<Self> {
        Ok(Self {
            exe_path: std::env::current_exe()?,
            diagnostics_enabled,
            log_path,
        })
    }

    /// Where the shell extension settings file lives: `$XDG_CONFIG_HOME/diskbench/shell_extension.ini`,
    /// falling back to `~/.config` when `XDG_CONFIG_HOME` isn't set.
    pub fn config_path() -> std::io::Result<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "neither XDG_CONFIG_HOME nor HOME is set"))?;
        Ok(base.join("diskbench").join("shell_extension.ini"))
    }

    /// Serialize as an ini-style file and write it to `config_path()`.
    pub fn write(&self) -> std::io::Result<PathBuf> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut ini = String::new();
        ini.push_str("[ShellExtension]\n");
        ini.push_str(&format!("exe_path={}\n", self.exe_path.display()));
        ini.push_str(&format!("diagnostics_enabled={}\n", self.diagnostics_enabled));
        if let Some(log_path) = &self.log_path {
            ini.push_str(&format!("log_path={}\n", log_path.display()));
        }
        std::fs::write(&path, ini)?;
        Ok(path)
    }
}
