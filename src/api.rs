//! Public benchmark engine surface
//!
//! `BenchmarkEngine` is the one entry point external callers (the CLI, or an
//! embedding application) drive: prepare a target file, run trials against
//! it, and query read-only drive metadata. A single trait collapsing
//! top-level orchestration so a caller never needs to know about
//! `SlotTable`/`BufferPool`/etc.

use crate::config::{DriveDetails, TrialSpec};
use crate::error::BenchError;
use crate::ioengine::mock::MockEngine;
use crate::ioengine::sync::SyncEngine;
use crate::ioengine::{EngineConfig, IOEngine};
use crate::prepare::{self, PrepareResult, PrepareSpec};
use crate::trial::{self, TrialProgress, TrialResult};
use crossbeam::channel::Sender;
use std::path::Path;
use std::sync::atomic::AtomicBool;

/// Library-level benchmark engine. Owns nothing across calls; each method
/// builds and tears down whatever backend the requested `EngineKind` needs.
pub trait BenchmarkEngine {
    /// Prepare (or reuse) the on-disk file a trial will measure against.
    fn prepare(&mut self, spec: &PrepareSpec) -> Result<PrepareResult, BenchError>;

    /// Run one trial to completion, publishing progress on `progress_tx` if given.
    fn run_trial(
        &mut self,
        spec: &TrialSpec,
        progress_tx: Option<&Sender<TrialProgress>>,
        cancel: &AtomicBool,
    ) -> Result<TrialResult, BenchError>;

    /// Logical sector size of the filesystem backing `path`.
    fn sector_size(&self, path: &Path) -> anyhow::Result<u64>;

    /// Best-effort device details for the filesystem backing `path`.
    fn drive_details(&self, path: &Path) -> anyhow::Result<Option<DriveDetails>>;

    /// Enumerate every drive the host exposes. Conservatively implemented:
    /// only the drive backing the current working directory is reliably
    /// discoverable without elevated privileges or a `/proc/mounts` parse
    /// this crate does not carry.
    fn all_drives(&self) -> anyhow::Result<Vec<DriveDetails>>;

    /// Release any engine-held resources. Idempotent.
    fn dispose(&mut self);
}

/// Default `BenchmarkEngine`, dispatching to the `IOEngine` backend named by
/// each `WorkloadSpec::engine`.
#[derive(Default)]
pub struct DiskBenchEngine {
    disposed: bool,
}

impl DiskBenchEngine {
    pub fn new() -> Self {
        Self { disposed: false }
    }

    fn build_backend(kind: crate::config::EngineKind) -> Box<dyn IOEngine> {
        match kind {
            crate::config::EngineKind::Sync => Box::new(SyncEngine::new()),
            crate::config::EngineKind::Mock => Box::new(MockEngine::new()),
            #[cfg(feature = "io_uring")]
            crate::config::EngineKind::IoUring => Box::new(crate::ioengine::io_uring::IoUringEngine::new()),
            #[cfg(not(feature = "io_uring"))]
            crate::config::EngineKind::IoUring => {
                log::warn!("io_uring feature not built in; falling back to the synchronous engine");
                Box::new(SyncEngine::new())
            }
        }
    }
}

impl BenchmarkEngine for DiskBenchEngine {
    fn prepare(&mut self, spec: &PrepareSpec) -> Result<PrepareResult, BenchError> {
        log::info!("preparing {} ({} bytes)", spec.path.display(), spec.size);
        prepare::prepare(spec)
    }

    fn run_trial(
        &mut self,
        spec: &TrialSpec,
        progress_tx: Option<&Sender<TrialProgress>>,
        cancel: &AtomicBool,
    ) -> Result<TrialResult, BenchError> {
        let mut engine = Self::build_backend(spec.workload.engine);
        let engine_config = EngineConfig {
            queue_depth: spec.workload.queue_depth,
            ..EngineConfig::default()
        };
        engine
            .init(&engine_config)
            .map_err(|e| BenchError::PreparationFailed(format!("engine init: {e}")))?;
        log::info!(
            "running trial {} ({} {}, block_size={}, qd={})",
            spec.trial_index,
            spec.workload.access_pattern,
            spec.workload.engine,
            spec.workload.block_size,
            spec.workload.queue_depth,
        );
        let result = trial::run_trial(engine.as_mut(), spec, true, progress_tx, cancel);
        let _ = engine.cleanup();
        result
    }

    fn sector_size(&self, path: &Path) -> anyhow::Result<u64> {
        prepare::sector_size(path)
    }

    fn drive_details(&self, path: &Path) -> anyhow::Result<Option<DriveDetails>> {
        let metadata = std::fs::metadata(path);
        if metadata.is_err() {
            return Ok(None);
        }
        let sector_size = prepare::sector_size(path).unwrap_or(512);
        let free_space_bytes = statvfs_free_space(path).unwrap_or(0);
        Ok(Some(DriveDetails {
            label: path.display().to_string(),
            bus_type: "unknown".to_string(),
            free_space_bytes,
            sector_size,
        }))
    }

    fn all_drives(&self) -> anyhow::Result<Vec<DriveDetails>> {
        let cwd = std::env::current_dir()?;
        Ok(self.drive_details(&cwd)?.into_iter().collect())
    }

    fn dispose(&mut self) {
        self.disposed = true;
    }
}

fn statvfs_free_space(path: &Path) -> Option<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return None;
    }
    Some(stat.f_bavail as u64 * stat.f_frsize as u64)
}
