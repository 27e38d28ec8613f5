//! Trial driver (C7)
//!
//! Drives one trial through its explicit phase sequence and publishes
//! coalesced progress while the completion loop runs. The phase machine and
//! the completion loop are kept as separate types rather than fused into one
//! method, so each has a single responsibility and the phase transitions are
//! testable without a real `IOEngine`. The progress publisher coalesces on a
//! fixed interval, same as a polling-interval check against a last-update
//! timestamp, but reports by sending on a bounded channel that drops under
//! backpressure instead of writing straight to stdout.

use crate::completion_loop::{self, CompletionLoopConfig, Totals};
use crate::config::TrialSpec;
use crate::error::{BenchError, ErrorTally};
use crate::histogram::LatencyHistogram;
use crate::ioengine::IOEngine;
use crate::prepare::{self, PrepareResult, PrepareSpec};
use crate::timeseries::TimeSeriesRing;
use crossbeam::channel::{bounded, Receiver, Sender};
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Explicit lifecycle state of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialPhase {
    Created,
    Prepared,
    Warming,
    Measuring,
    Draining,
    Finished,
    Aborting,
}

/// Coalesced progress update, published at roughly 4 Hz.
#[derive(Debug, Clone, Copy)]
pub struct TrialProgress {
    pub phase: TrialPhase,
    pub fraction_complete: f64,
    pub total_bytes: u64,
    pub total_ops: u64,
}

/// Final outcome of a trial.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TrialResult {
    pub trial_index: usize,
    pub total_bytes: u64,
    pub total_ops: u64,
    pub total_reads: u64,
    pub total_writes: u64,
    pub wall_duration: Duration,
    #[serde(skip)]
    pub histogram: Option<Arc<LatencyHistogram>>,
    #[serde(skip)]
    pub time_series: Option<TimeSeriesRing>,
    pub errors: ErrorTally,
    pub cancelled: bool,
}

/// A bounded, drop-on-backpressure progress channel. The publishing side
/// never blocks the completion thread; a slow consumer simply misses updates.
pub fn progress_channel() -> (Sender<TrialProgress>, Receiver<TrialProgress>) {
    bounded(1)
}

/// Drive `spec` to completion against `engine`, publishing progress on
/// `progress_tx` (best-effort — sends are dropped under backpressure) and
/// honoring `cancel` for cooperative cancellation.
pub fn run_trial(
    engine: &mut dyn IOEngine,
    spec: &TrialSpec,
    reuse_existing_files: bool,
    progress_tx: Option<&Sender<TrialProgress>>,
    cancel: &AtomicBool,
) -> Result<TrialResult, BenchError> {
    let mut phase = TrialPhase::Created;

    let prepare_spec = PrepareSpec {
        path: spec.workload.file_path.clone(),
        size: spec.workload.file_size,
        direct_io: true,
        reuse_existing: reuse_existing_files,
    };
    let PrepareResult { path, .. } = prepare::prepare(&prepare_spec)?;
    phase = TrialPhase::Prepared;

    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(&path)
        .map_err(|e| BenchError::PreparationFailed(format!("reopen {}: {e}", path.display())))?;
    let fd = file.as_raw_fd();

    let num_blocks = spec.workload.file_size / spec.workload.block_size as u64;
    let loop_cfg = CompletionLoopConfig {
        fd,
        block_size: spec.workload.block_size,
        queue_depth: spec.workload.queue_depth,
        write_percent: spec.workload.write_percent,
        num_blocks,
        access_pattern: spec.workload.access_pattern,
        warmup: spec.warmup,
        measured: spec.measured,
        seed: spec.workload.seed.unwrap_or(0),
        collect_time_series: spec.collect_time_series,
    };

    let buffer_pool = crate::buffer::BufferPool::new(
        spec.workload.queue_depth,
        spec.workload.block_size as usize,
        4096,
    )
    .map_err(|e| BenchError::ResourceExhausted(e.to_string()))?;

    let totals = Arc::new(Totals::new());
    let measuring = Arc::new(AtomicBool::new(false));
    phase = TrialPhase::Warming;
    publish(progress_tx, phase, 0.0, &totals);

    // The publisher thread polls `totals`/`measuring` at ~4 Hz until the
    // completion loop finishes; it never blocks the completion thread, which
    // only ever does a release-store to either.
    let publisher_cancel = Arc::new(AtomicBool::new(false));
    let total_duration = spec.warmup + spec.measured;
    let publisher_handle = progress_tx.map(|tx| {
        spawn_publisher(
            tx.clone(),
            Arc::clone(&publisher_cancel),
            Arc::clone(&totals),
            Arc::clone(&measuring),
            total_duration,
        )
    });

    let outcome = completion_loop::run(engine, &loop_cfg, &buffer_pool, cancel, &totals, &measuring);

    publisher_cancel.store(true, Ordering::Relaxed);
    if let Some(handle) = publisher_handle {
        let _ = handle.join();
    }

    phase = if cancel.load(Ordering::Relaxed) {
        TrialPhase::Aborting
    } else {
        TrialPhase::Draining
    };
    publish(progress_tx, phase, 0.95, &totals);

    let outcome = outcome?;
    phase = TrialPhase::Finished;
    publish(progress_tx, phase, 1.0, &totals);

    Ok(TrialResult {
        trial_index: spec.trial_index,
        total_bytes: outcome.total_bytes,
        total_ops: outcome.total_ops,
        total_reads: outcome.total_reads,
        total_writes: outcome.total_writes,
        wall_duration: outcome.wall_duration,
        histogram: Some(Arc::new(outcome.histogram)),
        time_series: outcome.time_series,
        errors: outcome.errors,
        cancelled: cancel.load(Ordering::Relaxed),
    })
}

fn publish(tx: Option<&Sender<TrialProgress>>, phase: TrialPhase, fraction: f64, totals: &Totals) {
    if let Some(tx) = tx {
        let (bytes, ops) = totals.snapshot();
        let _ = tx.try_send(TrialProgress {
            phase,
            fraction_complete: fraction,
            total_bytes: bytes,
            total_ops: ops,
        });
    }
}

fn spawn_publisher(
    tx: Sender<TrialProgress>,
    cancel: Arc<AtomicBool>,
    totals: Arc<Totals>,
    measuring: Arc<AtomicBool>,
    total_duration: Duration,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        const INTERVAL: Duration = Duration::from_millis(250); // ~4 Hz
        let start = std::time::Instant::now();
        while !cancel.load(Ordering::Relaxed) {
            std::thread::sleep(INTERVAL);
            let phase = if measuring.load(Ordering::Acquire) {
                TrialPhase::Measuring
            } else {
                TrialPhase::Warming
            };
            let (total_bytes, total_ops) = totals.snapshot();
            let fraction_complete = if total_duration.is_zero() {
                1.0
            } else {
                (start.elapsed().as_secs_f64() / total_duration.as_secs_f64()).min(1.0)
            };
            let _ = tx.try_send(TrialProgress {
                phase,
                fraction_complete,
                total_bytes,
                total_ops,
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AccessPattern, EngineKind, WorkloadSpec};
    use crate::ioengine::mock::MockEngine;
    use tempfile::TempDir;

    fn sample_spec(path: std::path::PathBuf) -> TrialSpec {
        TrialSpec {
            workload: WorkloadSpec {
                access_pattern: AccessPattern::Sequential,
                write_percent: 50,
                block_size: 4096,
                queue_depth: 4,
                file_path: path,
                file_size: 256 * 1024,
                seed: Some(1),
                engine: EngineKind::Mock,
            },
            warmup: Duration::from_millis(0),
            measured: Duration::from_millis(20),
            trial_index: 0,
            collect_time_series: false,
            track_allocations: false,
        }
    }

    #[test]
    fn runs_a_trial_to_finish() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trial.tmp");
        let spec = sample_spec(path);
        let mut engine = MockEngine::new();
        let cancel = AtomicBool::new(false);
        let result = run_trial(&mut engine, &spec, true, None, &cancel).unwrap();
        assert!(result.total_ops > 0);
        assert!(!result.cancelled);
    }

    #[test]
    fn cancel_flag_marks_result_cancelled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trial.tmp");
        let mut spec = sample_spec(path);
        spec.measured = Duration::from_secs(30);
        let mut engine = MockEngine::new();
        let cancel = AtomicBool::new(true);
        let result = run_trial(&mut engine, &spec, true, None, &cancel).unwrap();
        assert!(result.cancelled);
    }
}
