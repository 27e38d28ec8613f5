//! Completion loop (C6)
//!
//! Owns submission and reaping of I/O for one trial's warmup + measured
//! phases: primes the queue, then loops submitting/polling/recording until
//! the measured window elapses, then drains outstanding operations.
//!
//! Fill queue → poll completions → check duration, specialized into the
//! warmup→measured two-phase contract this component names; resource
//! sampling and think-time delays have no counterpart here and are not
//! part of this loop. The wait step polls with `submit_and_wait` and a
//! short timeout, then drains whatever the completion queue holds.

use crate::buffer::BufferPool;
use crate::config::AccessPattern;
use crate::distribution::{sequential::SequentialDistribution, uniform::UniformDistribution, Distribution};
use crate::error::{BenchError, ErrorTally};
use crate::histogram::LatencyHistogram;
use crate::ioengine::{IOEngine, IOOperation, OperationType};
use crate::slot::SlotTable;
use crate::timeseries::TimeSeriesRing;
use crate::util::fast_time::FastInstant;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Cache-line padded byte/op counters published by the completion thread and
/// read by the progress publisher without a lock.
#[repr(align(64))]
pub struct Totals {
    bytes: AtomicU64,
    ops: AtomicU64,
}

impl Default for Totals {
    fn default() -> Self {
        Self::new()
    }
}

impl Totals {
    pub fn new() -> Self {
        Self {
            bytes: AtomicU64::new(0),
            ops: AtomicU64::new(0),
        }
    }

    fn add(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Release);
        self.ops.fetch_add(1, Ordering::Release);
    }

    pub fn snapshot(&self) -> (u64, u64) {
        (
            self.bytes.load(Ordering::Acquire),
            self.ops.load(Ordering::Acquire),
        )
    }
}

pub struct CompletionLoopConfig {
    pub fd: RawFd,
    pub block_size: u32,
    pub queue_depth: usize,
    pub write_percent: u8,
    pub num_blocks: u64,
    pub access_pattern: AccessPattern,
    pub warmup: Duration,
    pub measured: Duration,
    pub seed: u64,
    pub collect_time_series: bool,
}

pub struct CompletionLoopOutcome {
    pub histogram: LatencyHistogram,
    pub time_series: Option<TimeSeriesRing>,
    pub total_bytes: u64,
    pub total_ops: u64,
    pub total_reads: u64,
    pub total_writes: u64,
    pub errors: ErrorTally,
    pub wall_duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Warmup,
    Measuring,
}

fn make_distribution(pattern: AccessPattern, seed: u64, num_blocks: u64) -> Box<dyn Distribution> {
    match pattern {
        AccessPattern::Sequential => Box::new(SequentialDistribution::new_at(seed % num_blocks.max(1))),
        AccessPattern::Random => Box::new(UniformDistribution::with_seed(seed)),
    }
}

/// Configure slot `index` with a freshly generated offset and submit it.
fn submit_one(
    engine: &mut dyn IOEngine,
    cfg: &CompletionLoopConfig,
    buffer_pool: &BufferPool,
    slots: &mut SlotTable,
    generators: &mut [Box<dyn Distribution>],
    write_rng: &mut Xoshiro256PlusPlus,
    index: usize,
) -> Result<(), BenchError> {
    let is_write = write_rng.gen_range(0..100) < cfg.write_percent;
    let block = generators[index].next_block(cfg.num_blocks.max(1));
    let offset = block * cfg.block_size as u64;
    let buf = buffer_pool.buffer(index);
    if is_write {
        for (i, b) in buf.iter_mut().enumerate() {
            *b = ((offset as usize + i) % 256) as u8;
        }
    }
    let submit_ticks = FastInstant::now().ticks();
    slots.configure(index, buf.as_mut_ptr(), offset, cfg.block_size, is_write, submit_ticks);
    let op = IOOperation {
        op_type: if is_write { OperationType::Write } else { OperationType::Read },
        target_fd: cfg.fd,
        offset,
        buffer: buf.as_mut_ptr(),
        length: cfg.block_size as usize,
        user_data: slots.get(index).token(),
    };
    let result = engine.submit(op).map_err(|e| BenchError::SubmitFailed(e.to_string()));
    if result.is_err() {
        // A submit that fails synchronously leaves the slot idle rather
        // than stuck in-flight with no completion ever coming.
        slots.recycle(index);
    }
    result
}

/// Run one trial's completion loop to exhaustion.
///
/// `cancel` is checked once per main-loop iteration for cooperative
/// cancellation; `totals` is release-stored after every measured-phase
/// completion so a caller (the trial driver's progress publisher) can
/// acquire-load `total_bytes`/`total_ops` concurrently. `measuring` is
/// release-stored the instant the loop transitions from warmup into the
/// measured window, for the same cross-thread visibility reason.
pub fn run(
    engine: &mut dyn IOEngine,
    cfg: &CompletionLoopConfig,
    buffer_pool: &BufferPool,
    cancel: &AtomicBool,
    totals: &Totals,
    measuring: &AtomicBool,
) -> Result<CompletionLoopOutcome, BenchError> {
    let mut slots = SlotTable::new(cfg.queue_depth);
    let mut generators: Vec<Box<dyn Distribution>> = (0..cfg.queue_depth)
        .map(|i| make_distribution(cfg.access_pattern, cfg.seed ^ i as u64, cfg.num_blocks))
        .collect();
    let mut write_rng = Xoshiro256PlusPlus::seed_from_u64(cfg.seed ^ 0xD15C);

    let mut histogram = LatencyHistogram::new(1000.0);
    let mut time_series = if cfg.collect_time_series {
        Some(TimeSeriesRing::new(cfg.measured.as_secs_f64(), 1_000_000_000.0))
    } else {
        None
    };

    let mut errors = ErrorTally::default();
    let mut total_bytes = 0u64;
    let mut total_ops = 0u64;
    let mut total_reads = 0u64;
    let mut total_writes = 0u64;

    let trial_start = FastInstant::now();
    let warmup_ticks = (cfg.warmup.as_secs_f64() * 1_000_000_000.0) as u64;
    let total_ticks = ((cfg.warmup + cfg.measured).as_secs_f64() * 1_000_000_000.0) as u64;
    let mut measuring_entered = false;
    let mut measure_start_ticks = 0u64;

    // Priming: fill the queue before entering the main loop.
    for index in 0..cfg.queue_depth {
        if submit_one(engine, cfg, buffer_pool, &mut slots, &mut generators, &mut write_rng, index).is_err() {
            errors.submit_failed += 1;
        }
    }

    while FastInstant::now().ticks() - trial_start.ticks() < total_ticks {
        if cancel.load(Ordering::Relaxed) {
            break;
        }

        let completions = engine
            .poll_completions()
            .map_err(|e| BenchError::CompletionFailed(e.to_string()))?;

        let now_ticks = FastInstant::now().ticks();
        let elapsed = now_ticks - trial_start.ticks();
        let phase = if elapsed < warmup_ticks {
            Phase::Warmup
        } else {
            Phase::Measuring
        };

        if phase == Phase::Measuring && !measuring_entered {
            // Zero-before-record rule: measured-phase stats start from a
            // clean slate, discarding anything warmup recorded.
            histogram = LatencyHistogram::new(1000.0);
            if let Some(ring) = &mut time_series {
                *ring = TimeSeriesRing::new(cfg.measured.as_secs_f64(), 1_000_000_000.0);
            }
            total_bytes = 0;
            total_ops = 0;
            total_reads = 0;
            total_writes = 0;
            measuring_entered = true;
            measure_start_ticks = now_ticks;
            measuring.store(true, Ordering::Release);
        }

        for completion in completions {
            let index = completion.user_data as usize;
            let submit_ticks = slots.mark_completed(index);
            let is_write = slots.get(index).is_write;

            match completion.result {
                Ok(bytes) => {
                    if phase == Phase::Measuring {
                        let latency_ticks = now_ticks.saturating_sub(submit_ticks);
                        histogram.record(latency_ticks);
                        if let Some(ring) = &time_series {
                            ring.record(now_ticks - measure_start_ticks, bytes as u64, is_write);
                        }
                        total_bytes += bytes as u64;
                        total_ops += 1;
                        if is_write {
                            total_writes += 1;
                        } else {
                            total_reads += 1;
                        }
                        totals.add(bytes as u64);
                    }

                    slots.recycle(index);
                    if FastInstant::now().ticks() - trial_start.ticks() < total_ticks
                        && !cancel.load(Ordering::Relaxed)
                        && submit_one(engine, cfg, buffer_pool, &mut slots, &mut generators, &mut write_rng, index).is_err()
                    {
                        errors.submit_failed += 1;
                    }
                }
                Err(_) => {
                    // No resubmit: a failed completion records an error and
                    // the slot stays idle rather than retrying immediately.
                    errors.completion_failed += 1;
                    slots.recycle(index);
                }
            }
        }
    }

    if let Some(ring) = &time_series {
        ring.flush();
    }

    // Drain: give outstanding operations a bounded window to finish.
    let drain_deadline = FastInstant::now();
    let drain_budget_ticks = 2_000_000_000u64; // 2s
    loop {
        let outstanding: Vec<usize> = slots.outstanding().collect();
        if outstanding.is_empty() {
            break;
        }
        if FastInstant::now().ticks() - drain_deadline.ticks() > drain_budget_ticks {
            errors.abandoned_on_drain += outstanding.len() as u64;
            for idx in outstanding {
                slots.recycle(idx);
            }
            break;
        }
        match engine.poll_completions() {
            Ok(completions) => {
                for completion in completions {
                    let index = completion.user_data as usize;
                    slots.mark_completed(index);
                    slots.recycle(index);
                }
            }
            Err(_) => {
                errors.completion_failed += 1;
                break;
            }
        }
    }

    let wall_duration = Duration::from_nanos(FastInstant::now().ticks() - trial_start.ticks());

    Ok(CompletionLoopOutcome {
        histogram,
        time_series,
        total_bytes,
        total_ops,
        total_reads,
        total_writes,
        errors,
        wall_duration,
    })
}
