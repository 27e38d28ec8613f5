//! Time-series ring (C4)
//!
//! Fixed-capacity, preallocated per-second counters covering the measured
//! phase plus a small margin for clock drift between the completion thread
//! and the trial driver's deadline check. Uses the same cache-line-aligned
//! atomic counter idiom as the slot table and histogram, applied here to
//! one entry per wall-clock second instead of one entry per latency bucket.

use std::sync::atomic::{AtomicU64, Ordering};

#[repr(align(64))]
struct SecondBucket {
    bytes: AtomicU64,
    operations: AtomicU64,
}

impl SecondBucket {
    fn new() -> Self {
        Self {
            bytes: AtomicU64::new(0),
            operations: AtomicU64::new(0),
        }
    }
}

/// One second's worth of throughput, read back via `snapshot`.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct SecondSample {
    pub bytes: u64,
    pub operations: u64,
}

/// Preallocated ring of per-second samples, sized to `ceil(measured_seconds) + 5`
/// entries so a trial's completion thread never needs to grow it mid-measurement.
pub struct TimeSeriesRing {
    buckets: Vec<SecondBucket>,
    ticks_per_second: f64,
}

impl TimeSeriesRing {
    pub fn new(measured_seconds: f64, ticks_per_second: f64) -> Self {
        let capacity = measured_seconds.ceil() as usize + 5;
        let buckets = (0..capacity.max(1)).map(|_| SecondBucket::new()).collect();
        Self {
            buckets,
            ticks_per_second,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    fn second_index(&self, elapsed_ticks: u64) -> Option<usize> {
        let seconds = (elapsed_ticks as f64 / self.ticks_per_second) as usize;
        if seconds < self.buckets.len() {
            Some(seconds)
        } else {
            None
        }
    }

    /// Record one completed operation at `elapsed_ticks` since the measured
    /// phase began. Completions landing past the ring's capacity (a trial
    /// running long due to scheduling jitter) are dropped rather than
    /// panicking or reallocating.
    pub fn record(&self, elapsed_ticks: u64, bytes: u64, _is_write: bool) {
        if let Some(idx) = self.second_index(elapsed_ticks) {
            let bucket = &self.buckets[idx];
            bucket.bytes.fetch_add(bytes, Ordering::Relaxed);
            bucket.operations.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Store-fence so a reader who observes the trial's `Finished` phase
    /// transition also observes every prior `record` call.
    pub fn flush(&self) {
        std::sync::atomic::fence(Ordering::Release);
    }

    /// Read every second's sample in order.
    pub fn snapshot(&self) -> Vec<SecondSample> {
        self.buckets
            .iter()
            .map(|b| SecondSample {
                bytes: b.bytes.load(Ordering::Acquire),
                operations: b.operations.load(Ordering::Acquire),
            })
            .collect()
    }
}
