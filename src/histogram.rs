//! Latency histogram (C3)
//!
//! Logarithmic-bucket histogram over raw tick counts. `record` is O(1) and
//! wait-free: one bucket increment, one running-sum add, a relaxed min/max
//! compare-exchange loop. One bucket per octave over raw ticks rather than
//! several buckets per octave over microseconds, since tick resolution
//! varies by platform and the bucket count is fixed independent of it.

use std::sync::atomic::{AtomicU64, Ordering};

/// Buckets span `2^0 .. 2^MAX_BUCKET` ticks; anything larger spills into the
/// last bucket.
pub const MAX_BUCKET: usize = 40;
pub const NUM_BUCKETS: usize = MAX_BUCKET + 1;

#[inline]
fn bucket_for(latency_ticks: u64) -> usize {
    let v = latency_ticks.max(1);
    let log2 = 63 - v.leading_zeros() as usize;
    log2.min(MAX_BUCKET)
}

/// Lower bound (in ticks) of a bucket, used for percentile interpolation.
#[inline]
fn bucket_floor(bucket: usize) -> u64 {
    if bucket == 0 {
        0
    } else {
        1u64 << bucket
    }
}

#[repr(align(64))]
struct AlignedBucket(AtomicU64);

/// Wait-free latency histogram over raw tick values.
///
/// `ticks_per_microsecond` is captured once at construction (from the same
/// clock source used to stamp submit/completion times) so percentiles can be
/// reported in both ticks and microseconds without re-deriving the conversion
/// at read time.
pub struct LatencyHistogram {
    buckets: Vec<AlignedBucket>,
    count: AtomicU64,
    sum: AtomicU64,
    min: AtomicU64,
    max: AtomicU64,
    ticks_per_microsecond: f64,
}

impl LatencyHistogram {
    pub fn new(ticks_per_microsecond: f64) -> Self {
        let buckets = (0..NUM_BUCKETS)
            .map(|_| AlignedBucket(AtomicU64::new(0)))
            .collect();
        Self {
            buckets,
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            min: AtomicU64::new(u64::MAX),
            max: AtomicU64::new(0),
            ticks_per_microsecond,
        }
    }

    /// Record one latency sample. Called only from the completion thread
    /// that owns this histogram — no synchronization needed beyond atomics
    /// for visibility to concurrent readers (progress publisher, final assembler).
    pub fn record(&self, latency_ticks: u64) {
        let bucket = bucket_for(latency_ticks);
        self.buckets[bucket].0.fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add(latency_ticks, Ordering::Relaxed);

        let mut cur = self.min.load(Ordering::Relaxed);
        while latency_ticks < cur {
            match self
                .min
                .compare_exchange_weak(cur, latency_ticks, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(actual) => cur = actual,
            }
        }

        let mut cur = self.max.load(Ordering::Relaxed);
        while latency_ticks > cur {
            match self
                .max
                .compare_exchange_weak(cur, latency_ticks, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(actual) => cur = actual,
            }
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum_ticks(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn min_ticks(&self) -> u64 {
        let v = self.min.load(Ordering::Relaxed);
        if v == u64::MAX { 0 } else { v }
    }

    pub fn max_ticks(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }

    pub fn mean_ticks(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum_ticks() as f64 / count as f64
        }
    }

    fn ticks_to_micros(&self, ticks: f64) -> f64 {
        if self.ticks_per_microsecond <= 0.0 {
            ticks
        } else {
            ticks / self.ticks_per_microsecond
        }
    }

    /// Estimate the tick value at percentile `p` (0.0..=100.0) using
    /// geometric-midpoint interpolation within the containing bucket: the
    /// estimate is `sqrt(bucket_floor * bucket_ceiling)` rather than the
    /// arithmetic midpoint, matching the exponential spacing of the buckets.
    pub fn percentile_ticks(&self, p: f64) -> u64 {
        let count = self.count();
        if count == 0 {
            return 0;
        }
        let target = ((p / 100.0) * count as f64).ceil() as u64;
        let target = target.max(1);

        let mut cumulative = 0u64;
        for (bucket, entry) in self.buckets.iter().enumerate() {
            let c = entry.0.load(Ordering::Relaxed);
            cumulative += c;
            if cumulative >= target {
                let floor = bucket_floor(bucket).max(1);
                let ceil = if bucket == MAX_BUCKET {
                    floor.saturating_mul(2)
                } else {
                    bucket_floor(bucket + 1)
                };
                let geo_mid = ((floor as f64) * (ceil as f64)).sqrt();
                return geo_mid.round() as u64;
            }
        }
        self.max_ticks()
    }

    /// Percentiles in microseconds for each requested percentile.
    pub fn percentiles_micros(&self, ps: &[f64]) -> Vec<(f64, f64)> {
        ps.iter()
            .map(|&p| (p, self.ticks_to_micros(self.percentile_ticks(p) as f64)))
            .collect()
    }

    /// Bucket-wise sum of `other` into `self`. Used to fold a per-trial
    /// histogram into a cross-trial aggregate.
    pub fn merge(&self, other: &LatencyHistogram) {
        for (a, b) in self.buckets.iter().zip(other.buckets.iter()) {
            let v = b.0.load(Ordering::Relaxed);
            if v != 0 {
                a.0.fetch_add(v, Ordering::Relaxed);
            }
        }
        self.count.fetch_add(other.count(), Ordering::Relaxed);
        self.sum.fetch_add(other.sum_ticks(), Ordering::Relaxed);

        let other_min = other.min_ticks();
        if other.count() > 0 {
            let mut cur = self.min.load(Ordering::Relaxed);
            while other_min < cur {
                match self.min.compare_exchange_weak(
                    cur,
                    other_min,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => break,
                    Err(actual) => cur = actual,
                }
            }
        }
        let other_max = other.max_ticks();
        let mut cur = self.max.load(Ordering::Relaxed);
        while other_max > cur {
            match self.max.compare_exchange_weak(
                cur,
                other_max,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => cur = actual,
            }
        }
    }
}
