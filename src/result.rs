//! Result assembler (C9)
//!
//! Aggregates the `TrialResult`s a `WorkloadSpec` produced into one summary:
//! per-trial metrics, a cross-trial median, and (optionally) a bootstrap
//! confidence interval around that median. Collects every trial's metrics
//! and merges them into one aggregate while keeping the per-trial detail
//! available, the same "collect, then merge, then keep the detail around"
//! shape used for folding concurrent workers' stats within a single trial,
//! generalized here to folding repeated trials of the same workload.

use crate::config::WorkloadSpec;
use crate::histogram::LatencyHistogram;
use crate::trial::TrialResult;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// One percentile/metric value plus its bootstrap confidence interval.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WithConfidenceInterval {
    pub median: f64,
    pub ci_low: Option<f64>,
    pub ci_high: Option<f64>,
}

impl WithConfidenceInterval {
    fn point(median: f64) -> Self {
        Self {
            median,
            ci_low: None,
            ci_high: None,
        }
    }
}

/// Assembled view of all trials run for one `WorkloadSpec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadSummary {
    pub workload: WorkloadSpec,
    pub trial_count: usize,
    pub throughput_bytes_per_sec: WithConfidenceInterval,
    pub iops: WithConfidenceInterval,
    pub p50_latency_micros: WithConfidenceInterval,
    pub p99_latency_micros: WithConfidenceInterval,
    pub total_errors: u64,
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = values.len();
    if n == 0 {
        0.0
    } else if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Resample `values` with replacement `iterations` times, taking the median
/// of each resample, and return the 2.5th/97.5th percentile of the resulting
/// distribution of medians (a percentile bootstrap CI).
fn bootstrap_ci(values: &[f64], iterations: usize, seed: u64) -> Option<(f64, f64)> {
    if values.len() < 2 || iterations == 0 {
        return None;
    }
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut resample_medians = Vec::with_capacity(iterations);
    let mut scratch = vec![0.0f64; values.len()];
    for _ in 0..iterations {
        for slot in scratch.iter_mut() {
            *slot = values[rng.gen_range(0..values.len())];
        }
        resample_medians.push(median(&mut scratch));
    }
    resample_medians.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let low_idx = ((0.025 * resample_medians.len() as f64).floor() as usize)
        .min(resample_medians.len() - 1);
    let high_idx = ((0.975 * resample_medians.len() as f64).ceil() as usize)
        .min(resample_medians.len() - 1);
    Some((resample_medians[low_idx], resample_medians[high_idx]))
}

fn summarize_metric(values: &[f64], bootstrap_iterations: usize, seed: u64) -> WithConfidenceInterval {
    let mut sorted = values.to_vec();
    let med = median(&mut sorted);
    match bootstrap_ci(values, bootstrap_iterations, seed) {
        Some((low, high)) => WithConfidenceInterval {
            median: med,
            ci_low: Some(low),
            ci_high: Some(high),
        },
        None => WithConfidenceInterval::point(med),
    }
}

/// Fold `trials` (all measuring the same `workload`) into one summary.
///
/// `bootstrap_iterations == 0` (or `compute_cis == false` upstream) disables
/// the resampling pass; the summary then reports point medians only.
pub fn summarize(
    workload: &WorkloadSpec,
    trials: &[TrialResult],
    bootstrap_iterations: usize,
    seed: u64,
) -> WorkloadSummary {
    let throughputs: Vec<f64> = trials
        .iter()
        .map(|t| {
            let secs = t.wall_duration.as_secs_f64();
            if secs > 0.0 {
                t.total_bytes as f64 / secs
            } else {
                0.0
            }
        })
        .collect();
    let iops: Vec<f64> = trials
        .iter()
        .map(|t| {
            let secs = t.wall_duration.as_secs_f64();
            if secs > 0.0 {
                t.total_ops as f64 / secs
            } else {
                0.0
            }
        })
        .collect();

    let p50s: Vec<f64> = trials
        .iter()
        .filter_map(|t| t.histogram.as_ref())
        .map(|h| h.percentiles_micros(&[50.0])[0].1)
        .collect();
    let p99s: Vec<f64> = trials
        .iter()
        .filter_map(|t| t.histogram.as_ref())
        .map(|h| h.percentiles_micros(&[99.0])[0].1)
        .collect();

    let total_errors: u64 = trials
        .iter()
        .map(|t| t.errors.submit_failed + t.errors.completion_failed + t.errors.abandoned_on_drain)
        .sum();

    WorkloadSummary {
        workload: workload.clone(),
        trial_count: trials.len(),
        throughput_bytes_per_sec: summarize_metric(&throughputs, bootstrap_iterations, seed ^ 0x7A16),
        iops: summarize_metric(&iops, bootstrap_iterations, seed ^ 0x10D5),
        p50_latency_micros: summarize_metric(&p50s, bootstrap_iterations, seed ^ 0x5014),
        p99_latency_micros: summarize_metric(&p99s, bootstrap_iterations, seed ^ 0x9914),
        total_errors,
    }
}
