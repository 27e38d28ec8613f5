//! Result reporting
//!
//! Text, JSON, and CSV rendering of `WorkloadSummary`s. The CSV writer is
//! flat, one row per workload summary — this crate's workload/trial model
//! has no per-operation log to stream (latency samples live only inside
//! the histogram), so there's no per-operation CSV granularity to offer.

use crate::result::WorkloadSummary;
use crate::util::time::format_throughput;
use anyhow::Context;
use std::io::Write;
use std::path::Path;

pub mod text;

/// Render every workload's summary to stdout, human-readable.
pub fn print_summaries(summaries: &[WorkloadSummary]) {
    text::print_summaries(summaries);
}

/// Serialize all summaries as JSON and write them to `path`.
pub fn write_json(summaries: &[WorkloadSummary], path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(summaries).context("serializing summaries to JSON")?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

/// Write a flat CSV — one row per workload, with medians only (confidence
/// intervals flattened into `_ci_low`/`_ci_high` columns when present).
pub fn write_csv(summaries: &[WorkloadSummary], path: &Path) -> anyhow::Result<()> {
    let mut file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    writeln!(
        file,
        "access_pattern,block_size,queue_depth,write_percent,trial_count,throughput_bps,throughput_ci_low,throughput_ci_high,iops,p50_us,p99_us,total_errors"
    )?;
    for summary in summaries {
        writeln!(
            file,
            "{},{},{},{},{},{},{},{},{},{},{},{}",
            summary.workload.access_pattern,
            summary.workload.block_size,
            summary.workload.queue_depth,
            summary.workload.write_percent,
            summary.trial_count,
            summary.throughput_bytes_per_sec.median,
            summary.throughput_bytes_per_sec.ci_low.map(|v| v.to_string()).unwrap_or_default(),
            summary.throughput_bytes_per_sec.ci_high.map(|v| v.to_string()).unwrap_or_default(),
            summary.iops.median,
            summary.p50_latency_micros.median,
            summary.p99_latency_micros.median,
            summary.total_errors,
        )?;
    }
    Ok(())
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    format_throughput(bytes as f64).replace("/s", "")
}
