//! Human-readable text output
//!
//! Boxed header, an operations/throughput/latency section per result. One
//! block per workload rather than one aggregate block, since a `Plan`
//! measures several block sizes/access patterns in one run.

use super::format_bytes;
use crate::result::{WithConfidenceInterval, WorkloadSummary};
use crate::util::time::format_throughput;

pub fn print_summaries(summaries: &[WorkloadSummary]) {
    println!("═══════════════════════════════════════════════════════════");
    println!("                    BENCHMARK RESULTS");
    println!("═══════════════════════════════════════════════════════════");

    for summary in summaries {
        println!();
        println!(
            "{} {} | block_size={} qd={} write%={}",
            summary.workload.engine,
            summary.workload.access_pattern,
            format_bytes(summary.workload.block_size as u64),
            summary.workload.queue_depth,
            summary.workload.write_percent,
        );
        println!("  trials: {}", summary.trial_count);
        println!("  throughput: {}", with_ci(&summary.throughput_bytes_per_sec, format_throughput));
        println!("  iops:       {}", with_ci(&summary.iops, |v| format!("{v:.0}")));
        println!("  p50 latency: {}", with_ci(&summary.p50_latency_micros, |v| format!("{v:.1}us")));
        println!("  p99 latency: {}", with_ci(&summary.p99_latency_micros, |v| format!("{v:.1}us")));
        if summary.total_errors > 0 {
            println!("  errors: {}", summary.total_errors);
        }
    }
    println!();
    println!("═══════════════════════════════════════════════════════════");
}

fn with_ci(value: &WithConfidenceInterval, fmt: impl Fn(f64) -> String) -> String {
    match (value.ci_low, value.ci_high) {
        (Some(low), Some(high)) => format!("{} [{}, {}]", fmt(value.median), fmt(low), fmt(high)),
        _ => fmt(value.median),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AccessPattern, EngineKind, WorkloadSpec};
    use std::path::PathBuf;

    #[test]
    fn with_ci_renders_bracket_when_present() {
        let value = WithConfidenceInterval {
            median: 10.0,
            ci_low: Some(8.0),
            ci_high: Some(12.0),
        };
        let rendered = with_ci(&value, |v| format!("{v:.0}"));
        assert_eq!(rendered, "10 [8, 12]");
    }

    #[test]
    fn print_summaries_does_not_panic_on_empty_input() {
        print_summaries(&[]);
    }

    #[test]
    fn print_summaries_handles_one_entry() {
        let summary = WorkloadSummary {
            workload: WorkloadSpec {
                access_pattern: AccessPattern::Sequential,
                write_percent: 0,
                block_size: 4096,
                queue_depth: 1,
                file_path: PathBuf::from("/tmp/x"),
                file_size: 4096,
                seed: None,
                engine: EngineKind::Sync,
            },
            trial_count: 1,
            throughput_bytes_per_sec: WithConfidenceInterval {
                median: 1.0,
                ci_low: None,
                ci_high: None,
            },
            iops: WithConfidenceInterval {
                median: 1.0,
                ci_low: None,
                ci_high: None,
            },
            p50_latency_micros: WithConfidenceInterval {
                median: 1.0,
                ci_low: None,
                ci_high: None,
            },
            p99_latency_micros: WithConfidenceInterval {
                median: 1.0,
                ci_low: None,
                ci_high: None,
            },
            total_errors: 0,
        };
        print_summaries(&[summary]);
    }
}
