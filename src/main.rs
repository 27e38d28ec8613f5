//! diskbench CLI entry point
//!
//! Parse CLI → build plan → run → report, the single execution mode this
//! crate supports: no service/coordinator launch, no distributed fan-out.

use anyhow::{Context, Result};
use clap::Parser;
use diskbench::api::{BenchmarkEngine, DiskBenchEngine};
use diskbench::cli::Cli;
use diskbench::config::{Plan, ShellExtensionSettings, TrialSpec};
use diskbench::output;
use diskbench::prepare::PrepareSpec;
use diskbench::result::{self, WorkloadSummary};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new().filter_level(cli.log_level()).init();

    println!("diskbench v{}", env!("CARGO_PKG_VERSION"));
    println!("disk I/O micro-benchmark engine");
    println!();

    let plan = match cli.build_plan() {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    };
    log::info!(
        "plan: {} workload(s), {} trial(s) each, warmup={:?}, measured={:?}",
        plan.workloads.len(),
        plan.trials_per_workload,
        plan.warmup,
        plan.measured,
    );

    match ShellExtensionSettings::from_current_process(cli.verbose > 0, None) {
        Ok(settings) => match settings.write() {
            Ok(path) => log::debug!("wrote shell extension settings to {}", path.display()),
            Err(e) => log::warn!("failed to write shell extension settings: {e}"),
        },
        Err(e) => log::warn!("failed to build shell extension settings: {e}"),
    }

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        if let Err(e) = install_sigint_handler(move || cancel.store(true, Ordering::Relaxed)) {
            log::warn!("failed to install SIGINT handler: {e}");
        }
    }

    let mut engine = DiskBenchEngine::new();
    let summaries = match run_plan(&mut engine, &plan, &cancel) {
        Ok(summaries) => summaries,
        Err(e) => {
            engine.dispose();
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    };
    engine.dispose();

    println!();
    output::print_summaries(&summaries);

    if let Some(json_path) = &cli.json {
        output::write_json(&summaries, json_path)
            .with_context(|| format!("writing JSON results to {}", json_path.display()))?;
        println!("\nwrote {}", json_path.display());
    }
    if let Some(csv_path) = &cli.csv {
        output::write_csv(&summaries, csv_path)
            .with_context(|| format!("writing CSV results to {}", csv_path.display()))?;
        println!("wrote {}", csv_path.display());
    }

    if plan.delete_on_completion {
        for workload in &plan.workloads {
            if let Err(e) = std::fs::remove_file(&workload.file_path) {
                log::warn!("failed to delete {}: {e}", workload.file_path.display());
            }
        }
    }

    Ok(())
}

/// Prepare each workload's target file once, then run its trials in order,
/// folding them into one `WorkloadSummary` per workload.
fn run_plan(
    engine: &mut DiskBenchEngine,
    plan: &Plan,
    cancel: &Arc<AtomicBool>,
) -> Result<Vec<WorkloadSummary>> {
    let mut summaries = Vec::with_capacity(plan.workloads.len());

    for workload in &plan.workloads {
        let prepare_spec = PrepareSpec {
            path: workload.file_path.clone(),
            size: workload.file_size,
            direct_io: true,
            reuse_existing: plan.reuse_existing_files,
        };
        let prepared = engine
            .prepare(&prepare_spec)
            .with_context(|| format!("preparing {}", workload.file_path.display()))?;
        log::info!(
            "{}: {} bytes, sector={}/{}, fast_path={}, reused={}",
            prepared.path.display(),
            prepared.final_size,
            prepared.logical_sector_size,
            prepared.physical_sector_size,
            prepared.used_fast_path,
            prepared.was_reused,
        );

        let mut trial_results = Vec::with_capacity(plan.trials_per_workload);
        for trial_index in 0..plan.trials_per_workload {
            if cancel.load(Ordering::Relaxed) {
                log::warn!("cancelled before trial {trial_index}");
                break;
            }
            let mut trial_workload = workload.clone();
            if trial_workload.seed.is_none() {
                trial_workload.seed = Some(plan.seed ^ trial_index as u64);
            }
            let trial_spec = TrialSpec {
                workload: trial_workload,
                warmup: plan.warmup,
                measured: plan.measured,
                trial_index,
                collect_time_series: false,
                track_allocations: false,
            };
            println!(
                "trial {}/{} ({} {}, block_size={}, qd={})...",
                trial_index + 1,
                plan.trials_per_workload,
                workload.access_pattern,
                workload.engine,
                workload.block_size,
                workload.queue_depth,
            );
            let result = engine
                .run_trial(&trial_spec, None, cancel)
                .context("running trial")?;
            trial_results.push(result);
        }

        let bootstrap_iterations = if plan.compute_cis { plan.bootstrap_iterations } else { 0 };
        summaries.push(result::summarize(workload, &trial_results, bootstrap_iterations, plan.seed));
    }

    Ok(summaries)
}

/// Install a `SIGINT` handler that flips the shared cancellation flag so an
/// in-flight trial drains cleanly instead of leaving the target file torn.
fn install_sigint_handler(on_interrupt: impl Fn() + Send + Sync + 'static) -> Result<()> {
    static HANDLER: std::sync::OnceLock<Box<dyn Fn() + Send + Sync>> = std::sync::OnceLock::new();

    extern "C" fn handle_sigint(_signum: libc::c_int) {
        if let Some(handler) = HANDLER.get() {
            handler();
        }
    }

    HANDLER
        .set(Box::new(on_interrupt))
        .map_err(|_| anyhow::anyhow!("signal handler already installed"))?;
    let rc = unsafe { libc::signal(libc::SIGINT, handle_sigint as libc::sighandler_t) };
    if rc == libc::SIG_ERR {
        anyhow::bail!("failed to install SIGINT handler");
    }
    Ok(())
}
