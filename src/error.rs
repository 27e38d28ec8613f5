//! Error taxonomy for the benchmark engine
//!
//! Every error a trial can encounter is one of the kinds below. The completion
//! loop never propagates an error upward; it records one of these and keeps
//! going. Only `PreparationFailed` and `ResourceExhausted` ever surface as an
//! `Err` from `run_trial` — everything else is annotated onto a successful
//! `TrialResult`.

use std::fmt;

/// Typed error kinds surfaced by the engine.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    /// Opening, sizing, or preallocating the target file failed. Fatal for the trial.
    #[error("preparation failed: {0}")]
    PreparationFailed(String),

    /// A single I/O submission failed synchronously.
    #[error("submit failed: {0}")]
    SubmitFailed(String),

    /// A reaped I/O completion reported an error status.
    #[error("completion failed: {0}")]
    CompletionFailed(String),

    /// The caller requested cancellation.
    #[error("cancelled")]
    Cancelled,

    /// Operations were still outstanding after the drain deadline.
    #[error("drain timeout: {abandoned} operation(s) abandoned")]
    DrainTimeout { abandoned: usize },

    /// Buffer or slot-table allocation failed. Fatal.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

/// Result alias used throughout the crate's library surface.
pub type Result<T> = anyhow::Result<T>;

/// Lightweight tag distinguishing the fatal error kinds from diagnostic-only ones.
impl BenchError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BenchError::PreparationFailed(_) | BenchError::ResourceExhausted(_)
        )
    }
}

impl fmt::Display for ErrorTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "submit_failed={} completion_failed={} abandoned_on_drain={}",
            self.submit_failed, self.completion_failed, self.abandoned_on_drain
        )
    }
}

/// Running counts of non-fatal errors recorded over a trial, annotated onto
/// the result rather than raised.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct ErrorTally {
    pub submit_failed: u64,
    pub completion_failed: u64,
    pub abandoned_on_drain: u64,
}
