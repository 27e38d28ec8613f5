//! diskbench — disk I/O micro-benchmark engine
//!
//! Drives a storage device with a controlled workload (sequential or random,
//! read or write, configurable block size and queue depth), collects
//! high-resolution per-operation latency and throughput samples, and reports
//! statistical summaries (percentiles, confidence intervals, time-series).
//!
//! # Architecture
//!
//! - **IO engines**: io_uring (feature-gated), synchronous pread/pwrite, mock
//! - **Offset distributions**: sequential wrap, seeded uniform random
//! - **Lock-free stats**: log2-bucket latency histogram, per-second time series
//! - **Trial state machine**: Created → Prepared → Warming → Measuring →
//!   Draining → Finished, with bounded-SPSC progress publication

pub mod api;
pub mod buffer;
pub mod cli;
pub mod completion_loop;
pub mod config;
pub mod distribution;
pub mod error;
pub mod histogram;
pub mod ioengine;
pub mod output;
pub mod prepare;
pub mod result;
pub mod slot;
pub mod timeseries;
pub mod trial;
pub mod util;

pub use api::{BenchmarkEngine, DiskBenchEngine};
pub use error::{BenchError, Result};
