//! A programmable load-generation engine.
//!
//! Given a [`task::Task`] and a [`load_pattern::LoadPattern`] describing how
//! target throughput should vary over wall-clock time, [`engine::ExecutionEngine`]
//! drives the task at the prescribed rate, records per-execution latency and
//! outcome in a [`metrics::MetricsCollector`], and hands periodic/final
//! snapshots to a [`pipeline::MetricsPipeline`] of [`pipeline::Exporter`]s.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod adaptive;
pub mod assertions;
pub mod cli;
pub mod config;
pub mod context;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod load_pattern;
pub mod logging;
pub mod metrics;
pub mod percentiles;
pub mod pipeline;
pub mod rate_controller;
pub mod task;
pub mod utils;

pub use context::RunContext;
pub use engine::{EngineBuilder, ExecutionEngine};
pub use errors::{EngineError, ExporterError};
pub use load_pattern::LoadPattern;
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use task::{ExecutionRecord, Outcome, Task, ThreadStrategy};
