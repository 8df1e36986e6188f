//! CLI entry point: wires the CLI flags, an example HTTP [`Task`], the
//! engine, and the console/Prometheus exporters together into a runnable
//! load test. The engine itself (lib.rs and friends) is the subject of this
//! crate; this binary is a thin demonstration of the collaborator contracts,
//! following an environment-variable-driven flow for its own configuration.

use std::env;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

use rust_loadtest::config::{ConfigFile, DefaultThreadPool};
use rust_loadtest::context::RunContext;
use rust_loadtest::engine::EngineBuilder;
use rust_loadtest::errors::EngineError;
use rust_loadtest::task::{FailureCause, Outcome, Task, ThreadStrategy};
use rust_loadtest::{cli, logging};
use rust_loadtest::pipeline::{ConsoleExporter, Exporter, MetricsPipeline, PrometheusExporter};

/// A minimal `Task` that issues one HTTP GET per iteration against a
/// fixed URL, read from the `TARGET_URL` environment variable.
struct HttpGetTask {
    client: reqwest::Client,
    url: String,
}

impl HttpGetTask {
    fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl Task for HttpGetTask {
    async fn execute(&self, _iteration_index: u64, _ctx: &RunContext) -> Outcome {
        match self.client.get(&self.url).send().await {
            Ok(response) if response.status().is_success() => Outcome::success(),
            Ok(response) => Outcome::failure(format!("unexpected status {}", response.status())),
            Err(e) => Outcome::Failure(FailureCause::from_error(e)),
        }
    }

    fn thread_strategy(&self) -> ThreadStrategy {
        ThreadStrategy::Io
    }
}

fn run_id_title(mode: &str) -> String {
    format!("loadgen[{mode}]")
}

async fn run() -> Result<(), EngineError> {
    let args: Vec<String> = env::args().skip(1).collect();
    let parsed = cli::CliArgs::parse(&args)?;

    let config = match env::var("LOADGEN_CONFIG") {
        Ok(path) => ConfigFile::from_path(path)?,
        Err(_) => ConfigFile::default(),
    };
    logging::init(config.observability.structured_logging);

    let pattern = parsed.build_load_pattern()?;
    let mode_label = format!("{:?}", parsed.mode.expect("validated by build_load_pattern"));
    let context = RunContext::new(run_id_title(&mode_label))
        .with_parameter("mode", mode_label);

    let url = env::var("TARGET_URL").unwrap_or_else(|_| "https://httpbin.org/get".to_string());
    let task: Arc<dyn Task> = Arc::new(HttpGetTask::new(url));

    let default_thread_strategy = match config.execution.default_thread_pool {
        DefaultThreadPool::Io => ThreadStrategy::Io,
        DefaultThreadPool::Cpu => ThreadStrategy::Cpu,
    };

    let engine = EngineBuilder::new()
        .task(task)
        .pattern(pattern)
        .context(context)
        .drain_timeout(Duration::from_secs(config.execution.drain_timeout_secs))
        .force_timeout(Duration::from_secs(config.execution.force_timeout_secs))
        .platform_thread_pool_size(config.execution.platform_thread_pool_size)
        .default_thread_strategy(default_thread_strategy)
        .build()?;

    let mut exporters: Vec<Arc<dyn Exporter>> = vec![Arc::new(ConsoleExporter)];
    let mut metrics_server = None;
    if config.observability.metrics_enabled {
        match PrometheusExporter::new("loadgen") {
            Ok(exporter) => {
                let addr: SocketAddr = ([0, 0, 0, 0], 9090).into();
                let exporter = Arc::new(exporter);
                metrics_server = Some(exporter.spawn_server(addr));
                info!(%addr, "serving prometheus metrics");
                exporters.push(exporter);
            }
            Err(e) => error!(error = %e, "failed to start prometheus exporter"),
        }
    }
    let pipeline = MetricsPipeline::new(exporters, Duration::from_secs(5));

    let metrics = engine.metrics();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let pipeline_handle = tokio::spawn(async move {
        pipeline
            .run_until(metrics, async {
                let _ = stop_rx.await;
            })
            .await;
    });

    let snapshot = engine.run().await?;
    let _ = stop_tx.send(());
    let _ = pipeline_handle.await;
    if let Some(handle) = metrics_server {
        handle.abort();
    }

    info!(
        total = snapshot.total_count,
        success = snapshot.success_count,
        failure = snapshot.failure_count,
        success_rate_pct = snapshot.success_rate_pct,
        response_tps = snapshot.response_tps,
        "run complete"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("loadgen: {e}");
            if e.is_fatal_exit() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}
