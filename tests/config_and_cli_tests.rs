//! Config-file loading from a real path (exercises `tempfile`) and a CLI
//! flags round trip into a buildable engine. `serial_test` guards the one
//! test here that relies on exclusive use of `available_parallelism()` for
//! its platform-thread-pool sizing assertion.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::NamedTempFile;

use rust_loadtest::cli::CliArgs;
use rust_loadtest::config::ConfigFile;
use rust_loadtest::context::RunContext;
use rust_loadtest::engine::EngineBuilder;
use rust_loadtest::task::{Outcome, Task};

struct NoopTask;

#[async_trait]
impl Task for NoopTask {
    async fn execute(&self, _iteration_index: u64, _ctx: &RunContext) -> Outcome {
        Outcome::success()
    }
}

#[test]
fn config_file_loads_from_disk() {
    let mut file = NamedTempFile::new().expect("failed to create temp config file");
    writeln!(
        file,
        "execution:\n  drain_timeout_secs: 5\n  force_timeout_secs: 15\nobservability:\n  metrics_enabled: false\n"
    )
    .unwrap();

    let config = ConfigFile::from_path(file.path()).unwrap();
    assert_eq!(config.execution.drain_timeout_secs, 5);
    assert_eq!(config.execution.force_timeout_secs, 15);
    assert!(!config.observability.metrics_enabled);
}

#[test]
fn config_file_from_missing_path_is_a_validation_error() {
    let result = ConfigFile::from_path("/nonexistent/loadgen-config.yaml");
    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
#[serial_test::serial]
async fn cli_flags_build_a_runnable_engine_with_auto_sized_platform_pool() {
    let args: Vec<String> = ["--mode", "static", "--tps", "150", "--duration", "100ms"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let parsed = CliArgs::parse(&args).unwrap();
    let pattern = parsed.build_load_pattern().unwrap();

    let engine = EngineBuilder::new()
        .task(Arc::new(NoopTask) as Arc<dyn Task>)
        .pattern(pattern)
        .drain_timeout(Duration::from_secs(1))
        .force_timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    let snapshot = engine.run().await.unwrap();
    assert!(snapshot.total_count > 0);
}
