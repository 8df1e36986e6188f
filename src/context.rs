//! Plain-data run context handed to a [`crate::task::Task`] at `init` time.
//!
//! Carries `run_id, start_time, end_time?, task_name, pattern_name,
//! config_kv_map, system_info` — an opaque bag of tagging metadata a
//! `Task` can read, with no behavior of its own.

use std::collections::HashMap;
use std::time::SystemTime;

use uuid::Uuid;

/// Identifying and configuration data for a single engine run. Carries no
/// behavior of its own — a `Task` reads it, the engine constructs it once
/// per run and never mutates it afterward; `end_time` is filled in on a
/// cloned copy once the run completes.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Unique identifier for this run, tagged onto every `MetricsSnapshot`.
    pub run_id: Uuid,

    /// Free-form label surfaced by exporters (e.g. a console table title) —
    /// defaults to `task_name` when not set explicitly.
    pub title: String,

    /// Name of the `Task` implementation driving this run.
    pub task_name: String,

    /// Name of the `LoadPattern` shaping this run's throughput.
    pub pattern_name: String,

    pub start_time: SystemTime,

    /// Set once the engine's `run()` returns; `None` while the run is
    /// in-flight.
    pub end_time: Option<SystemTime>,

    /// Opaque environment tags (OS, architecture, hostname, ...) used only
    /// for tagging emitted metrics — never consulted by engine control
    /// flow.
    pub system_info: HashMap<String, String>,

    /// Arbitrary caller-supplied parameters, analogous to a `config_kv_map`
    /// — opaque string keys used only for tagging.
    pub parameters: HashMap<String, String>,
}

impl RunContext {
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            run_id: Uuid::new_v4(),
            task_name: title.clone(),
            pattern_name: String::new(),
            title,
            start_time: SystemTime::now(),
            end_time: None,
            system_info: default_system_info(),
            parameters: HashMap::new(),
        }
    }

    /// An empty/unknown-variant context with a fresh run id, for tests that
    /// don't care about parameters or a descriptive title.
    pub fn empty() -> Self {
        Self::new("unnamed-run")
    }

    pub fn with_task_name(mut self, task_name: impl Into<String>) -> Self {
        self.task_name = task_name.into();
        self
    }

    pub fn with_pattern_name(mut self, pattern_name: impl Into<String>) -> Self {
        self.pattern_name = pattern_name.into();
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    /// A copy of this context with `end_time` stamped to now — the engine
    /// calls this once `run()` finishes, never mutating the context shared
    /// with in-flight workers.
    pub fn with_ended_now(&self) -> Self {
        let mut ended = self.clone();
        ended.end_time = Some(SystemTime::now());
        ended
    }
}

fn default_system_info() -> HashMap<String, String> {
    let mut info = HashMap::new();
    info.insert("os".to_string(), std::env::consts::OS.to_string());
    info.insert("arch".to_string(), std::env::consts::ARCH.to_string());
    info.insert(
        "available_parallelism".to_string(),
        std::thread::available_parallelism()
            .map(|n| n.get().to_string())
            .unwrap_or_else(|_| "unknown".to_string()),
    );
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_has_unique_run_ids() {
        let a = RunContext::empty();
        let b = RunContext::empty();
        assert_ne!(a.run_id, b.run_id);
    }

    #[test]
    fn parameter_round_trips() {
        let ctx = RunContext::new("smoke-test").with_parameter("env", "staging");
        assert_eq!(ctx.parameter("env"), Some("staging"));
        assert_eq!(ctx.parameter("missing"), None);
    }

    #[test]
    fn new_populates_system_info_and_defaults_task_name_to_title() {
        let ctx = RunContext::new("smoke-test");
        assert_eq!(ctx.task_name, "smoke-test");
        assert!(ctx.system_info.contains_key("os"));
        assert!(ctx.end_time.is_none());
    }

    #[test]
    fn with_ended_now_stamps_end_time_without_mutating_original() {
        let ctx = RunContext::new("smoke-test");
        let ended = ctx.with_ended_now();
        assert!(ctx.end_time.is_none());
        assert!(ended.end_time.is_some());
    }

    #[test]
    fn task_and_pattern_name_builders_round_trip() {
        let ctx = RunContext::new("smoke-test")
            .with_task_name("http-get")
            .with_pattern_name("static-100tps");
        assert_eq!(ctx.task_name, "http-get");
        assert_eq!(ctx.pattern_name, "static-100tps");
    }
}
