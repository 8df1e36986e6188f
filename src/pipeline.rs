//! The metrics pipeline: periodically (and finally) hands a
//! [`MetricsSnapshot`] to every configured [`Exporter`].
//!
//! `ConsoleExporter` reuses the table-formatting helpers from
//! `percentiles.rs`; `PrometheusExporter` wires `register_metrics`,
//! `metrics_handler`, and `start_metrics_server`-style pieces together,
//! both generalized to take a `Registry`/`MetricsSnapshot` as explicit
//! parameters instead of reading process-global statics.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Response, Server};
use prometheus::{Encoder, Gauge, IntGauge, Opts, Registry, TextEncoder};
use tracing::{error, info};

use crate::errors::ExporterError;
use crate::metrics::MetricsCollector;
use crate::percentiles::Percentile;

/// A sink a [`MetricsPipeline`] hands snapshots to. Errors are logged and
/// swallowed by the pipeline — an exporter can never fail a run.
#[async_trait]
pub trait Exporter: Send + Sync {
    async fn export(&self, snapshot: &crate::metrics::MetricsSnapshot) -> Result<(), ExporterError>;
    fn name(&self) -> &str;
}

/// Pretty-prints a snapshot as a fixed-width table to stdout via `tracing`.
pub struct ConsoleExporter;

#[async_trait]
impl Exporter for ConsoleExporter {
    async fn export(&self, snapshot: &crate::metrics::MetricsSnapshot) -> Result<(), ExporterError> {
        let percentile_cols: Vec<(Percentile, u64)> = snapshot.latency_percentiles.clone();
        let row = crate::percentiles::format_table_row(&snapshot.title, snapshot.total_count, &percentile_cols);
        info!(
            run_id = %snapshot.run_id,
            success_rate_pct = snapshot.success_rate_pct,
            response_tps = snapshot.response_tps,
            "{row}"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}

/// Gathers a snapshot into a `prometheus::Registry` and serves it at
/// `/metrics` via `hyper`, generalized away from lazy_static singletons.
pub struct PrometheusExporter {
    registry: Registry,
    success_count: IntGauge,
    failure_count: IntGauge,
    success_rate_pct: Gauge,
    response_tps: Gauge,
    p95_latency_ms: Gauge,
}

impl PrometheusExporter {
    pub fn new(namespace: &str) -> Result<Self, ExporterError> {
        let registry = Registry::new();
        let success_count = IntGauge::with_opts(
            Opts::new("success_count", "Total successful executions").namespace(namespace),
        )
        .map_err(|e| ExporterError::ExportFailed {
            exporter: "prometheus".into(),
            message: e.to_string(),
        })?;
        let failure_count = IntGauge::with_opts(
            Opts::new("failure_count", "Total failed executions").namespace(namespace),
        )
        .map_err(|e| ExporterError::ExportFailed {
            exporter: "prometheus".into(),
            message: e.to_string(),
        })?;
        let success_rate_pct = Gauge::with_opts(
            Opts::new("success_rate_pct", "Success rate percentage").namespace(namespace),
        )
        .map_err(|e| ExporterError::ExportFailed {
            exporter: "prometheus".into(),
            message: e.to_string(),
        })?;
        let response_tps = Gauge::with_opts(
            Opts::new("response_tps", "Observed executions per second").namespace(namespace),
        )
        .map_err(|e| ExporterError::ExportFailed {
            exporter: "prometheus".into(),
            message: e.to_string(),
        })?;
        let p95_latency_ms = Gauge::with_opts(
            Opts::new("p95_latency_ms", "p95 success latency in milliseconds").namespace(namespace),
        )
        .map_err(|e| ExporterError::ExportFailed {
            exporter: "prometheus".into(),
            message: e.to_string(),
        })?;

        for metric in [
            Box::new(success_count.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(failure_count.clone()),
            Box::new(success_rate_pct.clone()),
            Box::new(response_tps.clone()),
            Box::new(p95_latency_ms.clone()),
        ] {
            registry.register(metric).map_err(|e| ExporterError::ExportFailed {
                exporter: "prometheus".into(),
                message: e.to_string(),
            })?;
        }

        Ok(Self {
            registry,
            success_count,
            failure_count,
            success_rate_pct,
            response_tps,
            p95_latency_ms,
        })
    }

    pub fn gather_text(&self) -> String {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .expect("prometheus text encoding never fails for well-formed metrics");
        String::from_utf8(buffer).expect("prometheus exposition format is always valid utf8")
    }

    /// Serve `/metrics` on `addr` until the returned task is aborted. The
    /// `Registry` is cloned (cheap, `Arc`-backed internally) so the server
    /// and the exporter's own `export()` calls read the same state.
    pub fn spawn_server(&self, addr: SocketAddr) -> tokio::task::JoinHandle<()> {
        let registry = self.registry.clone();
        tokio::spawn(async move {
            let make_svc = make_service_fn(move |_conn| {
                let registry = registry.clone();
                async move {
                    Ok::<_, Infallible>(service_fn(move |_req| {
                        let registry = registry.clone();
                        async move {
                            let mut buffer = Vec::new();
                            let encoder = TextEncoder::new();
                            let metric_families = registry.gather();
                            if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
                                error!(error = %e, "failed to encode prometheus metrics");
                            }
                            Ok::<_, Infallible>(Response::new(Body::from(buffer)))
                        }
                    }))
                }
            });
            if let Err(e) = Server::bind(&addr).serve(make_svc).await {
                error!(error = %e, "metrics server failed");
            }
        })
    }
}

#[async_trait]
impl Exporter for PrometheusExporter {
    async fn export(&self, snapshot: &crate::metrics::MetricsSnapshot) -> Result<(), ExporterError> {
        self.success_count.set(snapshot.success_count as i64);
        self.failure_count.set(snapshot.failure_count as i64);
        self.success_rate_pct.set(snapshot.success_rate_pct);
        self.response_tps.set(snapshot.response_tps);
        if let Some(p95) = snapshot.success_percentile_ms(Percentile::P95) {
            self.p95_latency_ms.set(p95);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "prometheus"
    }
}

/// Ticks every `interval`, handing the collector's current snapshot to
/// every exporter, and does one final export when told the run is over.
pub struct MetricsPipeline {
    exporters: Vec<Arc<dyn Exporter>>,
    interval: Duration,
}

impl MetricsPipeline {
    pub fn new(exporters: Vec<Arc<dyn Exporter>>, interval: Duration) -> Self {
        Self { exporters, interval }
    }

    async fn export_once(&self, collector: &MetricsCollector) {
        let snapshot = collector.snapshot(None);
        for exporter in &self.exporters {
            if let Err(e) = exporter.export(&snapshot).await {
                error!(exporter = exporter.name(), error = %e, "exporter failed, continuing");
            }
        }
    }

    /// Same as `export_once`, but the snapshot's title is stamped so
    /// exporters (and anyone reading their output) can tell this was the
    /// run's closing snapshot rather than a mid-run tick.
    async fn export_final(&self, collector: &MetricsCollector) {
        let mut snapshot = collector.snapshot(None);
        snapshot.title = format!("{} (final)", snapshot.title);
        for exporter in &self.exporters {
            if let Err(e) = exporter.export(&snapshot).await {
                error!(exporter = exporter.name(), error = %e, "exporter failed, continuing");
            }
        }
    }

    /// Run periodic exports until `stop` resolves, then export one final
    /// snapshot — the run always gets a last export even if it stops
    /// between periodic ticks.
    pub async fn run_until<F>(&self, collector: Arc<MetricsCollector>, stop: F)
    where
        F: std::future::Future<Output = ()>,
    {
        tokio::pin!(stop);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    self.export_once(&collector).await;
                }
                _ = &mut stop => {
                    self.export_final(&collector).await;
                    return;
                }
            }
        }
    }
}
