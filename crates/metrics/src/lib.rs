//! Metrics and tracing setup for driftkv.
//!
//! Provides a global [`NodeMetrics`] singleton backed by the `prometheus`
//! crate, plus an optional lightweight HTTP server for Prometheus scraping.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::net::SocketAddr;
use std::sync::OnceLock;

// ────────────────────────── Tracing ──────────────────────────

/// Initialize the tracing subscriber with env-filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

// ────────────────────────── Prometheus metrics ──────────────────────────

static METRICS: OnceLock<NodeMetrics> = OnceLock::new();

/// Retrieve (or lazily create) the global metrics singleton.
pub fn metrics() -> &'static NodeMetrics {
    METRICS.get_or_init(NodeMetrics::new)
}

/// All Prometheus metrics for a driftkv node.
pub struct NodeMetrics {
    pub registry: Registry,

    // ── Merge engine ──
    pub patches_received: IntCounter,
    pub patches_applied: IntCounter,
    pub patches_stale: IntCounter,

    // ── API ──
    pub requests: IntCounterVec,

    // ── Anti-entropy ──
    pub gossip_rounds: IntCounter,
    pub gossip_sent: IntCounter,
    pub gossip_failures: IntCounter,
    pub gossip_latency_secs: Histogram,

    // ── Store state ──
    pub store_keys: IntGauge,
    pub logical_clock: IntGauge,
}

// Manual Debug impl because prometheus types don't derive Debug.
impl std::fmt::Debug for NodeMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeMetrics").finish_non_exhaustive()
    }
}

/// Histogram buckets (seconds) for gossip push latency.
const LATENCY_BUCKETS: &[f64] = &[0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0];

fn counter(name: &str, help: &str) -> IntCounter {
    IntCounter::with_opts(Opts::new(name, help)).expect("valid counter opts")
}

fn gauge(name: &str, help: &str) -> IntGauge {
    IntGauge::with_opts(Opts::new(name, help)).expect("valid gauge opts")
}

impl NodeMetrics {
    fn new() -> Self {
        let registry = Registry::new();

        let patches_received = counter(
            "driftkv_patches_received_total",
            "Writes handed to the merge engine",
        );
        let patches_applied = counter(
            "driftkv_patches_applied_total",
            "Writes that replaced or created a record",
        );
        let patches_stale = counter(
            "driftkv_patches_stale_total",
            "Writes rejected as stale or duplicate",
        );

        let requests = IntCounterVec::new(
            Opts::new("driftkv_requests_total", "HTTP requests handled, by endpoint"),
            &["endpoint", "status"],
        )
        .expect("requests counter vec");

        let gossip_rounds = counter(
            "driftkv_gossip_rounds_total",
            "Anti-entropy rounds that had something to send",
        );
        let gossip_sent = counter(
            "driftkv_gossip_sent_total",
            "Patches successfully pushed to peers",
        );
        let gossip_failures = counter(
            "driftkv_gossip_failures_total",
            "Anti-entropy pushes that failed or timed out",
        );
        let gossip_latency_secs = Histogram::with_opts(
            HistogramOpts::new(
                "driftkv_gossip_latency_seconds",
                "Latency of one anti-entropy push in seconds",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
        )
        .expect("gossip latency histogram");

        let store_keys = gauge("driftkv_store_keys", "Number of keys in the local store");
        let logical_clock = gauge("driftkv_logical_clock", "Current logical clock value");

        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(patches_received.clone()),
            Box::new(patches_applied.clone()),
            Box::new(patches_stale.clone()),
            Box::new(requests.clone()),
            Box::new(gossip_rounds.clone()),
            Box::new(gossip_sent.clone()),
            Box::new(gossip_failures.clone()),
            Box::new(gossip_latency_secs.clone()),
            Box::new(store_keys.clone()),
            Box::new(logical_clock.clone()),
        ];
        for collector in collectors {
            registry.register(collector).expect("register metric");
        }

        Self {
            registry,
            patches_received,
            patches_applied,
            patches_stale,
            requests,
            gossip_rounds,
            gossip_sent,
            gossip_failures,
            gossip_latency_secs,
            store_keys,
            logical_clock,
        }
    }
}

/// Encode all registered metrics in Prometheus text exposition format.
pub fn encode_metrics() -> String {
    let m = metrics();
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&m.registry.gather(), &mut buf) {
        tracing::warn!("prometheus encoding failed: {}", e);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Count one handled HTTP request.
pub fn record_request(endpoint: &str, status: u16) {
    metrics()
        .requests
        .with_label_values(&[endpoint, &status.to_string()])
        .inc();
}

/// Start a gossip push latency timer; records elapsed time on drop.
pub fn start_gossip_timer() -> prometheus::HistogramTimer {
    metrics().gossip_latency_secs.start_timer()
}

// ────────────────────────── Metrics HTTP server ──────────────────────────

use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

async fn metrics_handler(
    _req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::http::Error> {
    let body = encode_metrics();
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/plain; version=0.0.4; charset=utf-8")
        .body(Full::new(Bytes::from(body)))
}

/// Serve Prometheus metrics on the given address (`GET /metrics`).
///
/// This spawns a lightweight HTTP/1.1 server. Call from a `tokio::spawn`.
pub async fn serve_metrics(
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("metrics server listening on http://{}/metrics", addr);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(metrics_handler))
                .await
            {
                tracing::debug!("metrics connection error: {}", e);
            }
        });
    }
}

// ────────────────────────── Tests ──────────────────────────
