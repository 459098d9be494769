//! Prometheus metrics registry for the student portal.
//!
//! [`AppMetrics`] owns all registered metrics and the [`Registry`] they
//! belong to. Construct it once at startup, wrap in `Arc`, and pass it
//! to the handlers, the pruner and the HTTP middleware.
//!
//! Exposed at `GET /metrics` in Prometheus text exposition format
//! (`text/plain; version=0.0.4`).

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use prometheus::{Counter, CounterVec, Histogram, HistogramOpts, Opts, Registry};

pub const LOGIN_SUCCESS: &str = "success";
pub const LOGIN_INVALID_CREDENTIALS: &str = "invalid_credentials";
pub const LOGIN_UNVERIFIED: &str = "unverified";

/// All application-level Prometheus metrics.
pub struct AppMetrics {
    /// Successful registrations (API and admin).
    pub registrations_total: Counter,
    /// Login attempts, labelled by outcome.
    pub logins_total: CounterVec,
    /// OTP codes generated and mailed.
    pub otp_sent_total: Counter,
    /// Completed password resets.
    pub password_resets_total: Counter,
    /// Messages the mail transport failed to deliver.
    pub mail_failures_total: Counter,
    /// Rows removed by the background pruner.
    pub pruned_rows_total: Counter,
    /// HTTP request count, labelled by method, path, and status code.
    pub http_requests_total: CounterVec,
    /// HTTP request latency histogram in seconds.
    pub http_request_duration: Histogram,
    /// The registry that owns all of the above metrics.
    pub registry: Registry,
}

impl AppMetrics {
    /// Create and register all metrics. Returns an error if any metric
    /// name is invalid or duplicated (should not happen in practice).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let registrations_total = Counter::with_opts(Opts::new(
            "student_portal_registrations_total",
            "Students registered",
        ))?;

        let logins_total = CounterVec::new(
            Opts::new("student_portal_logins_total", "Login attempts by outcome"),
            &["outcome"],
        )?;

        let otp_sent_total = Counter::with_opts(Opts::new(
            "student_portal_otp_sent_total",
            "Password reset codes sent",
        ))?;

        let password_resets_total = Counter::with_opts(Opts::new(
            "student_portal_password_resets_total",
            "Passwords reset",
        ))?;

        let mail_failures_total = Counter::with_opts(Opts::new(
            "student_portal_mail_failures_total",
            "Mail delivery failures",
        ))?;

        let pruned_rows_total = Counter::with_opts(Opts::new(
            "student_portal_pruned_rows_total",
            "Expired rows removed by the pruner",
        ))?;

        let http_requests_total = CounterVec::new(
            Opts::new(
                "student_portal_http_requests_total",
                "HTTP requests by method, path, and status",
            ),
            &["method", "path", "status"],
        )?;

        let http_request_duration = Histogram::with_opts(
            HistogramOpts::new(
                "student_portal_http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;

        registry.register(Box::new(registrations_total.clone()))?;
        registry.register(Box::new(logins_total.clone()))?;
        registry.register(Box::new(otp_sent_total.clone()))?;
        registry.register(Box::new(password_resets_total.clone()))?;
        registry.register(Box::new(mail_failures_total.clone()))?;
        registry.register(Box::new(pruned_rows_total.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;

        Ok(Self {
            registrations_total,
            logins_total,
            otp_sent_total,
            password_resets_total,
            mail_failures_total,
            pruned_rows_total,
            http_requests_total,
            http_request_duration,
            registry,
        })
    }

    pub fn record_login(&self, outcome: &str) {
        self.logins_total.with_label_values(&[outcome]).inc();
    }

    /// Render all metrics as Prometheus text format (for the `/metrics` endpoint).
    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap_or_default())
    }
}

/// `GET /metrics`
pub async fn metrics_handler(State(metrics): State<Arc<AppMetrics>>) -> Response {
    match metrics.render() {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
            .body(Body::from(body))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(err) => {
            tracing::error!("Failed to render metrics: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics error").into_response()
        }
    }
}

/// Middleware recording request count and latency per matched route.
pub async fn track_http(
    State(metrics): State<Arc<AppMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let started = Instant::now();

    let response = next.run(request).await;

    metrics
        .http_requests_total
        .with_label_values(&[&method, &path, response.status().as_str()])
        .inc();
    metrics
        .http_request_duration
        .observe(started.elapsed().as_secs_f64());

    response
}
