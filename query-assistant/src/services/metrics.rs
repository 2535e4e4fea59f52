//! Prometheus metrics for the query assistant.
//!
//! Covers question outcomes, model provider calls and query execution.
//! Recording is a no-op until [`init_metrics`] has run.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

static METRICS: OnceLock<Metrics> = OnceLock::new();

struct Metrics {
    registry: Registry,

    // Assistant metrics
    questions_total: IntCounterVec,
    question_duration_seconds: HistogramVec,
    attempt_failures_total: IntCounterVec,

    // Provider metrics
    tokens_total: IntCounterVec,
    provider_latency_seconds: HistogramVec,
    provider_errors_total: IntCounterVec,

    // Database metrics
    db_operation_duration_seconds: HistogramVec,
    db_errors_total: IntCounterVec,
}

impl Metrics {
    fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let questions_total = IntCounterVec::new(
            Opts::new("assistant_questions_total", "Questions answered, by outcome"),
            &["outcome"], // answered, fallback
        )?;

        let question_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "assistant_question_duration_seconds",
                "Time to answer a question, including retries",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
            &["outcome"],
        )?;

        let attempt_failures_total = IntCounterVec::new(
            Opts::new(
                "assistant_attempt_failures_total",
                "Failed attempts, by the step that failed",
            ),
            &["reason"],
        )?;

        let tokens_total = IntCounterVec::new(
            Opts::new("genai_tokens_total", "Total tokens processed"),
            &["model", "type"], // type: input, output
        )?;

        let provider_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "genai_provider_latency_seconds",
                "AI provider API latency in seconds",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
            &["model"],
        )?;

        let provider_errors_total = IntCounterVec::new(
            Opts::new("genai_provider_errors_total", "Total AI provider errors"),
            &["model", "error_type"],
        )?;

        let db_operation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "db_operation_duration_seconds",
                "Database operation duration in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]),
            &["operation"],
        )?;

        let db_errors_total = IntCounterVec::new(
            Opts::new("db_errors_total", "Total database errors"),
            &["operation"],
        )?;

        registry.register(Box::new(questions_total.clone()))?;
        registry.register(Box::new(question_duration_seconds.clone()))?;
        registry.register(Box::new(attempt_failures_total.clone()))?;
        registry.register(Box::new(tokens_total.clone()))?;
        registry.register(Box::new(provider_latency_seconds.clone()))?;
        registry.register(Box::new(provider_errors_total.clone()))?;
        registry.register(Box::new(db_operation_duration_seconds.clone()))?;
        registry.register(Box::new(db_errors_total.clone()))?;

        Ok(Self {
            registry,
            questions_total,
            question_duration_seconds,
            attempt_failures_total,
            tokens_total,
            provider_latency_seconds,
            provider_errors_total,
            db_operation_duration_seconds,
            db_errors_total,
        })
    }
}

/// Initialize all metrics. Later calls are no-ops.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if METRICS.get().is_some() {
        return Ok(());
    }

    let metrics = Metrics::new()?;
    // A concurrent caller may have won; its set is complete too.
    let _ = METRICS.set(metrics);

    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let metrics = match METRICS.get() {
        Some(m) => m,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    if let Err(e) = encoder.encode(&metrics.registry.gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to convert metrics to UTF-8");
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}

/// Record a finished question.
pub fn record_question(outcome: &str, duration_secs: f64) {
    if let Some(m) = METRICS.get() {
        m.questions_total.with_label_values(&[outcome]).inc();
        m.question_duration_seconds
            .with_label_values(&[outcome])
            .observe(duration_secs);
    }
}

/// Record a failed attempt.
pub fn record_attempt_failure(reason: &str) {
    if let Some(m) = METRICS.get() {
        m.attempt_failures_total.with_label_values(&[reason]).inc();
    }
}

/// Record token usage of one model call.
pub fn record_tokens(model: &str, input_tokens: i32, output_tokens: i32) {
    if let Some(m) = METRICS.get() {
        m.tokens_total
            .with_label_values(&[model, "input"])
            .inc_by(input_tokens.max(0) as u64);
        m.tokens_total
            .with_label_values(&[model, "output"])
            .inc_by(output_tokens.max(0) as u64);
    }
}

/// Record provider latency.
pub fn record_provider_latency(model: &str, duration_secs: f64) {
    if let Some(m) = METRICS.get() {
        m.provider_latency_seconds
            .with_label_values(&[model])
            .observe(duration_secs);
    }
}

/// Record a provider error.
pub fn record_provider_error(model: &str, error_type: &str) {
    if let Some(m) = METRICS.get() {
        m.provider_errors_total
            .with_label_values(&[model, error_type])
            .inc();
    }
}

/// Record database operation duration.
pub fn record_db_operation(operation: &str, duration_secs: f64) {
    if let Some(m) = METRICS.get() {
        m.db_operation_duration_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }
}

/// Record a database error.
pub fn record_db_error(operation: &str) {
    if let Some(m) = METRICS.get() {
        m.db_errors_total.with_label_values(&[operation]).inc();
    }
}
