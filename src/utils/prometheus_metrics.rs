// src/utils/prometheus_metrics.rs

use once_cell::sync::Lazy;
use prometheus::{register_counter, register_gauge, register_histogram, Counter, Gauge, Histogram};

// Broker-level metrics
pub static MESSAGES_CONSUMED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "worker_messages_consumed_total",
        "Total number of messages taken off the request queue."
    )
    .expect("Failed to register MESSAGES_CONSUMED_TOTAL counter")
});

pub static BROKER_RECONNECTS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "worker_broker_reconnects_total",
        "Total number of consumer loop reconnect attempts after a failure."
    )
    .expect("Failed to register BROKER_RECONNECTS_TOTAL counter")
});

// Pipeline metrics
pub static REQUESTS_COMPLETED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "worker_requests_completed_total",
        "Total number of requests answered with a success response."
    )
    .expect("Failed to register REQUESTS_COMPLETED_TOTAL counter")
});

pub static REQUESTS_FAILED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "worker_requests_failed_total",
        "Total number of requests answered with a failure response."
    )
    .expect("Failed to register REQUESTS_FAILED_TOTAL counter")
});

pub static REQUEST_PARSE_ERRORS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "worker_request_parse_errors_total",
        "Total number of inbound messages rejected as unparsable requests."
    )
    .expect("Failed to register REQUEST_PARSE_ERRORS_TOTAL counter")
});

pub static RESPONSES_PUBLISHED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "worker_responses_published_total",
        "Total number of responses published to the reply queue."
    )
    .expect("Failed to register RESPONSES_PUBLISHED_TOTAL counter")
});

pub static RESPONSE_PUBLISH_ERRORS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "worker_response_publish_errors_total",
        "Total number of responses lost after exhausting publish retries."
    )
    .expect("Failed to register RESPONSE_PUBLISH_ERRORS_TOTAL counter")
});

pub static GENERATION_CALLS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "worker_generation_calls_total",
        "Total number of generation backend calls."
    )
    .expect("Failed to register GENERATION_CALLS_TOTAL counter")
});

pub static GENERATION_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "worker_generation_duration_seconds",
        "Histogram of generation backend call latencies."
    )
    .expect("Failed to register GENERATION_DURATION_SECONDS histogram")
});

pub static REQUEST_PROCESSING_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "worker_request_processing_duration_seconds",
        "Histogram of request durations (from receipt to response published)."
    )
    .expect("Failed to register REQUEST_PROCESSING_DURATION_SECONDS histogram")
});

pub static ACTIVE_REQUESTS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "worker_active_requests",
        "Number of requests currently being processed."
    )
    .expect("Failed to register ACTIVE_REQUESTS gauge")
});
