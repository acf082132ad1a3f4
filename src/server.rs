// src/server.rs

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::{serve, Router};
use prometheus::{gather, Encoder, TextEncoder};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::broker::ConnectionManager;

/// State shared with the status handlers.
#[derive(Clone)]
struct AppState {
    manager: Arc<ConnectionManager>,
}

/// Liveness endpoint: process version plus current broker connectivity.
async fn status_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "rabbitmqConnected": state.manager.is_connected().await,
    }))
}

// Axum handler for /metrics
async fn metrics_handler() -> (StatusCode, String) {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&gather(), &mut buffer) {
        error!("Could not encode prometheus metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Could not encode prometheus metrics: {}", e),
        );
    }
    match String::from_utf8(buffer) {
        Ok(s) => (StatusCode::OK, s),
        Err(e) => {
            error!("Prometheus metrics UTF-8 error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Prometheus metrics UTF-8 error: {}", e),
            )
        }
    }
}

/// Spawns the status server on `0.0.0.0:{port}`. Serves `/api/status` for
/// orchestration probes and `/metrics` for Prometheus scrapes. Bind errors
/// are logged inside the spawned task; the worker keeps consuming without
/// the endpoint.
pub fn run_status_server(port: u16, manager: Arc<ConnectionManager>) {
    let app = Router::new()
        .route("/api/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(AppState { manager });

    let listener_addr = format!("0.0.0.0:{}", port);
    info!(
        "Status endpoint will be available at http://{}/api/status",
        listener_addr
    );

    tokio::spawn(async move {
        match TcpListener::bind(&listener_addr).await {
            Ok(listener) => {
                if let Err(e) = serve(listener, app).await {
                    error!("Status server error: {}", e);
                }
            }
            Err(e) => {
                error!("Failed to bind status server to {}: {}", listener_addr, e);
            }
        }
    });
}
