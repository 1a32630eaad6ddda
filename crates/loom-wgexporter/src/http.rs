// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Metrics and health HTTP handlers.

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use loom_wgexporter_core::ConnectionRegistry;
use tokio::net::TcpListener;

use crate::error::ServerError;
use crate::health::{HealthReport, HealthState};
use crate::metrics;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Clone)]
pub struct AppState {
	pub registry: Arc<ConnectionRegistry>,
	pub metrics: prometheus::Registry,
}

impl AppState {
	pub fn new(registry: Arc<ConnectionRegistry>) -> prometheus::Result<Self> {
		let metrics = metrics::new_registry(Arc::clone(&registry))?;
		Ok(Self { registry, metrics })
	}
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/metrics", get(prometheus_metrics))
		.route("/health", get(health_check))
		.with_state(state)
}

/// GET /metrics - Prometheus text exposition of the latest snapshot.
pub async fn prometheus_metrics(
	State(state): State<AppState>,
) -> Result<impl IntoResponse, ServerError> {
	let body = metrics::encode(&state.metrics)?;
	Ok((
		StatusCode::OK,
		[(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
		body,
	))
}

/// GET /health - scrape health; 503 once scrapes keep failing.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
	let report = HealthReport::from_snapshot(&state.registry.snapshot());
	let http_status = match report.status {
		HealthState::Healthy | HealthState::Degraded => StatusCode::OK,
		HealthState::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
	};
	(http_status, Json(report))
}

/// Serves the router on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
	F: Future<Output = ()> + Send + 'static,
{
	axum::serve(listener, router(state))
		.with_graceful_shutdown(shutdown)
		.await
}
