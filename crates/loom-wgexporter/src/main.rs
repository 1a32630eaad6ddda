// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Loom WireGuard exporter binary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use loom_wgexporter::config::parse_interfaces;
use loom_wgexporter::{
	build_source, load_config, serve, AppState, ExporterConfig, ExporterConfigLayer, LogFormat,
	ScrapeScheduler, SourceKind,
};
use loom_wgexporter_core::{ConnectionRegistry, InterfaceFilter};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exports WireGuard peer handshakes, transfer and liveness as Prometheus metrics.
#[derive(Parser, Debug)]
#[command(name = "loom-wgexporter", about = "Prometheus exporter for WireGuard", version)]
struct Args {
	/// TOML config file (defaults to /etc/loom/wgexporter.toml when present)
	#[arg(long, env = "WIREGUARD_EXPORTER_CONFIG")]
	config: Option<PathBuf>,

	/// Address to listen on
	#[arg(long)]
	host: Option<String>,

	/// Port to listen on (1024-49151)
	#[arg(short = 'p', long)]
	port: Option<u16>,

	/// Comma-separated interfaces to monitor; all when unset
	#[arg(short = 'i', long)]
	interfaces: Option<String>,

	/// Where device status is read from
	#[arg(long, value_enum)]
	source: Option<SourceKind>,

	/// Directory holding `<interface>.sock` control sockets
	#[arg(long)]
	socket_dir: Option<PathBuf>,

	#[arg(long)]
	scrape_interval_secs: Option<u64>,

	/// Handshake age under which a peer counts as up
	#[arg(long)]
	liveness_threshold_secs: Option<u64>,

	#[arg(long)]
	fetch_timeout_secs: Option<u64>,

	/// Log level or filter directive when RUST_LOG is unset
	#[arg(long)]
	log_level: Option<String>,

	#[arg(long, value_enum)]
	log_format: Option<LogFormat>,
}

impl Args {
	fn into_layer(self) -> ExporterConfigLayer {
		ExporterConfigLayer {
			host: self.host,
			port: self.port,
			interfaces: self.interfaces.as_deref().map(parse_interfaces),
			scrape_interval_secs: self.scrape_interval_secs,
			liveness_threshold_secs: self.liveness_threshold_secs,
			fetch_timeout_secs: self.fetch_timeout_secs,
			source: self.source,
			command: None,
			socket_dir: self.socket_dir,
			log_level: self.log_level,
			log_format: self.log_format,
		}
	}
}

fn init_tracing(config: &ExporterConfig) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
	let registry = tracing_subscriber::registry().with(filter);

	match config.log_format {
		LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
		LogFormat::Json => registry
			.with(tracing_subscriber::fmt::layer().json())
			.init(),
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let mut args = Args::parse();
	let config_path = args.config.take();
	let config = load_config(config_path.as_deref(), args.into_layer())?;

	init_tracing(&config);

	tracing::info!(
		addr = %config.socket_addr(),
		source = ?config.source,
		interval_secs = config.scrape_interval.as_secs(),
		"starting loom-wgexporter"
	);

	let filter = InterfaceFilter::new(&config.interfaces);
	if filter.is_empty() {
		tracing::info!("monitoring all interfaces");
	} else {
		tracing::info!(
			interfaces = ?filter.names().collect::<Vec<_>>(),
			"monitoring interface allow-list"
		);
	}
	let registry = Arc::new(ConnectionRegistry::new(filter, config.liveness_threshold));
	let source = build_source(&config)?;
	let state = AppState::new(Arc::clone(&registry))?;

	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	let scrape_task = ScrapeScheduler::new(source, registry)
		.with_interval(config.scrape_interval)
		.with_fetch_timeout(config.fetch_timeout)
		.spawn(shutdown_rx);

	let listener = TcpListener::bind(config.socket_addr()).await?;
	tracing::info!(addr = %config.socket_addr(), "listening");

	serve(listener, state, async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %e, "failed to listen for shutdown signal");
		}
		tracing::info!("received shutdown signal");
	})
	.await?;

	let _ = shutdown_tx.send(true);
	scrape_task.await?;

	tracing::info!("exporter shutdown complete");
	Ok(())
}
