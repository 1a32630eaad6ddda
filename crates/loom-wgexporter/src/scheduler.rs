// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Periodic scrape loop: fetch, normalize, publish.

use std::sync::Arc;
use std::time::{Duration, Instant};

use loom_wgexporter_core::{ConnectionRegistry, Snapshot};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::config::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_SCRAPE_INTERVAL_SECS};
use crate::error::ScrapeError;
use crate::source::DeviceSource;

pub struct ScrapeScheduler {
	source: Arc<dyn DeviceSource>,
	registry: Arc<ConnectionRegistry>,
	interval: Duration,
	fetch_timeout: Duration,
}

impl ScrapeScheduler {
	pub fn new(source: Arc<dyn DeviceSource>, registry: Arc<ConnectionRegistry>) -> Self {
		Self {
			source,
			registry,
			interval: Duration::from_secs(DEFAULT_SCRAPE_INTERVAL_SECS),
			fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
		}
	}

	pub fn with_interval(mut self, interval: Duration) -> Self {
		self.interval = interval;
		self
	}

	pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
		self.fetch_timeout = fetch_timeout;
		self
	}

	pub fn registry(&self) -> &Arc<ConnectionRegistry> {
		&self.registry
	}

	/// Runs a single scrape and publishes its outcome.
	///
	/// A failure publishes an empty snapshot and bumps the failure counter;
	/// the error is returned for the caller's benefit only.
	#[instrument(skip(self), fields(source = self.source.name()))]
	pub async fn run_once(&self) -> Result<Arc<Snapshot>, ScrapeError> {
		let started = Instant::now();
		match self.scrape().await {
			Ok(status) => {
				let snapshot = self.registry.publish_success(status, started.elapsed());
				debug!(
					peers = snapshot.peers.len(),
					peers_up = snapshot.peers_up(),
					duration_ms = snapshot.scrape_duration.as_millis() as u64,
					"scrape succeeded"
				);
				Ok(snapshot)
			}
			Err(e) => {
				let snapshot = self.registry.publish_failure(started.elapsed());
				warn!(
					error = %e,
					phase = e.phase(),
					consecutive_failures = snapshot.consecutive_failures,
					"scrape failed"
				);
				Err(e)
			}
		}
	}

	async fn scrape(&self) -> Result<loom_wgexporter_core::DeviceStatus, ScrapeError> {
		let raw = tokio::time::timeout(self.fetch_timeout, self.source.fetch())
			.await
			.map_err(|_| ScrapeError::Timeout(self.fetch_timeout))??;
		Ok(raw.normalize()?)
	}

	/// Scrapes on every tick until `shutdown` flips to `true` or its sender
	/// is dropped. A scrape in flight at shutdown is abandoned.
	pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
		let mut timer = tokio::time::interval(self.interval);
		timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

		info!(
			source = self.source.name(),
			interval_secs = self.interval.as_secs_f64(),
			"scrape loop started"
		);

		loop {
			tokio::select! {
				biased;

				changed = shutdown.changed() => {
					if changed.is_err() || *shutdown.borrow() {
						info!("shutdown signal received");
						break;
					}
				}

				_ = timer.tick() => {
					tokio::select! {
						biased;

						changed = shutdown.changed() => {
							if changed.is_err() || *shutdown.borrow() {
								info!("shutdown signal received, abandoning in-flight scrape");
								break;
							}
						}

						_ = self.run_once() => {}
					}
				}
			}
		}

		info!("scrape loop stopped");
	}

	pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
		tokio::spawn(self.run(shutdown))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::FetchError;
	use async_trait::async_trait;
	use loom_wgexporter_core::{Device, DevicePeer, RawStatus};
	use std::collections::VecDeque;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Mutex;

	const STATUS: &str = "interface: wg0\n\
		public key: c2VydmVy\n\
		listening port: 51820\n\
		\n\
		peer: cGVlcjE=\n\
		allowed ips: 10.0.0.2/32\n\
		latest handshake: 10 seconds ago\n\
		transfer: 1.50 KiB received, 2 MiB sent\n";

	struct QueuedSource {
		results: Mutex<VecDeque<Result<RawStatus, FetchError>>>,
		calls: AtomicUsize,
	}

	impl QueuedSource {
		fn new(results: Vec<Result<RawStatus, FetchError>>) -> Self {
			Self {
				results: Mutex::new(results.into()),
				calls: AtomicUsize::new(0),
			}
		}
	}

	#[async_trait]
	impl DeviceSource for QueuedSource {
		fn name(&self) -> &'static str {
			"queued"
		}

		async fn fetch(&self) -> Result<RawStatus, FetchError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self
				.results
				.lock()
				.unwrap()
				.pop_front()
				.unwrap_or_else(|| Ok(RawStatus::Text(STATUS.to_string())))
		}
	}

	struct SlowSource;

	#[async_trait]
	impl DeviceSource for SlowSource {
		fn name(&self) -> &'static str {
			"slow"
		}

		async fn fetch(&self) -> Result<RawStatus, FetchError> {
			tokio::time::sleep(Duration::from_secs(30)).await;
			Ok(RawStatus::Devices(Vec::new()))
		}
	}

	fn scheduler(source: Arc<dyn DeviceSource>) -> ScrapeScheduler {
		ScrapeScheduler::new(source, Arc::new(ConnectionRegistry::default()))
	}

	#[tokio::test]
	async fn test_run_once_publishes_parsed_text() {
		let scheduler = scheduler(Arc::new(QueuedSource::new(vec![])));
		let snapshot = scheduler.run_once().await.unwrap();

		assert!(snapshot.fetch_succeeded);
		assert_eq!(snapshot.peers.len(), 1);
		let peer = &snapshot.peers["cGVlcjE="];
		assert!(peer.is_up);
		assert_eq!(peer.record.interface_name, "wg0");
		assert_eq!(peer.record.bytes_received.to_bytes(), Some(1536.0));
		assert_eq!(snapshot.interfaces["wg0"].listen_port, Some(51820));
		assert!(Arc::ptr_eq(&snapshot, &scheduler.registry().snapshot()));
	}

	#[tokio::test]
	async fn test_run_once_publishes_devices() {
		let devices = vec![Device {
			name: "wg1".to_string(),
			public_key: None,
			listen_port: Some(51821),
			peers: vec![DevicePeer {
				public_key: "cGVlcjI=".to_string(),
				allowed_ips: vec!["10.1.0.2/32".to_string()],
				last_handshake: None,
				rx_bytes: 10,
				tx_bytes: 20,
			}],
		}];
		let source = QueuedSource::new(vec![Ok(RawStatus::Devices(devices))]);
		let snapshot = scheduler(Arc::new(source)).run_once().await.unwrap();

		let peer = &snapshot.peers["cGVlcjI="];
		assert!(!peer.is_up);
		assert_eq!(peer.record.bytes_sent.to_bytes(), Some(20.0));
	}

	#[tokio::test]
	async fn test_failures_count_and_reset() {
		let source = QueuedSource::new(vec![
			Err(FetchError::NotInstalled {
				program: "wg".to_string(),
			}),
			Ok(RawStatus::Text(
				"peer: x\n  latest handshake: 1 2 3 4 5 6 seconds ago\n".to_string(),
			)),
			Ok(RawStatus::Text(STATUS.to_string())),
		]);
		let scheduler = scheduler(Arc::new(source));

		let err = scheduler.run_once().await.unwrap_err();
		assert_eq!(err.phase(), "fetching");
		let snapshot = scheduler.registry().snapshot();
		assert!(!snapshot.fetch_succeeded);
		assert_eq!(snapshot.consecutive_failures, 1);
		assert!(snapshot.peers.is_empty());

		let err = scheduler.run_once().await.unwrap_err();
		assert_eq!(err.phase(), "parsing");
		assert_eq!(scheduler.registry().snapshot().consecutive_failures, 2);

		let snapshot = scheduler.run_once().await.unwrap();
		assert_eq!(snapshot.consecutive_failures, 0);
		assert_eq!(snapshot.peers.len(), 1);
	}

	#[tokio::test]
	async fn test_fetch_timeout() {
		let scheduler =
			scheduler(Arc::new(SlowSource)).with_fetch_timeout(Duration::from_millis(50));

		let err = scheduler.run_once().await.unwrap_err();
		assert!(matches!(err, ScrapeError::Timeout(d) if d == Duration::from_millis(50)));
		assert_eq!(scheduler.registry().snapshot().consecutive_failures, 1);
	}

	#[tokio::test]
	async fn test_run_stops_on_shutdown() {
		let source = Arc::new(QueuedSource::new(vec![]));
		let registry = Arc::new(ConnectionRegistry::default());
		let scheduler = ScrapeScheduler::new(source.clone(), Arc::clone(&registry))
			.with_interval(Duration::from_millis(10));

		let (shutdown_tx, shutdown_rx) = watch::channel(false);
		let handle = scheduler.spawn(shutdown_rx);

		for _ in 0..200 {
			if source.calls.load(Ordering::SeqCst) >= 2 {
				break;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		assert!(source.calls.load(Ordering::SeqCst) >= 2);
		assert!(registry.snapshot().fetch_succeeded);

		shutdown_tx.send(true).unwrap();
		tokio::time::timeout(Duration::from_secs(5), handle)
			.await
			.unwrap()
			.unwrap();
	}

	#[tokio::test]
	async fn test_shutdown_interrupts_hung_fetch() {
		let registry = Arc::new(ConnectionRegistry::default());
		let scheduler = ScrapeScheduler::new(Arc::new(SlowSource), Arc::clone(&registry))
			.with_interval(Duration::from_millis(10))
			.with_fetch_timeout(Duration::from_secs(60));

		let (shutdown_tx, shutdown_rx) = watch::channel(false);
		let handle = scheduler.spawn(shutdown_rx);
		tokio::time::sleep(Duration::from_millis(50)).await;

		shutdown_tx.send(true).unwrap();
		tokio::time::timeout(Duration::from_secs(1), handle)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(*registry.snapshot(), Snapshot::empty());
	}

	#[tokio::test]
	async fn test_run_stops_when_sender_dropped() {
		let scheduler = scheduler(Arc::new(QueuedSource::new(vec![])))
			.with_interval(Duration::from_millis(10));
		let (shutdown_tx, shutdown_rx) = watch::channel(false);
		let handle = scheduler.spawn(shutdown_rx);
		drop(shutdown_tx);

		tokio::time::timeout(Duration::from_secs(5), handle)
			.await
			.unwrap()
			.unwrap();
	}
}
