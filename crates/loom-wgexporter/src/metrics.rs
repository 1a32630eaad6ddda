// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Prometheus exposition of the latest published snapshot.
//!
//! [`WireguardCollector`] rebuilds every family from the current snapshot on
//! each gather, so peers that disappear stop being exported immediately.

use std::sync::{Arc, Mutex};

use loom_wgexporter_core::{ConnectionRegistry, Snapshot};
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};

const PEER_LABELS: &[&str] = &["interface", "public_key", "allowed_ips"];
const INTERFACE_LABELS: &[&str] = &["interface", "public_key", "listen_port"];

pub struct WireguardCollector {
	registry: Arc<ConnectionRegistry>,

	latest_handshake: GaugeVec,
	transmitted_bytes: GaugeVec,
	received_bytes: GaugeVec,
	peer_up: GaugeVec,
	interface_info: GaugeVec,
	scrape_success: Gauge,
	scrape_duration: Gauge,

	// Serializes reset-and-fill across concurrent gathers.
	collect_lock: Mutex<()>,
}

impl WireguardCollector {
	pub fn new(registry: Arc<ConnectionRegistry>) -> prometheus::Result<Self> {
		Ok(Self {
			registry,
			latest_handshake: GaugeVec::new(
				Opts::new(
					"wireguard_latest_handshake_seconds",
					"Epoch seconds of the latest handshake with the peer, 0 if none",
				),
				PEER_LABELS,
			)?,
			transmitted_bytes: GaugeVec::new(
				Opts::new("wireguard_transmitted_bytes", "Bytes sent to the peer"),
				PEER_LABELS,
			)?,
			received_bytes: GaugeVec::new(
				Opts::new("wireguard_received_bytes", "Bytes received from the peer"),
				PEER_LABELS,
			)?,
			peer_up: GaugeVec::new(
				Opts::new(
					"wireguard_peer_up",
					"Whether the peer handshook within the liveness threshold",
				),
				PEER_LABELS,
			)?,
			interface_info: GaugeVec::new(
				Opts::new("wireguard_interface_info", "WireGuard interface information"),
				INTERFACE_LABELS,
			)?,
			scrape_success: Gauge::new(
				"wireguard_scrape_success",
				"Whether the last scrape of the device source succeeded",
			)?,
			scrape_duration: Gauge::new(
				"wireguard_scrape_duration_seconds",
				"Duration of the last scrape in seconds",
			)?,
			collect_lock: Mutex::new(()),
		})
	}

	fn peer_vecs(&self) -> [&GaugeVec; 5] {
		[
			&self.latest_handshake,
			&self.transmitted_bytes,
			&self.received_bytes,
			&self.peer_up,
			&self.interface_info,
		]
	}

	fn fill(&self, snapshot: &Snapshot) {
		for vec in self.peer_vecs() {
			vec.reset();
		}

		for state in snapshot.peers.values() {
			let record = &state.record;
			let labels = [
				record.interface_name.as_str(),
				record.peer_identity.as_str(),
				record.allowed_ips.as_str(),
			];

			self
				.latest_handshake
				.with_label_values(&labels)
				.set(record.last_handshake.unwrap_or(0) as f64);
			self
				.peer_up
				.with_label_values(&labels)
				.set(if state.is_up { 1.0 } else { 0.0 });
			if let Some(sent) = record.bytes_sent.to_bytes() {
				self.transmitted_bytes.with_label_values(&labels).set(sent);
			}
			if let Some(received) = record.bytes_received.to_bytes() {
				self.received_bytes.with_label_values(&labels).set(received);
			}
		}

		for interface in snapshot.interfaces.values() {
			let port = interface
				.listen_port
				.map(|p| p.to_string())
				.unwrap_or_default();
			self
				.interface_info
				.with_label_values(&[
					interface.name.as_str(),
					interface.public_key.as_deref().unwrap_or(""),
					port.as_str(),
				])
				.set(1.0);
		}

		self
			.scrape_success
			.set(if snapshot.fetch_succeeded { 1.0 } else { 0.0 });
		self
			.scrape_duration
			.set(snapshot.scrape_duration.as_secs_f64());
	}
}

impl Collector for WireguardCollector {
	fn desc(&self) -> Vec<&Desc> {
		self
			.peer_vecs()
			.into_iter()
			.flat_map(|vec| vec.desc())
			.chain(self.scrape_success.desc())
			.chain(self.scrape_duration.desc())
			.collect()
	}

	fn collect(&self) -> Vec<MetricFamily> {
		let _guard = self
			.collect_lock
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner());

		self.fill(&self.registry.snapshot());

		let mut families = Vec::new();
		for vec in self.peer_vecs() {
			families.extend(vec.collect());
		}
		families.extend(self.scrape_success.collect());
		families.extend(self.scrape_duration.collect());
		families
	}
}

/// Creates a process-owned registry exporting `registry`'s snapshots.
pub fn new_registry(registry: Arc<ConnectionRegistry>) -> prometheus::Result<Registry> {
	let prometheus_registry = Registry::new();
	prometheus_registry.register(Box::new(WireguardCollector::new(registry)?))?;
	Ok(prometheus_registry)
}

/// Encodes all metrics in `registry` in the text exposition format.
pub fn encode(registry: &Registry) -> prometheus::Result<String> {
	let encoder = TextEncoder::new();
	let mut buffer = Vec::new();
	encoder.encode(&registry.gather(), &mut buffer)?;
	String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
