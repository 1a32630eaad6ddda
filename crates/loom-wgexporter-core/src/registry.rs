// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Published scrape snapshots.
//!
//! The registry holds exactly one [`Snapshot`] behind an [`ArcSwap`]. Readers
//! take a cheap `Arc` clone and never block the publisher; the publisher builds
//! a complete snapshot off to the side and swaps it in with a single store.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::Utc;
use tracing::debug;

use crate::record::{DeviceStatus, InterfaceRecord, PeerRecord};

pub const DEFAULT_LIVENESS_THRESHOLD: Duration = Duration::from_secs(5 * 60);

/// Interface allow-list. Empty means every interface is monitored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceFilter {
	names: BTreeSet<String>,
}

impl InterfaceFilter {
	pub fn new<I, S>(names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let names = names
			.into_iter()
			.map(|name| name.as_ref().trim().to_string())
			.filter(|name| !name.is_empty())
			.collect();
		Self { names }
	}

	pub fn allow_all() -> Self {
		Self::default()
	}

	pub fn is_empty(&self) -> bool {
		self.names.is_empty()
	}

	/// Exact, case-sensitive match.
	pub fn allows(&self, interface: &str) -> bool {
		self.names.is_empty() || self.names.contains(interface)
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.names.iter().map(String::as_str)
	}
}

/// A peer is up when it has handshaken and the handshake is younger than
/// `threshold`.
pub fn is_peer_up(last_handshake: Option<i64>, now: i64, threshold: Duration) -> bool {
	let Some(at) = last_handshake else {
		return false;
	};
	let threshold = i64::try_from(threshold.as_secs()).unwrap_or(i64::MAX);
	now.saturating_sub(at) < threshold
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeerState {
	pub record: PeerRecord,
	pub is_up: bool,
}

/// One complete scrape result. Never mutated after publication.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
	pub peers: BTreeMap<String, PeerState>,
	pub interfaces: BTreeMap<String, InterfaceRecord>,
	pub fetch_succeeded: bool,
	pub scrape_duration: Duration,
	/// Epoch seconds at which the snapshot was built.
	pub taken_at: i64,
	pub consecutive_failures: u32,
}

impl Snapshot {
	/// The value held before the first scrape completes.
	pub fn empty() -> Self {
		Self {
			peers: BTreeMap::new(),
			interfaces: BTreeMap::new(),
			fetch_succeeded: false,
			scrape_duration: Duration::ZERO,
			taken_at: 0,
			consecutive_failures: 0,
		}
	}

	pub fn peers_up(&self) -> usize {
		self.peers.values().filter(|p| p.is_up).count()
	}
}

impl Default for Snapshot {
	fn default() -> Self {
		Self::empty()
	}
}

pub struct ConnectionRegistry {
	current: ArcSwap<Snapshot>,
	filter: InterfaceFilter,
	liveness_threshold: Duration,
}

impl Default for ConnectionRegistry {
	fn default() -> Self {
		Self::new(InterfaceFilter::allow_all(), DEFAULT_LIVENESS_THRESHOLD)
	}
}

impl ConnectionRegistry {
	pub fn new(filter: InterfaceFilter, liveness_threshold: Duration) -> Self {
		Self {
			current: ArcSwap::from_pointee(Snapshot::empty()),
			filter,
			liveness_threshold,
		}
	}

	/// Returns the current snapshot. Safe to call while a publish is in flight.
	pub fn snapshot(&self) -> Arc<Snapshot> {
		self.current.load_full()
	}

	/// Filters `status`, derives liveness at `now` and builds a successful
	/// snapshot without publishing it.
	pub fn build_snapshot(&self, status: DeviceStatus, scrape_duration: Duration, now: i64) -> Snapshot {
		let total = status.peers.len();
		let peers: BTreeMap<String, PeerState> = status
			.peers
			.into_iter()
			.filter(|(_, record)| self.filter.allows(&record.interface_name))
			.map(|(identity, record)| {
				let is_up = is_peer_up(record.last_handshake, now, self.liveness_threshold);
				(identity, PeerState { record, is_up })
			})
			.collect();
		let interfaces = status
			.interfaces
			.into_iter()
			.filter(|(name, _)| self.filter.allows(name))
			.collect();

		if peers.len() != total {
			debug!(
				kept = peers.len(),
				dropped = total - peers.len(),
				"filtered peers by interface allow-list"
			);
		}

		Snapshot {
			peers,
			interfaces,
			fetch_succeeded: true,
			scrape_duration,
			taken_at: now,
			consecutive_failures: 0,
		}
	}

	/// Publishes a successful scrape.
	pub fn publish_success(&self, status: DeviceStatus, scrape_duration: Duration) -> Arc<Snapshot> {
		self.publish_success_at(status, scrape_duration, Utc::now().timestamp())
	}

	pub fn publish_success_at(
		&self,
		status: DeviceStatus,
		scrape_duration: Duration,
		now: i64,
	) -> Arc<Snapshot> {
		let snapshot = Arc::new(self.build_snapshot(status, scrape_duration, now));
		self.current.store(Arc::clone(&snapshot));
		snapshot
	}

	/// Publishes a failed scrape with an empty peer mapping.
	///
	/// The failure counter is read from the current snapshot, so publishes must
	/// come from a single producer.
	pub fn publish_failure(&self, scrape_duration: Duration) -> Arc<Snapshot> {
		let consecutive_failures = self.current.load().consecutive_failures.saturating_add(1);
		let snapshot = Arc::new(Snapshot {
			peers: BTreeMap::new(),
			interfaces: BTreeMap::new(),
			fetch_succeeded: false,
			scrape_duration,
			taken_at: Utc::now().timestamp(),
			consecutive_failures,
		});
		self.current.store(Arc::clone(&snapshot));
		snapshot
	}
}
