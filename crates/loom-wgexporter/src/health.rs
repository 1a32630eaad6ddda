// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use loom_wgexporter_core::Snapshot;
use serde::Serialize;

const DEGRADED_AFTER: u32 = 1;
const UNHEALTHY_AFTER: u32 = 3;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
	Healthy,
	Degraded,
	Unhealthy,
}

impl HealthState {
	pub fn from_failures(consecutive_failures: u32) -> Self {
		if consecutive_failures >= UNHEALTHY_AFTER {
			HealthState::Unhealthy
		} else if consecutive_failures >= DEGRADED_AFTER {
			HealthState::Degraded
		} else {
			HealthState::Healthy
		}
	}
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HealthReport {
	pub status: HealthState,
	pub consecutive_failures: u32,
	pub last_scrape_success: bool,
	pub peers: usize,
	pub peers_up: usize,
}

impl HealthReport {
	pub fn from_snapshot(snapshot: &Snapshot) -> Self {
		Self {
			status: HealthState::from_failures(snapshot.consecutive_failures),
			consecutive_failures: snapshot.consecutive_failures,
			last_scrape_success: snapshot.fetch_succeeded,
			peers: snapshot.peers.len(),
			peers_up: snapshot.peers_up(),
		}
	}
}
