// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Canonical per-peer and per-interface records.

use std::collections::BTreeMap;

/// Binary prefixes understood by [`Quantity::to_bytes`], smallest first.
const BYTE_UNITS: [&str; 7] = ["b", "kib", "mib", "gib", "tib", "pib", "eib"];

/// A transfer amount exactly as reported, e.g. `1.37 mib`.
///
/// The unit is kept as parsed (lower-cased) and never normalized on
/// construction; use [`Quantity::to_bytes`] when a byte count is needed.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
	pub unit: String,
	pub magnitude: f64,
}

impl Quantity {
	pub fn new(unit: impl Into<String>, magnitude: f64) -> Self {
		Self {
			unit: unit.into(),
			magnitude,
		}
	}

	pub fn from_bytes(bytes: u64) -> Self {
		Self::new("b", bytes as f64)
	}

	/// Converts to a byte count. Returns `None` for units that are not a
	/// binary-prefixed byte unit.
	pub fn to_bytes(&self) -> Option<f64> {
		let unit = self.unit.to_ascii_lowercase();
		let exponent = BYTE_UNITS.iter().position(|u| *u == unit)?;
		Some(self.magnitude * 1024f64.powi(exponent as i32))
	}
}

impl Default for Quantity {
	fn default() -> Self {
		Self::from_bytes(0)
	}
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PeerRecord {
	/// Public key encoding of the peer; unique within a scrape.
	pub peer_identity: String,
	/// Empty when the peer block appeared before any interface.
	pub interface_name: String,
	/// Epoch seconds of the latest handshake, `None` if none was observed.
	pub last_handshake: Option<i64>,
	pub bytes_received: Quantity,
	pub bytes_sent: Quantity,
	/// Raw CIDR list, display only.
	pub allowed_ips: String,
}

impl PeerRecord {
	pub fn new(peer_identity: impl Into<String>, interface_name: impl Into<String>) -> Self {
		Self {
			peer_identity: peer_identity.into(),
			interface_name: interface_name.into(),
			..Default::default()
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InterfaceRecord {
	pub name: String,
	pub public_key: Option<String>,
	pub listen_port: Option<u16>,
}

impl InterfaceRecord {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Default::default()
		}
	}
}

/// Normalized output of one fetch, before filtering and liveness.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceStatus {
	pub interfaces: BTreeMap<String, InterfaceRecord>,
	pub peers: BTreeMap<String, PeerRecord>,
}

impl DeviceStatus {
	pub fn is_empty(&self) -> bool {
		self.interfaces.is_empty() && self.peers.is_empty()
	}
}
