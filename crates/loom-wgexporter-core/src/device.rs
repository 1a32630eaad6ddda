// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Raw device data as returned by a device source, and its normalization
//! into a [`DeviceStatus`].

use crate::error::Result;
use crate::record::{DeviceStatus, InterfaceRecord, PeerRecord, Quantity};
use crate::status::parse_status;

/// A peer as reported by a structured control-plane query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DevicePeer {
	pub public_key: String,
	pub allowed_ips: Vec<String>,
	/// Epoch seconds; `None` when the peer never completed a handshake.
	pub last_handshake: Option<i64>,
	pub rx_bytes: u64,
	pub tx_bytes: u64,
}

/// An interface as reported by a structured control-plane query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Device {
	pub name: String,
	pub public_key: Option<String>,
	pub listen_port: Option<u16>,
	pub peers: Vec<DevicePeer>,
}

/// Whatever a device source produced for one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawStatus {
	/// Human-readable status dump (`wg show`).
	Text(String),
	/// Devices read directly from the control plane.
	Devices(Vec<Device>),
}

impl RawStatus {
	/// Produces the canonical interface and peer mapping.
	pub fn normalize(self) -> Result<DeviceStatus> {
		match self {
			RawStatus::Text(text) => parse_status(&text),
			RawStatus::Devices(devices) => Ok(normalize_devices(devices)),
		}
	}
}

/// Maps structured devices onto the same records the text parser yields.
pub fn normalize_devices(devices: Vec<Device>) -> DeviceStatus {
	let mut status = DeviceStatus::default();

	for device in devices {
		for peer in device.peers {
			let record = PeerRecord {
				peer_identity: peer.public_key.clone(),
				interface_name: device.name.clone(),
				last_handshake: peer.last_handshake.filter(|at| *at != 0),
				bytes_received: Quantity::from_bytes(peer.rx_bytes),
				bytes_sent: Quantity::from_bytes(peer.tx_bytes),
				allowed_ips: peer.allowed_ips.join(", "),
			};
			status.peers.insert(peer.public_key, record);
		}

		status.interfaces.insert(
			device.name.clone(),
			InterfaceRecord {
				name: device.name,
				public_key: device.public_key,
				listen_port: device.listen_port,
			},
		);
	}

	status
}
