// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Line-oriented parser for `wg show` style status text.
//!
//! The parser walks the dump with three states: no context, inside an
//! interface block and inside a peer block. `interface:` and `peer:` lines
//! switch blocks; `key: value` lines update whatever block is active. Any
//! handshake or transfer value that fails to parse fails the whole dump, so a
//! caller never publishes a partially understood scrape.

use chrono::Utc;

use crate::error::Result;
use crate::handshake::parse_handshake_at;
use crate::record::{DeviceStatus, InterfaceRecord, PeerRecord};
use crate::transfer::parse_transfer;

const INTERFACE_KEY: &str = "interface";
const PEER_KEY: &str = "peer";
const PUBLIC_KEY_KEY: &str = "public key";
const LISTENING_PORT_KEY: &str = "listening port";
const LATEST_HANDSHAKE_KEY: &str = "latest handshake";
const TRANSFER_KEY: &str = "transfer";
const ALLOWED_IPS_KEY: &str = "allowed ips";

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParserState {
	NoContext,
	InInterface { interface: String },
	InPeer { interface: String, peer: String },
}

impl ParserState {
	fn interface(&self) -> &str {
		match self {
			ParserState::NoContext => "",
			ParserState::InInterface { interface } | ParserState::InPeer { interface, .. } => {
				interface
			}
		}
	}
}

struct StatusParser {
	now: i64,
	state: ParserState,
	status: DeviceStatus,
}

impl StatusParser {
	fn new(now: i64) -> Self {
		Self {
			now,
			state: ParserState::NoContext,
			status: DeviceStatus::default(),
		}
	}

	fn feed(&mut self, line: &str) -> Result<()> {
		let line = line.trim();
		let Some((key, value)) = line.split_once(':') else {
			return Ok(());
		};
		let key = key.trim().to_ascii_lowercase();
		let value = value.trim();

		match key.as_str() {
			INTERFACE_KEY => self.enter_interface(value),
			PEER_KEY => self.enter_peer(value),
			_ => self.apply_field(&key, value)?,
		}
		Ok(())
	}

	fn enter_interface(&mut self, name: &str) {
		if !name.is_empty() {
			self
				.status
				.interfaces
				.entry(name.to_string())
				.or_insert_with(|| InterfaceRecord::new(name));
		}
		self.state = ParserState::InInterface {
			interface: name.to_string(),
		};
	}

	fn enter_peer(&mut self, value: &str) {
		let Some(peer) = value.split_whitespace().next() else {
			// A blank peer line still closes the previous peer block.
			if matches!(self.state, ParserState::InPeer { .. }) {
				let interface = self.state.interface().to_string();
				self.state = ParserState::InInterface { interface };
			}
			return;
		};
		let interface = self.state.interface().to_string();

		self
			.status
			.peers
			.insert(peer.to_string(), PeerRecord::new(peer, interface.clone()));
		self.state = ParserState::InPeer {
			interface,
			peer: peer.to_string(),
		};
	}

	fn apply_field(&mut self, key: &str, value: &str) -> Result<()> {
		match &self.state {
			ParserState::NoContext => {}
			ParserState::InInterface { interface } => {
				let Some(record) = self.status.interfaces.get_mut(interface) else {
					return Ok(());
				};
				match key {
					PUBLIC_KEY_KEY => record.public_key = Some(value.to_string()),
					LISTENING_PORT_KEY => record.listen_port = value.parse().ok(),
					_ => {}
				}
			}
			ParserState::InPeer { peer, .. } => {
				let Some(record) = self.status.peers.get_mut(peer) else {
					return Ok(());
				};
				match key {
					LATEST_HANDSHAKE_KEY => {
						record.last_handshake = parse_handshake_at(value, self.now)
							.map_err(|e| e.in_field(peer, LATEST_HANDSHAKE_KEY))?;
					}
					TRANSFER_KEY => {
						let transfer =
							parse_transfer(value).map_err(|e| e.in_field(peer, TRANSFER_KEY))?;
						record.bytes_received = transfer.received;
						record.bytes_sent = transfer.sent;
					}
					ALLOWED_IPS_KEY => record.allowed_ips = value.to_string(),
					_ => {}
				}
			}
		}
		Ok(())
	}
}

/// Parses a status dump using the current wall clock for handshake ages.
pub fn parse_status(raw: &str) -> Result<DeviceStatus> {
	parse_status_at(raw, Utc::now().timestamp())
}

/// Parses a status dump with handshake ages resolved against `now`.
///
/// Empty or unrecognized input yields an empty [`DeviceStatus`].
pub fn parse_status_at(raw: &str, now: i64) -> Result<DeviceStatus> {
	let mut parser = StatusParser::new(now);
	for line in raw.lines() {
		parser.feed(line)?;
	}
	Ok(parser.status)
}
