// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reads devices through the userspace WireGuard control socket protocol.
//!
//! Each interface exposes `<socket_dir>/<name>.sock`. A `get=1` request is
//! answered with `key=value` lines terminated by `errno=<n>` and a blank line.
//! Keys are hex encoded on the wire and re-encoded as base64 here so records
//! match `wg show` output.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use loom_wgexporter_core::{Device, DevicePeer, RawStatus};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::{debug, instrument, warn};
use x25519_dalek::{PublicKey, StaticSecret};

use super::DeviceSource;
use crate::config::DEFAULT_SOCKET_DIR;
use crate::error::FetchError;

const GET_REQUEST: &[u8] = b"get=1\n\n";

#[derive(Debug, Clone)]
pub struct UapiDeviceSource {
	socket_dir: PathBuf,
}

impl UapiDeviceSource {
	pub fn new(socket_dir: impl Into<PathBuf>) -> Self {
		Self {
			socket_dir: socket_dir.into(),
		}
	}

	/// Lists `(interface, socket path)` pairs, sorted by interface name.
	async fn list_sockets(&self) -> Result<Vec<(String, PathBuf)>, FetchError> {
		let mut entries = match tokio::fs::read_dir(&self.socket_dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				debug!(dir = %self.socket_dir.display(), "socket directory missing, no devices");
				return Ok(Vec::new());
			}
			Err(e) => return Err(FetchError::Io(e)),
		};

		let mut sockets = Vec::new();
		while let Some(entry) = entries.next_entry().await? {
			let path = entry.path();
			if path.extension().and_then(|e| e.to_str()) != Some("sock") {
				continue;
			}
			if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
				sockets.push((name.to_string(), path));
			}
		}
		sockets.sort();
		Ok(sockets)
	}
}

impl Default for UapiDeviceSource {
	fn default() -> Self {
		Self::new(DEFAULT_SOCKET_DIR)
	}
}

#[async_trait]
impl DeviceSource for UapiDeviceSource {
	fn name(&self) -> &'static str {
		"uapi"
	}

	#[instrument(skip(self), fields(dir = %self.socket_dir.display()))]
	async fn fetch(&self) -> Result<RawStatus, FetchError> {
		let mut devices = Vec::new();

		for (name, path) in self.list_sockets().await? {
			match query_device(&name, &path).await {
				Ok(device) => devices.push(device),
				Err(FetchError::Io(e))
					if matches!(
						e.kind(),
						std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::NotFound
					) =>
				{
					warn!(device = %name, error = %e, "skipping stale control socket");
				}
				Err(e) => return Err(e),
			}
		}

		debug!(devices = devices.len(), "queried control sockets");
		Ok(RawStatus::Devices(devices))
	}
}

async fn query_device(name: &str, path: &Path) -> Result<Device, FetchError> {
	let mut stream = UnixStream::connect(path).await?;
	stream.write_all(GET_REQUEST).await?;

	let (read, _write) = stream.split();
	let mut reader = BufReader::new(read);
	let mut response = String::new();
	let mut line = String::new();
	loop {
		line.clear();
		if reader.read_line(&mut line).await? == 0 || line.trim_end().is_empty() {
			break;
		}
		response.push_str(&line);
	}

	parse_get_response(name, path, &response)
}

/// Parses the body of a `get=1` reply into a [`Device`].
pub fn parse_get_response(name: &str, path: &Path, response: &str) -> Result<Device, FetchError> {
	let protocol = |message: String| FetchError::Protocol {
		path: path.to_path_buf(),
		message,
	};

	let mut device = Device {
		name: name.to_string(),
		..Default::default()
	};
	let mut peer: Option<DevicePeer> = None;
	let mut errno = None;

	for line in response.lines() {
		if line.is_empty() {
			break;
		}
		let (key, value) = line
			.split_once('=')
			.ok_or_else(|| protocol(format!("malformed line '{line}'")))?;

		match key {
			"private_key" => {
				let secret = StaticSecret::from(decode_key(value).map_err(&protocol)?);
				device.public_key = Some(STANDARD.encode(PublicKey::from(&secret).as_bytes()));
			}
			"listen_port" => {
				let port = value
					.parse::<u16>()
					.map_err(|_| protocol(format!("invalid listen_port '{value}'")))?;
				device.listen_port = Some(port);
			}
			"public_key" => {
				if let Some(done) = peer.take() {
					device.peers.push(done);
				}
				peer = Some(DevicePeer {
					public_key: STANDARD.encode(decode_key(value).map_err(&protocol)?),
					..Default::default()
				});
			}
			"last_handshake_time_sec" | "rx_bytes" | "tx_bytes" | "allowed_ip" => {
				let current = peer
					.as_mut()
					.ok_or_else(|| protocol(format!("'{key}' before any public_key")))?;
				apply_peer_field(current, key, value).map_err(&protocol)?;
			}
			"errno" => {
				errno = Some(
					value
						.parse::<i32>()
						.map_err(|_| protocol(format!("invalid errno '{value}'")))?,
				);
			}
			_ => {}
		}
	}

	if let Some(done) = peer.take() {
		device.peers.push(done);
	}

	match errno {
		Some(0) => Ok(device),
		Some(errno) => Err(FetchError::Device {
			device: name.to_string(),
			errno,
		}),
		None => Err(protocol("response missing errno".to_string())),
	}
}

fn apply_peer_field(peer: &mut DevicePeer, key: &str, value: &str) -> Result<(), String> {
	let number = |value: &str| {
		value
			.parse::<u64>()
			.map_err(|_| format!("invalid {key} '{value}'"))
	};

	match key {
		"last_handshake_time_sec" => {
			let secs = i64::try_from(number(value)?).map_err(|_| format!("invalid {key} '{value}'"))?;
			peer.last_handshake = (secs != 0).then_some(secs);
		}
		"rx_bytes" => peer.rx_bytes = number(value)?,
		"tx_bytes" => peer.tx_bytes = number(value)?,
		"allowed_ip" => peer.allowed_ips.push(value.to_string()),
		_ => {}
	}
	Ok(())
}

fn decode_key(value: &str) -> Result<[u8; 32], String> {
	let bytes = hex::decode(value).map_err(|e| format!("invalid key encoding: {e}"))?;
	<[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| format!("key has {} bytes, expected 32", bytes.len()))
}
