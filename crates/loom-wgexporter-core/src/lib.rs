// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core of the Loom WireGuard exporter.
//!
//! This crate turns WireGuard status output into canonical per-peer records and
//! publishes them as immutable snapshots:
//!
//! - [`handshake`]: relative handshake ages (`3 hours, 44 minutes, 51 seconds ago`)
//! - [`transfer`]: transfer phrases (`180 B received, 400 B sent`)
//! - [`status`]: the line-oriented `wg show` parser built on the two above
//! - [`device`]: structured device data and normalization of either form
//! - [`registry`]: interface allow-list, liveness and the published [`Snapshot`]
//!
//! Nothing here performs I/O; fetching and scheduling live in `loom-wgexporter`.

pub mod device;
pub mod error;
pub mod handshake;
pub mod record;
pub mod registry;
pub mod status;
pub mod transfer;

pub use device::{normalize_devices, Device, DevicePeer, RawStatus};
pub use error::{ParseError, Result};
pub use handshake::{parse_handshake, parse_handshake_at};
pub use record::{DeviceStatus, InterfaceRecord, PeerRecord, Quantity};
pub use registry::{
	is_peer_up, ConnectionRegistry, InterfaceFilter, PeerState, Snapshot, DEFAULT_LIVENESS_THRESHOLD,
};
pub use status::{parse_status, parse_status_at};
pub use transfer::{parse_transfer, Transfer};
