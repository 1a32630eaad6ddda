// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Prometheus exporter for WireGuard interfaces and peers.
//!
//! A single [`ScrapeScheduler`] task fetches device status from a
//! [`DeviceSource`], normalizes it and publishes a snapshot into the shared
//! [`ConnectionRegistry`](loom_wgexporter_core::ConnectionRegistry). HTTP
//! handlers only ever read the latest snapshot.

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod metrics;
pub mod scheduler;
pub mod source;

pub use config::{load_config, ExporterConfig, ExporterConfigLayer, LogFormat, SourceKind};
pub use error::{ConfigError, FetchError, ScrapeError, ServerError};
pub use health::{HealthReport, HealthState};
pub use http::{router, serve, AppState};
pub use metrics::{encode, new_registry, WireguardCollector};
pub use scheduler::ScrapeScheduler;
pub use source::{build_source, CommandDeviceSource, DeviceSource};
#[cfg(unix)]
pub use source::UapiDeviceSource;
