// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Device sources produce the raw WireGuard status for one scrape.

mod command;
#[cfg(unix)]
mod uapi;

use std::sync::Arc;

use async_trait::async_trait;
use loom_wgexporter_core::RawStatus;

use crate::config::{ExporterConfig, SourceKind};
use crate::error::{ConfigError, FetchError};

pub use command::CommandDeviceSource;
#[cfg(unix)]
pub use uapi::{parse_get_response, UapiDeviceSource};

/// Trait abstracting how device status is obtained, for testability.
#[async_trait]
pub trait DeviceSource: Send + Sync {
	/// Short name used in log fields.
	fn name(&self) -> &'static str;

	/// Fetches the current status of every visible interface.
	async fn fetch(&self) -> Result<RawStatus, FetchError>;
}

/// Builds the source selected by `config`.
pub fn build_source(config: &ExporterConfig) -> Result<Arc<dyn DeviceSource>, ConfigError> {
	match config.source {
		SourceKind::Command => {
			let (program, args) = config
				.command
				.split_first()
				.ok_or_else(|| ConfigError::InvalidValue {
					key: "command".to_string(),
					message: "command must name a program".to_string(),
				})?;
			Ok(Arc::new(CommandDeviceSource::new(program.clone(), args.to_vec())))
		}
		#[cfg(unix)]
		SourceKind::Uapi => Ok(Arc::new(UapiDeviceSource::new(config.socket_dir.clone()))),
		#[cfg(not(unix))]
		SourceKind::Uapi => Err(ConfigError::InvalidValue {
			key: "source".to_string(),
			message: "control socket source requires a unix platform".to_string(),
		}),
	}
}
