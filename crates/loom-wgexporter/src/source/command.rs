// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use loom_wgexporter_core::RawStatus;
use tokio::process::Command;
use tracing::{trace, warn};

use super::DeviceSource;
use crate::error::FetchError;

/// Reads status by running `wg show` (or a configured equivalent).
#[derive(Debug, Clone)]
pub struct CommandDeviceSource {
	program: String,
	args: Vec<String>,
}

impl CommandDeviceSource {
	pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
		Self {
			program: program.into(),
			args,
		}
	}

	pub fn wg_show() -> Self {
		Self::new("wg", vec!["show".to_string()])
	}
}

impl Default for CommandDeviceSource {
	fn default() -> Self {
		Self::wg_show()
	}
}

#[async_trait]
impl DeviceSource for CommandDeviceSource {
	fn name(&self) -> &'static str {
		"command"
	}

	async fn fetch(&self) -> Result<RawStatus, FetchError> {
		run_command(&self.program, &self.args)
			.await
			.map(RawStatus::Text)
	}
}

async fn run_command(program: &str, args: &[String]) -> Result<String, FetchError> {
	let mut cmd = Command::new(program);
	cmd.args(args).kill_on_drop(true);

	trace!(cmd = %format!("{} {}", program, args.join(" ")), "running status command");

	let output = cmd.output().await.map_err(|e| {
		if e.kind() == std::io::ErrorKind::NotFound {
			warn!(program, "status command not found in PATH");
			FetchError::NotInstalled {
				program: program.to_string(),
			}
		} else {
			FetchError::Io(e)
		}
	})?;

	if output.status.success() {
		Ok(String::from_utf8_lossy(&output.stdout).into_owned())
	} else {
		let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
		Err(FetchError::CommandFailed {
			program: program.to_string(),
			status: output.status.to_string(),
			stderr,
		})
	}
}
