// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use loom_wgexporter_core::ParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
	#[error("`{program}` not found in PATH")]
	NotInstalled { program: String },

	#[error("`{program}` exited with {status}: {stderr}")]
	CommandFailed {
		program: String,
		status: String,
		stderr: String,
	},

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("control socket {}: {message}", .path.display())]
	Protocol { path: PathBuf, message: String },

	#[error("device {device} returned errno {errno}")]
	Device { device: String, errno: i32 },

	#[error("unsupported device source: {0}")]
	Unsupported(String),
}

#[derive(Debug, Error)]
pub enum ScrapeError {
	#[error("fetch failed: {0}")]
	Fetch(#[from] FetchError),

	#[error("parse failed: {0}")]
	Parse(#[from] ParseError),

	#[error("fetch timed out after {0:?}")]
	Timeout(Duration),
}

impl ScrapeError {
	/// Scrape phase the error came from, for log fields.
	pub fn phase(&self) -> &'static str {
		match self {
			ScrapeError::Fetch(_) | ScrapeError::Timeout(_) => "fetching",
			ScrapeError::Parse(_) => "parsing",
		}
	}
}

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config file {}: {source}", .path.display())]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config file {}: {source}", .path.display())]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },
}

#[derive(Debug, Error)]
pub enum ServerError {
	#[error("metrics encoding failed: {0}")]
	Metrics(#[from] prometheus::Error),
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		tracing::error!(error = %self, "request failed");
		(StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
	}
}
