// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered exporter configuration.
//!
//! Precedence (highest to lowest):
//! 1. Command line flags
//! 2. Environment variables (`WIREGUARD_EXPORTER_*`)
//! 3. Config file (`/etc/loom/wgexporter.toml`, or `--config`)
//! 4. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/loom/wgexporter.toml";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9011;
pub const DEFAULT_SCRAPE_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_LIVENESS_THRESHOLD_SECS: u64 = 300;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SOCKET_DIR: &str = "/var/run/wireguard";

const MIN_USER_PORT: u16 = 1024;
const MAX_USER_PORT: u16 = 49151;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
	/// Parse the output of `wg show`.
	#[default]
	Command,
	/// Query userspace WireGuard control sockets directly.
	Uapi,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	#[default]
	Text,
	Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExporterConfigLayer {
	pub host: Option<String>,
	pub port: Option<u16>,
	pub interfaces: Option<Vec<String>>,
	pub scrape_interval_secs: Option<u64>,
	pub liveness_threshold_secs: Option<u64>,
	pub fetch_timeout_secs: Option<u64>,
	pub source: Option<SourceKind>,
	/// Program followed by its arguments.
	pub command: Option<Vec<String>>,
	pub socket_dir: Option<PathBuf>,
	pub log_level: Option<String>,
	pub log_format: Option<LogFormat>,
}

impl ExporterConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.host.is_some() {
			self.host = other.host;
		}
		if other.port.is_some() {
			self.port = other.port;
		}
		if other.interfaces.is_some() {
			self.interfaces = other.interfaces;
		}
		if other.scrape_interval_secs.is_some() {
			self.scrape_interval_secs = other.scrape_interval_secs;
		}
		if other.liveness_threshold_secs.is_some() {
			self.liveness_threshold_secs = other.liveness_threshold_secs;
		}
		if other.fetch_timeout_secs.is_some() {
			self.fetch_timeout_secs = other.fetch_timeout_secs;
		}
		if other.source.is_some() {
			self.source = other.source;
		}
		if other.command.is_some() {
			self.command = other.command;
		}
		if other.socket_dir.is_some() {
			self.socket_dir = other.socket_dir;
		}
		if other.log_level.is_some() {
			self.log_level = other.log_level;
		}
		if other.log_format.is_some() {
			self.log_format = other.log_format;
		}
	}

	pub fn finalize(self) -> Result<ExporterConfig, ConfigError> {
		let port = self.port.unwrap_or(DEFAULT_PORT);
		if !(MIN_USER_PORT..=MAX_USER_PORT).contains(&port) {
			return Err(ConfigError::InvalidValue {
				key: "port".to_string(),
				message: format!(
					"port must be between {MIN_USER_PORT} and {MAX_USER_PORT}, got {port}"
				),
			});
		}

		let command = self
			.command
			.unwrap_or_else(|| vec!["wg".to_string(), "show".to_string()]);
		if command.first().map_or(true, |program| program.trim().is_empty()) {
			return Err(ConfigError::InvalidValue {
				key: "command".to_string(),
				message: "command must name a program".to_string(),
			});
		}

		let config = ExporterConfig {
			host: self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
			port,
			interfaces: self
				.interfaces
				.map(|names| {
					names
						.into_iter()
						.map(|n| n.trim().to_string())
						.filter(|n| !n.is_empty())
						.collect()
				})
				.unwrap_or_default(),
			scrape_interval: positive_secs(
				"scrape_interval_secs",
				self.scrape_interval_secs.unwrap_or(DEFAULT_SCRAPE_INTERVAL_SECS),
			)?,
			liveness_threshold: positive_secs(
				"liveness_threshold_secs",
				self
					.liveness_threshold_secs
					.unwrap_or(DEFAULT_LIVENESS_THRESHOLD_SECS),
			)?,
			fetch_timeout: positive_secs(
				"fetch_timeout_secs",
				self.fetch_timeout_secs.unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
			)?,
			source: self.source.unwrap_or_default(),
			command,
			socket_dir: self
				.socket_dir
				.unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_DIR)),
			log_level: self.log_level.unwrap_or_else(|| "info".to_string()),
			log_format: self.log_format.unwrap_or_default(),
		};
		Ok(config)
	}
}

fn positive_secs(key: &str, secs: u64) -> Result<Duration, ConfigError> {
	if secs == 0 {
		return Err(ConfigError::InvalidValue {
			key: key.to_string(),
			message: "must be greater than zero".to_string(),
		});
	}
	Ok(Duration::from_secs(secs))
}

/// Fully resolved exporter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ExporterConfig {
	pub host: String,
	pub port: u16,
	/// Interface allow-list; empty monitors every interface.
	pub interfaces: Vec<String>,
	pub scrape_interval: Duration,
	pub liveness_threshold: Duration,
	pub fetch_timeout: Duration,
	pub source: SourceKind,
	pub command: Vec<String>,
	pub socket_dir: PathBuf,
	pub log_level: String,
	pub log_format: LogFormat,
}

impl ExporterConfig {
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}
}

impl Default for ExporterConfig {
	fn default() -> Self {
		Self {
			host: DEFAULT_HOST.to_string(),
			port: DEFAULT_PORT,
			interfaces: Vec::new(),
			scrape_interval: Duration::from_secs(DEFAULT_SCRAPE_INTERVAL_SECS),
			liveness_threshold: Duration::from_secs(DEFAULT_LIVENESS_THRESHOLD_SECS),
			fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
			source: SourceKind::Command,
			command: vec!["wg".to_string(), "show".to_string()],
			socket_dir: PathBuf::from(DEFAULT_SOCKET_DIR),
			log_level: "info".to_string(),
			log_format: LogFormat::Text,
		}
	}
}

/// Splits a comma-separated interface list, dropping blanks.
pub fn parse_interfaces(list: &str) -> Vec<String> {
	list
		.split(',')
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(str::to_string)
		.collect()
}

/// Reads a TOML config file.
pub fn load_toml(path: &Path) -> Result<ExporterConfigLayer, ConfigError> {
	debug!(path = %path.display(), "loading config file");
	let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
		path: path.to_path_buf(),
		source: e,
	})?;

	let layer: ExporterConfigLayer =
		toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: path.to_path_buf(),
			source: e,
		})?;

	trace!("parsed config layer from TOML");
	Ok(layer)
}

/// Reads a TOML config file, treating a missing file as an empty layer.
pub fn load_toml_if_present(path: &Path) -> Result<ExporterConfigLayer, ConfigError> {
	if !path.exists() {
		debug!(path = %path.display(), "config file not found, skipping");
		return Ok(ExporterConfigLayer::default());
	}
	load_toml(path)
}

pub fn layer_from_env() -> Result<ExporterConfigLayer, ConfigError> {
	layer_from_env_with(|name| std::env::var(name).ok())
}

/// Builds a layer from `WIREGUARD_EXPORTER_*` variables using `lookup`.
pub fn layer_from_env_with<F>(lookup: F) -> Result<ExporterConfigLayer, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
	let number = |name: &str| -> Result<Option<u64>, ConfigError> {
		match var(name) {
			Some(v) => v.trim().parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid integer value '{v}'"),
			}),
			None => Ok(None),
		}
	};
	let choice = |name: &str| var(name).map(|v| v.trim().to_string());

	let port = number("WIREGUARD_EXPORTER_PORT")?
		.map(|p| {
			u16::try_from(p).map_err(|_| ConfigError::InvalidValue {
				key: "WIREGUARD_EXPORTER_PORT".to_string(),
				message: format!("invalid port '{p}'"),
			})
		})
		.transpose()?;

	let source = choice("WIREGUARD_EXPORTER_SOURCE")
		.map(|v| {
			SourceKind::from_str(&v, true).map_err(|message| ConfigError::InvalidValue {
				key: "WIREGUARD_EXPORTER_SOURCE".to_string(),
				message,
			})
		})
		.transpose()?;

	let log_format = choice("WIREGUARD_EXPORTER_LOG_FORMAT")
		.map(|v| {
			LogFormat::from_str(&v, true).map_err(|message| ConfigError::InvalidValue {
				key: "WIREGUARD_EXPORTER_LOG_FORMAT".to_string(),
				message,
			})
		})
		.transpose()?;

	Ok(ExporterConfigLayer {
		host: var("WIREGUARD_EXPORTER_HOST"),
		port,
		interfaces: var("WIREGUARD_EXPORTER_INTERFACES").map(|v| parse_interfaces(&v)),
		scrape_interval_secs: number("WIREGUARD_EXPORTER_SCRAPE_INTERVAL_SECS")?,
		liveness_threshold_secs: number("WIREGUARD_EXPORTER_LIVENESS_THRESHOLD_SECS")?,
		fetch_timeout_secs: number("WIREGUARD_EXPORTER_FETCH_TIMEOUT_SECS")?,
		source,
		command: var("WIREGUARD_EXPORTER_COMMAND")
			.map(|v| v.split_whitespace().map(str::to_string).collect()),
		socket_dir: var("WIREGUARD_EXPORTER_SOCKET_DIR").map(PathBuf::from),
		log_level: var("WIREGUARD_EXPORTER_LOG_LEVEL"),
		log_format,
	})
}

/// Loads configuration from every source. `overrides` is the command line
/// layer and wins over everything else.
pub fn load_config(
	config_path: Option<&Path>,
	overrides: ExporterConfigLayer,
) -> Result<ExporterConfig, ConfigError> {
	let file = match config_path {
		Some(path) => load_toml(path)?,
		None => load_toml_if_present(Path::new(DEFAULT_CONFIG_PATH))?,
	};
	resolve(file, layer_from_env()?, overrides)
}

fn resolve(
	file: ExporterConfigLayer,
	env: ExporterConfigLayer,
	overrides: ExporterConfigLayer,
) -> Result<ExporterConfig, ConfigError> {
	let mut merged = ExporterConfigLayer::default();
	for (source, layer) in [("toml-config", file), ("environment", env), ("cli", overrides)] {
		debug!(source, "merging configuration source");
		merged.merge(layer);
	}
	merged.finalize()
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::collections::HashMap;
	use tempfile::TempDir;

	fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> = pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |name| map.get(name).cloned()
	}

	#[test]
	fn test_defaults() {
		let config = ExporterConfigLayer::default().finalize().unwrap();
		assert_eq!(config, ExporterConfig::default());
		assert_eq!(config.socket_addr(), "0.0.0.0:9011");
		assert_eq!(config.scrape_interval, Duration::from_secs(5));
		assert_eq!(config.liveness_threshold, Duration::from_secs(300));
		assert!(config.interfaces.is_empty());
	}

	#[test]
	fn test_merge_overwrites_only_set_fields() {
		let mut base = ExporterConfigLayer {
			port: Some(9100),
			interfaces: Some(vec!["wg0".to_string()]),
			..Default::default()
		};
		base.merge(ExporterConfigLayer {
			port: Some(9200),
			..Default::default()
		});
		assert_eq!(base.port, Some(9200));
		assert_eq!(base.interfaces, Some(vec!["wg0".to_string()]));
	}

	#[test]
	fn test_port_out_of_user_range() {
		for port in [80u16, 1023, 49152, 65535] {
			let result = ExporterConfigLayer {
				port: Some(port),
				..Default::default()
			}
			.finalize();
			assert!(
				matches!(result, Err(ConfigError::InvalidValue { ref key, .. }) if key == "port"),
				"accepted port {port}"
			);
		}
	}

	#[test]
	fn test_zero_interval_rejected() {
		let result = ExporterConfigLayer {
			scrape_interval_secs: Some(0),
			..Default::default()
		}
		.finalize();
		assert!(result.is_err());
	}

	#[test]
	fn test_empty_command_rejected() {
		let result = ExporterConfigLayer {
			command: Some(vec![]),
			..Default::default()
		}
		.finalize();
		assert!(result.is_err());
	}

	#[test]
	fn test_parse_interfaces() {
		assert_eq!(parse_interfaces("wg0, wg1 ,,"), vec!["wg0", "wg1"]);
		assert!(parse_interfaces("  ").is_empty());
	}

	#[test]
	fn test_env_layer() {
		let layer = layer_from_env_with(env(&[
			("WIREGUARD_EXPORTER_PORT", "9100"),
			("WIREGUARD_EXPORTER_INTERFACES", "wg0,wg1"),
			("WIREGUARD_EXPORTER_SOURCE", "UAPI"),
			("WIREGUARD_EXPORTER_COMMAND", "sudo wg show"),
			("WIREGUARD_EXPORTER_LOG_FORMAT", "json"),
			("WIREGUARD_EXPORTER_HOST", ""),
		]))
		.unwrap();

		assert_eq!(layer.port, Some(9100));
		assert_eq!(
			layer.interfaces,
			Some(vec!["wg0".to_string(), "wg1".to_string()])
		);
		assert_eq!(layer.source, Some(SourceKind::Uapi));
		assert_eq!(
			layer.command,
			Some(vec!["sudo".to_string(), "wg".to_string(), "show".to_string()])
		);
		assert_eq!(layer.log_format, Some(LogFormat::Json));
		assert!(layer.host.is_none());
	}

	#[test]
	fn test_env_layer_invalid_values() {
		let err = layer_from_env_with(env(&[("WIREGUARD_EXPORTER_PORT", "abc")])).unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "WIREGUARD_EXPORTER_PORT"));

		let err = layer_from_env_with(env(&[("WIREGUARD_EXPORTER_PORT", "70000")])).unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { .. }));

		let err = layer_from_env_with(env(&[("WIREGUARD_EXPORTER_SOURCE", "netlink")])).unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "WIREGUARD_EXPORTER_SOURCE"));
	}

	#[test]
	fn test_toml_layer_partial() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("wgexporter.toml");
		std::fs::write(
			&path,
			r#"
port = 9300
interfaces = ["wg0"]
source = "uapi"
socket_dir = "/run/wireguard"
"#,
		)
		.unwrap();

		let layer = load_toml(&path).unwrap();
		assert_eq!(layer.port, Some(9300));
		assert_eq!(layer.interfaces, Some(vec!["wg0".to_string()]));
		assert_eq!(layer.source, Some(SourceKind::Uapi));
		assert_eq!(layer.socket_dir, Some(PathBuf::from("/run/wireguard")));
		assert!(layer.scrape_interval_secs.is_none());
	}

	#[test]
	fn test_toml_parse_error() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("broken.toml");
		std::fs::write(&path, "port = \"not a number\"").unwrap();
		assert!(matches!(load_toml(&path), Err(ConfigError::TomlParse { .. })));
	}

	#[test]
	fn test_missing_file_handling() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("absent.toml");
		assert_eq!(
			load_toml_if_present(&path).unwrap(),
			ExporterConfigLayer::default()
		);
		assert!(matches!(load_toml(&path), Err(ConfigError::FileRead { .. })));
	}

	#[test]
	fn test_resolve_precedence() {
		let file = ExporterConfigLayer {
			port: Some(9100),
			scrape_interval_secs: Some(30),
			interfaces: Some(vec!["wg0".to_string()]),
			..Default::default()
		};
		let env = ExporterConfigLayer {
			port: Some(9200),
			interfaces: Some(vec!["wg1".to_string()]),
			..Default::default()
		};
		let cli = ExporterConfigLayer {
			port: Some(9300),
			..Default::default()
		};

		let config = resolve(file, env, cli).unwrap();
		assert_eq!(config.port, 9300);
		assert_eq!(config.interfaces, vec!["wg1".to_string()]);
		assert_eq!(config.scrape_interval, Duration::from_secs(30));
	}

	proptest! {
		#[test]
		fn parse_interfaces_yields_trimmed_names(list in "[ ,a-z0-9]{0,40}") {
			let names = parse_interfaces(&list);
			for name in &names {
				prop_assert!(!name.is_empty());
				prop_assert_eq!(name.trim(), name.as_str());
				prop_assert!(!name.contains(','));
			}
			let expected = list.split(',').filter(|s| !s.trim().is_empty()).count();
			prop_assert_eq!(names.len(), expected);
		}
	}
}
