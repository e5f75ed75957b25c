// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, a TOML file and environment
//! variables.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use super::layer::TrackerConfigLayer;
use crate::error::ConfigError;

/// Default location of the tracker config file, relative to the working
/// directory.
pub const DEFAULT_CONFIG_FILE: &str = "loom-tracker.toml";

/// Environment variable that points at an alternative config file.
pub const CONFIG_PATH_ENV: &str = "LOOM_TRACKER_CONFIG";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<TrackerConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<TrackerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(TrackerConfigLayer::default())
	}
}

/// TOML file source. A missing file is not an error.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// `$LOOM_TRACKER_CONFIG` if set, otherwise `./loom-tracker.toml`.
	pub fn discover() -> Self {
		Self::new(env_var(CONFIG_PATH_ENV).unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string()))
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<TrackerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(TrackerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: TrackerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed tracker config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: LOOM_TRACKER_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<TrackerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(TrackerConfigLayer {
			enable_console_capture: env_bool("LOOM_TRACKER_ENABLE_CONSOLE_CAPTURE"),
			enable_network_capture: env_bool("LOOM_TRACKER_ENABLE_NETWORK_CAPTURE"),
			enable_performance_capture: env_bool("LOOM_TRACKER_ENABLE_PERFORMANCE_CAPTURE"),
			enable_user_interaction_capture: env_bool(
				"LOOM_TRACKER_ENABLE_USER_INTERACTION_CAPTURE",
			),
			enable_unhandled_rejection_capture: env_bool(
				"LOOM_TRACKER_ENABLE_UNHANDLED_REJECTION_CAPTURE",
			),
			enable_resource_error_capture: env_bool("LOOM_TRACKER_ENABLE_RESOURCE_ERROR_CAPTURE"),
			enable_panic_capture: env_bool("LOOM_TRACKER_ENABLE_PANIC_CAPTURE"),
			max_breadcrumbs: env_parse("LOOM_TRACKER_MAX_BREADCRUMBS")?,
			max_errors: env_parse("LOOM_TRACKER_MAX_ERRORS")?,
			max_performance_issues: env_parse("LOOM_TRACKER_MAX_PERFORMANCE_ISSUES")?,
			mirror_performance_issues: env_bool("LOOM_TRACKER_MIRROR_PERFORMANCE_ISSUES"),
			report_to_console: env_bool("LOOM_TRACKER_REPORT_TO_CONSOLE"),
			report_to_server: env_bool("LOOM_TRACKER_REPORT_TO_SERVER"),
			server_endpoint: env_var("LOOM_TRACKER_SERVER_ENDPOINT"),
			api_key: env_var("LOOM_TRACKER_API_KEY"),
			request_timeout_secs: env_parse("LOOM_TRACKER_REQUEST_TIMEOUT_SECS")?,
			environment: env_var("LOOM_TRACKER_ENVIRONMENT"),
			release: env_var("LOOM_TRACKER_RELEASE"),
			user_id: env_var("LOOM_TRACKER_USER_ID"),
			session_id: env_parse("LOOM_TRACKER_SESSION_ID")?,
			long_task_threshold_ms: env_parse("LOOM_TRACKER_LONG_TASK_THRESHOLD_MS")?,
			long_task_issue_threshold_ms: env_parse("LOOM_TRACKER_LONG_TASK_ISSUE_THRESHOLD_MS")?,
			slow_api_threshold_ms: env_parse("LOOM_TRACKER_SLOW_API_THRESHOLD_MS")?,
			memory_sample_interval_secs: env_parse("LOOM_TRACKER_MEMORY_SAMPLE_INTERVAL_SECS")?,
			memory_warning_ratio: env_parse("LOOM_TRACKER_MEMORY_WARNING_RATIO")?,
			memory_critical_ratio: env_parse("LOOM_TRACKER_MEMORY_CRITICAL_RATIO")?,
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_parse<T>(name: &str) -> Result<Option<T>, ConfigError>
where
	T: FromStr,
	T::Err: std::fmt::Display,
{
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|e| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid value '{v}': {e}"),
		}),
		None => Ok(None),
	}
}
