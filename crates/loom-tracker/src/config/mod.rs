// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered tracker configuration.
//!
//! Precedence (highest to lowest):
//! 1. Environment variables (`LOOM_TRACKER_*`)
//! 2. Config file (`$LOOM_TRACKER_CONFIG` or `./loom-tracker.toml`)
//! 3. Built-in defaults

pub mod layer;
pub mod sources;

pub use layer::TrackerConfigLayer;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use std::fmt;
use std::path::Path;
use std::time::Duration;

use loom_tracker_core::breadcrumb::DEFAULT_MAX_BREADCRUMBS;
use loom_tracker_core::performance::DEFAULT_MAX_PERFORMANCE_ISSUES;
use loom_tracker_core::store::DEFAULT_MAX_ERRORS;
use loom_tracker_core::{CoreOptions, SessionId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;

/// Fully resolved tracker configuration.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackerConfig {
	pub enable_console_capture: bool,
	pub enable_network_capture: bool,
	pub enable_performance_capture: bool,
	pub enable_user_interaction_capture: bool,
	pub enable_unhandled_rejection_capture: bool,
	pub enable_resource_error_capture: bool,
	pub enable_panic_capture: bool,

	pub max_breadcrumbs: usize,
	pub max_errors: usize,
	pub max_performance_issues: usize,
	/// Also capture each performance issue as a `performance` error.
	pub mirror_performance_issues: bool,

	pub report_to_console: bool,
	pub report_to_server: bool,
	pub server_endpoint: Option<String>,
	pub api_key: Option<String>,
	pub request_timeout_secs: u64,

	pub environment: String,
	pub release: Option<String>,
	pub user_id: Option<String>,
	pub session_id: Option<SessionId>,

	/// Tasks longer than this leave a performance breadcrumb.
	pub long_task_threshold_ms: u64,
	/// Tasks longer than this are recorded as `slow_render` issues.
	pub long_task_issue_threshold_ms: u64,
	pub slow_api_threshold_ms: u64,
	pub memory_sample_interval_secs: u64,
	pub memory_warning_ratio: f64,
	pub memory_critical_ratio: f64,
}

impl Default for TrackerConfig {
	fn default() -> Self {
		Self {
			enable_console_capture: true,
			enable_network_capture: true,
			enable_performance_capture: true,
			enable_user_interaction_capture: true,
			enable_unhandled_rejection_capture: true,
			enable_resource_error_capture: true,
			enable_panic_capture: true,
			max_breadcrumbs: DEFAULT_MAX_BREADCRUMBS,
			max_errors: DEFAULT_MAX_ERRORS,
			max_performance_issues: DEFAULT_MAX_PERFORMANCE_ISSUES,
			mirror_performance_issues: true,
			report_to_console: true,
			report_to_server: false,
			server_endpoint: None,
			api_key: None,
			request_timeout_secs: 10,
			environment: "production".to_string(),
			release: None,
			user_id: None,
			session_id: None,
			long_task_threshold_ms: 50,
			long_task_issue_threshold_ms: 100,
			slow_api_threshold_ms: 3000,
			memory_sample_interval_secs: 30,
			memory_warning_ratio: 0.8,
			memory_critical_ratio: 0.9,
		}
	}
}

impl fmt::Debug for TrackerConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TrackerConfig")
			.field("enable_console_capture", &self.enable_console_capture)
			.field("enable_network_capture", &self.enable_network_capture)
			.field("enable_performance_capture", &self.enable_performance_capture)
			.field(
				"enable_user_interaction_capture",
				&self.enable_user_interaction_capture,
			)
			.field(
				"enable_unhandled_rejection_capture",
				&self.enable_unhandled_rejection_capture,
			)
			.field(
				"enable_resource_error_capture",
				&self.enable_resource_error_capture,
			)
			.field("enable_panic_capture", &self.enable_panic_capture)
			.field("max_breadcrumbs", &self.max_breadcrumbs)
			.field("max_errors", &self.max_errors)
			.field("max_performance_issues", &self.max_performance_issues)
			.field("mirror_performance_issues", &self.mirror_performance_issues)
			.field("report_to_console", &self.report_to_console)
			.field("report_to_server", &self.report_to_server)
			.field("server_endpoint", &self.server_endpoint)
			.field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
			.field("request_timeout_secs", &self.request_timeout_secs)
			.field("environment", &self.environment)
			.field("release", &self.release)
			.field("user_id", &self.user_id)
			.field("session_id", &self.session_id)
			.field("long_task_threshold_ms", &self.long_task_threshold_ms)
			.field(
				"long_task_issue_threshold_ms",
				&self.long_task_issue_threshold_ms,
			)
			.field("slow_api_threshold_ms", &self.slow_api_threshold_ms)
			.field(
				"memory_sample_interval_secs",
				&self.memory_sample_interval_secs,
			)
			.field("memory_warning_ratio", &self.memory_warning_ratio)
			.field("memory_critical_ratio", &self.memory_critical_ratio)
			.finish()
	}
}

impl TrackerConfig {
	/// Checks cross-field constraints.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.report_to_server && self.server_endpoint.is_none() {
			return Err(ConfigError::Validation(
				"report_to_server requires server_endpoint".to_string(),
			));
		}
		if let Some(endpoint) = &self.server_endpoint {
			if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
				return Err(ConfigError::InvalidValue {
					key: "server_endpoint".to_string(),
					message: format!("'{endpoint}' is not an http(s) URL"),
				});
			}
		}
		for (key, value) in [
			("max_breadcrumbs", self.max_breadcrumbs),
			("max_errors", self.max_errors),
			("max_performance_issues", self.max_performance_issues),
		] {
			if value == 0 {
				return Err(ConfigError::InvalidValue {
					key: key.to_string(),
					message: "must be greater than zero".to_string(),
				});
			}
		}
		if self.memory_sample_interval_secs == 0 {
			return Err(ConfigError::InvalidValue {
				key: "memory_sample_interval_secs".to_string(),
				message: "must be greater than zero".to_string(),
			});
		}
		let (warning, critical) = (self.memory_warning_ratio, self.memory_critical_ratio);
		if !(warning > 0.0 && warning < critical && critical <= 1.0) {
			return Err(ConfigError::Validation(format!(
				"memory ratios must satisfy 0 < warning ({warning}) < critical ({critical}) <= 1"
			)));
		}
		Ok(())
	}

	pub fn core_options(&self) -> CoreOptions {
		CoreOptions {
			max_errors: self.max_errors,
			max_breadcrumbs: self.max_breadcrumbs,
			max_performance_issues: self.max_performance_issues,
			mirror_performance_issues: self.mirror_performance_issues,
			session_id: self.session_id,
		}
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_secs)
	}

	pub fn long_task_threshold(&self) -> Duration {
		Duration::from_millis(self.long_task_threshold_ms)
	}

	pub fn long_task_issue_threshold(&self) -> Duration {
		Duration::from_millis(self.long_task_issue_threshold_ms)
	}

	pub fn slow_api_threshold(&self) -> Duration {
		Duration::from_millis(self.slow_api_threshold_ms)
	}

	pub fn memory_sample_interval(&self) -> Duration {
		Duration::from_secs(self.memory_sample_interval_secs)
	}
}

/// Load configuration from all sources with standard precedence.
pub fn load_config() -> Result<TrackerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::discover()),
		Box::new(EnvSource),
	])
}

/// Load configuration using an explicit config file path.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<TrackerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(path.as_ref())),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<TrackerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = TrackerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	let config = merged.finalize();
	config.validate()?;

	info!(
		environment = %config.environment,
		report_to_server = config.report_to_server,
		max_errors = config.max_errors,
		"Tracker configuration loaded"
	);
	Ok(config)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn defaults_are_valid() {
		let config = TrackerConfig::default();
		config.validate().unwrap();
		assert_eq!(config.max_breadcrumbs, 100);
		assert_eq!(config.max_errors, 1000);
		assert_eq!(config.long_task_threshold_ms, 50);
		assert!(!config.report_to_server);
	}

	#[test]
	fn server_reporting_requires_endpoint() {
		let config = TrackerConfig {
			report_to_server: true,
			..Default::default()
		};
		assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
	}

	#[test]
	fn endpoint_must_be_http() {
		let config = TrackerConfig {
			server_endpoint: Some("ftp://errors".to_string()),
			..Default::default()
		};
		assert!(matches!(
			config.validate(),
			Err(ConfigError::InvalidValue { ref key, .. }) if key == "server_endpoint"
		));
	}

	#[test]
	fn zero_capacity_rejected() {
		let config = TrackerConfig {
			max_breadcrumbs: 0,
			..Default::default()
		};
		assert!(config.validate().is_err());
	}

	#[test]
	fn memory_ratios_must_be_ordered() {
		let config = TrackerConfig {
			memory_warning_ratio: 0.95,
			memory_critical_ratio: 0.9,
			..Default::default()
		};
		assert!(config.validate().is_err());

		let config = TrackerConfig {
			memory_warning_ratio: f64::NAN,
			..Default::default()
		};
		assert!(config.validate().is_err());
	}

	#[test]
	fn debug_redacts_api_key() {
		let config = TrackerConfig {
			api_key: Some("super-secret".to_string()),
			..Default::default()
		};
		let debug = format!("{config:?}");
		assert!(!debug.contains("super-secret"));
		assert!(debug.contains("[REDACTED]"));
	}

	#[test]
	fn load_config_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			"environment = \"staging\"\nmax_errors = 7\nreport_to_console = false"
		)
		.unwrap();

		let config = load_config_from(file.path()).unwrap();
		assert_eq!(config.environment, "staging");
		assert_eq!(config.max_errors, 7);
		assert!(!config.report_to_console);
		assert_eq!(config.core_options().max_errors, 7);
	}

	#[test]
	fn load_config_from_file_validates() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "report_to_server = true").unwrap();

		assert!(load_config_from(file.path()).is_err());
	}
}
