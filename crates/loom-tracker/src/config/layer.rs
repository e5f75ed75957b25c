// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial tracker configuration produced by a single source.

use loom_tracker_core::SessionId;
use serde::{Deserialize, Serialize};

use super::TrackerConfig;

/// One layer of tracker configuration. Unset fields fall through to lower
/// precedence layers and finally to the built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrackerConfigLayer {
	pub enable_console_capture: Option<bool>,
	pub enable_network_capture: Option<bool>,
	pub enable_performance_capture: Option<bool>,
	pub enable_user_interaction_capture: Option<bool>,
	pub enable_unhandled_rejection_capture: Option<bool>,
	pub enable_resource_error_capture: Option<bool>,
	pub enable_panic_capture: Option<bool>,

	pub max_breadcrumbs: Option<usize>,
	pub max_errors: Option<usize>,
	pub max_performance_issues: Option<usize>,
	pub mirror_performance_issues: Option<bool>,

	pub report_to_console: Option<bool>,
	pub report_to_server: Option<bool>,
	pub server_endpoint: Option<String>,
	pub api_key: Option<String>,
	pub request_timeout_secs: Option<u64>,

	pub environment: Option<String>,
	pub release: Option<String>,
	pub user_id: Option<String>,
	pub session_id: Option<SessionId>,

	pub long_task_threshold_ms: Option<u64>,
	pub long_task_issue_threshold_ms: Option<u64>,
	pub slow_api_threshold_ms: Option<u64>,
	pub memory_sample_interval_secs: Option<u64>,
	pub memory_warning_ratio: Option<f64>,
	pub memory_critical_ratio: Option<f64>,
}

macro_rules! overlay {
	($base:expr, $other:expr, [$($field:ident),+ $(,)?]) => {
		$(
			if $other.$field.is_some() {
				$base.$field = $other.$field;
			}
		)+
	};
}

impl TrackerConfigLayer {
	/// Overlays every field that `other` sets.
	pub fn merge(&mut self, other: Self) {
		overlay!(
			self,
			other,
			[
				enable_console_capture,
				enable_network_capture,
				enable_performance_capture,
				enable_user_interaction_capture,
				enable_unhandled_rejection_capture,
				enable_resource_error_capture,
				enable_panic_capture,
				max_breadcrumbs,
				max_errors,
				max_performance_issues,
				mirror_performance_issues,
				report_to_console,
				report_to_server,
				server_endpoint,
				api_key,
				request_timeout_secs,
				environment,
				release,
				user_id,
				session_id,
				long_task_threshold_ms,
				long_task_issue_threshold_ms,
				slow_api_threshold_ms,
				memory_sample_interval_secs,
				memory_warning_ratio,
				memory_critical_ratio,
			]
		);
	}

	pub fn finalize(self) -> TrackerConfig {
		let defaults = TrackerConfig::default();
		TrackerConfig {
			enable_console_capture: self
				.enable_console_capture
				.unwrap_or(defaults.enable_console_capture),
			enable_network_capture: self
				.enable_network_capture
				.unwrap_or(defaults.enable_network_capture),
			enable_performance_capture: self
				.enable_performance_capture
				.unwrap_or(defaults.enable_performance_capture),
			enable_user_interaction_capture: self
				.enable_user_interaction_capture
				.unwrap_or(defaults.enable_user_interaction_capture),
			enable_unhandled_rejection_capture: self
				.enable_unhandled_rejection_capture
				.unwrap_or(defaults.enable_unhandled_rejection_capture),
			enable_resource_error_capture: self
				.enable_resource_error_capture
				.unwrap_or(defaults.enable_resource_error_capture),
			enable_panic_capture: self
				.enable_panic_capture
				.unwrap_or(defaults.enable_panic_capture),
			max_breadcrumbs: self.max_breadcrumbs.unwrap_or(defaults.max_breadcrumbs),
			max_errors: self.max_errors.unwrap_or(defaults.max_errors),
			max_performance_issues: self
				.max_performance_issues
				.unwrap_or(defaults.max_performance_issues),
			mirror_performance_issues: self
				.mirror_performance_issues
				.unwrap_or(defaults.mirror_performance_issues),
			report_to_console: self.report_to_console.unwrap_or(defaults.report_to_console),
			report_to_server: self.report_to_server.unwrap_or(defaults.report_to_server),
			server_endpoint: self.server_endpoint,
			api_key: self.api_key,
			request_timeout_secs: self
				.request_timeout_secs
				.unwrap_or(defaults.request_timeout_secs),
			environment: self.environment.unwrap_or(defaults.environment),
			release: self.release,
			user_id: self.user_id,
			session_id: self.session_id,
			long_task_threshold_ms: self
				.long_task_threshold_ms
				.unwrap_or(defaults.long_task_threshold_ms),
			long_task_issue_threshold_ms: self
				.long_task_issue_threshold_ms
				.unwrap_or(defaults.long_task_issue_threshold_ms),
			slow_api_threshold_ms: self
				.slow_api_threshold_ms
				.unwrap_or(defaults.slow_api_threshold_ms),
			memory_sample_interval_secs: self
				.memory_sample_interval_secs
				.unwrap_or(defaults.memory_sample_interval_secs),
			memory_warning_ratio: self
				.memory_warning_ratio
				.unwrap_or(defaults.memory_warning_ratio),
			memory_critical_ratio: self
				.memory_critical_ratio
				.unwrap_or(defaults.memory_critical_ratio),
		}
	}
}
