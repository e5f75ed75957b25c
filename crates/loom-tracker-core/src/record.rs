// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error records, the capture input type and the severity/category taxonomy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::breadcrumb::Breadcrumb;
use crate::context::Context;
use crate::error::TrackerError;
use crate::{ErrorId, SessionId};

/// How bad an error is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
	Low,
	Medium,
	High,
	Critical,
}

impl Default for Severity {
	fn default() -> Self {
		Self::Medium
	}
}

impl fmt::Display for Severity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Low => write!(f, "low"),
			Self::Medium => write!(f, "medium"),
			Self::High => write!(f, "high"),
			Self::Critical => write!(f, "critical"),
		}
	}
}

impl FromStr for Severity {
	type Err = TrackerError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"low" => Ok(Self::Low),
			"medium" => Ok(Self::Medium),
			"high" => Ok(Self::High),
			"critical" => Ok(Self::Critical),
			_ => Err(TrackerError::InvalidSeverity(s.to_string())),
		}
	}
}

/// What kind of failure an error is.
///
/// The set is open: any unknown name parses into [`ErrorCategory::Custom`]
/// and serializes back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCategory {
	/// Uncaught runtime failures (panics).
	Javascript,
	Network,
	Api,
	Ui,
	Performance,
	Security,
	Console,
	/// Failures of detached async tasks.
	Promise,
	Resource,
	Custom(String),
}

impl Default for ErrorCategory {
	fn default() -> Self {
		Self::Javascript
	}
}

impl ErrorCategory {
	pub fn as_str(&self) -> &str {
		match self {
			Self::Javascript => "javascript",
			Self::Network => "network",
			Self::Api => "api",
			Self::Ui => "ui",
			Self::Performance => "performance",
			Self::Security => "security",
			Self::Console => "console",
			Self::Promise => "promise",
			Self::Resource => "resource",
			Self::Custom(name) => name,
		}
	}
}

impl fmt::Display for ErrorCategory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ErrorCategory {
	type Err = std::convert::Infallible;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(match s {
			"javascript" => Self::Javascript,
			"network" => Self::Network,
			"api" => Self::Api,
			"ui" => Self::Ui,
			"performance" => Self::Performance,
			"security" => Self::Security,
			"console" => Self::Console,
			"promise" => Self::Promise,
			"resource" => Self::Resource,
			other => Self::Custom(other.to_string()),
		})
	}
}

impl From<String> for ErrorCategory {
	fn from(s: String) -> Self {
		match s.parse() {
			Ok(category) => category,
			Err(never) => match never {},
		}
	}
}

impl From<ErrorCategory> for String {
	fn from(c: ErrorCategory) -> Self {
		match c {
			ErrorCategory::Custom(name) => name,
			other => other.as_str().to_string(),
		}
	}
}

/// An error as handed to the tracker.
///
/// Anything that can go wrong is normalized into this shape: plain strings
/// become an `Error` with no stack, [`std::error::Error`] values keep their
/// type name and source chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedError {
	pub name: String,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stack: Option<String>,
}

impl TrackedError {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			name: "Error".to_string(),
			message: message.into(),
			stack: None,
		}
	}

	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
		self.stack = Some(stack.into());
		self
	}

	/// Normalizes a Rust error, recording its source chain as stack lines.
	pub fn from_error<E: std::error::Error + ?Sized>(error: &E) -> Self {
		let type_name = std::any::type_name::<E>();
		let name = if type_name.starts_with("dyn ") {
			"Error"
		} else {
			type_name
				.split('<')
				.next()
				.and_then(|path| path.rsplit("::").next())
				.filter(|n| !n.is_empty())
				.unwrap_or("Error")
		};

		let mut causes = Vec::new();
		let mut source = error.source();
		while let Some(cause) = source {
			causes.push(format!("Caused by: {cause}"));
			source = cause.source();
		}

		Self {
			name: name.to_string(),
			message: error.to_string(),
			stack: (!causes.is_empty()).then(|| causes.join("\n")),
		}
	}
}

impl fmt::Display for TrackedError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.name, self.message)
	}
}

impl From<&str> for TrackedError {
	fn from(message: &str) -> Self {
		Self::new(message)
	}
}

impl From<String> for TrackedError {
	fn from(message: String) -> Self {
		Self::new(message)
	}
}

/// A deduplicated error as held by the error store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
	pub id: ErrorId,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stack: Option<String>,
	pub fingerprint: String,
	pub first_seen: DateTime<Utc>,
	pub last_seen: DateTime<Utc>,
	pub occurrences: u64,
	pub severity: Severity,
	pub category: ErrorCategory,
	#[serde(default)]
	pub context: Context,
	/// Trail captured when the record was created. Never updated afterwards.
	#[serde(default)]
	pub breadcrumbs: Vec<Breadcrumb>,
	#[serde(default)]
	pub tags: Vec<String>,
	pub resolved: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub resolved_at: Option<DateTime<Utc>>,
	pub session_id: SessionId,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_id: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[derive(Debug)]
	struct Outer(std::io::Error);

	impl fmt::Display for Outer {
		fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
			write!(f, "failed to load invoices")
		}
	}

	impl std::error::Error for Outer {
		fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
			Some(&self.0)
		}
	}

	#[test]
	fn from_error_keeps_type_name_and_sources() {
		let err = Outer(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
		let tracked = TrackedError::from_error(&err);

		assert_eq!(tracked.name, "Outer");
		assert_eq!(tracked.message, "failed to load invoices");
		assert_eq!(tracked.stack.as_deref(), Some("Caused by: disk gone"));
	}

	#[test]
	fn from_error_without_source_has_no_stack() {
		let err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
		let tracked = TrackedError::from_error(&err);

		assert_eq!(tracked.name, "Error");
		assert!(tracked.stack.is_none());
	}

	#[test]
	fn dyn_errors_fall_back_to_error_name() {
		let err: Box<dyn std::error::Error> = "plain".into();
		let tracked = TrackedError::from_error(err.as_ref());
		assert_eq!(tracked.name, "Error");
		assert_eq!(tracked.message, "plain");
	}

	#[test]
	fn custom_category_serializes_verbatim() {
		let category: ErrorCategory = "billing".parse().unwrap();
		assert_eq!(category, ErrorCategory::Custom("billing".to_string()));

		let json = serde_json::to_string(&category).unwrap();
		assert_eq!(json, "\"billing\"");

		let known: ErrorCategory = serde_json::from_str("\"network\"").unwrap();
		assert_eq!(known, ErrorCategory::Network);
	}

	#[test]
	fn severity_orders_by_impact() {
		assert!(Severity::Low < Severity::Medium);
		assert!(Severity::High < Severity::Critical);
	}

	proptest! {
		#[test]
		fn severity_roundtrip(severity in prop_oneof![
			Just(Severity::Low),
			Just(Severity::Medium),
			Just(Severity::High),
			Just(Severity::Critical),
		]) {
			let parsed: Severity = severity.to_string().parse().unwrap();
			prop_assert_eq!(severity, parsed);
		}
	}
}
