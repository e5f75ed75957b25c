// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Performance issues: recorded threshold violations (long tasks, memory
//! pressure, slow network calls).

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use crate::error::TrackerError;
use crate::record::Severity;
use crate::PerformanceIssueId;

/// Default number of performance issues kept before the oldest are dropped.
pub const DEFAULT_MAX_PERFORMANCE_ISSUES: usize = 1000;

/// Kind of threshold violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceIssueType {
	SlowApi,
	MemoryLeak,
	LargeBundle,
	SlowRender,
	NetworkTimeout,
}

impl fmt::Display for PerformanceIssueType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::SlowApi => write!(f, "slow_api"),
			Self::MemoryLeak => write!(f, "memory_leak"),
			Self::LargeBundle => write!(f, "large_bundle"),
			Self::SlowRender => write!(f, "slow_render"),
			Self::NetworkTimeout => write!(f, "network_timeout"),
		}
	}
}

impl FromStr for PerformanceIssueType {
	type Err = TrackerError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"slow_api" => Ok(Self::SlowApi),
			"memory_leak" => Ok(Self::MemoryLeak),
			"large_bundle" => Ok(Self::LargeBundle),
			"slow_render" => Ok(Self::SlowRender),
			"network_timeout" => Ok(Self::NetworkTimeout),
			_ => Err(TrackerError::InvalidIssueType(s.to_string())),
		}
	}
}

/// Maps a measurement onto a value JSON can carry: NaN becomes 0 and
/// infinities saturate to the largest finite value of the same sign.
pub fn finite_measure(value: f64) -> f64 {
	if value.is_nan() {
		0.0
	} else {
		value.clamp(f64::MIN, f64::MAX)
	}
}

/// A single recorded threshold violation. Issues are never deduplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceIssue {
	pub id: PerformanceIssueId,
	#[serde(rename = "type")]
	pub issue_type: PerformanceIssueType,
	pub severity: Severity,
	pub message: String,
	#[serde(default)]
	pub metrics: BTreeMap<String, f64>,
	pub threshold: f64,
	pub actual_value: f64,
	pub timestamp: DateTime<Utc>,
	#[serde(default)]
	pub url: String,
	pub resolved: bool,
}

impl PerformanceIssue {
	/// Creates an unresolved issue stamped with the current time.
	pub fn new(
		issue_type: PerformanceIssueType,
		severity: Severity,
		message: impl Into<String>,
		threshold: f64,
		actual_value: f64,
	) -> Self {
		Self {
			id: PerformanceIssueId::new(),
			issue_type,
			severity,
			message: message.into(),
			metrics: BTreeMap::new(),
			threshold: finite_measure(threshold),
			actual_value: finite_measure(actual_value),
			timestamp: Utc::now(),
			url: String::new(),
			resolved: false,
		}
	}

	pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
		self.metrics.insert(name.into(), finite_measure(value));
		self
	}

	/// Applies [`finite_measure`] to every measurement, including ones set
	/// through the public fields.
	pub fn normalized(mut self) -> Self {
		self.threshold = finite_measure(self.threshold);
		self.actual_value = finite_measure(self.actual_value);
		for value in self.metrics.values_mut() {
			*value = finite_measure(*value);
		}
		self
	}

	pub fn with_url(mut self, url: impl Into<String>) -> Self {
		self.url = url.into();
		self
	}
}

/// Bounded, insertion-ordered store of performance issues.
pub struct PerformanceIssueStore {
	issues: RwLock<VecDeque<PerformanceIssue>>,
	capacity: usize,
}

impl PerformanceIssueStore {
	pub fn new(capacity: usize) -> Self {
		Self {
			issues: RwLock::new(VecDeque::new()),
			capacity,
		}
	}

	pub fn record(&self, issue: PerformanceIssue) {
		let mut issues = self.issues.write();
		issues.push_back(issue.normalized());
		while issues.len() > self.capacity {
			issues.pop_front();
		}
	}

	/// All issues, oldest first.
	pub fn all(&self) -> Vec<PerformanceIssue> {
		self.issues.read().iter().cloned().collect()
	}

	pub fn by_type(&self, issue_type: PerformanceIssueType) -> Vec<PerformanceIssue> {
		self
			.issues
			.read()
			.iter()
			.filter(|i| i.issue_type == issue_type)
			.cloned()
			.collect()
	}

	pub fn resolve(&self, id: PerformanceIssueId) -> bool {
		match self.issues.write().iter_mut().find(|i| i.id == id) {
			Some(issue) => {
				issue.resolved = true;
				true
			}
			None => false,
		}
	}

	pub fn clear(&self) {
		self.issues.write().clear();
	}

	pub fn len(&self) -> usize {
		self.issues.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.issues.read().is_empty()
	}
}

impl Default for PerformanceIssueStore {
	fn default() -> Self {
		Self::new(DEFAULT_MAX_PERFORMANCE_ISSUES)
	}
}
