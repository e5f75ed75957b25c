// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Breadcrumbs (events leading up to an error) and the bounded ring that
//! holds them.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::context::Context;
use crate::error::TrackerError;

/// Default number of breadcrumbs kept by the ring.
pub const DEFAULT_MAX_BREADCRUMBS: usize = 100;

/// A breadcrumb representing an event leading up to an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breadcrumb {
	pub timestamp: DateTime<Utc>,
	pub message: String,
	pub category: BreadcrumbCategory,
	pub level: BreadcrumbLevel,
	#[serde(default, skip_serializing_if = "Context::is_empty")]
	pub data: Context,
}

impl Breadcrumb {
	/// Creates an `info` breadcrumb stamped with the current time.
	pub fn new(category: BreadcrumbCategory, message: impl Into<String>) -> Self {
		Self {
			timestamp: Utc::now(),
			message: message.into(),
			category,
			level: BreadcrumbLevel::Info,
			data: Context::new(),
		}
	}

	pub fn with_level(mut self, level: BreadcrumbLevel) -> Self {
		self.level = level;
		self
	}

	pub fn with_data(mut self, data: Context) -> Self {
		self.data = data;
		self
	}
}

/// Where a breadcrumb came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreadcrumbCategory {
	Navigation,
	User,
	Console,
	Network,
	Dom,
	Http,
	Performance,
}

impl fmt::Display for BreadcrumbCategory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Navigation => write!(f, "navigation"),
			Self::User => write!(f, "user"),
			Self::Console => write!(f, "console"),
			Self::Network => write!(f, "network"),
			Self::Dom => write!(f, "dom"),
			Self::Http => write!(f, "http"),
			Self::Performance => write!(f, "performance"),
		}
	}
}

impl FromStr for BreadcrumbCategory {
	type Err = TrackerError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"navigation" => Ok(Self::Navigation),
			"user" => Ok(Self::User),
			"console" => Ok(Self::Console),
			"network" => Ok(Self::Network),
			"dom" => Ok(Self::Dom),
			"http" => Ok(Self::Http),
			"performance" => Ok(Self::Performance),
			_ => Err(TrackerError::InvalidBreadcrumbCategory(s.to_string())),
		}
	}
}

/// Severity level of a breadcrumb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreadcrumbLevel {
	Debug,
	Info,
	Warning,
	Error,
}

impl fmt::Display for BreadcrumbLevel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Debug => write!(f, "debug"),
			Self::Info => write!(f, "info"),
			Self::Warning => write!(f, "warning"),
			Self::Error => write!(f, "error"),
		}
	}
}

impl FromStr for BreadcrumbLevel {
	type Err = TrackerError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"debug" => Ok(Self::Debug),
			"info" => Ok(Self::Info),
			"warning" => Ok(Self::Warning),
			"error" => Ok(Self::Error),
			_ => Err(TrackerError::InvalidBreadcrumbLevel(s.to_string())),
		}
	}
}

/// A thread-safe, bounded, insertion-ordered breadcrumb log.
///
/// Once `capacity` is reached the oldest breadcrumbs are evicted first.
#[derive(Clone)]
pub struct BreadcrumbRing {
	inner: Arc<RingInner>,
}

struct RingInner {
	entries: RwLock<VecDeque<Breadcrumb>>,
	capacity: usize,
}

impl BreadcrumbRing {
	pub fn new(capacity: usize) -> Self {
		Self {
			inner: Arc::new(RingInner {
				entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
				capacity,
			}),
		}
	}

	/// Appends a breadcrumb, then trims to the most recent `capacity` entries.
	pub fn add(&self, breadcrumb: Breadcrumb) {
		let mut entries = self.inner.entries.write();
		entries.push_back(breadcrumb);
		while entries.len() > self.inner.capacity {
			entries.pop_front();
		}
	}

	/// Returns an owned copy of the current trail, oldest first.
	pub fn snapshot(&self) -> Vec<Breadcrumb> {
		self.inner.entries.read().iter().cloned().collect()
	}

	pub fn clear(&self) {
		self.inner.entries.write().clear();
	}

	pub fn len(&self) -> usize {
		self.inner.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.entries.read().is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.inner.capacity
	}
}

impl Default for BreadcrumbRing {
	fn default() -> Self {
		Self::new(DEFAULT_MAX_BREADCRUMBS)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn crumb(i: usize) -> Breadcrumb {
		Breadcrumb::new(BreadcrumbCategory::User, format!("click {i}"))
	}

	#[test]
	fn keeps_last_hundred_of_one_hundred_fifty() {
		let ring = BreadcrumbRing::new(100);
		for i in 0..150 {
			ring.add(crumb(i));
		}

		let trail = ring.snapshot();
		assert_eq!(trail.len(), 100);
		assert_eq!(trail[0].message, "click 50");
		assert_eq!(trail[99].message, "click 149");
	}

	#[test]
	fn snapshot_is_detached_from_ring() {
		let ring = BreadcrumbRing::new(3);
		ring.add(crumb(0));
		let before = ring.snapshot();

		ring.add(crumb(1));
		ring.clear();

		assert_eq!(before.len(), 1);
		assert_eq!(before[0].message, "click 0");
		assert!(ring.is_empty());
	}

	#[test]
	fn breadcrumb_serializes_camel_case_with_snake_enums() {
		let b = Breadcrumb::new(BreadcrumbCategory::Http, "GET /api/contacts")
			.with_level(BreadcrumbLevel::Warning)
			.with_data(Context::new().with("status", 404));

		let json = serde_json::to_value(&b).unwrap();
		assert_eq!(json["category"], "http");
		assert_eq!(json["level"], "warning");
		assert_eq!(json["data"]["status"], 404);
	}

	proptest! {
		#[test]
		fn ring_never_exceeds_capacity_and_keeps_order(
			capacity in 1usize..64,
			count in 0usize..200,
		) {
			let ring = BreadcrumbRing::new(capacity);
			for i in 0..count {
				ring.add(crumb(i));
			}

			let trail = ring.snapshot();
			prop_assert_eq!(trail.len(), count.min(capacity));

			let first = count.saturating_sub(capacity);
			for (offset, b) in trail.iter().enumerate() {
				prop_assert_eq!(&b.message, &format!("click {}", first + offset));
			}
		}

		#[test]
		fn breadcrumb_level_roundtrip(level in prop_oneof![
			Just(BreadcrumbLevel::Debug),
			Just(BreadcrumbLevel::Info),
			Just(BreadcrumbLevel::Warning),
			Just(BreadcrumbLevel::Error),
		]) {
			let parsed: BreadcrumbLevel = level.to_string().parse().unwrap();
			prop_assert_eq!(level, parsed);
		}
	}
}
