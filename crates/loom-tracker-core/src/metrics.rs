// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Aggregated error metrics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::record::{ErrorCategory, ErrorRecord, Severity};
use crate::SessionId;

/// How many entries `top_errors` holds at most.
pub const TOP_ERRORS_LIMIT: usize = 10;

/// One entry of the most frequent errors list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopError {
	pub fingerprint: String,
	pub message: String,
	pub count: u64,
}

/// Snapshot of the error store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMetrics {
	pub total_errors: usize,
	/// Errors recorded for the current session.
	pub error_rate: f64,
	pub unresolved_errors: usize,
	pub top_errors: Vec<TopError>,
	pub errors_by_category: BTreeMap<ErrorCategory, usize>,
	pub errors_by_severity: BTreeMap<Severity, usize>,
	/// Mean time from first sighting to resolution, in milliseconds. Zero
	/// until something is resolved.
	pub average_resolution_time: f64,
}

impl ErrorMetrics {
	/// Aggregates `records` (expected in creation order).
	pub fn compute(records: &[ErrorRecord], session_id: SessionId) -> Self {
		let mut by_fingerprint: BTreeMap<&str, (u64, &str, usize)> = BTreeMap::new();
		let mut errors_by_category = BTreeMap::new();
		let mut errors_by_severity = BTreeMap::new();
		let mut unresolved_errors = 0;
		let mut session_errors = 0usize;
		let mut resolution_total_ms = 0i64;
		let mut resolved_count = 0i64;

		for (position, record) in records.iter().enumerate() {
			let entry = by_fingerprint
				.entry(record.fingerprint.as_str())
				.or_insert((0, record.message.as_str(), position));
			entry.0 += record.occurrences;

			*errors_by_category
				.entry(record.category.clone())
				.or_insert(0) += 1;
			*errors_by_severity.entry(record.severity).or_insert(0) += 1;

			if !record.resolved {
				unresolved_errors += 1;
			}
			if record.session_id == session_id {
				session_errors += 1;
			}
			if let (true, Some(resolved_at)) = (record.resolved, record.resolved_at) {
				resolution_total_ms += (resolved_at - record.first_seen).num_milliseconds().max(0);
				resolved_count += 1;
			}
		}

		let mut top: Vec<(&str, (u64, &str, usize))> = by_fingerprint.into_iter().collect();
		top.sort_by(|(_, a), (_, b)| b.0.cmp(&a.0).then(a.2.cmp(&b.2)));
		let top_errors = top
			.into_iter()
			.take(TOP_ERRORS_LIMIT)
			.map(|(fingerprint, (count, message, _))| TopError {
				fingerprint: fingerprint.to_string(),
				message: message.to_string(),
				count,
			})
			.collect();

		let average_resolution_time = if resolved_count > 0 {
			resolution_total_ms as f64 / resolved_count as f64
		} else {
			0.0
		};

		Self {
			total_errors: records.len(),
			error_rate: session_errors as f64,
			unresolved_errors,
			top_errors,
			errors_by_category,
			errors_by_severity,
			average_resolution_time,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::context::Context;
	use crate::ErrorId;
	use chrono::{Duration, Utc};

	fn record(fp: &str, occurrences: u64, category: ErrorCategory, severity: Severity) -> ErrorRecord {
		let now = Utc::now();
		ErrorRecord {
			id: ErrorId::new(),
			message: format!("message {fp}"),
			stack: None,
			fingerprint: fp.to_string(),
			first_seen: now,
			last_seen: now,
			occurrences,
			severity,
			category,
			context: Context::new(),
			breadcrumbs: Vec::new(),
			tags: Vec::new(),
			resolved: false,
			resolved_at: None,
			session_id: SessionId::new(),
			user_id: None,
		}
	}

	#[test]
	fn empty_store_has_zero_metrics() {
		let metrics = ErrorMetrics::compute(&[], SessionId::new());
		assert_eq!(metrics, ErrorMetrics::default());
	}

	#[test]
	fn top_errors_sorted_by_occurrences_and_capped() {
		let mut records: Vec<ErrorRecord> = (0..12)
			.map(|i| record(&format!("fp{i}"), i + 1, ErrorCategory::Ui, Severity::Low))
			.collect();
		records.push(record("hot", 100, ErrorCategory::Network, Severity::High));

		let metrics = ErrorMetrics::compute(&records, SessionId::new());

		assert_eq!(metrics.top_errors.len(), TOP_ERRORS_LIMIT);
		assert_eq!(metrics.top_errors[0].fingerprint, "hot");
		assert_eq!(metrics.top_errors[0].count, 100);
		assert_eq!(metrics.top_errors[1].count, 12);
		assert_eq!(metrics.errors_by_category[&ErrorCategory::Ui], 12);
		assert_eq!(metrics.errors_by_severity[&Severity::High], 1);
	}

	#[test]
	fn resolution_time_and_unresolved_count() {
		let mut resolved = record("a", 1, ErrorCategory::Api, Severity::Medium);
		resolved.resolved = true;
		resolved.resolved_at = Some(resolved.first_seen + Duration::milliseconds(1500));
		let open = record("b", 1, ErrorCategory::Api, Severity::Medium);

		let metrics = ErrorMetrics::compute(&[resolved, open], SessionId::new());

		assert_eq!(metrics.unresolved_errors, 1);
		assert_eq!(metrics.average_resolution_time, 1500.0);
	}

	#[test]
	fn error_rate_counts_current_session_only() {
		let session = SessionId::new();
		let mut mine = record("a", 3, ErrorCategory::Api, Severity::Low);
		mine.session_id = session;
		let theirs = record("b", 1, ErrorCategory::Api, Severity::Low);

		let metrics = ErrorMetrics::compute(&[mine, theirs], session);
		assert_eq!(metrics.error_rate, 1.0);
		assert_eq!(metrics.total_errors, 2);
	}

	#[test]
	fn metrics_serialize_with_string_map_keys() {
		let records = vec![record("a", 1, ErrorCategory::Custom("billing".into()), Severity::Critical)];
		let metrics = ErrorMetrics::compute(&records, SessionId::new());

		let json = serde_json::to_value(&metrics).unwrap();
		assert_eq!(json["errorsByCategory"]["billing"], 1);
		assert_eq!(json["errorsBySeverity"]["critical"], 1);

		let parsed: ErrorMetrics = serde_json::from_value(json).unwrap();
		assert_eq!(parsed, metrics);
	}
}
