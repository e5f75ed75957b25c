// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded, fingerprint-keyed error store with least-recently-updated eviction.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::record::ErrorRecord;
use crate::ErrorId;

/// Default number of distinct errors kept by the store.
pub const DEFAULT_MAX_ERRORS: usize = 1000;

/// Result of inserting a capture into the store.
#[derive(Debug, Clone)]
pub enum Upsert {
	/// First occurrence of the fingerprint; carries a copy of the new record.
	Created(ErrorRecord),
	/// Repeat occurrence; the existing record was updated in place.
	Repeated { id: ErrorId, occurrences: u64 },
}

impl Upsert {
	pub fn id(&self) -> ErrorId {
		match self {
			Self::Created(record) => record.id,
			Self::Repeated { id, .. } => *id,
		}
	}
}

struct Entry {
	record: ErrorRecord,
	/// Insertion sequence, used for stable listing order.
	created: u64,
	/// Sequence of the last update, used for eviction and recency.
	touched: u64,
}

/// Fingerprint-keyed error store.
///
/// Not synchronized; the owner wraps it in a lock.
pub struct ErrorStore {
	entries: HashMap<String, Entry>,
	capacity: usize,
	seq: u64,
}

impl ErrorStore {
	pub fn new(capacity: usize) -> Self {
		Self {
			entries: HashMap::new(),
			capacity,
			seq: 0,
		}
	}

	/// Records one occurrence of `fingerprint`.
	///
	/// Repeats bump `occurrences` and `last_seen`; otherwise `build` creates
	/// the record. Eviction runs afterwards and returns the fingerprints it
	/// removed alongside the outcome.
	pub fn upsert(
		&mut self,
		fingerprint: &str,
		now: DateTime<Utc>,
		build: impl FnOnce() -> ErrorRecord,
	) -> (Upsert, Vec<String>) {
		self.seq += 1;
		let seq = self.seq;

		let outcome = match self.entries.get_mut(fingerprint) {
			Some(entry) => {
				entry.record.occurrences += 1;
				entry.record.last_seen = now;
				entry.touched = seq;
				Upsert::Repeated {
					id: entry.record.id,
					occurrences: entry.record.occurrences,
				}
			}
			None => {
				let record = build();
				let created = record.clone();
				self.entries.insert(
					fingerprint.to_string(),
					Entry {
						record,
						created: seq,
						touched: seq,
					},
				);
				Upsert::Created(created)
			}
		};

		let evicted = self.evict();
		(outcome, evicted)
	}

	/// Removes least-recently-updated entries until the store fits.
	fn evict(&mut self) -> Vec<String> {
		let mut evicted = Vec::new();
		while self.entries.len() > self.capacity {
			let Some(oldest) = self
				.entries
				.iter()
				.min_by_key(|(_, e)| e.touched)
				.map(|(fp, _)| fp.clone())
			else {
				break;
			};
			self.entries.remove(&oldest);
			evicted.push(oldest);
		}
		evicted
	}

	pub fn get(&self, fingerprint: &str) -> Option<&ErrorRecord> {
		self.entries.get(fingerprint).map(|e| &e.record)
	}

	/// All records in creation order.
	pub fn records(&self) -> Vec<ErrorRecord> {
		let mut entries: Vec<&Entry> = self.entries.values().collect();
		entries.sort_by_key(|e| e.created);
		entries.into_iter().map(|e| e.record.clone()).collect()
	}

	/// Up to `limit` records, most recently updated first.
	pub fn recent(&self, limit: usize) -> Vec<ErrorRecord> {
		let mut entries: Vec<&Entry> = self.entries.values().collect();
		entries.sort_by(|a, b| b.touched.cmp(&a.touched));
		entries
			.into_iter()
			.take(limit)
			.map(|e| e.record.clone())
			.collect()
	}

	/// Marks a record resolved. Unknown fingerprints are left alone.
	pub fn resolve(&mut self, fingerprint: &str, now: DateTime<Utc>) -> bool {
		match self.entries.get_mut(fingerprint) {
			Some(entry) => {
				entry.record.resolved = true;
				entry.record.resolved_at.get_or_insert(now);
				true
			}
			None => false,
		}
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}
}

impl Default for ErrorStore {
	fn default() -> Self {
		Self::new(DEFAULT_MAX_ERRORS)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::context::Context;
	use crate::record::{ErrorCategory, Severity};
	use crate::SessionId;
	use proptest::prelude::*;

	fn record(fingerprint: &str) -> ErrorRecord {
		let now = Utc::now();
		ErrorRecord {
			id: ErrorId::new(),
			message: fingerprint.to_string(),
			stack: None,
			fingerprint: fingerprint.to_string(),
			first_seen: now,
			last_seen: now,
			occurrences: 1,
			severity: Severity::Medium,
			category: ErrorCategory::Javascript,
			context: Context::new(),
			breadcrumbs: Vec::new(),
			tags: Vec::new(),
			resolved: false,
			resolved_at: None,
			session_id: SessionId::new(),
			user_id: None,
		}
	}

	fn capture(store: &mut ErrorStore, fp: &str) -> (Upsert, Vec<String>) {
		store.upsert(fp, Utc::now(), || record(fp))
	}

	#[test]
	fn repeat_updates_in_place() {
		let mut store = ErrorStore::new(10);
		let (first, _) = capture(&mut store, "a");
		let (second, _) = capture(&mut store, "a");

		assert!(matches!(first, Upsert::Created(_)));
		assert!(matches!(second, Upsert::Repeated { occurrences: 2, .. }));
		assert_eq!(first.id(), second.id());
		assert_eq!(store.len(), 1);
		assert_eq!(store.get("a").unwrap().occurrences, 2);
	}

	#[test]
	fn evicts_least_recently_updated() {
		let mut store = ErrorStore::new(2);
		capture(&mut store, "a");
		capture(&mut store, "b");
		// Touching "a" makes "b" the stalest.
		capture(&mut store, "a");
		let (_, evicted) = capture(&mut store, "c");

		assert_eq!(evicted, vec!["b".to_string()]);
		assert!(store.get("a").is_some());
		assert!(store.get("b").is_none());
		assert!(store.get("c").is_some());
	}

	#[test]
	fn records_keep_creation_order_and_recent_uses_updates() {
		let mut store = ErrorStore::new(10);
		capture(&mut store, "a");
		capture(&mut store, "b");
		capture(&mut store, "c");
		capture(&mut store, "a");

		let order: Vec<String> = store.records().into_iter().map(|r| r.fingerprint).collect();
		assert_eq!(order, vec!["a", "b", "c"]);

		let recent: Vec<String> = store.recent(2).into_iter().map(|r| r.fingerprint).collect();
		assert_eq!(recent, vec!["a", "c"]);
	}

	#[test]
	fn resolve_unknown_is_a_no_op() {
		let mut store = ErrorStore::new(10);
		capture(&mut store, "a");

		assert!(!store.resolve("missing", Utc::now()));
		assert!(!store.get("a").unwrap().resolved);

		assert!(store.resolve("a", Utc::now()));
		let resolved = store.get("a").unwrap();
		assert!(resolved.resolved);
		assert!(resolved.resolved_at.is_some());
	}

	proptest! {
		#[test]
		fn store_never_exceeds_capacity(
			capacity in 1usize..16,
			fingerprints in proptest::collection::vec(0u8..32, 0..100),
		) {
			let mut store = ErrorStore::new(capacity);
			for fp in &fingerprints {
				capture(&mut store, &fp.to_string());
				prop_assert!(store.len() <= capacity);
			}

			// The most recently captured fingerprint always survives.
			if let Some(last) = fingerprints.last() {
				prop_assert!(store.get(&last.to_string()).is_some());
			}
		}
	}
}
