// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types and stores for the Loom error and performance tracker.
//!
//! This crate holds everything the tracker keeps in memory and is shared by
//! the `loom-tracker` SDK and by anything that reads its exports. It has no
//! runtime dependencies; every operation is synchronous and thread-safe.
//!
//! # Overview
//!
//! - Fingerprinting of errors by message and leading stack lines
//! - A deduplicating, bounded error store with least-recently-updated eviction
//! - A bounded breadcrumb ring whose trail is snapshotted into each new record
//! - Listener fan-out with per-listener panic isolation
//! - A parallel store for performance issues (long tasks, memory pressure,
//!   slow network calls)
//! - Aggregated metrics and a lossless JSON export

pub mod breadcrumb;
pub mod context;
pub mod error;
pub mod error_core;
pub mod export;
pub mod fingerprint;
pub mod metrics;
pub mod notifier;
pub mod performance;
pub mod record;
pub mod store;

pub use breadcrumb::{Breadcrumb, BreadcrumbCategory, BreadcrumbLevel, BreadcrumbRing};
pub use context::{Context, ContextValue, UserContext};
pub use error::{Result, TrackerError};
pub use error_core::{CaptureOptions, CoreOptions, ErrorCore};
pub use export::ErrorExport;
pub use fingerprint::compute_fingerprint;
pub use metrics::{ErrorMetrics, TopError};
pub use notifier::{is_dispatching, DispatchGuard, ErrorListener, Notifier, Subscription};
pub use performance::{PerformanceIssue, PerformanceIssueStore, PerformanceIssueType};
pub use record::{ErrorCategory, ErrorRecord, Severity, TrackedError};
pub use store::{ErrorStore, Upsert};

use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
		#[serde(transparent)]
		pub struct $name(pub Uuid);

		impl $name {
			pub fn new() -> Self {
				Self(Uuid::now_v7())
			}
		}

		impl Default for $name {
			fn default() -> Self {
				Self::new()
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl FromStr for $name {
			type Err = uuid::Error;

			fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
				Ok(Self(Uuid::parse_str(s)?))
			}
		}
	};
}

uuid_id!(
	/// Identifier of an error record.
	ErrorId
);

uuid_id!(
	/// Identifier of a performance issue.
	PerformanceIssueId
);

uuid_id!(
	/// Identifier of a tracker session; one per tracker instance.
	SessionId
);

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn ids_serialize_as_plain_strings() {
		let id = SessionId::new();
		let json = serde_json::to_string(&id).unwrap();
		assert_eq!(json, format!("\"{id}\""));
	}

	proptest! {
		#[test]
		fn session_id_roundtrip(uuid_bytes in any::<[u8; 16]>()) {
			let id = SessionId(Uuid::from_bytes(uuid_bytes));
			let parsed: SessionId = id.to_string().parse().unwrap();
			prop_assert_eq!(id, parsed);
		}
	}
}
