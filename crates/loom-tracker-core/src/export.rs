// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! JSON interchange format for everything the tracker holds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metrics::ErrorMetrics;
use crate::performance::PerformanceIssue;
use crate::record::ErrorRecord;
use crate::SessionId;

/// Full dump of the tracker state.
///
/// Serializes to `{errors, performanceIssues, metrics, sessionId, exportTime}`
/// and parses back to an equal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorExport {
	pub errors: Vec<ErrorRecord>,
	pub performance_issues: Vec<PerformanceIssue>,
	pub metrics: ErrorMetrics,
	pub session_id: SessionId,
	pub export_time: DateTime<Utc>,
}

impl ErrorExport {
	pub fn to_json(&self) -> Result<String> {
		Ok(serde_json::to_string_pretty(self)?)
	}

	pub fn from_json(json: &str) -> Result<Self> {
		Ok(serde_json::from_str(json)?)
	}
}
