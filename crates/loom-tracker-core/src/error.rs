// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the tracker core.

use thiserror::Error;

/// Errors that can occur in the tracker core.
///
/// Capture paths never surface these; they come from parsing enum values out
/// of strings and from the JSON export.
#[derive(Debug, Error)]
pub enum TrackerError {
	#[error("invalid severity: {0}")]
	InvalidSeverity(String),

	#[error("invalid breadcrumb level: {0}")]
	InvalidBreadcrumbLevel(String),

	#[error("invalid breadcrumb category: {0}")]
	InvalidBreadcrumbCategory(String),

	#[error("invalid performance issue type: {0}")]
	InvalidIssueType(String),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

/// Result type for tracker core operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
