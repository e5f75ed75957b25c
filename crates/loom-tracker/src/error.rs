// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the tracker SDK.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for tracker SDK operations.
pub type Result<T> = std::result::Result<T, TrackerSdkError>;

/// Errors that can occur in the tracker SDK.
///
/// None of these escape from capture paths; they are returned from setup
/// (building the handler, loading configuration, installing interceptors)
/// and from explicit exports.
#[derive(Debug, Error)]
pub enum TrackerSdkError {
	/// Configuration could not be loaded or is invalid.
	#[error("configuration error: {0}")]
	Config(#[from] ConfigError),

	/// The HTTP client could not be built.
	#[error("HTTP client error: {0}")]
	HttpClient(#[from] reqwest::Error),

	/// An interceptor could not be installed.
	#[error("interceptor {name} failed to install: {message}")]
	InterceptorInstall {
		/// Interceptor name.
		name: &'static str,
		/// Why installation failed.
		message: String,
	},

	/// Error from the tracker core (export serialization).
	#[error(transparent)]
	Core(#[from] loom_tracker_core::TrackerError),
}

/// Errors raised while loading tracker configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("Invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },

	#[error("Failed to parse TOML config at {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("Failed to read config file {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Validation error: {0}")]
	Validation(String),
}
