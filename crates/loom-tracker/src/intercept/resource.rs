// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resource load failures (assets, templates, config files, plugins).

use std::fmt::Display;
use std::sync::Arc;

use loom_tracker_core::{CaptureOptions, ErrorCategory, ErrorId, Severity, TrackedError};

use super::{CaptureSink, Interceptor, SinkSlot};
use crate::error::Result;

#[derive(Default)]
pub struct ResourceMonitor {
	sink: SinkSlot,
}

impl ResourceMonitor {
	pub fn new() -> Self {
		Self::default()
	}

	/// Captures a failed load of `resource` as a `resource` error.
	pub fn report(&self, resource: &str, reason: impl Display) -> Option<ErrorId> {
		let sink = self.sink.get()?;
		let tracked = TrackedError::new(format!("Failed to load resource: {resource}"))
			.with_name("ResourceError");
		let options = CaptureOptions::new(Severity::Medium, ErrorCategory::Resource)
			.with("resource", resource)
			.with("reason", reason.to_string());
		sink.capture(tracked, options)
	}

	/// Passes `result` through, reporting it first if it is an error.
	pub fn watch<T, E: Display>(&self, resource: &str, result: std::result::Result<T, E>) -> std::result::Result<T, E> {
		if let Err(e) = &result {
			self.report(resource, e);
		}
		result
	}
}

impl Interceptor for ResourceMonitor {
	fn name(&self) -> &'static str {
		"resource"
	}

	fn install(&self, sink: Arc<dyn CaptureSink>) -> Result<()> {
		self.sink.set(&sink);
		Ok(())
	}

	fn uninstall(&self) {
		self.sink.clear();
	}

	fn is_installed(&self) -> bool {
		self.sink.is_set()
	}
}
