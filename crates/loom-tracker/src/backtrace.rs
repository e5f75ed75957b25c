// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Turns a Rust backtrace into a compact, application-only stack string.
//!
//! The first lines of the stack feed the error fingerprint, so frames from
//! the standard library, the async runtime and the tracker itself are left
//! out: they differ between call paths without telling errors apart.

use rustc_demangle::demangle;
use std::backtrace::Backtrace;

/// One frame of a rendered backtrace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
	pub function: String,
	/// `file:line:column` when debug info is available.
	pub location: Option<String>,
}

impl StackFrame {
	fn render(&self) -> String {
		match &self.location {
			Some(location) => format!("at {} ({location})", self.function),
			None => format!("at {}", self.function),
		}
	}
}

/// Captures the current backtrace and renders its in-app frames, one per
/// line. Returns `None` when no in-app frame could be resolved.
pub fn capture_stack() -> Option<String> {
	render_stack(&Backtrace::force_capture().to_string())
}

/// Renders the in-app frames of a formatted backtrace.
pub fn render_stack(backtrace: &str) -> Option<String> {
	let lines: Vec<String> = parse_frames(backtrace)
		.iter()
		.filter(|frame| is_in_app_frame(&frame.function))
		.map(StackFrame::render)
		.collect();
	(!lines.is_empty()).then(|| lines.join("\n"))
}

/// Parses `std::backtrace::Backtrace` display output:
///
/// ```text
///    3: my_app::handlers::process
///              at ./src/handlers.rs:42:9
/// ```
pub fn parse_frames(backtrace: &str) -> Vec<StackFrame> {
	let mut frames: Vec<StackFrame> = Vec::new();

	for line in backtrace.lines() {
		let line = line.trim();
		if line.is_empty() {
			continue;
		}

		if let Some(location) = line.strip_prefix("at ") {
			if let Some(frame) = frames.last_mut() {
				if frame.location.is_none() {
					frame.location = Some(location.trim().to_string());
				}
			}
			continue;
		}

		let Some((index, function)) = line.split_once(':') else {
			continue;
		};
		if index.trim().parse::<u32>().is_err() {
			continue;
		}
		let function = function.trim();
		if function.is_empty() {
			continue;
		}

		frames.push(StackFrame {
			function: demangle(function).to_string(),
			location: None,
		});
	}

	frames
}

/// Whether a frame belongs to the host application rather than to the
/// standard library, a runtime crate or the tracker.
pub fn is_in_app_frame(function: &str) -> bool {
	const SYSTEM_PREFIXES: &[&str] = &[
		"std::",
		"core::",
		"alloc::",
		"<std::",
		"<core::",
		"<alloc::",
		"tokio::",
		"<tokio::",
		"futures::",
		"<futures::",
		"futures_util::",
		"<futures_util::",
		"tracing::",
		"<tracing::",
		"tracing_subscriber::",
		"<tracing_subscriber::",
		"loom_tracker::",
		"<loom_tracker::",
		"loom_tracker_core::",
		"<loom_tracker_core::",
		"panic_unwind::",
		"rust_begin_unwind",
		"rust_panic",
		"__rust_",
		"_rust_",
		"__libc_start",
		"_start",
		"clone",
		"start_thread",
	];

	const SYSTEM_CONTAINS: &[&str] = &[
		"::panicking::",
		"::sys_common::",
		"::rt::lang_start",
		"__rust_begin_short_backtrace",
		"__rust_end_short_backtrace",
	];

	if function == "main" {
		return true;
	}
	if SYSTEM_PREFIXES.iter().any(|p| function.starts_with(p)) {
		return false;
	}
	!SYSTEM_CONTAINS.iter().any(|c| function.contains(c))
}
