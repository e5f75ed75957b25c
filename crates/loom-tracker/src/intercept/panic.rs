// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Panic hook integration: uncaught panics become `javascript` errors.

use std::panic::PanicHookInfo;
use std::sync::Arc;

use loom_tracker_core::notifier::panic_message;
use loom_tracker_core::{
	is_dispatching, CaptureOptions, DispatchGuard, ErrorCategory, Severity, TrackedError,
};
use parking_lot::Mutex;
use tracing::warn;

use super::task::in_supervised_task;
use super::{CaptureSink, Interceptor, SinkSlot};
use crate::backtrace::capture_stack;
use crate::error::Result;

type PanicHook = dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static;

const REPORTER_THREAD: &str = "loom-tracker-panic";

/// Chains a reporting hook in front of the process panic hook.
///
/// The previous hook always runs after reporting, so panic output and
/// abort behavior are unchanged. Panics raised while error listeners or
/// handler callbacks run, and panics inside supervised tasks, are left to
/// their own reporting paths.
///
/// The chained hook is installed once per interceptor and never removed:
/// `uninstall` empties the sink slot, which turns the hook into a plain
/// pass-through. Hooks that other code chains on top later stay intact.
#[derive(Default)]
pub struct PanicInterceptor {
	sink: SinkSlot,
	hooked: Mutex<bool>,
}

impl PanicInterceptor {
	pub fn new() -> Self {
		Self::default()
	}
}

impl Interceptor for PanicInterceptor {
	fn name(&self) -> &'static str {
		"panic"
	}

	fn install(&self, sink: Arc<dyn CaptureSink>) -> Result<()> {
		let mut hooked = self.hooked.lock();
		self.sink.set(&sink);
		if *hooked {
			return Ok(());
		}

		let chained: Arc<PanicHook> = Arc::from(std::panic::take_hook());
		let slot = self.sink.clone();
		std::panic::set_hook(Box::new(move |info| {
			if let Some(sink) = slot.get() {
				if !is_dispatching() && !in_supervised_task() {
					report_panic(&sink, info);
				}
			}
			chained(info);
		}));
		*hooked = true;
		Ok(())
	}

	fn uninstall(&self) {
		self.sink.clear();
	}

	fn is_installed(&self) -> bool {
		self.sink.is_set()
	}
}

fn report_panic(sink: &Arc<dyn CaptureSink>, info: &PanicHookInfo<'_>) {
	let message = panic_message(info.payload());
	let mut error = TrackedError::new(message).with_name("panic");
	if let Some(stack) = capture_stack() {
		error = error.with_stack(stack);
	}

	let mut options = CaptureOptions::new(Severity::High, ErrorCategory::Javascript);
	if let Some(location) = info.location() {
		options = options
			.with("filename", location.file())
			.with("lineno", location.line())
			.with("colno", location.column());
	}
	if let Some(thread) = std::thread::current().name() {
		options = options.with("thread", thread);
	}

	// A second panic on this thread while the hook runs aborts the process,
	// so host callbacks and listeners run on a helper thread where they can
	// unwind into their own boundaries.
	std::thread::scope(|scope| {
		let spawned = std::thread::Builder::new()
			.name(REPORTER_THREAD.to_string())
			.spawn_scoped(scope, move || {
				let _guard = DispatchGuard::enter();
				sink.capture(error, options)
			});
		match spawned {
			Ok(handle) => {
				if handle.join().is_err() {
					warn!("Panic capture failed");
				}
			}
			Err(e) => warn!(error = %e, "Failed to spawn panic capture thread"),
		}
	});
}
