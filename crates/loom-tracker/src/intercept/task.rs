// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Supervised tasks: background work whose failures nobody awaits.

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use loom_tracker_core::notifier::panic_message;
use loom_tracker_core::{CaptureOptions, ErrorCategory, Severity, TrackedError};
use tokio::task::JoinHandle;

use super::{CaptureSink, Interceptor, SinkSlot};
use crate::error::Result;

tokio::task_local! {
	static SUPERVISED: ();
}

/// True when called from inside a task spawned by [`TaskSupervisor`].
pub fn in_supervised_task() -> bool {
	SUPERVISED.try_with(|_| ()).is_ok()
}

/// Spawns tokio tasks and reports how they fail.
///
/// A task that resolves to `Err` is captured as a `promise` error; a task
/// that panics is captured and the panic is resumed, so the caller's
/// [`JoinHandle`] sees exactly the outcome it would have seen from
/// `tokio::spawn`.
#[derive(Default)]
pub struct TaskSupervisor {
	sink: SinkSlot,
}

impl TaskSupervisor {
	pub fn new() -> Self {
		Self::default()
	}

	/// Spawns `future` on the current runtime.
	///
	/// # Panics
	///
	/// Panics when called outside a tokio runtime, like `tokio::spawn`.
	pub fn spawn<F, T, E>(&self, name: impl Into<String>, future: F) -> JoinHandle<std::result::Result<T, E>>
	where
		F: Future<Output = std::result::Result<T, E>> + Send + 'static,
		T: Send + 'static,
		E: Display + Send + 'static,
	{
		if !self.sink.is_set() {
			return tokio::spawn(future);
		}

		let name = name.into();
		let slot = self.sink.clone();
		tokio::spawn(async move {
			match AssertUnwindSafe(SUPERVISED.scope((), future)).catch_unwind().await {
				Ok(Ok(value)) => Ok(value),
				Ok(Err(e)) => {
					if let Some(sink) = slot.get() {
						report_rejection(sink.as_ref(), &name, e.to_string(), "rejected");
					}
					Err(e)
				}
				Err(payload) => {
					if let Some(sink) = slot.get() {
						report_rejection(sink.as_ref(), &name, panic_message(&*payload), "panicked");
					}
					std::panic::resume_unwind(payload)
				}
			}
		})
	}
}

fn report_rejection(sink: &dyn CaptureSink, task: &str, reason: String, outcome: &str) {
	let error = TrackedError::new(reason).with_name("UnhandledRejection");
	let options = CaptureOptions::new(Severity::High, ErrorCategory::Promise)
		.with("task", task)
		.with("outcome", outcome);
	sink.capture(error, options);
}

impl Interceptor for TaskSupervisor {
	fn name(&self) -> &'static str {
		"task"
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

#[cfg(test)]
mod tests {
	use super::super::testing::RecordingSink;
	use super::*;

	#[tokio::test]
	async fn failed_task_is_captured_and_error_returned() {
		let supervisor = TaskSupervisor::new();
		let recording = RecordingSink::new();
		supervisor.install(recording.as_sink()).unwrap();

		let result = supervisor
			.spawn("sync-contacts", async { Err::<(), _>("upstream refused") })
			.await
			.unwrap();
		assert_eq!(result, Err("upstream refused"));

		let captures = recording.captures.lock();
		assert_eq!(captures.len(), 1);
		let (error, options) = &captures[0];
		assert_eq!(error.message, "upstream refused");
		assert_eq!(options.category, ErrorCategory::Promise);
		assert_eq!(options.severity, Severity::High);
		assert_eq!(options.context.get_str("task"), Some("sync-contacts"));
		assert_eq!(options.context.get_str("outcome"), Some("rejected"));
	}

	#[tokio::test]
	async fn panicking_task_is_captured_and_panic_propagates() {
		let supervisor = TaskSupervisor::new();
		let recording = RecordingSink::new();
		supervisor.install(recording.as_sink()).unwrap();

		let join = supervisor
			.spawn("reindex", async {
				assert!(in_supervised_task());
				if true {
					panic!("index corrupted");
				}
				Ok::<(), String>(())
			})
			.await;
		assert!(join.unwrap_err().is_panic());

		let captures = recording.captures.lock();
		assert_eq!(captures.len(), 1);
		assert_eq!(captures[0].0.message, "index corrupted");
		assert_eq!(captures[0].1.context.get_str("outcome"), Some("panicked"));
	}

	#[tokio::test]
	async fn successful_task_records_nothing() {
		let supervisor = TaskSupervisor::new();
		let recording = RecordingSink::new();
		supervisor.install(recording.as_sink()).unwrap();

		let value = supervisor
			.spawn("ok", async { Ok::<_, String>(42) })
			.await
			.unwrap();
		assert_eq!(value, Ok(42));
		assert!(recording.captures.lock().is_empty());
	}

	#[tokio::test]
	async fn uninstalled_supervisor_is_plain_spawn() {
		let supervisor = TaskSupervisor::new();
		let recording = RecordingSink::new();
		supervisor.install(recording.as_sink()).unwrap();
		supervisor.uninstall();

		let result = supervisor
			.spawn("ignored", async { Err::<(), _>("nobody listens") })
			.await
			.unwrap();
		assert!(result.is_err());
		assert!(recording.captures.lock().is_empty());
		assert!(!in_supervised_task());
	}
}
