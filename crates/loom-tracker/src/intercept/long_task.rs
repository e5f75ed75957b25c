// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Long task monitoring.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use loom_tracker_core::{
	Breadcrumb, BreadcrumbCategory, BreadcrumbLevel, Context, PerformanceIssue, PerformanceIssueType,
	Severity,
};

use super::{CaptureSink, Interceptor, SinkSlot};
use crate::error::Result;

/// Times units of work and flags the slow ones.
///
/// Work longer than `breadcrumb_threshold` leaves a performance
/// breadcrumb. Work longer than `issue_threshold` is also recorded as a
/// `slow_render` issue, at high severity when it takes more than twice the
/// threshold.
pub struct LongTaskMonitor {
	sink: SinkSlot,
	breadcrumb_threshold: Duration,
	issue_threshold: Duration,
}

impl LongTaskMonitor {
	pub fn new(breadcrumb_threshold: Duration, issue_threshold: Duration) -> Self {
		Self {
			sink: SinkSlot::new(),
			breadcrumb_threshold,
			issue_threshold,
		}
	}

	pub fn record(&self, name: &str, duration: Duration) {
		if duration <= self.breadcrumb_threshold {
			return;
		}
		let Some(sink) = self.sink.get() else {
			return;
		};

		let duration_ms = duration.as_secs_f64() * 1000.0;
		sink.add_breadcrumb(
			Breadcrumb::new(
				BreadcrumbCategory::Performance,
				format!("Long task detected: {name} took {duration_ms:.0}ms"),
			)
			.with_level(BreadcrumbLevel::Warning)
			.with_data(Context::new().with("name", name).with("durationMs", duration_ms)),
		);

		if duration > self.issue_threshold {
			let threshold_ms = self.issue_threshold.as_secs_f64() * 1000.0;
			let severity = if duration_ms > threshold_ms * 2.0 {
				Severity::High
			} else {
				Severity::Medium
			};
			sink.record_performance_issue(
				PerformanceIssue::new(
					PerformanceIssueType::SlowRender,
					severity,
					format!("Slow task: {name} took {duration_ms:.0}ms"),
					threshold_ms,
					duration_ms,
				)
				.with_metric("durationMs", duration_ms),
			);
		}
	}

	/// Starts a timer that records when dropped.
	pub fn start(self: &Arc<Self>, name: impl Into<String>) -> TaskTimer {
		TaskTimer {
			monitor: Arc::clone(self),
			name: name.into(),
			started: Instant::now(),
		}
	}

	/// Awaits `future` and records how long it took.
	pub async fn time<F: Future>(&self, name: &str, future: F) -> F::Output {
		let started = Instant::now();
		let output = future.await;
		self.record(name, started.elapsed());
		output
	}
}

impl Interceptor for LongTaskMonitor {
	fn name(&self) -> &'static str {
		"long_task"
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

/// Guard returned by [`LongTaskMonitor::start`].
#[must_use = "the task is timed until the timer is dropped"]
pub struct TaskTimer {
	monitor: Arc<LongTaskMonitor>,
	name: String,
	started: Instant,
}

impl Drop for TaskTimer {
	fn drop(&mut self) {
		self.monitor.record(&self.name, self.started.elapsed());
	}
}

#[cfg(test)]
mod tests {
	use super::super::testing::RecordingSink;
	use super::*;

	fn installed() -> (Arc<LongTaskMonitor>, Arc<RecordingSink>) {
		let monitor = Arc::new(LongTaskMonitor::new(
			Duration::from_millis(50),
			Duration::from_millis(100),
		));
		let recording = RecordingSink::new();
		monitor.install(recording.as_sink()).unwrap();
		(monitor, recording)
	}

	#[test]
	fn short_tasks_are_ignored() {
		let (monitor, recording) = installed();
		monitor.record("render", Duration::from_millis(50));
		assert!(recording.breadcrumbs.lock().is_empty());
	}

	#[test]
	fn long_task_leaves_breadcrumb() {
		let (monitor, recording) = installed();
		monitor.record("render", Duration::from_millis(80));

		let crumbs = recording.breadcrumbs.lock();
		assert_eq!(crumbs.len(), 1);
		assert_eq!(crumbs[0].category, BreadcrumbCategory::Performance);
		assert!(recording.issues.lock().is_empty());
	}

	#[test]
	fn very_long_task_records_slow_render() {
		let (monitor, recording) = installed();
		monitor.record("pipeline board", Duration::from_millis(150));
		monitor.record("pipeline board", Duration::from_millis(250));

		let issues = recording.issues.lock();
		assert_eq!(issues.len(), 2);
		assert_eq!(issues[0].issue_type, PerformanceIssueType::SlowRender);
		assert_eq!(issues[0].severity, Severity::Medium);
		assert_eq!(issues[0].actual_value, 150.0);
		assert_eq!(issues[1].severity, Severity::High);
		assert_eq!(recording.breadcrumbs.lock().len(), 2);
	}

	#[test]
	fn timer_records_on_drop() {
		let (monitor, recording) = installed();
		{
			let _timer = monitor.start("sleep");
			std::thread::sleep(Duration::from_millis(60));
		}
		assert_eq!(recording.breadcrumbs.lock().len(), 1);
	}

	#[tokio::test]
	async fn time_returns_output() {
		let (monitor, recording) = installed();
		let value = monitor.time("quick", async { 7 }).await;
		assert_eq!(value, 7);
		assert!(recording.breadcrumbs.lock().is_empty());
	}
}
