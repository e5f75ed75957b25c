// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Periodic memory sampling.

use std::sync::Arc;
use std::time::Duration;

use loom_tracker_core::{PerformanceIssue, PerformanceIssueType, Severity};
use parking_lot::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use super::{CaptureSink, Interceptor, SinkSlot};
use crate::error::{Result, TrackerSdkError};

/// Memory in use against the limit it is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
	pub used_bytes: u64,
	pub limit_bytes: u64,
}

impl MemorySample {
	/// `used / limit`, or `None` when the limit is unknown.
	pub fn ratio(&self) -> Option<f64> {
		(self.limit_bytes > 0).then(|| self.used_bytes as f64 / self.limit_bytes as f64)
	}
}

pub trait MemorySource: Send + Sync + 'static {
	fn sample(&self) -> Option<MemorySample>;
}

/// Resident memory of the current process against the cgroup limit, or
/// total system memory when no cgroup limit applies.
pub struct SystemMemorySource {
	system: Mutex<System>,
	pid: Option<Pid>,
}

impl SystemMemorySource {
	pub fn new() -> Self {
		Self {
			system: Mutex::new(System::new()),
			pid: sysinfo::get_current_pid().ok(),
		}
	}
}

impl Default for SystemMemorySource {
	fn default() -> Self {
		Self::new()
	}
}

impl MemorySource for SystemMemorySource {
	fn sample(&self) -> Option<MemorySample> {
		let pid = self.pid?;
		let mut system = self.system.lock();
		system.refresh_memory();
		system.refresh_processes_specifics(
			ProcessesToUpdate::Some(&[pid]),
			false,
			ProcessRefreshKind::new().with_memory(),
		);

		let used_bytes = system.process(pid)?.memory();
		let limit_bytes = system
			.cgroup_limits()
			.map(|limits| limits.total_memory)
			.filter(|&total| total > 0)
			.unwrap_or_else(|| system.total_memory());

		(limit_bytes > 0).then_some(MemorySample {
			used_bytes,
			limit_bytes,
		})
	}
}

/// Thresholds applied to each sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryThresholds {
	pub warning_ratio: f64,
	pub critical_ratio: f64,
}

impl MemoryThresholds {
	/// Builds the issue for `sample`, if it crosses a threshold.
	pub fn evaluate(&self, sample: MemorySample) -> Option<PerformanceIssue> {
		let ratio = sample.ratio().filter(|r| r.is_finite())?;
		if ratio <= self.warning_ratio {
			return None;
		}
		let severity = if ratio > self.critical_ratio {
			Severity::Critical
		} else {
			Severity::High
		};
		Some(
			PerformanceIssue::new(
				PerformanceIssueType::MemoryLeak,
				severity,
				format!("High memory usage: {:.1}%", ratio * 100.0),
				self.warning_ratio,
				ratio,
			)
			.with_metric("usedBytes", sample.used_bytes as f64)
			.with_metric("limitBytes", sample.limit_bytes as f64)
			.with_metric("usageRatio", ratio),
		)
	}
}

/// Samples a [`MemorySource`] on an interval while installed.
///
/// Needs a tokio runtime at install time; without one installation fails
/// and the other interceptors carry on.
pub struct MemorySampler {
	sink: SinkSlot,
	source: Arc<dyn MemorySource>,
	interval: Duration,
	thresholds: MemoryThresholds,
	task: Mutex<Option<JoinHandle<()>>>,
}

impl MemorySampler {
	pub fn new(source: Arc<dyn MemorySource>, interval: Duration, thresholds: MemoryThresholds) -> Self {
		Self {
			sink: SinkSlot::new(),
			source,
			interval,
			thresholds,
			task: Mutex::new(None),
		}
	}

	/// Takes one sample now and records an issue if it crosses a threshold.
	pub fn check(&self) -> Option<PerformanceIssue> {
		let sink = self.sink.get()?;
		sample_once(self.source.as_ref(), &self.thresholds, sink.as_ref())
	}
}

fn sample_once(
	source: &dyn MemorySource,
	thresholds: &MemoryThresholds,
	sink: &dyn CaptureSink,
) -> Option<PerformanceIssue> {
	let sample = source.sample()?;
	trace!(used = sample.used_bytes, limit = sample.limit_bytes, "memory sample");
	let issue = thresholds.evaluate(sample)?;
	sink.record_performance_issue(issue.clone());
	Some(issue)
}

impl Interceptor for MemorySampler {
	fn name(&self) -> &'static str {
		"memory"
	}

	fn install(&self, sink: Arc<dyn CaptureSink>) -> Result<()> {
		let handle =
			tokio::runtime::Handle::try_current().map_err(|e| TrackerSdkError::InterceptorInstall {
				name: "memory",
				message: e.to_string(),
			})?;

		let mut task = self.task.lock();
		if let Some(previous) = task.take() {
			previous.abort();
		}
		self.sink.set(&sink);

		let slot = self.sink.clone();
		let source = Arc::clone(&self.source);
		let thresholds = self.thresholds;
		let period = self.interval;
		*task = Some(handle.spawn(async move {
			let mut ticker = interval_at(Instant::now() + period, period);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
			loop {
				ticker.tick().await;
				let Some(sink) = slot.get() else {
					debug!("memory sampler detached, stopping");
					break;
				};
				sample_once(source.as_ref(), &thresholds, sink.as_ref());
			}
		}));
		debug!(interval_secs = period.as_secs(), "memory sampler started");
		Ok(())
	}

	fn uninstall(&self) {
		self.sink.clear();
		if let Some(task) = self.task.lock().take() {
			task.abort();
		}
	}

	fn is_installed(&self) -> bool {
		self.sink.is_set()
	}
}

impl Drop for MemorySampler {
	fn drop(&mut self) {
		if let Some(task) = self.task.get_mut().take() {
			task.abort();
		}
	}
}
