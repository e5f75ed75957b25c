// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Automatic capture hooks.
//!
//! Each interceptor hooks one source of failures or telemetry in the host
//! process (panics, supervised tasks, `tracing` events, HTTP calls, long
//! tasks, memory pressure, user interactions, resource loads) and forwards
//! what it sees to a [`CaptureSink`]. Interceptors are strictly
//! pass-through: the observed behavior of the host is identical with or
//! without them, and an uninstalled interceptor records nothing.

pub mod console;
pub mod interaction;
pub mod long_task;
pub mod memory;
pub mod network;
pub mod panic;
pub mod resource;
pub mod task;

use std::sync::{Arc, Weak};

use loom_tracker_core::{Breadcrumb, CaptureOptions, ErrorId, PerformanceIssue, TrackedError};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::Result;

/// Destination of everything the interceptors observe.
pub trait CaptureSink: Send + Sync {
	/// Captures an error. Returns `None` when a filter dropped it.
	fn capture(&self, error: TrackedError, options: CaptureOptions) -> Option<ErrorId>;

	fn add_breadcrumb(&self, breadcrumb: Breadcrumb);

	fn record_performance_issue(&self, issue: PerformanceIssue);

	/// Location the host is currently at, if it tracks one.
	fn current_url(&self) -> Option<String> {
		None
	}

	fn set_current_url(&self, _url: String) {}
}

/// A hook that can be attached to and detached from a [`CaptureSink`].
pub trait Interceptor: Send + Sync {
	fn name(&self) -> &'static str;

	fn install(&self, sink: Arc<dyn CaptureSink>) -> Result<()>;

	/// Detaches the hook and restores whatever it replaced. Calling this on
	/// an interceptor that is not installed does nothing.
	fn uninstall(&self);

	fn is_installed(&self) -> bool;
}

/// Weak, swappable reference to the sink an interceptor reports into.
///
/// Empty while the interceptor is not installed. Holding the sink weakly
/// means a hook that outlives its handler (a panic hook left behind, a
/// detached task) silently stops reporting instead of keeping it alive.
#[derive(Clone, Default)]
pub struct SinkSlot {
	inner: Arc<RwLock<Option<Weak<dyn CaptureSink>>>>,
}

impl SinkSlot {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set(&self, sink: &Arc<dyn CaptureSink>) {
		*self.inner.write() = Some(Arc::downgrade(sink));
	}

	pub fn clear(&self) {
		*self.inner.write() = None;
	}

	pub fn get(&self) -> Option<Arc<dyn CaptureSink>> {
		self.inner.read().as_ref().and_then(Weak::upgrade)
	}

	pub fn is_set(&self) -> bool {
		self.get().is_some()
	}
}

struct Registration {
	interceptor: Arc<dyn Interceptor>,
	enabled: bool,
}

/// Ordered registry of interceptors.
///
/// Installation runs in registration order and stops at nothing: a hook
/// that fails to install is logged and skipped. Uninstallation runs in
/// reverse order so hooks that wrap one another unwind cleanly.
#[derive(Default)]
pub struct InterceptionLayer {
	registrations: RwLock<Vec<Registration>>,
}

impl InterceptionLayer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds an interceptor. Disabled interceptors are kept but never
	/// installed.
	pub fn register(&self, interceptor: Arc<dyn Interceptor>, enabled: bool) {
		debug!(interceptor = interceptor.name(), enabled, "Interceptor registered");
		self.registrations.write().push(Registration {
			interceptor,
			enabled,
		});
	}

	/// Installs every enabled interceptor. Returns how many are installed
	/// afterwards.
	pub fn install_all(&self, sink: &Arc<dyn CaptureSink>) -> usize {
		let registrations = self.registrations.read();
		let mut installed = 0;
		for registration in registrations.iter().filter(|r| r.enabled) {
			let interceptor = &registration.interceptor;
			if interceptor.is_installed() {
				installed += 1;
				continue;
			}
			match interceptor.install(Arc::clone(sink)) {
				Ok(()) => {
					debug!(interceptor = interceptor.name(), "Interceptor installed");
					installed += 1;
				}
				Err(e) => {
					warn!(interceptor = interceptor.name(), error = %e, "Failed to install interceptor");
				}
			}
		}
		installed
	}

	pub fn uninstall_all(&self) {
		let registrations = self.registrations.read();
		for registration in registrations.iter().rev() {
			let interceptor = &registration.interceptor;
			if interceptor.is_installed() {
				interceptor.uninstall();
				debug!(interceptor = interceptor.name(), "Interceptor uninstalled");
			}
		}
	}

	pub fn installed(&self) -> Vec<&'static str> {
		self.registrations
			.read()
			.iter()
			.filter(|r| r.interceptor.is_installed())
			.map(|r| r.interceptor.name())
			.collect()
	}

	pub fn len(&self) -> usize {
		self.registrations.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.registrations.read().is_empty()
	}
}


#[cfg(test)]
mod tests {
	use super::testing::RecordingSink;
	use super::*;
	use crate::error::TrackerSdkError;
	use parking_lot::Mutex;

	struct Probe {
		name: &'static str,
		fail: bool,
		log: Arc<Mutex<Vec<String>>>,
		slot: SinkSlot,
	}

	impl Interceptor for Probe {
		fn name(&self) -> &'static str {
			self.name
		}

		fn install(&self, sink: Arc<dyn CaptureSink>) -> Result<()> {
			if self.fail {
				return Err(TrackerSdkError::InterceptorInstall {
					name: self.name,
					message: "unsupported".to_string(),
				});
			}
			self.slot.set(&sink);
			self.log.lock().push(format!("install {}", self.name));
			Ok(())
		}

		fn uninstall(&self) {
			self.slot.clear();
			self.log.lock().push(format!("uninstall {}", self.name));
		}

		fn is_installed(&self) -> bool {
			self.slot.is_set()
		}
	}

	fn probe(name: &'static str, fail: bool, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn Interceptor> {
		Arc::new(Probe {
			name,
			fail,
			log: Arc::clone(log),
			slot: SinkSlot::new(),
		})
	}

	#[test]
	fn installs_in_order_and_uninstalls_in_reverse() {
		let log = Arc::new(Mutex::new(Vec::new()));
		let layer = InterceptionLayer::new();
		layer.register(probe("a", false, &log), true);
		layer.register(probe("b", false, &log), true);
		layer.register(probe("c", false, &log), false);

		let sink = RecordingSink::new().as_sink();
		assert_eq!(layer.install_all(&sink), 2);
		assert_eq!(layer.installed(), vec!["a", "b"]);

		layer.uninstall_all();
		assert_eq!(
			*log.lock(),
			vec!["install a", "install b", "uninstall b", "uninstall a"]
		);
		assert!(layer.installed().is_empty());
	}

	#[test]
	fn failed_install_does_not_block_others() {
		let log = Arc::new(Mutex::new(Vec::new()));
		let layer = InterceptionLayer::new();
		layer.register(probe("broken", true, &log), true);
		layer.register(probe("ok", false, &log), true);

		let sink = RecordingSink::new().as_sink();
		assert_eq!(layer.install_all(&sink), 1);
		assert_eq!(layer.installed(), vec!["ok"]);
	}

	#[test]
	fn install_all_is_idempotent() {
		let log = Arc::new(Mutex::new(Vec::new()));
		let layer = InterceptionLayer::new();
		layer.register(probe("a", false, &log), true);

		let sink = RecordingSink::new().as_sink();
		layer.install_all(&sink);
		layer.install_all(&sink);
		assert_eq!(*log.lock(), vec!["install a"]);
	}

	#[test]
	fn slot_empties_when_sink_dropped() {
		let slot = SinkSlot::new();
		let sink = RecordingSink::new().as_sink();
		slot.set(&sink);
		assert!(slot.is_set());

		drop(sink);
		assert!(!slot.is_set());
	}
}
