// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fan-out of "new error" events to registered listeners.

use parking_lot::RwLock;
use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::error;

use crate::record::ErrorRecord;

/// Callback invoked the first time a fingerprint is captured.
pub type ErrorListener = Arc<dyn Fn(&ErrorRecord) + Send + Sync>;

thread_local! {
	static DISPATCHING: Cell<bool> = const { Cell::new(false) };
}

/// Returns true while the current thread is running error listeners or
/// other host callbacks entered through [`DispatchGuard`].
pub fn is_dispatching() -> bool {
	DISPATCHING.with(Cell::get)
}

/// Marks the current thread as running host callbacks until dropped.
///
/// Panic reporting skips panics raised under the guard; the unwind
/// boundary around the callback logs them instead.
#[must_use = "the thread is only marked while the guard is alive"]
pub struct DispatchGuard {
	was_dispatching: bool,
}

impl DispatchGuard {
	pub fn enter() -> Self {
		Self {
			was_dispatching: DISPATCHING.with(|d| d.replace(true)),
		}
	}
}

impl Drop for DispatchGuard {
	fn drop(&mut self) {
		DISPATCHING.with(|d| d.set(self.was_dispatching));
	}
}

struct NotifierInner {
	listeners: RwLock<Vec<(u64, ErrorListener)>>,
	next_id: AtomicU64,
}

/// Registry of error listeners.
///
/// Every listener runs in its own unwind boundary: a panicking listener is
/// logged and skipped, the remaining listeners still run and the capture
/// that triggered the dispatch completes normally.
#[derive(Clone)]
pub struct Notifier {
	inner: Arc<NotifierInner>,
}

impl Notifier {
	pub fn new() -> Self {
		Self {
			inner: Arc::new(NotifierInner {
				listeners: RwLock::new(Vec::new()),
				next_id: AtomicU64::new(1),
			}),
		}
	}

	pub fn subscribe(&self, listener: ErrorListener) -> Subscription {
		let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
		self.inner.listeners.write().push((id, listener));
		Subscription {
			id,
			notifier: Arc::downgrade(&self.inner),
		}
	}

	pub fn listener_count(&self) -> usize {
		self.inner.listeners.read().len()
	}

	/// Invokes every listener with `record`.
	///
	/// Listeners are cloned out of the registry first so they can subscribe,
	/// unsubscribe or query the tracker without deadlocking.
	pub fn notify(&self, record: &ErrorRecord) {
		let listeners: Vec<(u64, ErrorListener)> = self.inner.listeners.read().clone();
		if listeners.is_empty() {
			return;
		}

		let _guard = DispatchGuard::enter();
		for (id, listener) in listeners {
			if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(record))) {
				error!(
					listener_id = id,
					fingerprint = %record.fingerprint,
					panic = %panic_message(payload.as_ref()),
					"Error listener panicked"
				);
			}
		}
	}
}

impl Default for Notifier {
	fn default() -> Self {
		Self::new()
	}
}

/// Handle returned by [`Notifier::subscribe`].
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
	id: u64,
	notifier: Weak<NotifierInner>,
}

impl Subscription {
	/// Removes the listener. Returns false if it was already gone.
	pub fn unsubscribe(self) -> bool {
		let Some(inner) = self.notifier.upgrade() else {
			return false;
		};
		let mut listeners = inner.listeners.write();
		let before = listeners.len();
		listeners.retain(|(id, _)| *id != self.id);
		listeners.len() != before
	}
}

/// Extract a printable message from a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
	if let Some(s) = payload.downcast_ref::<&str>() {
		s.to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"Box<dyn Any>".to_string()
	}
}

impl std::fmt::Debug for NotifierInner {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("NotifierInner")
			.field("listeners", &self.listeners.read().len())
			.finish()
	}
}
