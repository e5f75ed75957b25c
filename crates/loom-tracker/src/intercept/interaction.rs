// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User interaction and navigation breadcrumbs.

use std::sync::Arc;

use loom_tracker_core::{Breadcrumb, BreadcrumbCategory, Context};

use super::{CaptureSink, Interceptor, SinkSlot};
use crate::error::Result;

/// Records what the user did. Only ever adds breadcrumbs.
#[derive(Default)]
pub struct InteractionRecorder {
	sink: SinkSlot,
}

impl InteractionRecorder {
	pub fn new() -> Self {
		Self::default()
	}

	/// A click, key press or command on `target`.
	pub fn click(&self, target: &str, data: Context) {
		let Some(sink) = self.sink.get() else {
			return;
		};
		let mut data = data;
		data.insert("target", target);
		sink.add_breadcrumb(
			Breadcrumb::new(BreadcrumbCategory::User, format!("Clicked {target}")).with_data(data),
		);
	}

	/// A move between screens or routes. `to` becomes the current location
	/// attached to later captures.
	pub fn navigate(&self, from: &str, to: &str) {
		let Some(sink) = self.sink.get() else {
			return;
		};
		sink.add_breadcrumb(
			Breadcrumb::new(BreadcrumbCategory::Navigation, format!("Navigated from {from} to {to}"))
				.with_data(Context::new().with("from", from).with("to", to)),
		);
		sink.set_current_url(to.to_string());
	}
}

impl Interceptor for InteractionRecorder {
	fn name(&self) -> &'static str {
		"interaction"
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
