// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `tracing` layer that turns warnings and errors into console breadcrumbs.

use std::fmt;
use std::sync::Arc;

use loom_tracker_core::fingerprint::truncate;
use loom_tracker_core::{Breadcrumb, BreadcrumbCategory, BreadcrumbLevel, Context, ContextValue};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::{CaptureSink, Interceptor, SinkSlot};
use crate::error::Result;

/// Longest breadcrumb message kept from a log event.
const MAX_MESSAGE_CHARS: usize = 1000;

/// Events from these targets are the tracker's own output.
const OWN_TARGET_PREFIX: &str = "loom_tracker";

/// Switch for the console breadcrumb layer.
#[derive(Default)]
pub struct ConsoleInterceptor {
	sink: SinkSlot,
}

impl ConsoleInterceptor {
	pub fn new() -> Self {
		Self::default()
	}
}

impl Interceptor for ConsoleInterceptor {
	fn name(&self) -> &'static str {
		"console"
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

/// A tracing Layer that records `WARN` and `ERROR` events as breadcrumbs.
///
/// Add it to the host's subscriber next to its formatting layer. It never
/// filters: every event still reaches the other layers unchanged. While the
/// owning [`ConsoleInterceptor`] is not installed the layer does nothing.
#[derive(Clone)]
pub struct ConsoleLayer {
	interceptor: Arc<ConsoleInterceptor>,
}

impl ConsoleLayer {
	pub fn new(interceptor: Arc<ConsoleInterceptor>) -> Self {
		Self { interceptor }
	}
}

impl<S> Layer<S> for ConsoleLayer
where
	S: Subscriber + for<'a> LookupSpan<'a>,
{
	fn on_event(&self, event: &Event<'_>, _ctx: layer::Context<'_, S>) {
		let metadata = event.metadata();
		let level = match *metadata.level() {
			Level::ERROR => BreadcrumbLevel::Error,
			Level::WARN => BreadcrumbLevel::Warning,
			_ => return,
		};
		if metadata.target().starts_with(OWN_TARGET_PREFIX) {
			return;
		}
		let Some(sink) = self.interceptor.sink.get() else {
			return;
		};

		let mut visitor = BreadcrumbVisitor::default();
		event.record(&mut visitor);

		let mut data = visitor.fields;
		data.insert("target", metadata.target());
		let message = visitor
			.message
			.unwrap_or_else(|| metadata.target().to_string());

		sink.add_breadcrumb(
			Breadcrumb::new(BreadcrumbCategory::Console, truncate(&message, MAX_MESSAGE_CHARS))
				.with_level(level)
				.with_data(data),
		);
	}
}

#[derive(Default)]
struct BreadcrumbVisitor {
	message: Option<String>,
	fields: Context,
}

impl BreadcrumbVisitor {
	fn put(&mut self, field: &Field, value: impl Into<ContextValue>) {
		self.fields.insert(field.name(), value);
	}
}

impl Visit for BreadcrumbVisitor {
	fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
		let rendered = format!("{value:?}");
		if field.name() == "message" {
			self.message = Some(rendered);
		} else {
			self.put(field, rendered);
		}
	}

	fn record_str(&mut self, field: &Field, value: &str) {
		if field.name() == "message" {
			self.message = Some(value.to_string());
		} else {
			self.put(field, value);
		}
	}

	fn record_i64(&mut self, field: &Field, value: i64) {
		self.put(field, value);
	}

	fn record_u64(&mut self, field: &Field, value: u64) {
		self.put(field, value);
	}

	fn record_bool(&mut self, field: &Field, value: bool) {
		self.put(field, value);
	}

	fn record_f64(&mut self, field: &Field, value: f64) {
		self.put(field, value);
	}

	fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
		self.put(field, value.to_string());
	}
}
