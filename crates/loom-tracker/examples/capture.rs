// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Example: track errors in a small async program using the loom-tracker SDK.
//!
//! Run with:
//!   cargo run --example capture -p loom-tracker
//!
//! Set LOOM_TRACKER_REPORT_TO_SERVER=true and LOOM_TRACKER_SERVER_ENDPOINT
//! to also post captures to a collector.

use std::time::Duration;

use loom_tracker::{
	Breadcrumb, BreadcrumbCategory, CaptureOptions, Context, ErrorCategory, ErrorHandler, Severity,
	TrackedError,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let handler = ErrorHandler::builder()
		.config(loom_tracker::load_config()?)
		.before_send(|error| (!error.message.contains("ResizeObserver")).then_some(error))
		.on_error(|event| println!("captured {} ({})", event.error_id, event.options.category))
		.build()?;

	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with(tracing_subscriber::fmt::layer())
		.with(handler.console_layer())
		.init();

	handler.initialize();
	handler.set_user("user_example_123", Some(Context::new().with("email", "example@example.com")));

	handler.interactions().navigate("/", "/contacts");
	handler.add_breadcrumb(Breadcrumb::new(BreadcrumbCategory::User, "Opened contact list"));
	tracing::warn!(target: "crm::contacts", rows = 5000, "Contact list is large");

	// An HTTP failure captured by the instrumented client
	let http = handler.http_client(reqwest::Client::new());
	let _ = http
		.send(http.get("https://httpbin.org/status/503"))
		.await;

	// Slow work
	handler
		.long_tasks()
		.time("render pipeline board", tokio::time::sleep(Duration::from_millis(180)))
		.await;

	// A failing background task
	let _ = handler
		.tasks()
		.spawn("sync-invoices", async { Err::<(), _>("invoice service unavailable") })
		.await;

	// Manual capture
	handler.capture_error(
		TrackedError::new("Example test error from loom-tracker SDK").with_name("ExampleError"),
		CaptureOptions::new(Severity::Medium, ErrorCategory::Api).with("attempt", 1),
	);

	let metrics = handler.metrics();
	println!("\nMetrics:");
	println!("  Total errors:      {}", metrics.total_errors);
	println!("  Unresolved errors: {}", metrics.unresolved_errors);
	for top in &metrics.top_errors {
		println!("  {:>3}x {}", top.count, top.message);
	}
	println!("  Performance issues: {}", handler.performance_issues().len());

	println!("\n{}", handler.export_errors()?);

	handler.destroy();
	Ok(())
}
