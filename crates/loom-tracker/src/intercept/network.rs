// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP client instrumentation.
//!
//! [`InstrumentedClient`] wraps the host's `reqwest::Client`. Every call
//! leaves an `http` breadcrumb; failed calls are captured as `network`
//! errors and slow or timed-out calls become performance issues. Responses
//! and errors are handed back to the caller untouched.

use std::sync::Arc;
use std::time::{Duration, Instant};

use loom_tracker_core::{
	Breadcrumb, BreadcrumbCategory, BreadcrumbLevel, CaptureOptions, Context, ErrorCategory,
	PerformanceIssue, PerformanceIssueType, Severity, TrackedError,
};
use reqwest::{IntoUrl, Request, RequestBuilder, Response};

use super::{CaptureSink, Interceptor, SinkSlot};
use crate::error::Result;

/// Stands in for request parts a failed build never produced.
const UNKNOWN: &str = "<invalid>";

/// How an observed HTTP exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpOutcome {
	/// A response arrived with this status code.
	Status(u16),
	/// No response: connection, TLS, body or timeout failure.
	Failed { message: String, timed_out: bool },
}

impl HttpOutcome {
	pub fn is_ok(&self) -> bool {
		matches!(self, Self::Status(status) if (200..300).contains(status))
	}
}

pub struct NetworkInterceptor {
	sink: SinkSlot,
	slow_threshold: Duration,
}

impl NetworkInterceptor {
	pub fn new(slow_threshold: Duration) -> Self {
		Self {
			sink: SinkSlot::new(),
			slow_threshold,
		}
	}

	/// Records one finished exchange. Does nothing while uninstalled.
	pub fn observe(&self, method: &str, url: &str, outcome: &HttpOutcome, elapsed: Duration) {
		let Some(sink) = self.sink.get() else {
			return;
		};
		let duration_ms = elapsed.as_secs_f64() * 1000.0;

		let mut data = Context::new()
			.with("method", method)
			.with("url", url)
			.with("durationMs", duration_ms);
		let (message, level) = match outcome {
			HttpOutcome::Status(status) => {
				data.insert("status", *status);
				let level = if outcome.is_ok() {
					BreadcrumbLevel::Info
				} else {
					BreadcrumbLevel::Error
				};
				(format!("{method} {url} [{status}]"), level)
			}
			HttpOutcome::Failed { message, .. } => {
				data.insert("error", message.as_str());
				(format!("{method} {url} failed"), BreadcrumbLevel::Error)
			}
		};
		sink.add_breadcrumb(
			Breadcrumb::new(BreadcrumbCategory::Http, message)
				.with_level(level)
				.with_data(data),
		);

		if !outcome.is_ok() {
			capture_failure(sink.as_ref(), method, url, outcome, duration_ms);
		}

		if let HttpOutcome::Failed { timed_out: true, .. } = outcome {
			sink.record_performance_issue(
				PerformanceIssue::new(
					PerformanceIssueType::NetworkTimeout,
					Severity::High,
					format!("Request timed out: {method} {url}"),
					self.slow_threshold.as_secs_f64() * 1000.0,
					duration_ms,
				)
				.with_metric("durationMs", duration_ms),
			);
		} else if elapsed > self.slow_threshold {
			let threshold_ms = self.slow_threshold.as_secs_f64() * 1000.0;
			let severity = if duration_ms > threshold_ms * 2.0 {
				Severity::High
			} else {
				Severity::Medium
			};
			sink.record_performance_issue(
				PerformanceIssue::new(
					PerformanceIssueType::SlowApi,
					severity,
					format!("Slow API call: {method} {url} took {duration_ms:.0}ms"),
					threshold_ms,
					duration_ms,
				)
				.with_metric("durationMs", duration_ms),
			);
		}
	}
}

fn capture_failure(sink: &dyn CaptureSink, method: &str, url: &str, outcome: &HttpOutcome, duration_ms: f64) {
	let mut options = CaptureOptions::new(Severity::Medium, ErrorCategory::Network)
		.with("method", method)
		.with("requestUrl", url)
		.with("durationMs", duration_ms);

	let error = match outcome {
		HttpOutcome::Status(status) => {
			options.context.insert("status", *status);
			if *status >= 500 {
				options.severity = Severity::High;
			}
			TrackedError::new(format!("HTTP {status}: {method} {url}")).with_name("HttpError")
		}
		HttpOutcome::Failed { message, timed_out } => {
			options.severity = Severity::High;
			options.context.insert("timedOut", *timed_out);
			TrackedError::new(format!("Network request failed: {method} {url}: {message}"))
				.with_name("NetworkError")
		}
	};
	sink.capture(error, options);
}

impl Interceptor for NetworkInterceptor {
	fn name(&self) -> &'static str {
		"network"
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

/// A `reqwest::Client` whose calls are observed by a [`NetworkInterceptor`].
#[derive(Clone)]
pub struct InstrumentedClient {
	client: reqwest::Client,
	interceptor: Arc<NetworkInterceptor>,
}

impl InstrumentedClient {
	pub fn new(client: reqwest::Client, interceptor: Arc<NetworkInterceptor>) -> Self {
		Self {
			client,
			interceptor,
		}
	}

	/// The wrapped client. Calls made through it directly are not observed.
	pub fn inner(&self) -> &reqwest::Client {
		&self.client
	}

	pub fn get<U: IntoUrl>(&self, url: U) -> RequestBuilder {
		self.client.get(url)
	}

	pub fn post<U: IntoUrl>(&self, url: U) -> RequestBuilder {
		self.client.post(url)
	}

	/// Builds and executes `builder`. A request that fails to build (bad
	/// URL, invalid header) is observed as a failed call before the error is
	/// returned.
	pub async fn send(&self, builder: RequestBuilder) -> reqwest::Result<Response> {
		match builder.build() {
			Ok(request) => self.execute(request).await,
			Err(e) => {
				let url = e.url().map_or_else(|| UNKNOWN.to_string(), |url| url.to_string());
				let outcome = HttpOutcome::Failed {
					message: e.to_string(),
					timed_out: false,
				};
				self.interceptor.observe(UNKNOWN, &url, &outcome, Duration::ZERO);
				Err(e)
			}
		}
	}

	pub async fn execute(&self, request: Request) -> reqwest::Result<Response> {
		let method = request.method().to_string();
		let url = request.url().to_string();

		let start = Instant::now();
		let result = self.client.execute(request).await;
		let elapsed = start.elapsed();

		let outcome = match &result {
			Ok(response) => HttpOutcome::Status(response.status().as_u16()),
			Err(e) => HttpOutcome::Failed {
				message: e.to_string(),
				timed_out: e.is_timeout(),
			},
		};
		self.interceptor.observe(&method, &url, &outcome, elapsed);

		result
	}
}
