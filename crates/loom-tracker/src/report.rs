// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reporting captured errors to the log and to a collector endpoint.
//!
//! Server reporting is fire-and-forget: the request runs on the ambient
//! tokio runtime when there is one. Otherwise it is queued for a single
//! worker thread that owns a blocking client; when that queue is full the
//! report is dropped. Failures are logged and dropped. They are never
//! captured, so a broken collector cannot feed back into the tracker.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use loom_tracker_core::{CaptureOptions, Context, ErrorId, TrackedError};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, warn};

use crate::error::Result;

/// User-Agent sent with reports: `loom-tracker/{version} ({os}-{arch})`.
pub fn user_agent() -> String {
	format!(
		"loom-tracker/{} ({}-{})",
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}

/// Builds `{errorId, message, stack, name, ...context, timestamp}`.
///
/// Context keys override the four leading fields; `timestamp` is always the
/// report time.
pub fn build_payload(
	error_id: ErrorId,
	error: &TrackedError,
	context: &Context,
	timestamp: DateTime<Utc>,
) -> Value {
	let mut payload = Map::new();
	payload.insert("errorId".to_string(), Value::String(error_id.to_string()));
	payload.insert("message".to_string(), Value::String(error.message.clone()));
	payload.insert(
		"stack".to_string(),
		error.stack.clone().map_or(Value::Null, Value::String),
	);
	payload.insert("name".to_string(), Value::String(error.name.clone()));
	if let Ok(Value::Object(fields)) = serde_json::to_value(context) {
		payload.extend(fields);
	}
	payload.insert("timestamp".to_string(), Value::String(timestamp.to_rfc3339()));
	Value::Object(payload)
}

/// Writes the capture to the log: the error itself at `ERROR`, stack and
/// context at `DEBUG`.
pub fn log_capture(error_id: ErrorId, error: &TrackedError, options: &CaptureOptions) {
	error!(
		error_id = %error_id,
		name = %error.name,
		severity = %options.severity,
		category = %options.category,
		"Error captured: {}",
		error.message
	);
	if let Some(stack) = &error.stack {
		debug!(error_id = %error_id, stack = %stack, "Error stack");
	}
	debug!(error_id = %error_id, context = ?options.context, "Error context");
}

/// Reports waiting for the blocking worker before new ones are dropped.
pub const BLOCKING_QUEUE_CAPACITY: usize = 256;

/// Posts payloads to the collector endpoint.
#[derive(Clone)]
pub struct Reporter {
	endpoint: String,
	api_key: Option<String>,
	timeout: Duration,
	client: reqwest::Client,
	blocking: Arc<Mutex<Option<mpsc::Sender<Value>>>>,
}

impl Reporter {
	pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
		let client = reqwest::Client::builder()
			.user_agent(user_agent())
			.timeout(timeout)
			.build()?;
		Ok(Self {
			endpoint: endpoint.into(),
			api_key,
			timeout,
			client,
			blocking: Arc::new(Mutex::new(None)),
		})
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	/// Sends `payload` in the background. Never blocks the caller on the
	/// network and never fails.
	pub fn send(&self, payload: Value) {
		match tokio::runtime::Handle::try_current() {
			Ok(handle) => {
				let mut request = self.client.post(&self.endpoint).json(&payload);
				if let Some(key) = &self.api_key {
					request = request.header("Authorization", format!("Bearer {key}"));
				}
				let endpoint = self.endpoint.clone();
				handle.spawn(async move {
					match request.send().await {
						Ok(response) => log_response(&endpoint, response.status()),
						Err(e) => warn!(endpoint = %endpoint, error = %e, "Failed to report error"),
					}
				});
			}
			Err(_) => self.enqueue_blocking(payload),
		}
	}

	fn enqueue_blocking(&self, payload: Value) {
		let mut worker = self.blocking.lock();
		if worker.as_ref().map_or(true, mpsc::Sender::is_closed) {
			*worker = self.spawn_blocking_worker();
		}
		let Some(tx) = worker.as_ref() else {
			return;
		};
		match tx.try_send(payload) {
			Ok(()) => {}
			Err(TrySendError::Full(_)) => {
				warn!(capacity = BLOCKING_QUEUE_CAPACITY, "Report queue full, dropping error report");
			}
			Err(TrySendError::Closed(_)) => warn!("Report worker stopped, dropping error report"),
		}
	}

	/// Starts the worker thread. It exits once every clone of the reporter
	/// is gone and the queue has drained.
	fn spawn_blocking_worker(&self) -> Option<mpsc::Sender<Value>> {
		let (tx, mut rx) = mpsc::channel::<Value>(BLOCKING_QUEUE_CAPACITY);
		let endpoint = self.endpoint.clone();
		let api_key = self.api_key.clone();
		let timeout = self.timeout;

		let spawned = std::thread::Builder::new()
			.name("loom-tracker-report".to_string())
			.spawn(move || {
				let client = match reqwest::blocking::Client::builder()
					.user_agent(user_agent())
					.timeout(timeout)
					.build()
				{
					Ok(client) => client,
					Err(e) => {
						warn!(error = %e, "Failed to build blocking report client");
						return;
					}
				};
				while let Some(payload) = rx.blocking_recv() {
					let mut request = client.post(&endpoint).json(&payload);
					if let Some(key) = &api_key {
						request = request.header("Authorization", format!("Bearer {key}"));
					}
					match request.send() {
						Ok(response) => log_response(&endpoint, response.status()),
						Err(e) => warn!(endpoint = %endpoint, error = %e, "Failed to report error"),
					}
				}
			});

		match spawned {
			Ok(_) => Some(tx),
			Err(e) => {
				warn!(error = %e, "Failed to spawn report thread");
				None
			}
		}
	}
}

fn log_response(endpoint: &str, status: reqwest::StatusCode) {
	if status.is_success() {
		debug!(endpoint = %endpoint, status = status.as_u16(), "Error reported");
	} else {
		warn!(endpoint = %endpoint, status = status.as_u16(), "Error report rejected");
	}
}

impl std::fmt::Debug for Reporter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Reporter")
			.field("endpoint", &self.endpoint)
			.field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
			.field("timeout", &self.timeout)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use wiremock::matchers::{body_partial_json, header, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	#[test]
	fn payload_flattens_context_and_stamps_time() {
		let id = ErrorId::new();
		let error = TrackedError::new("boom").with_name("TypeError");
		let context = Context::new()
			.with("sessionId", "s1")
			.with("environment", "staging")
			.with("timestamp", "stale");
		let now = Utc::now();

		let payload = build_payload(id, &error, &context, now);
		assert_eq!(payload["errorId"], id.to_string());
		assert_eq!(payload["message"], "boom");
		assert_eq!(payload["name"], "TypeError");
		assert_eq!(payload["stack"], Value::Null);
		assert_eq!(payload["sessionId"], "s1");
		assert_eq!(payload["environment"], "staging");
		assert_eq!(payload["timestamp"], now.to_rfc3339());
	}

	#[test]
	fn user_agent_names_the_sdk() {
		assert!(user_agent().starts_with("loom-tracker/"));
	}

	#[test]
	fn debug_hides_api_key() {
		let reporter = Reporter::new("http://localhost/errors", Some("k-123".into()), Duration::from_secs(1)).unwrap();
		assert!(!format!("{reporter:?}").contains("k-123"));
	}

	async fn wait_for_requests(server: &MockServer, count: usize) {
		for _ in 0..100 {
			if server.received_requests().await.map_or(0, |r| r.len()) >= count {
				return;
			}
			tokio::time::sleep(Duration::from_millis(20)).await;
		}
	}

	#[tokio::test]
	async fn send_posts_json_with_bearer_token() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/errors"))
			.and(header("authorization", "Bearer secret-key"))
			.and(header("content-type", "application/json"))
			.and(body_partial_json(serde_json::json!({"message": "boom"})))
			.respond_with(ResponseTemplate::new(202))
			.expect(1)
			.mount(&server)
			.await;

		let reporter = Reporter::new(
			format!("{}/api/errors", server.uri()),
			Some("secret-key".to_string()),
			Duration::from_secs(5),
		)
		.unwrap();
		let payload = build_payload(ErrorId::new(), &TrackedError::new("boom"), &Context::new(), Utc::now());
		reporter.send(payload);

		wait_for_requests(&server, 1).await;
		server.verify().await;
	}

	#[test]
	fn reports_without_a_runtime_share_one_worker() {
		let runtime = tokio::runtime::Runtime::new().unwrap();
		let server = runtime.block_on(async {
			let server = MockServer::start().await;
			Mock::given(method("POST"))
				.and(path("/api/errors"))
				.respond_with(ResponseTemplate::new(201))
				.expect(20)
				.mount(&server)
				.await;
			server
		});

		let reporter = Reporter::new(
			format!("{}/api/errors", server.uri()),
			None,
			Duration::from_secs(5),
		)
		.unwrap();
		for i in 0..20 {
			let error = TrackedError::new(format!("poll failure {i}"));
			reporter.send(build_payload(ErrorId::new(), &error, &Context::new(), Utc::now()));
		}
		let worker = reporter.blocking.lock().clone();
		assert!(worker.is_some_and(|tx| !tx.is_closed()));

		runtime.block_on(async {
			wait_for_requests(&server, 20).await;
			server.verify().await;
		});
	}

	#[tokio::test]
	async fn rejected_report_is_swallowed() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(500))
			.expect(1)
			.mount(&server)
			.await;

		let reporter = Reporter::new(server.uri(), None, Duration::from_secs(5)).unwrap();
		reporter.send(Value::Null);

		wait_for_requests(&server, 1).await;
		server.verify().await;
	}
}
