// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end tests for the error handler against a mock HTTP server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use loom_tracker::{
	BreadcrumbCategory, CaptureOptions, ErrorCategory, ErrorHandler, ErrorRecord, HandlerState,
	Severity, TrackerConfig,
};
use serde_json::Value;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn config() -> TrackerConfig {
	TrackerConfig {
		enable_panic_capture: false,
		enable_performance_capture: false,
		report_to_console: false,
		..Default::default()
	}
}

async fn wait_for_requests(server: &MockServer, count: usize) -> Vec<Request> {
	for _ in 0..100 {
		let requests = server.received_requests().await.unwrap_or_default();
		if requests.len() >= count {
			return requests;
		}
		tokio::time::sleep(Duration::from_millis(20)).await;
	}
	server.received_requests().await.unwrap_or_default()
}

fn network_errors(handler: &ErrorHandler) -> Vec<ErrorRecord> {
	handler.errors_by_category(&ErrorCategory::Network)
}

#[tokio::test]
async fn not_found_yields_one_breadcrumb_and_medium_network_error() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/api/contacts/404"))
		.respond_with(ResponseTemplate::new(404))
		.mount(&server)
		.await;

	let handler = ErrorHandler::with_config(config()).unwrap();
	handler.initialize();
	let http = handler.http_client(reqwest::Client::new());

	let response = http
		.send(http.get(format!("{}/api/contacts/404", server.uri())))
		.await
		.unwrap();
	assert_eq!(response.status(), 404);

	let breadcrumbs = handler.core().breadcrumbs();
	let http_crumbs: Vec<_> = breadcrumbs
		.iter()
		.filter(|b| b.category == BreadcrumbCategory::Http)
		.collect();
	assert_eq!(http_crumbs.len(), 1);

	let errors = network_errors(&handler);
	assert_eq!(errors.len(), 1);
	assert_eq!(errors[0].severity, Severity::Medium);
	assert_eq!(errors[0].breadcrumbs.len(), 1);
	assert_eq!(handler.all_errors().len(), 1);

	handler.destroy();
}

#[tokio::test]
async fn service_unavailable_yields_high_network_error() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/api/invoices"))
		.respond_with(ResponseTemplate::new(503))
		.mount(&server)
		.await;

	let handler = ErrorHandler::with_config(config()).unwrap();
	handler.initialize();
	let http = handler.http_client(reqwest::Client::new());

	let response = http
		.send(http.post(format!("{}/api/invoices", server.uri())).body("{}"))
		.await
		.unwrap();
	assert_eq!(response.status(), 503);

	let errors = network_errors(&handler);
	assert_eq!(errors.len(), 1);
	assert_eq!(errors[0].severity, Severity::High);
	assert!(errors[0].message.starts_with("HTTP 503: POST"));

	handler.destroy();
}

#[tokio::test]
async fn successful_call_is_not_captured() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.respond_with(ResponseTemplate::new(200).set_body_string("[]"))
		.mount(&server)
		.await;

	let handler = ErrorHandler::with_config(config()).unwrap();
	handler.initialize();
	let http = handler.http_client(reqwest::Client::new());

	let body = http
		.send(http.get(server.uri()))
		.await
		.unwrap()
		.text()
		.await
		.unwrap();
	assert_eq!(body, "[]");
	assert!(handler.all_errors().is_empty());
	assert_eq!(handler.core().breadcrumbs().len(), 1);

	handler.destroy();
}

#[tokio::test]
async fn network_capture_disabled_or_destroyed_records_nothing() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.respond_with(ResponseTemplate::new(500))
		.mount(&server)
		.await;

	let handler = ErrorHandler::with_config(TrackerConfig {
		enable_network_capture: false,
		..config()
	})
	.unwrap();
	handler.initialize();
	let http = handler.http_client(reqwest::Client::new());
	let response = http.send(http.get(server.uri())).await.unwrap();
	assert_eq!(response.status(), 500);
	assert!(handler.all_errors().is_empty());
	handler.destroy();

	let handler = ErrorHandler::with_config(config()).unwrap();
	handler.initialize();
	handler.destroy();
	let http = handler.http_client(reqwest::Client::new());
	http.send(http.get(server.uri())).await.unwrap();
	assert!(handler.all_errors().is_empty());
	assert!(handler.core().breadcrumbs().is_empty());
}

#[tokio::test]
async fn connection_failure_is_high_and_error_propagates() {
	let handler = ErrorHandler::with_config(config()).unwrap();
	handler.initialize();
	let http = handler.http_client(reqwest::Client::new());

	let result = http.send(http.get("http://127.0.0.1:9/unreachable")).await;
	assert!(result.is_err());

	let errors = network_errors(&handler);
	assert_eq!(errors.len(), 1);
	assert_eq!(errors[0].severity, Severity::High);

	handler.destroy();
}

#[tokio::test]
async fn captures_are_posted_to_the_server() {
	let collector = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/api/errors"))
		.and(header("authorization", "Bearer tracker-key"))
		.respond_with(ResponseTemplate::new(201))
		.expect(1)
		.mount(&collector)
		.await;

	let handler = ErrorHandler::with_config(TrackerConfig {
		report_to_server: true,
		server_endpoint: Some(format!("{}/api/errors", collector.uri())),
		api_key: Some("tracker-key".to_string()),
		release: Some("3.1.0".to_string()),
		..config()
	})
	.unwrap();

	let error_id = handler
		.capture_error(
			"Cannot read properties of undefined",
			CaptureOptions::new(Severity::High, ErrorCategory::Javascript).with("component", "DealCard"),
		)
		.unwrap();

	let requests = wait_for_requests(&collector, 1).await;
	assert_eq!(requests.len(), 1);
	let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
	assert_eq!(body["errorId"], error_id.to_string());
	assert_eq!(body["message"], "Cannot read properties of undefined");
	assert_eq!(body["name"], "Error");
	assert_eq!(body["component"], "DealCard");
	assert_eq!(body["release"], "3.1.0");
	assert_eq!(body["sessionId"], handler.session_id().to_string());
	assert!(body["timestamp"].is_string());

	collector.verify().await;
}

#[tokio::test]
async fn dropped_errors_are_not_reported() {
	let collector = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(201))
		.expect(0)
		.mount(&collector)
		.await;

	let handler = ErrorHandler::builder()
		.config(TrackerConfig {
			report_to_server: true,
			server_endpoint: Some(collector.uri()),
			..config()
		})
		.before_send(|_| None)
		.build()
		.unwrap();

	assert_eq!(handler.capture_error("noise", CaptureOptions::default()), None);
	tokio::time::sleep(Duration::from_millis(100)).await;
	assert!(handler.all_errors().is_empty());
	collector.verify().await;
}

#[tokio::test]
async fn failing_collector_never_feeds_back() {
	let collector = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(500))
		.mount(&collector)
		.await;

	let handler = ErrorHandler::with_config(TrackerConfig {
		report_to_server: true,
		server_endpoint: Some(collector.uri()),
		..config()
	})
	.unwrap();
	handler.initialize();

	handler.capture_error("first", CaptureOptions::default());
	wait_for_requests(&collector, 1).await;
	tokio::time::sleep(Duration::from_millis(100)).await;

	assert_eq!(handler.all_errors().len(), 1);
	assert_eq!(collector.received_requests().await.unwrap().len(), 1);
	handler.destroy();
}

#[tokio::test]
async fn supervised_task_failure_is_captured() {
	let handler = ErrorHandler::with_config(config()).unwrap();
	handler.initialize();

	let result = handler
		.tasks()
		.spawn("sync-calendar", async { Err::<(), _>("calendar feed timed out") })
		.await
		.unwrap();
	assert!(result.is_err());

	let promises = handler.errors_by_category(&ErrorCategory::Promise);
	assert_eq!(promises.len(), 1);
	assert_eq!(promises[0].severity, Severity::High);

	handler.destroy();
}

#[test]
fn listeners_fire_once_per_fingerprint() {
	let handler = ErrorHandler::with_config(config()).unwrap();
	let calls = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&calls);
	let subscription = handler.on_error(move |_| {
		counter.fetch_add(1, Ordering::SeqCst);
	});

	for _ in 0..3 {
		handler.capture_error("same failure", CaptureOptions::default());
	}
	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert_eq!(handler.all_errors()[0].occurrences, 3);

	assert!(subscription.unsubscribe());
	handler.capture_error("another failure", CaptureOptions::default());
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn initialize_twice_then_destroy_twice() {
	let handler = ErrorHandler::with_config(config()).unwrap();
	handler.initialize();
	let installed = handler.installed_interceptors();
	handler.initialize();
	assert_eq!(handler.installed_interceptors(), installed);
	assert_eq!(handler.state(), HandlerState::Initialized);

	handler.destroy();
	handler.destroy();
	assert_eq!(handler.state(), HandlerState::Destroyed);
	assert!(handler.installed_interceptors().is_empty());
}

#[test]
fn resolve_and_metrics() {
	let handler = ErrorHandler::with_config(config()).unwrap();
	handler.capture_error("a", CaptureOptions::new(Severity::Low, ErrorCategory::Ui));
	handler.capture_error("b", CaptureOptions::new(Severity::Critical, ErrorCategory::Security));

	let fingerprint = handler.all_errors()[0].fingerprint.clone();
	assert!(handler.resolve_error(&fingerprint));
	assert!(!handler.resolve_error("unknown"));

	let metrics = handler.metrics();
	assert_eq!(metrics.total_errors, 2);
	assert_eq!(metrics.unresolved_errors, 1);
	assert_eq!(handler.errors_by_severity(Severity::Critical).len(), 1);
	assert_eq!(handler.recent_errors(1).len(), 1);

	handler.clear_errors();
	assert_eq!(handler.metrics().total_errors, 0);
}
