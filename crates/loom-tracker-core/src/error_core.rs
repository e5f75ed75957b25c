// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The error core: capture, deduplication, queries and export.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::breadcrumb::{Breadcrumb, BreadcrumbRing, DEFAULT_MAX_BREADCRUMBS};
use crate::context::{Context, ContextValue, UserContext};
use crate::error::Result;
use crate::export::ErrorExport;
use crate::fingerprint::compute_fingerprint;
use crate::metrics::ErrorMetrics;
use crate::notifier::{ErrorListener, Notifier, Subscription};
use crate::performance::{PerformanceIssue, PerformanceIssueStore, DEFAULT_MAX_PERFORMANCE_ISSUES};
use crate::record::{ErrorCategory, ErrorRecord, Severity, TrackedError};
use crate::store::{ErrorStore, Upsert, DEFAULT_MAX_ERRORS};
use crate::{ErrorId, PerformanceIssueId, SessionId};

/// Sizing and policy for an [`ErrorCore`].
#[derive(Debug, Clone)]
pub struct CoreOptions {
	pub max_errors: usize,
	pub max_breadcrumbs: usize,
	pub max_performance_issues: usize,
	/// Also capture every performance issue as a `performance` error.
	pub mirror_performance_issues: bool,
	/// Adopt an existing session instead of starting a new one.
	pub session_id: Option<SessionId>,
}

impl Default for CoreOptions {
	fn default() -> Self {
		Self {
			max_errors: DEFAULT_MAX_ERRORS,
			max_breadcrumbs: DEFAULT_MAX_BREADCRUMBS,
			max_performance_issues: DEFAULT_MAX_PERFORMANCE_ISSUES,
			mirror_performance_issues: true,
			session_id: None,
		}
	}
}

/// Per-capture classification and context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureOptions {
	pub context: Context,
	pub severity: Severity,
	pub category: ErrorCategory,
}

impl CaptureOptions {
	pub fn new(severity: Severity, category: ErrorCategory) -> Self {
		Self {
			context: Context::new(),
			severity,
			category,
		}
	}

	pub fn with_context(mut self, context: Context) -> Self {
		self.context = context;
		self
	}

	pub fn with(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
		self.context.insert(key, value);
		self
	}

	pub fn severity(mut self, severity: Severity) -> Self {
		self.severity = severity;
		self
	}

	pub fn category(mut self, category: ErrorCategory) -> Self {
		self.category = category;
		self
	}
}

/// In-process error tracker state for one session.
///
/// All operations are synchronous and infallible from the caller's point of
/// view. Listeners run after the store lock is released.
pub struct ErrorCore {
	session_id: SessionId,
	user: RwLock<Option<UserContext>>,
	store: Mutex<ErrorStore>,
	breadcrumbs: BreadcrumbRing,
	performance: PerformanceIssueStore,
	notifier: Notifier,
	mirror_performance_issues: bool,
}

impl ErrorCore {
	pub fn new(options: CoreOptions) -> Self {
		let session_id = options.session_id.unwrap_or_default();
		debug!(session_id = %session_id, max_errors = options.max_errors, "Error core created");
		Self {
			session_id,
			user: RwLock::new(None),
			store: Mutex::new(ErrorStore::new(options.max_errors)),
			breadcrumbs: BreadcrumbRing::new(options.max_breadcrumbs),
			performance: PerformanceIssueStore::new(options.max_performance_issues),
			notifier: Notifier::new(),
			mirror_performance_issues: options.mirror_performance_issues,
		}
	}

	pub fn session_id(&self) -> SessionId {
		self.session_id
	}

	/// Captures one occurrence of `error`.
	///
	/// The first capture of a fingerprint creates a record (with a snapshot of
	/// the breadcrumb trail) and notifies listeners once; later captures only
	/// bump its counters.
	pub fn capture(&self, error: impl Into<TrackedError>, options: CaptureOptions) -> ErrorId {
		let error = error.into();
		let fingerprint = compute_fingerprint(&error.message, error.stack.as_deref());
		let now = Utc::now();

		let (outcome, evicted) = {
			let mut store = self.store.lock();
			store.upsert(&fingerprint, now, || {
				let tags = derive_tags(&options);
				ErrorRecord {
					id: ErrorId::new(),
					message: error.message.clone(),
					stack: error.stack.clone(),
					fingerprint: fingerprint.clone(),
					first_seen: now,
					last_seen: now,
					occurrences: 1,
					severity: options.severity,
					category: options.category.clone(),
					context: options.context.clone(),
					breadcrumbs: self.breadcrumbs.snapshot(),
					tags,
					resolved: false,
					resolved_at: None,
					session_id: self.session_id,
					user_id: self.user.read().as_ref().map(|u| u.id.clone()),
				}
			})
		};

		if !evicted.is_empty() {
			debug!(count = evicted.len(), "Evicted least recently updated errors");
		}

		match outcome {
			Upsert::Created(record) => {
				debug!(
					error_id = %record.id,
					fingerprint = %record.fingerprint,
					category = %record.category,
					severity = %record.severity,
					"Captured new error"
				);
				let id = record.id;
				self.notifier.notify(&record);
				id
			}
			Upsert::Repeated { id, occurrences } => {
				trace!(error_id = %id, occurrences, "Captured repeat error");
				id
			}
		}
	}

	pub fn add_breadcrumb(&self, breadcrumb: Breadcrumb) {
		self.breadcrumbs.add(breadcrumb);
	}

	pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
		self.breadcrumbs.snapshot()
	}

	pub fn clear_breadcrumbs(&self) {
		self.breadcrumbs.clear();
	}

	/// Associates subsequent captures with a user.
	pub fn set_user(&self, user_id: impl Into<String>, user_data: Option<Context>) {
		let mut user = UserContext::new(user_id);
		if let Some(data) = user_data {
			user.email = data.get_str("email").map(str::to_string);
			user.username = data.get_str("username").map(str::to_string);
			user.data = data;
		}
		*self.user.write() = Some(user);
	}

	pub fn clear_user(&self) {
		*self.user.write() = None;
	}

	pub fn user(&self) -> Option<UserContext> {
		self.user.read().clone()
	}

	pub fn metrics(&self) -> ErrorMetrics {
		ErrorMetrics::compute(&self.all_errors(), self.session_id)
	}

	/// All records in creation order.
	pub fn all_errors(&self) -> Vec<ErrorRecord> {
		self.store.lock().records()
	}

	pub fn errors_by_category(&self, category: &ErrorCategory) -> Vec<ErrorRecord> {
		self
			.all_errors()
			.into_iter()
			.filter(|r| &r.category == category)
			.collect()
	}

	pub fn errors_by_severity(&self, severity: Severity) -> Vec<ErrorRecord> {
		self
			.all_errors()
			.into_iter()
			.filter(|r| r.severity == severity)
			.collect()
	}

	/// Up to `limit` records, most recently updated first.
	pub fn recent_errors(&self, limit: usize) -> Vec<ErrorRecord> {
		self.store.lock().recent(limit)
	}

	pub fn error(&self, fingerprint: &str) -> Option<ErrorRecord> {
		self.store.lock().get(fingerprint).cloned()
	}

	/// Marks the record with `fingerprint` resolved; false if unknown.
	pub fn resolve_error(&self, fingerprint: &str) -> bool {
		let resolved = self.store.lock().resolve(fingerprint, Utc::now());
		if resolved {
			debug!(fingerprint, "Error resolved");
		}
		resolved
	}

	/// Drops every error record and performance issue.
	pub fn clear_errors(&self) {
		self.store.lock().clear();
		self.performance.clear();
		debug!("Errors cleared");
	}

	pub fn on_error(&self, listener: ErrorListener) -> Subscription {
		self.notifier.subscribe(listener)
	}

	pub fn notifier(&self) -> &Notifier {
		&self.notifier
	}

	/// Stores a performance issue and, if mirroring is on, captures it as a
	/// `performance` error as well.
	pub fn record_performance_issue(&self, issue: PerformanceIssue) -> PerformanceIssueId {
		let issue = issue.normalized();
		let id = issue.id;
		debug!(
			issue_id = %id,
			issue_type = %issue.issue_type,
			actual = issue.actual_value,
			threshold = issue.threshold,
			"Performance issue recorded"
		);

		let mirrored = self.mirror_performance_issues.then(|| {
			let mut context: Context = issue
				.metrics
				.iter()
				.map(|(k, v)| (k.clone(), *v))
				.collect();
			context.insert("issueType", issue.issue_type.to_string());
			context.insert("threshold", issue.threshold);
			context.insert("actualValue", issue.actual_value);
			if !issue.url.is_empty() {
				context.insert("url", issue.url.clone());
			}
			(
				TrackedError::new(issue.message.clone()).with_name("PerformanceIssue"),
				CaptureOptions::new(issue.severity, ErrorCategory::Performance).with_context(context),
			)
		});

		self.performance.record(issue);

		if let Some((error, options)) = mirrored {
			self.capture(error, options);
		}
		id
	}

	pub fn performance_issues(&self) -> Vec<PerformanceIssue> {
		self.performance.all()
	}

	pub fn resolve_performance_issue(&self, id: PerformanceIssueId) -> bool {
		self.performance.resolve(id)
	}

	pub fn export(&self) -> ErrorExport {
		ErrorExport {
			errors: self.all_errors(),
			performance_issues: self.performance_issues(),
			metrics: self.metrics(),
			session_id: self.session_id,
			export_time: Utc::now(),
		}
	}

	/// Serializes [`ErrorCore::export`] to JSON.
	pub fn export_errors(&self) -> Result<String> {
		self.export().to_json()
	}
}

impl Default for ErrorCore {
	fn default() -> Self {
		Self::new(CoreOptions::default())
	}
}

/// Tags derived from a capture's classification and context.
fn derive_tags(options: &CaptureOptions) -> Vec<String> {
	let mut tags = vec![
		format!("category:{}", options.category),
		format!("severity:{}", options.severity),
		format!("os:{}", std::env::consts::OS),
	];
	for key in ["environment", "release"] {
		if let Some(value) = options.context.get_str(key) {
			tags.push(format!("{key}:{value}"));
		}
	}
	if let Some(page) = options.context.get_str("url").and_then(page_path) {
		tags.push(format!("page:{page}"));
	}
	tags
}

/// Path component of an absolute URL, or the value itself for a bare path.
fn page_path(raw: &str) -> Option<String> {
	if raw.starts_with('/') {
		return Some(raw.split(['?', '#']).next().unwrap_or(raw).to_string());
	}
	url::Url::parse(raw).ok().map(|u| u.path().to_string())
}
