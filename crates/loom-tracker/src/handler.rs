// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The configurable error handler: the SDK's entry point.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::Utc;
use loom_tracker_core::notifier::panic_message;
use loom_tracker_core::{
	Breadcrumb, CaptureOptions, Context, DispatchGuard, ErrorCategory, ErrorCore, ErrorId,
	ErrorListener, ErrorMetrics, ErrorRecord, PerformanceIssue, PerformanceIssueId, SessionId,
	Severity, Subscription, TrackedError, UserContext,
};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::error::Result;
use crate::intercept::console::{ConsoleInterceptor, ConsoleLayer};
use crate::intercept::interaction::InteractionRecorder;
use crate::intercept::long_task::LongTaskMonitor;
use crate::intercept::memory::{MemorySampler, MemorySource, MemoryThresholds, SystemMemorySource};
use crate::intercept::network::{InstrumentedClient, NetworkInterceptor};
use crate::intercept::panic::PanicInterceptor;
use crate::intercept::resource::ResourceMonitor;
use crate::intercept::task::TaskSupervisor;
use crate::intercept::{CaptureSink, InterceptionLayer, Interceptor};
use crate::report::{self, Reporter};

/// Filter run before every capture. Returning `None` drops the error.
pub type BeforeSend = Arc<dyn Fn(TrackedError) -> Option<TrackedError> + Send + Sync>;

/// Callback run after every capture that was not dropped.
pub type OnCapture = Arc<dyn Fn(&CaptureEvent) + Send + Sync>;

/// What [`OnCapture`] callbacks receive.
#[derive(Debug, Clone)]
pub struct CaptureEvent {
	pub error_id: ErrorId,
	pub error: TrackedError,
	pub options: CaptureOptions,
}

/// Lifecycle of an [`ErrorHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
	Uninitialized,
	Initialized,
	Destroyed,
}

/// Builder for creating an [`ErrorHandler`].
pub struct ErrorHandlerBuilder {
	config: TrackerConfig,
	before_send: Option<BeforeSend>,
	on_error: Option<OnCapture>,
	memory_source: Option<Arc<dyn MemorySource>>,
	interceptors: Vec<Arc<dyn Interceptor>>,
}

impl Default for ErrorHandlerBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ErrorHandlerBuilder {
	pub fn new() -> Self {
		Self {
			config: TrackerConfig::default(),
			before_send: None,
			on_error: None,
			memory_source: None,
			interceptors: Vec::new(),
		}
	}

	pub fn config(mut self, config: TrackerConfig) -> Self {
		self.config = config;
		self
	}

	pub fn before_send<F>(mut self, f: F) -> Self
	where
		F: Fn(TrackedError) -> Option<TrackedError> + Send + Sync + 'static,
	{
		self.before_send = Some(Arc::new(f));
		self
	}

	pub fn on_error<F>(mut self, f: F) -> Self
	where
		F: Fn(&CaptureEvent) + Send + Sync + 'static,
	{
		self.on_error = Some(Arc::new(f));
		self
	}

	/// Replaces the process memory source used by the memory sampler.
	pub fn memory_source(mut self, source: Arc<dyn MemorySource>) -> Self {
		self.memory_source = Some(source);
		self
	}

	/// Registers an additional interceptor, installed after the built-in
	/// ones.
	pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
		self.interceptors.push(interceptor);
		self
	}

	/// Validates the configuration and builds the handler. The handler is
	/// not initialized yet.
	pub fn build(self) -> Result<ErrorHandler> {
		let config = self.config;
		config.validate()?;

		let reporter = match (&config.server_endpoint, config.report_to_server) {
			(Some(endpoint), true) => Some(Reporter::new(
				endpoint.clone(),
				config.api_key.clone(),
				config.request_timeout(),
			)?),
			_ => None,
		};

		let core = ErrorCore::new(config.core_options());
		if let Some(user_id) = &config.user_id {
			core.set_user(user_id.clone(), None);
		}

		let builtins = Builtins {
			panic: Arc::new(PanicInterceptor::new()),
			tasks: Arc::new(TaskSupervisor::new()),
			console: Arc::new(ConsoleInterceptor::new()),
			network: Arc::new(NetworkInterceptor::new(config.slow_api_threshold())),
			long_tasks: Arc::new(LongTaskMonitor::new(
				config.long_task_threshold(),
				config.long_task_issue_threshold(),
			)),
			memory: Arc::new(MemorySampler::new(
				self.memory_source
					.unwrap_or_else(|| Arc::new(SystemMemorySource::new())),
				config.memory_sample_interval(),
				MemoryThresholds {
					warning_ratio: config.memory_warning_ratio,
					critical_ratio: config.memory_critical_ratio,
				},
			)),
			interactions: Arc::new(InteractionRecorder::new()),
			resources: Arc::new(ResourceMonitor::new()),
		};

		let interceptors = InterceptionLayer::new();
		interceptors.register(builtins.panic.clone(), config.enable_panic_capture);
		interceptors.register(
			builtins.tasks.clone(),
			config.enable_unhandled_rejection_capture,
		);
		interceptors.register(builtins.console.clone(), config.enable_console_capture);
		interceptors.register(builtins.network.clone(), config.enable_network_capture);
		interceptors.register(builtins.long_tasks.clone(), config.enable_performance_capture);
		interceptors.register(builtins.memory.clone(), config.enable_performance_capture);
		interceptors.register(
			builtins.interactions.clone(),
			config.enable_user_interaction_capture,
		);
		interceptors.register(
			builtins.resources.clone(),
			config.enable_resource_error_capture,
		);
		for interceptor in self.interceptors {
			interceptors.register(interceptor, true);
		}

		info!(
			session_id = %core.session_id(),
			environment = %config.environment,
			report_to_server = reporter.is_some(),
			"Error handler created"
		);

		Ok(ErrorHandler {
			inner: Arc::new(HandlerInner {
				config,
				core,
				state: Mutex::new(HandlerState::Uninitialized),
				interceptors,
				builtins,
				reporter,
				before_send: self.before_send,
				on_error: self.on_error,
				current_url: RwLock::new(None),
			}),
		})
	}
}

struct Builtins {
	panic: Arc<PanicInterceptor>,
	tasks: Arc<TaskSupervisor>,
	console: Arc<ConsoleInterceptor>,
	network: Arc<NetworkInterceptor>,
	long_tasks: Arc<LongTaskMonitor>,
	memory: Arc<MemorySampler>,
	interactions: Arc<InteractionRecorder>,
	resources: Arc<ResourceMonitor>,
}

struct HandlerInner {
	config: TrackerConfig,
	core: ErrorCore,
	state: Mutex<HandlerState>,
	interceptors: InterceptionLayer,
	builtins: Builtins,
	reporter: Option<Reporter>,
	before_send: Option<BeforeSend>,
	on_error: Option<OnCapture>,
	current_url: RwLock<Option<String>>,
}

impl HandlerInner {
	fn capture_error(&self, error: TrackedError, mut options: CaptureOptions) -> Option<ErrorId> {
		let error = match &self.before_send {
			Some(filter) => {
				let original = error.clone();
				match catch_unwind(AssertUnwindSafe(|| {
					let _guard = DispatchGuard::enter();
					filter(error)
				})) {
					Ok(Some(error)) => error,
					Ok(None) => {
						debug!(message = %original.message, "Error dropped by before_send");
						return None;
					}
					Err(payload) => {
						warn!(panic = %panic_message(&*payload), "before_send panicked, keeping original error");
						original
					}
				}
			}
			None => error,
		};

		options.context.merge_defaults(self.global_context());
		let error_id = self.core.capture(error.clone(), options.clone());

		if self.config.report_to_console {
			report::log_capture(error_id, &error, &options);
		}

		if let Some(reporter) = &self.reporter {
			reporter.send(report::build_payload(
				error_id,
				&error,
				&options.context,
				Utc::now(),
			));
		}

		if let Some(callback) = &self.on_error {
			let event = CaptureEvent {
				error_id,
				error,
				options,
			};
			if let Err(payload) = catch_unwind(AssertUnwindSafe(|| {
				let _guard = DispatchGuard::enter();
				callback(&event)
			})) {
				warn!(error_id = %error_id, panic = %panic_message(&*payload), "on_error callback panicked");
			}
		}

		Some(error_id)
	}

	/// Context every capture carries unless the caller set the key itself.
	fn global_context(&self) -> Context {
		let mut context = Context::new()
			.with("sessionId", self.core.session_id().to_string())
			.with("environment", self.config.environment.as_str())
			.with("userAgent", report::user_agent())
			.with("timestamp", Utc::now().to_rfc3339());
		let user_id = self
			.core
			.user()
			.map(|user| user.id)
			.or_else(|| self.config.user_id.clone());
		if let Some(user_id) = user_id {
			context.insert("userId", user_id);
		}
		if let Some(release) = &self.config.release {
			context.insert("release", release.as_str());
		}
		if let Some(url) = self.current_url.read().clone() {
			context.insert("url", url);
		}
		context
	}
}

impl CaptureSink for HandlerInner {
	fn capture(&self, error: TrackedError, options: CaptureOptions) -> Option<ErrorId> {
		self.capture_error(error, options)
	}

	fn add_breadcrumb(&self, breadcrumb: Breadcrumb) {
		self.core.add_breadcrumb(breadcrumb);
	}

	fn record_performance_issue(&self, issue: PerformanceIssue) {
		let issue = match (&*self.current_url.read(), issue.url.is_empty()) {
			(Some(url), true) => issue.with_url(url.clone()),
			_ => issue,
		};
		self.core.record_performance_issue(issue);
	}

	fn current_url(&self) -> Option<String> {
		self.current_url.read().clone()
	}

	fn set_current_url(&self, url: String) {
		*self.current_url.write() = Some(url);
	}
}

impl Drop for HandlerInner {
	fn drop(&mut self) {
		self.interceptors.uninstall_all();
	}
}

/// Error and performance tracker for one application session.
///
/// Cloning is cheap; clones share all state. Interceptors are only active
/// between [`initialize`](Self::initialize) and [`destroy`](Self::destroy),
/// while manual captures work in any state.
///
/// # Example
///
/// ```ignore
/// use loom_tracker::{ErrorHandler, TrackerConfig};
///
/// let handler = ErrorHandler::builder()
///     .config(loom_tracker::load_config()?)
///     .before_send(|error| (!error.message.contains("ResizeObserver")).then_some(error))
///     .build()?;
/// handler.initialize();
///
/// let client = handler.http_client(reqwest::Client::new());
/// let response = client.send(client.get("https://api.example.com/contacts")).await?;
/// ```
#[derive(Clone)]
pub struct ErrorHandler {
	inner: Arc<HandlerInner>,
}

impl ErrorHandler {
	pub fn builder() -> ErrorHandlerBuilder {
		ErrorHandlerBuilder::new()
	}

	/// Handler with the default configuration.
	pub fn new() -> Result<Self> {
		Self::builder().build()
	}

	pub fn with_config(config: TrackerConfig) -> Result<Self> {
		Self::builder().config(config).build()
	}

	/// Installs the enabled interceptors. Calling it again while initialized
	/// logs a warning and does nothing.
	pub fn initialize(&self) {
		let mut state = self.inner.state.lock();
		if *state == HandlerState::Initialized {
			warn!("Error handler already initialized");
			return;
		}

		let sink: Arc<dyn CaptureSink> = self.inner.clone();
		let installed = self.inner.interceptors.install_all(&sink);
		*state = HandlerState::Initialized;

		info!(
			session_id = %self.inner.core.session_id(),
			interceptors = installed,
			"Error handler initialized"
		);
	}

	/// Uninstalls every interceptor. A later [`initialize`](Self::initialize)
	/// starts from a clean slate. Does nothing unless initialized.
	pub fn destroy(&self) {
		let mut state = self.inner.state.lock();
		if *state != HandlerState::Initialized {
			debug!(state = ?*state, "Error handler not initialized, nothing to destroy");
			return;
		}

		self.inner.interceptors.uninstall_all();
		*state = HandlerState::Destroyed;
		info!(session_id = %self.inner.core.session_id(), "Error handler destroyed");
	}

	pub fn state(&self) -> HandlerState {
		*self.inner.state.lock()
	}

	pub fn config(&self) -> &TrackerConfig {
		&self.inner.config
	}

	pub fn session_id(&self) -> SessionId {
		self.inner.core.session_id()
	}

	/// The underlying store, for queries not mirrored here.
	pub fn core(&self) -> &ErrorCore {
		&self.inner.core
	}

	/// Runs `before_send`, merges the global context, stores the error,
	/// reports it and notifies `on_error`. Returns `None` if the error was
	/// dropped by `before_send`.
	pub fn capture_error(&self, error: impl Into<TrackedError>, options: CaptureOptions) -> Option<ErrorId> {
		self.inner.capture_error(error.into(), options)
	}

	/// Captures an error caught by a UI error boundary.
	pub fn capture_error_boundary(&self, error: impl Into<TrackedError>, component_stack: &str) -> Option<ErrorId> {
		let options = CaptureOptions::new(Severity::High, ErrorCategory::Ui)
			.with("componentStack", component_stack)
			.with("errorBoundary", true);
		self.capture_error(error, options)
	}

	pub fn add_breadcrumb(&self, breadcrumb: Breadcrumb) {
		self.inner.core.add_breadcrumb(breadcrumb);
	}

	pub fn set_user(&self, user_id: impl Into<String>, user_data: Option<Context>) {
		self.inner.core.set_user(user_id, user_data);
	}

	pub fn user(&self) -> Option<UserContext> {
		self.inner.core.user()
	}

	/// Sets the location attached as `url` to later captures.
	pub fn set_location(&self, url: impl Into<String>) {
		self.inner.set_current_url(url.into());
	}

	pub fn location(&self) -> Option<String> {
		self.inner.current_url()
	}

	pub fn metrics(&self) -> ErrorMetrics {
		self.inner.core.metrics()
	}

	pub fn all_errors(&self) -> Vec<ErrorRecord> {
		self.inner.core.all_errors()
	}

	pub fn errors_by_category(&self, category: &ErrorCategory) -> Vec<ErrorRecord> {
		self.inner.core.errors_by_category(category)
	}

	pub fn errors_by_severity(&self, severity: Severity) -> Vec<ErrorRecord> {
		self.inner.core.errors_by_severity(severity)
	}

	pub fn recent_errors(&self, limit: usize) -> Vec<ErrorRecord> {
		self.inner.core.recent_errors(limit)
	}

	pub fn performance_issues(&self) -> Vec<PerformanceIssue> {
		self.inner.core.performance_issues()
	}

	pub fn record_performance_issue(&self, issue: PerformanceIssue) {
		self.inner.record_performance_issue(issue);
	}

	pub fn resolve_performance_issue(&self, id: PerformanceIssueId) -> bool {
		self.inner.core.resolve_performance_issue(id)
	}

	pub fn resolve_error(&self, fingerprint: &str) -> bool {
		self.inner.core.resolve_error(fingerprint)
	}

	pub fn clear_errors(&self) {
		self.inner.core.clear_errors();
	}

	/// Subscribes to newly created error records.
	pub fn on_error<F>(&self, listener: F) -> Subscription
	where
		F: Fn(&ErrorRecord) + Send + Sync + 'static,
	{
		let listener: ErrorListener = Arc::new(listener);
		self.inner.core.on_error(listener)
	}

	pub fn export_errors(&self) -> Result<String> {
		Ok(self.inner.core.export_errors()?)
	}

	/// Registers an extra interceptor. It is installed right away when the
	/// handler is initialized.
	pub fn register_interceptor(&self, interceptor: Arc<dyn Interceptor>) {
		let state = self.inner.state.lock();
		self.inner.interceptors.register(Arc::clone(&interceptor), true);
		if *state == HandlerState::Initialized {
			let sink: Arc<dyn CaptureSink> = self.inner.clone();
			if let Err(e) = interceptor.install(sink) {
				warn!(interceptor = interceptor.name(), error = %e, "Failed to install interceptor");
			}
		}
	}

	/// Names of the interceptors currently installed.
	pub fn installed_interceptors(&self) -> Vec<&'static str> {
		self.inner.interceptors.installed()
	}

	/// `tracing` layer feeding console breadcrumbs into this handler.
	pub fn console_layer(&self) -> ConsoleLayer {
		ConsoleLayer::new(Arc::clone(&self.inner.builtins.console))
	}

	/// Wraps `client` so its calls are observed.
	pub fn http_client(&self, client: reqwest::Client) -> InstrumentedClient {
		InstrumentedClient::new(client, Arc::clone(&self.inner.builtins.network))
	}

	pub fn tasks(&self) -> Arc<TaskSupervisor> {
		Arc::clone(&self.inner.builtins.tasks)
	}

	pub fn long_tasks(&self) -> Arc<LongTaskMonitor> {
		Arc::clone(&self.inner.builtins.long_tasks)
	}

	pub fn memory(&self) -> Arc<MemorySampler> {
		Arc::clone(&self.inner.builtins.memory)
	}

	pub fn interactions(&self) -> Arc<InteractionRecorder> {
		Arc::clone(&self.inner.builtins.interactions)
	}

	pub fn resources(&self) -> Arc<ResourceMonitor> {
		Arc::clone(&self.inner.builtins.resources)
	}
}

impl std::fmt::Debug for ErrorHandler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ErrorHandler")
			.field("session_id", &self.inner.core.session_id())
			.field("state", &self.state())
			.field("config", &self.inner.config)
			.finish()
	}
}
