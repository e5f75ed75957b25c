// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error and performance tracking SDK for Rust applications.
//!
//! The SDK wraps [`loom_tracker_core::ErrorCore`] with a configurable
//! handler that captures errors automatically through interceptors, filters
//! them through `before_send`, enriches them with session context and
//! optionally reports them to a collector endpoint.
//!
//! # Quick Start
//!
//! ```ignore
//! use loom_tracker::{CaptureOptions, ErrorCategory, ErrorHandler, Severity};
//! use tracing_subscriber::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handler = ErrorHandler::builder()
//!         .config(loom_tracker::load_config()?)
//!         .build()?;
//!
//!     tracing_subscriber::registry()
//!         .with(tracing_subscriber::fmt::layer())
//!         .with(handler.console_layer())
//!         .init();
//!
//!     // Panic hook, supervised tasks, HTTP and performance monitors
//!     handler.initialize();
//!
//!     let http = handler.http_client(reqwest::Client::new());
//!     let contacts = http.send(http.get("https://api.example.com/contacts")).await;
//!
//!     if let Err(e) = contacts {
//!         handler.capture_error(
//!             loom_tracker::TrackedError::from_error(&e),
//!             CaptureOptions::new(Severity::High, ErrorCategory::Api),
//!         );
//!     }
//!
//!     println!("{}", handler.export_errors()?);
//!     handler.destroy();
//!     Ok(())
//! }
//! ```
//!
//! # Interceptors
//!
//! | Interceptor | Toggle | Produces |
//! |-------------|--------|----------|
//! | panic hook | `enable_panic_capture` | `javascript` errors, high |
//! | [`TaskSupervisor`] | `enable_unhandled_rejection_capture` | `promise` errors, high |
//! | [`ConsoleLayer`] | `enable_console_capture` | `console` breadcrumbs |
//! | [`InstrumentedClient`] | `enable_network_capture` | `http` breadcrumbs, `network` errors, `slow_api` / `network_timeout` issues |
//! | [`LongTaskMonitor`] | `enable_performance_capture` | `performance` breadcrumbs, `slow_render` issues |
//! | [`MemorySampler`] | `enable_performance_capture` | `memory_leak` issues |
//! | [`InteractionRecorder`] | `enable_user_interaction_capture` | `user` / `navigation` breadcrumbs |
//! | [`ResourceMonitor`] | `enable_resource_error_capture` | `resource` errors, medium |

pub mod backtrace;
pub mod config;
pub mod error;
pub mod handler;
pub mod intercept;
pub mod report;

pub use config::{load_config, load_config_from, TrackerConfig, TrackerConfigLayer};
pub use error::{ConfigError, Result, TrackerSdkError};
pub use handler::{
	BeforeSend, CaptureEvent, ErrorHandler, ErrorHandlerBuilder, HandlerState, OnCapture,
};
pub use intercept::console::{ConsoleInterceptor, ConsoleLayer};
pub use intercept::interaction::InteractionRecorder;
pub use intercept::long_task::{LongTaskMonitor, TaskTimer};
pub use intercept::memory::{MemorySample, MemorySampler, MemorySource, SystemMemorySource};
pub use intercept::network::{HttpOutcome, InstrumentedClient, NetworkInterceptor};
pub use intercept::panic::PanicInterceptor;
pub use intercept::resource::ResourceMonitor;
pub use intercept::task::TaskSupervisor;
pub use intercept::{CaptureSink, InterceptionLayer, Interceptor};

// Re-export core types for convenience
pub use loom_tracker_core::{
	Breadcrumb, BreadcrumbCategory, BreadcrumbLevel, CaptureOptions, Context, ContextValue,
	ErrorCategory, ErrorExport, ErrorId, ErrorMetrics, ErrorRecord, PerformanceIssue,
	PerformanceIssueId, PerformanceIssueType, SessionId, Severity, Subscription, TopError,
	TrackedError, UserContext,
};
