//! OpenTelemetry instrumentation for outgoing HTTP client calls.
//!
//! For every traced call a client ("exit") span is created towards the
//! `host:port` of the target, the propagation headers of that span are
//! written onto the outgoing request, and the URL, method, response status
//! and errors of the call are recorded before the span is stopped.
//!
//! Synchronous clients wrap their execution with
//! [`RequestInterceptor::intercept`]. Clients implementing [`HttpClient`] can
//! be wrapped in a [`TracedHttpClient`].
//!
//! # Example
//!
//! ```
//! use http::{Request, Response};
//! use opentelemetry::global;
//! use opentelemetry_httpclient::{HttpHost, OtelTraceContext, RequestInterceptor};
//!
//! let interceptor = RequestInterceptor::new(OtelTraceContext::new(global::tracer("my-client")));
//! let host = HttpHost::new("api.example.com", None, "https");
//! let request = Request::get("/status").body(()).unwrap();
//!
//! let response = interceptor.intercept(Some(&host), request, |_request| {
//!     // execute `_request` with the real client here
//!     Response::builder().status(200).body(())
//! });
//! assert_eq!(response.unwrap().status(), 200);
//! ```
//!
//! # Crate Feature Flags
//!
//! * `internal-logs`: emit internal diagnostics through `tracing`. Enabled by
//!   default.
//! * `testing`: expose the in-memory [`testing::RecordingTraceContext`].
mod carrier;
mod client;
mod config;
mod context;
mod interceptor;
mod otel;
mod target;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[doc(no_inline)]
pub use bytes::Bytes;
#[doc(no_inline)]
pub use opentelemetry_http::{HttpClient, HttpError};

pub use carrier::{CarrierItem, ContextCarrier};
pub use client::TracedHttpClient;
pub use config::InterceptorConfig;
pub use context::{ActiveSpan, Component, ExitSpan, SpanLayer, TraceContext};
pub use interceptor::RequestInterceptor;
pub use otel::{OtelExitSpan, OtelTraceContext, COMPONENT_KEY, SPAN_LAYER_KEY};
pub use target::{build_url, derive_operation_name, is_url, HttpHost, TargetError, ERROR_URI};
