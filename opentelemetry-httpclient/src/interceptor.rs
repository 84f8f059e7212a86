use std::error::Error;

use http::header::{HeaderName, HeaderValue};
use http::{Request, Response};
use opentelemetry::{otel_debug, KeyValue};
use opentelemetry_semantic_conventions::attribute::{
    HTTP_REQUEST_METHOD, HTTP_RESPONSE_STATUS_CODE, URL_FULL, URL_QUERY,
};

use crate::carrier::ContextCarrier;
use crate::config::InterceptorConfig;
use crate::context::{ActiveSpan, Component, ExitSpan, SpanLayer, TraceContext};
use crate::target::{build_url, derive_operation_name, HttpHost, ERROR_URI};

/// Traces the execution of outgoing HTTP requests.
///
/// Wrap a call with [`RequestInterceptor::intercept`], or drive the three
/// stages yourself:
///
/// 1. [`before`](RequestInterceptor::before) creates an exit span, tags it and
///    writes the propagation headers onto the request.
/// 2. [`on_exception`](RequestInterceptor::on_exception) attaches a failed
///    call's error to the span.
/// 3. [`after`](RequestInterceptor::after) records the response status and
///    stops the span. It runs for failed calls too, without a response.
#[derive(Debug)]
pub struct RequestInterceptor<T> {
    trace_context: T,
    config: InterceptorConfig,
}

impl<T: TraceContext> RequestInterceptor<T> {
    /// Create an interceptor with the default, environment based,
    /// configuration.
    pub fn new(trace_context: T) -> Self {
        RequestInterceptor::with_config(trace_context, InterceptorConfig::default())
    }

    pub fn with_config(trace_context: T, config: InterceptorConfig) -> Self {
        RequestInterceptor {
            trace_context,
            config,
        }
    }

    pub fn trace_context(&self) -> &T {
        &self.trace_context
    }

    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    /// Start tracing a call to `host`.
    ///
    /// Returns `None`, leaving the request untouched, when the host or the
    /// request is missing or when the target port is excluded from
    /// propagation. Otherwise the returned span must be handed to
    /// [`after`](RequestInterceptor::after) once the call completes.
    pub fn before<B>(
        &self,
        host: Option<&HttpHost>,
        request: Option<&mut Request<B>>,
    ) -> Option<ActiveSpan<T::Span>> {
        let (Some(host), Some(request)) = (host, request) else {
            otel_debug!(
                name: "RequestInterceptor.UntracedCall",
                message = "Missing target host or request, executing the call without tracing"
            );
            return None;
        };

        let port = host.resolved_port();
        if self.config.is_excluded_port(port) {
            otel_debug!(
                name: "RequestInterceptor.ExcludedPort",
                port = i64::from(port)
            );
            return None;
        }

        let uri = request.uri().to_string();
        let operation_name = derive_operation_name(&uri);
        let mut carrier = ContextCarrier::new();
        let mut span =
            self.trace_context
                .create_exit_span(&operation_name, &mut carrier, &host.remote_peer());

        if operation_name == ERROR_URI {
            span.error_occurred();
        }
        span.set_component(Component::HttpClient);
        span.set_attribute(KeyValue::new(URL_FULL, build_url(host, &uri)));
        span.set_attribute(KeyValue::new(
            HTTP_REQUEST_METHOD,
            request.method().as_str().to_owned(),
        ));
        span.set_layer(SpanLayer::Http);

        if self.config.collect_http_params {
            if let Some(query) = request.uri().query() {
                span.set_attribute(KeyValue::new(
                    URL_QUERY,
                    cut(query, self.config.http_params_length_threshold),
                ));
            }
        }

        let headers = request.headers_mut();
        for item in carrier {
            match (
                HeaderName::from_bytes(item.key().as_bytes()),
                HeaderValue::from_str(item.value()),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => {
                    otel_debug!(
                        name: "RequestInterceptor.InvalidPropagationHeader",
                        key = item.key().to_owned()
                    );
                }
            }
        }

        Some(ActiveSpan::new(span))
    }

    /// Finish tracing a call.
    ///
    /// With a response the status code is recorded and statuses of 400 and
    /// above flag the span as failed. The span is stopped either way.
    pub fn after<R>(&self, span: Option<ActiveSpan<T::Span>>, response: Option<&Response<R>>) {
        let Some(mut active) = span else {
            return;
        };

        if let (Some(response), Some(span)) = (response, active.span_mut()) {
            let status = response.status().as_u16();
            span.set_attribute(KeyValue::new(HTTP_RESPONSE_STATUS_CODE, i64::from(status)));
            if status >= 400 {
                span.error_occurred();
            }
        }

        active.stop();
    }

    /// Attach the error of a failed call to its span. The span stays active
    /// until [`after`](RequestInterceptor::after).
    pub fn on_exception(&self, span: Option<&mut ActiveSpan<T::Span>>, error: &dyn Error) {
        if let Some(span) = span.and_then(ActiveSpan::span_mut) {
            span.log(error);
        }
    }

    /// Execute `call` with `request` inside a traced exit span.
    ///
    /// The result of `call` is returned unchanged.
    pub fn intercept<B, R, E, F>(
        &self,
        host: Option<&HttpHost>,
        mut request: Request<B>,
        call: F,
    ) -> Result<Response<R>, E>
    where
        F: FnOnce(Request<B>) -> Result<Response<R>, E>,
        E: Error,
    {
        let mut span = self.before(host, Some(&mut request));
        match call(request) {
            Ok(response) => {
                self.after(span, Some(&response));
                Ok(response)
            }
            Err(err) => {
                self.on_exception(span.as_mut(), &err);
                self.after::<R>(span, None);
                Err(err)
            }
        }
    }
}

/// Cut `text` to at most `threshold` characters, marking truncation with
/// `...`.
fn cut(text: &str, threshold: usize) -> String {
    match text.char_indices().nth(threshold) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_owned(),
    }
}
