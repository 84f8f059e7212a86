//! [`TraceContext`] backed by the OpenTelemetry tracing API.
use std::borrow::Cow;
use std::error::Error;
use std::fmt;

use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{global, Context, KeyValue};
use opentelemetry_semantic_conventions::attribute::{SERVER_ADDRESS, SERVER_PORT};

use crate::carrier::ContextCarrier;
use crate::context::{Component, ExitSpan, SpanLayer, TraceContext};

/// Attribute holding the [`Component`] that produced the span.
pub const COMPONENT_KEY: &str = "component";
/// Attribute holding the [`SpanLayer`] of the span.
pub const SPAN_LAYER_KEY: &str = "span.layer";

/// Creates exit spans as [`SpanKind::Client`] spans of an OpenTelemetry
/// [`Tracer`].
///
/// Spans are children of the configured parent context, or of
/// [`Context::current`] when no parent was set. Propagation headers come from
/// the configured propagator, falling back to the global text map propagator.
pub struct OtelTraceContext<T> {
    tracer: T,
    parent: Option<Context>,
    propagator: Option<Box<dyn TextMapPropagator + Send + Sync>>,
}

impl<T: fmt::Debug> fmt::Debug for OtelTraceContext<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtelTraceContext")
            .field("tracer", &self.tracer)
            .field("parent", &self.parent)
            .field("propagator", &self.propagator)
            .finish()
    }
}

impl<T> OtelTraceContext<T>
where
    T: Tracer,
    T::Span: Send + Sync + 'static,
{
    pub fn new(tracer: T) -> Self {
        OtelTraceContext {
            tracer,
            parent: None,
            propagator: None,
        }
    }

    /// Start every exit span as a child of `parent`.
    pub fn with_parent_context(mut self, parent: Context) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Use `propagator` instead of the global text map propagator.
    pub fn with_propagator<P>(mut self, propagator: P) -> Self
    where
        P: TextMapPropagator + Send + Sync + 'static,
    {
        self.propagator = Some(Box::new(propagator));
        self
    }

    fn inject(&self, cx: &Context, carrier: &mut ContextCarrier) {
        match &self.propagator {
            Some(propagator) => propagator.inject_context(cx, carrier),
            None => global::get_text_map_propagator(|propagator| {
                propagator.inject_context(cx, carrier)
            }),
        }
    }
}

impl<T> TraceContext for OtelTraceContext<T>
where
    T: Tracer,
    T::Span: Send + Sync + 'static,
{
    type Span = OtelExitSpan;

    fn create_exit_span(
        &self,
        operation_name: &str,
        carrier: &mut ContextCarrier,
        remote_peer: &str,
    ) -> Self::Span {
        let current;
        let parent = match &self.parent {
            Some(parent) => parent,
            None => {
                current = Context::current();
                &current
            }
        };

        let span = self
            .tracer
            .span_builder(operation_name.to_owned())
            .with_kind(SpanKind::Client)
            .with_attributes(peer_attributes(remote_peer))
            .start_with_context(&self.tracer, parent);
        let cx = parent.with_span(span);
        self.inject(&cx, carrier);

        OtelExitSpan { cx }
    }
}

fn peer_attributes(remote_peer: &str) -> Vec<KeyValue> {
    match remote_peer
        .rsplit_once(':')
        .and_then(|(host, port)| port.parse::<u16>().ok().map(|port| (host, port)))
    {
        Some((host, port)) => vec![
            KeyValue::new(SERVER_ADDRESS, host.to_owned()),
            KeyValue::new(SERVER_PORT, i64::from(port)),
        ],
        None => vec![KeyValue::new(SERVER_ADDRESS, remote_peer.to_owned())],
    }
}

/// An exit span living in an OpenTelemetry [`Context`].
#[derive(Debug)]
pub struct OtelExitSpan {
    cx: Context,
}

impl OtelExitSpan {
    /// The context carrying this span, for work that should continue the
    /// trace of the outgoing call.
    pub fn context(&self) -> &Context {
        &self.cx
    }
}

impl ExitSpan for OtelExitSpan {
    fn set_component(&mut self, component: Component) {
        self.cx
            .span()
            .set_attribute(KeyValue::new(COMPONENT_KEY, component.as_str()));
    }

    fn set_layer(&mut self, layer: SpanLayer) {
        self.cx
            .span()
            .set_attribute(KeyValue::new(SPAN_LAYER_KEY, layer.as_str()));
    }

    fn set_attribute(&mut self, attribute: KeyValue) {
        self.cx.span().set_attribute(attribute);
    }

    fn error_occurred(&mut self) {
        self.cx.span().set_status(Status::error(""));
    }

    fn log(&mut self, error: &dyn Error) {
        let span = self.cx.span();
        span.record_error(error);
        span.set_status(Status::error(Cow::Owned(error.to_string())));
    }

    fn end(&mut self) {
        self.cx.span().end();
    }
}
