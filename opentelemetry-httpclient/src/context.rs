//! Tracing collaborators used by the interceptor.
//!
//! The interceptor never stores spans itself. It asks a [`TraceContext`] for
//! a new exit span and mutates the returned [`ExitSpan`] handle, which is
//! kept in an [`ActiveSpan`] guard until the call completes.
use std::error::Error;
use std::fmt;

use opentelemetry::KeyValue;

use crate::carrier::ContextCarrier;

/// The library that produced a span.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Component {
    /// Generic blocking or async HTTP client.
    HttpClient,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::HttpClient => "HttpClient",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The technology layer a span belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SpanLayer {
    Database,
    RpcFramework,
    Http,
    Mq,
    Cache,
}

impl SpanLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanLayer::Database => "database",
            SpanLayer::RpcFramework => "rpc_framework",
            SpanLayer::Http => "http",
            SpanLayer::Mq => "mq",
            SpanLayer::Cache => "cache",
        }
    }
}

impl fmt::Display for SpanLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A span describing a call that leaves the process.
pub trait ExitSpan {
    fn set_component(&mut self, component: Component);

    fn set_layer(&mut self, layer: SpanLayer);

    /// Set a tag, such as the URL, method or response status code.
    fn set_attribute(&mut self, attribute: KeyValue);

    /// Flag the span as failed.
    fn error_occurred(&mut self);

    /// Attach an error to the span. Implementations also flag the span as
    /// failed.
    fn log(&mut self, error: &dyn Error);

    /// Stop the span. Called exactly once per span.
    fn end(&mut self);
}

/// Creates exit spans and fills their propagation carriers.
pub trait TraceContext {
    type Span: ExitSpan;

    /// Start an exit span named `operation_name` towards `remote_peer`
    /// (`host:port`), writing the headers that continue the trace on the
    /// remote side into `carrier`.
    fn create_exit_span(
        &self,
        operation_name: &str,
        carrier: &mut ContextCarrier,
        remote_peer: &str,
    ) -> Self::Span;
}

/// The span of an in-flight call.
///
/// The span is stopped by [`ActiveSpan::stop`], or on drop if the call never
/// got that far, so every created span is stopped exactly once.
#[derive(Debug)]
pub struct ActiveSpan<S: ExitSpan> {
    span: Option<S>,
}

impl<S: ExitSpan> ActiveSpan<S> {
    pub(crate) fn new(span: S) -> Self {
        ActiveSpan { span: Some(span) }
    }

    /// Access the underlying span.
    pub fn span_mut(&mut self) -> Option<&mut S> {
        self.span.as_mut()
    }

    /// Access the underlying span.
    pub fn span(&self) -> Option<&S> {
        self.span.as_ref()
    }

    /// Stop the span.
    pub fn stop(mut self) {
        self.end_once();
    }

    fn end_once(&mut self) {
        if let Some(mut span) = self.span.take() {
            span.end();
        }
    }
}

impl<S: ExitSpan> Drop for ActiveSpan<S> {
    fn drop(&mut self) {
        self.end_once();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct CountingSpan(Rc<Cell<usize>>);

    impl ExitSpan for CountingSpan {
        fn set_component(&mut self, _component: Component) {}
        fn set_layer(&mut self, _layer: SpanLayer) {}
        fn set_attribute(&mut self, _attribute: KeyValue) {}
        fn error_occurred(&mut self) {}
        fn log(&mut self, _error: &dyn Error) {}
        fn end(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn stop_ends_span_once() {
        let ended = Rc::new(Cell::new(0));
        let active = ActiveSpan::new(CountingSpan(ended.clone()));
        active.stop();
        assert_eq!(ended.get(), 1);
    }

    #[test]
    fn drop_ends_unstopped_span() {
        let ended = Rc::new(Cell::new(0));
        {
            let _active = ActiveSpan::new(CountingSpan(ended.clone()));
        }
        assert_eq!(ended.get(), 1);
    }

    #[test]
    fn names() {
        assert_eq!(Component::HttpClient.to_string(), "HttpClient");
        assert_eq!(SpanLayer::Http.as_str(), "http");
    }
}
