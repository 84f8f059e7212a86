//! In-memory collaborators for testing instrumented clients.
use std::error::Error;
use std::sync::{Arc, Mutex};

use opentelemetry::propagation::Injector;
use opentelemetry::{Key, KeyValue, Value};

use crate::carrier::ContextCarrier;
use crate::context::{Component, ExitSpan, SpanLayer, TraceContext};

/// Everything recorded on one exit span.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordedSpan {
    pub operation_name: String,
    pub remote_peer: String,
    pub component: Option<Component>,
    pub layer: Option<SpanLayer>,
    pub attributes: Vec<KeyValue>,
    pub error_occurred: bool,
    /// Display output of every logged error.
    pub logs: Vec<String>,
    /// Number of times the span was ended.
    pub end_count: usize,
}

impl RecordedSpan {
    /// The last value set for `key`.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        let key = Key::from(key.to_owned());
        self.attributes
            .iter()
            .rev()
            .find(|kv| kv.key == key)
            .map(|kv| &kv.value)
    }
}

/// A [`TraceContext`] that records exit spans in memory and emits a fixed set
/// of propagation headers.
#[derive(Clone, Debug, Default)]
pub struct RecordingTraceContext {
    spans: Arc<Mutex<Vec<RecordedSpan>>>,
    headers: Vec<(String, String)>,
}

impl RecordingTraceContext {
    pub fn new() -> Self {
        RecordingTraceContext::default()
    }

    /// Add a header written into the carrier of every new span.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Snapshot of all spans created so far, in creation order.
    pub fn spans(&self) -> Vec<RecordedSpan> {
        self.spans
            .lock()
            .map(|spans| spans.clone())
            .unwrap_or_default()
    }
}

impl TraceContext for RecordingTraceContext {
    type Span = RecordingSpan;

    fn create_exit_span(
        &self,
        operation_name: &str,
        carrier: &mut ContextCarrier,
        remote_peer: &str,
    ) -> Self::Span {
        let index = self
            .spans
            .lock()
            .map(|mut spans| {
                spans.push(RecordedSpan {
                    operation_name: operation_name.to_owned(),
                    remote_peer: remote_peer.to_owned(),
                    ..Default::default()
                });
                spans.len() - 1
            })
            .unwrap_or_default();

        for (key, value) in &self.headers {
            carrier.set(key, value.clone());
        }

        RecordingSpan {
            index,
            spans: self.spans.clone(),
        }
    }
}

/// Handle to a [`RecordedSpan`].
#[derive(Debug)]
pub struct RecordingSpan {
    index: usize,
    spans: Arc<Mutex<Vec<RecordedSpan>>>,
}

impl RecordingSpan {
    fn update(&self, f: impl FnOnce(&mut RecordedSpan)) {
        if let Ok(mut spans) = self.spans.lock() {
            if let Some(span) = spans.get_mut(self.index) {
                f(span);
            }
        }
    }
}

impl ExitSpan for RecordingSpan {
    fn set_component(&mut self, component: Component) {
        self.update(|span| span.component = Some(component));
    }

    fn set_layer(&mut self, layer: SpanLayer) {
        self.update(|span| span.layer = Some(layer));
    }

    fn set_attribute(&mut self, attribute: KeyValue) {
        self.update(|span| span.attributes.push(attribute));
    }

    fn error_occurred(&mut self) {
        self.update(|span| span.error_occurred = true);
    }

    fn log(&mut self, error: &dyn Error) {
        let message = error.to_string();
        self.update(|span| {
            span.error_occurred = true;
            span.logs.push(message);
        });
    }

    fn end(&mut self) {
        self.update(|span| span.end_count += 1);
    }
}
