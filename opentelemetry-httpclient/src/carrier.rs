use opentelemetry::propagation::Injector;

/// Propagation headers produced for a single outgoing call.
///
/// A [`TraceContext`](crate::TraceContext) fills the carrier when it creates
/// an exit span; the interceptor then copies every item onto the request in
/// the order the items were generated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextCarrier {
    items: Vec<CarrierItem>,
}

/// A single propagation header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CarrierItem {
    key: String,
    value: String,
}

impl CarrierItem {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl ContextCarrier {
    /// Create an empty carrier.
    pub fn new() -> Self {
        ContextCarrier::default()
    }

    /// Iterate over the header items in generation order.
    pub fn items(&self) -> impl Iterator<Item = &CarrierItem> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl Injector for ContextCarrier {
    /// Record a header. Setting a key again replaces its value in place so
    /// the original position is kept.
    fn set(&mut self, key: &str, value: String) {
        match self.items.iter_mut().find(|item| item.key == key) {
            Some(item) => item.value = value,
            None => self.items.push(CarrierItem {
                key: key.to_owned(),
                value,
            }),
        }
    }
}

impl IntoIterator for ContextCarrier {
    type Item = CarrierItem;
    type IntoIter = std::vec::IntoIter<CarrierItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_keep_generation_order() {
        let mut carrier = ContextCarrier::new();
        carrier.set("traceparent", "tp".to_string());
        carrier.set("tracestate", "ts".to_string());
        carrier.set("baggage", "b".to_string());

        let keys = carrier.items().map(CarrierItem::key).collect::<Vec<_>>();
        assert_eq!(keys, vec!["traceparent", "tracestate", "baggage"]);
    }

    #[test]
    fn set_existing_key_replaces_value() {
        let mut carrier = ContextCarrier::new();
        carrier.set("traceparent", "first".to_string());
        carrier.set("baggage", "b".to_string());
        carrier.set("traceparent", "second".to_string());

        assert_eq!(carrier.len(), 2);
        let first = carrier.items().next().unwrap();
        assert_eq!(first.key(), "traceparent");
        assert_eq!(first.value(), "second");
    }
}
