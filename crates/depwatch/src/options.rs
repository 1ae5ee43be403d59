use std::sync::Arc;

use prost_reflect::{DescriptorPool, DynamicMessage, FieldDescriptor, MessageDescriptor, ServiceDescriptor};
use tonic::metadata::MetadataMap;

use crate::call_meta::CallMeta;

/// Per-event context handed to label extractors.
pub struct CallContext<'a> {
    pub meta: &'a CallMeta,
    /// Request metadata of the surrounding call, when the adapter has it.
    pub metadata: Option<&'a MetadataMap>,
}

/// Produces one label value for one event.
///
/// The message is the request being evaluated (absent for method events
/// observed at stream open) and the field descriptor is the deprecated field
/// the event fired for (absent for method events). Extractors run once per
/// event per label and should stay fast and allocation-conscious.
pub type LabelValueFn =
    Arc<dyn Fn(&CallContext<'_>, Option<&DynamicMessage>, Option<&FieldDescriptor>) -> String + Send + Sync>;

/// One user-supplied label: a name and the extractor producing its value.
#[derive(Clone)]
pub struct Label {
    pub name: String,
    pub value: LabelValueFn,
}

impl Label {
    pub fn new<F>(name: impl Into<String>, value: F) -> Self
    where
        F: Fn(&CallContext<'_>, Option<&DynamicMessage>, Option<&FieldDescriptor>) -> String
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            value: Arc::new(value),
        }
    }
}

/// Ordered label lists per event kind. Order is preserved into the counter
/// label schemas.
#[derive(Clone, Default)]
pub struct LabelSet {
    pub method: Vec<Label>,
    pub field: Vec<Label>,
    pub enum_value: Vec<Label>,
}

/// Passthrough knobs applied to every counter the middleware registers.
#[derive(Debug, Clone)]
pub struct CounterOpts {
    pub namespace: String,
    pub subsystem: String,
    pub const_labels: Vec<(String, String)>,
}

impl Default for CounterOpts {
    fn default() -> Self {
        Self {
            namespace: "grpc".to_string(),
            subsystem: String::new(),
            const_labels: Vec::new(),
        }
    }
}

impl CounterOpts {
    /// `namespace_subsystem_name`, skipping empty components.
    pub(crate) fn full_name(&self, name: &str) -> String {
        let mut full = String::new();
        for part in [self.namespace.as_str(), self.subsystem.as_str(), name] {
            if part.is_empty() {
                continue;
            }
            if !full.is_empty() {
                full.push('_');
            }
            full.push_str(part);
        }
        full
    }
}

/// Configuration for [`crate::DeprecationMetrics`].
#[derive(Clone, Default)]
pub struct MetricsOptions {
    /// Extra counter labels appended after the built-in ones.
    pub extra_labels: LabelSet,
    /// Exemplar labels attached to increments; an event kind with no
    /// exemplar labels configured never emits exemplars.
    pub exemplars: LabelSet,
    /// Message types whose plans are built eagerly at construction.
    pub seed_messages: Vec<MessageDescriptor>,
    /// Services whose methods are resolved eagerly at construction.
    pub seed_services: Vec<ServiceDescriptor>,
    /// Descriptor pool consulted for method resolution. Defaults to
    /// [`DescriptorPool::global`].
    pub descriptor_pool: Option<DescriptorPool>,
    pub counters: CounterOpts,
}

impl MetricsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extra_labels(mut self, labels: LabelSet) -> Self {
        self.extra_labels = labels;
        self
    }

    pub fn with_exemplars(mut self, exemplars: LabelSet) -> Self {
        self.exemplars = exemplars;
        self
    }

    pub fn with_seed_messages(
        mut self,
        descriptors: impl IntoIterator<Item = MessageDescriptor>,
    ) -> Self {
        self.seed_messages.extend(descriptors);
        self
    }

    pub fn with_seed_services(
        mut self,
        descriptors: impl IntoIterator<Item = ServiceDescriptor>,
    ) -> Self {
        self.seed_services.extend(descriptors);
        self
    }

    pub fn with_descriptor_pool(mut self, pool: DescriptorPool) -> Self {
        self.descriptor_pool = Some(pool);
        self
    }

    pub fn with_counter_opts(mut self, counters: CounterOpts) -> Self {
        self.counters = counters;
        self
    }
}
