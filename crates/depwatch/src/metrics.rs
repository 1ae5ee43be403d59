use std::sync::Arc;

use prost_reflect::{DescriptorPool, DynamicMessage, FieldDescriptor};

use crate::field_reporter::FieldReporter;
use crate::method_reporter::MethodReporter;
use crate::options::{CallContext, Label, LabelSet, MetricsOptions};
use crate::plan::{CollectionKind, Presence, MAX_ITEMS_PER_COLLECTION};
use crate::registry::{CounterHandle, CounterSink, CounterSpec, TextRegistry};

const METHOD_USED: &str = "deprecated_method_used_total";
const FIELD_USED: &str = "deprecated_field_used_total";
const ENUM_USED: &str = "deprecated_enum_used_total";
const HIT_MAX_ITEMS: &str = "deprecated_field_usage_hit_max_items_per_collection_total";

const BASE_LABELS: [&str; 3] = ["grpc_type", "grpc_service", "grpc_method"];

/// The reporter: owns the method and field reporters, the counters, and the
/// configured extra labels and exemplars.
///
/// A deprecated method short-circuits field-level reporting: the method
/// counter is incremented and the payload is not walked.
pub struct DeprecationMetrics {
    methods: MethodReporter,
    fields: FieldReporter,
    method_used: Arc<dyn CounterHandle>,
    field_used: Arc<dyn CounterHandle>,
    enum_used: Arc<dyn CounterHandle>,
    hit_max_items: Arc<dyn CounterHandle>,
    extra_labels: LabelSet,
    exemplars: LabelSet,
    registry: Option<Arc<TextRegistry>>,
}

impl DeprecationMetrics {
    /// Builds the reporter backed by an owned [`TextRegistry`], reachable via
    /// [`DeprecationMetrics::registry`] for rendering and scraping.
    pub fn new(options: MetricsOptions) -> Self {
        let registry = Arc::new(TextRegistry::new());
        let mut metrics = Self::with_sink(registry.as_ref(), options);
        metrics.registry = Some(registry);
        metrics
    }

    /// Builds the reporter registering its counters with an external sink.
    pub fn with_sink(sink: &dyn CounterSink, options: MetricsOptions) -> Self {
        let MetricsOptions {
            extra_labels,
            exemplars,
            seed_messages,
            seed_services,
            descriptor_pool,
            counters,
        } = options;

        let pool = descriptor_pool.unwrap_or_else(DescriptorPool::global);
        let methods = MethodReporter::with_seed(pool, &seed_services);
        let fields = FieldReporter::with_seed(&seed_messages);

        let method_used = sink.counter(CounterSpec {
            name: counters.full_name(METHOD_USED),
            help: "Count of calls to deprecated RPC methods (proto method or service option deprecated=true).".to_string(),
            labels: label_names(&[], &extra_labels.method),
            const_labels: counters.const_labels.clone(),
        });
        let field_used = sink.counter(CounterSpec {
            name: counters.full_name(FIELD_USED),
            help: "Count of requests using deprecated fields (proto field option deprecated=true).".to_string(),
            labels: label_names(&["field", "field_presence"], &extra_labels.field),
            const_labels: counters.const_labels.clone(),
        });
        let enum_used = sink.counter(CounterSpec {
            name: counters.full_name(ENUM_USED),
            help: "Count of requests using deprecated enum values (proto enum value option deprecated=true).".to_string(),
            labels: label_names(&["field", "enum_value", "enum_number"], &extra_labels.enum_value),
            const_labels: counters.const_labels.clone(),
        });
        let hit_max_items = sink.counter(CounterSpec {
            name: counters.full_name(HIT_MAX_ITEMS),
            help: "Number of times collection iteration was cut off by the per-collection item limit.".to_string(),
            labels: label_names(&["field", "collection_type", "max_items"], &[]),
            const_labels: counters.const_labels,
        });

        Self {
            methods,
            fields,
            method_used,
            field_used,
            enum_used,
            hit_max_items,
            extra_labels,
            exemplars,
            registry: None,
        }
    }

    /// Record deprecated-surface usage for one received request message.
    pub fn observe(&self, ctx: &CallContext<'_>, msg: &DynamicMessage) {
        if self.report_method(ctx, Some(msg)) {
            return;
        }
        self.report_fields(ctx, msg);
    }

    /// Method-level check only; used by the stream wrapper at stream open,
    /// before any message has arrived. Returns `true` when the method is
    /// deprecated (in which case the call's messages are not walked).
    pub(crate) fn report_method(&self, ctx: &CallContext<'_>, msg: Option<&DynamicMessage>) -> bool {
        self.methods.report(&ctx.meta.full_method, |_descriptor| {
            let mut values = base_values(ctx);
            push_extras(&mut values, &self.extra_labels.method, ctx, msg, None);
            self.inc(&self.method_used, values, &self.exemplars.method, ctx, msg, None);
        })
    }

    pub(crate) fn report_fields(&self, ctx: &CallContext<'_>, msg: &DynamicMessage) {
        let mut on_field = |fd: &FieldDescriptor, path: &str, presence: Presence| {
            let mut values = base_values(ctx);
            values.push(path.to_string());
            values.push(presence.as_str().to_string());
            push_extras(&mut values, &self.extra_labels.field, ctx, Some(msg), Some(fd));
            self.inc(&self.field_used, values, &self.exemplars.field, ctx, Some(msg), Some(fd));
        };
        let mut on_enum = |fd: &FieldDescriptor, path: &str, name: &str, number: i32| {
            let mut values = base_values(ctx);
            values.push(path.to_string());
            values.push(name.to_string());
            values.push(number.to_string());
            push_extras(&mut values, &self.extra_labels.enum_value, ctx, Some(msg), Some(fd));
            self.inc(&self.enum_used, values, &self.exemplars.enum_value, ctx, Some(msg), Some(fd));
        };
        let mut on_cap = |path: &str, kind: CollectionKind| {
            let mut values = base_values(ctx);
            values.push(path.to_string());
            values.push(kind.as_str().to_string());
            values.push(MAX_ITEMS_PER_COLLECTION.to_string());
            self.hit_max_items.inc(&values);
        };

        self.fields
            .report(msg, &mut on_field, &mut on_enum, &mut on_cap);
    }

    fn inc(
        &self,
        counter: &Arc<dyn CounterHandle>,
        values: Vec<String>,
        exemplar_labels: &[Label],
        ctx: &CallContext<'_>,
        msg: Option<&DynamicMessage>,
        fd: Option<&FieldDescriptor>,
    ) {
        if exemplar_labels.is_empty() {
            counter.inc(&values);
            return;
        }
        let exemplar: Vec<(String, String)> = exemplar_labels
            .iter()
            .map(|label| (label.name.clone(), (label.value)(ctx, msg, fd)))
            .collect();
        counter.inc_with_exemplar(&values, &exemplar);
    }

    /// The owned registry, when constructed via [`DeprecationMetrics::new`].
    pub fn registry(&self) -> Option<&Arc<TextRegistry>> {
        self.registry.as_ref()
    }

    /// Renders the owned registry; empty when an external sink is in use.
    pub fn render(&self) -> String {
        self.registry
            .as_ref()
            .map(|registry| registry.render())
            .unwrap_or_default()
    }
}

fn label_names(fixed: &[&str], extras: &[Label]) -> Vec<String> {
    let mut names: Vec<String> = BASE_LABELS
        .iter()
        .chain(fixed)
        .map(|name| name.to_string())
        .collect();
    names.extend(extras.iter().map(|label| label.name.clone()));
    names
}

fn base_values(ctx: &CallContext<'_>) -> Vec<String> {
    vec![
        ctx.meta.rpc_type.as_str().to_string(),
        ctx.meta.service.clone(),
        ctx.meta.method.clone(),
    ]
}

fn push_extras(
    values: &mut Vec<String>,
    labels: &[Label],
    ctx: &CallContext<'_>,
    msg: Option<&DynamicMessage>,
    fd: Option<&FieldDescriptor>,
) {
    for label in labels {
        values.push((label.value)(ctx, msg, fd));
    }
}
