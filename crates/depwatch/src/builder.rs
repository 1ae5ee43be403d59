use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use prost_reflect::{EnumDescriptor, FieldDescriptor, Kind, MessageDescriptor};

use crate::plan::{
    EnumNode, EvalPlan, Evaluator, FieldNode, ItemEval, ListNode, MapNode, MessageNode,
};

// Keyed by the message's fully-qualified name; within one descriptor pool
// that is equivalent to descriptor identity.
type PlanMap = HashMap<Box<str>, Arc<EvalPlan>>;

/// Builds evaluation plans and memoises them in a copy-on-write cache.
///
/// Lookups load the current snapshot without taking a lock; building clones
/// the snapshot, inserts the new plans and publishes the clone atomically.
/// Writers serialise on a mutex, which is contended only while previously
/// unseen message types keep arriving.
pub struct PlanBuilder {
    cache: ArcSwap<PlanMap>,
    build_lock: Mutex<()>,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self {
            cache: ArcSwap::from_pointee(PlanMap::new()),
            build_lock: Mutex::new(()),
        }
    }

    /// Pre-builds plans for the given types so the request path never pays
    /// construction cost for them.
    pub fn with_seed(seed: &[MessageDescriptor]) -> Self {
        let builder = Self::new();
        for md in seed {
            let _ = builder.load_or_build(md);
        }
        builder
    }

    pub fn load_or_build(&self, md: &MessageDescriptor) -> Arc<EvalPlan> {
        if let Some(plan) = self.cache.load().get(md.full_name()) {
            return plan.clone();
        }

        let _guard = self.build_lock.lock();
        let snapshot = self.cache.load_full();
        if let Some(plan) = snapshot.get(md.full_name()) {
            return plan.clone();
        }

        let mut next: PlanMap = (*snapshot).clone();
        let mut frames = BuildFrames::default();
        let plan = build(md, &mut next, &mut frames);
        self.cache.store(Arc::new(next));
        plan
    }

    /// Snapshot lookup without building. Mostly useful to assert cache state.
    pub fn cached(&self, md: &MessageDescriptor) -> Option<Arc<EvalPlan>> {
        self.cache.load().get(md.full_name()).cloned()
    }
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// Node counts of the plans currently under construction on the build stack.
// A nested reference to an in-progress type resolves against the count
// appended so far, which is what keeps recursive types finite.
#[derive(Default)]
struct BuildFrames {
    in_progress: HashMap<Box<str>, usize>,
}

fn build(md: &MessageDescriptor, cache: &mut PlanMap, frames: &mut BuildFrames) -> Arc<EvalPlan> {
    let key: Box<str> = md.full_name().into();
    if let Some(plan) = cache.get(&key) {
        return plan.clone();
    }

    // Insert the handle before walking fields; cyclic references below pick
    // up this same plan.
    let plan = Arc::new(EvalPlan::default());
    cache.insert(key.clone(), plan.clone());
    frames.in_progress.insert(key.clone(), 0);

    let mut nodes = Vec::new();
    for fd in md.fields() {
        if let Some(node) = plan_field(&fd, cache, frames) {
            nodes.push(node);
            frames.in_progress.insert(key.clone(), nodes.len());
        }
    }
    frames.in_progress.remove(&key);

    tracing::debug!(
        message_type = md.full_name(),
        nodes = nodes.len(),
        "compiled deprecation plan"
    );
    plan.seal(nodes);
    plan
}

fn plan_field(
    fd: &FieldDescriptor,
    cache: &mut PlanMap,
    frames: &mut BuildFrames,
) -> Option<Evaluator> {
    // Wholesale deprecation supersedes sub-observation: no descent.
    if field_deprecated(fd) {
        return Some(Evaluator::Field(FieldNode::new(fd.clone())));
    }

    if fd.is_map() {
        let Kind::Message(entry) = fd.kind() else {
            return None;
        };
        let value_fd = entry.map_entry_value_field();
        return match value_fd.kind() {
            Kind::Message(value_md) => {
                let nested = build(&value_md, cache, frames);
                plan_has_nodes(&value_md, &nested, frames).then(|| {
                    Evaluator::Map(MapNode::new(fd.clone(), ItemEval::Message(nested)))
                })
            }
            Kind::Enum(ed) => {
                let deprecated = deprecated_enum_values(&ed);
                (!deprecated.is_empty()).then(|| {
                    Evaluator::Map(MapNode::new(
                        fd.clone(),
                        ItemEval::Enum(EnumNode::new(fd.clone(), deprecated)),
                    ))
                })
            }
            _ => None,
        };
    }

    if fd.is_list() {
        return match fd.kind() {
            Kind::Message(item_md) => {
                let nested = build(&item_md, cache, frames);
                plan_has_nodes(&item_md, &nested, frames).then(|| {
                    Evaluator::List(ListNode::new(fd.clone(), ItemEval::Message(nested)))
                })
            }
            Kind::Enum(ed) => {
                let deprecated = deprecated_enum_values(&ed);
                (!deprecated.is_empty()).then(|| {
                    Evaluator::List(ListNode::new(
                        fd.clone(),
                        ItemEval::Enum(EnumNode::new(fd.clone(), deprecated)),
                    ))
                })
            }
            _ => None,
        };
    }

    match fd.kind() {
        Kind::Message(sub_md) => {
            let nested = build(&sub_md, cache, frames);
            plan_has_nodes(&sub_md, &nested, frames)
                .then(|| Evaluator::Message(MessageNode::new(fd.clone(), nested)))
        }
        Kind::Enum(ed) => {
            let deprecated = deprecated_enum_values(&ed);
            (!deprecated.is_empty())
                .then(|| Evaluator::Enum(EnumNode::new(fd.clone(), deprecated)))
        }
        _ => None,
    }
}

// Whether a nested plan earns its parent a node, judged at append time: a
// sealed plan by its node count, an in-progress plan by the count appended
// so far.
fn plan_has_nodes(md: &MessageDescriptor, plan: &EvalPlan, frames: &BuildFrames) -> bool {
    if let Some(count) = frames.in_progress.get(md.full_name()) {
        return *count > 0;
    }
    !plan.is_empty()
}

fn field_deprecated(fd: &FieldDescriptor) -> bool {
    fd.field_descriptor_proto()
        .options
        .as_ref()
        .is_some_and(|opts| opts.deprecated())
}

fn deprecated_enum_values(ed: &EnumDescriptor) -> HashMap<i32, Arc<str>> {
    let mut deprecated = HashMap::new();
    for value in &ed.enum_descriptor_proto().value {
        let is_deprecated = value
            .options
            .as_ref()
            .is_some_and(|opts| opts.deprecated());
        if is_deprecated {
            deprecated.insert(value.number(), Arc::from(value.name()));
        }
    }
    deprecated
}
