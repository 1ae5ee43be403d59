use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use prost_reflect::{DynamicMessage, FieldDescriptor, Value};

use crate::field_path::{render_path_part, FieldPath};

/// Upper bound on elements visited per repeated/map field. Scans past this
/// point are cut off and surfaced through the collection-cap counter.
pub const MAX_ITEMS_PER_COLLECTION: usize = 50;

/// Presence semantics of a field, fixed at plan build time from descriptor
/// metadata and carried into the `field_presence` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Presence {
    Explicit,
    Implicit,
}

impl Presence {
    pub const fn as_str(self) -> &'static str {
        match self {
            Presence::Explicit => "explicit",
            Presence::Implicit => "implicit",
        }
    }

    fn of(fd: &FieldDescriptor) -> Self {
        if fd.supports_presence() {
            Presence::Explicit
        } else {
            Presence::Implicit
        }
    }
}

/// Collection shape reported in the `collection_type` label of the cap
/// counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Repeated,
    Map,
}

impl CollectionKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            CollectionKind::Repeated => "repeated",
            CollectionKind::Map => "map",
        }
    }
}

/// Callback bundle threaded through one plan evaluation.
pub(crate) struct EvalContext<'a> {
    pub(crate) on_field: &'a mut dyn FnMut(&FieldDescriptor, &str, Presence),
    pub(crate) on_enum: &'a mut dyn FnMut(&FieldDescriptor, &str, &str, i32),
    pub(crate) on_cap: &'a mut dyn FnMut(&str, CollectionKind),
    pub(crate) path: FieldPath,
}

/// Compiled evaluation plan for one message type.
///
/// A plan holds only the nodes that can observe a deprecation signal; a
/// message type with no deprecated surface anywhere in its subtree compiles
/// to an empty plan. The node list is written exactly once, when the build
/// frame that created the plan completes; recursive type references share
/// the same plan handle before it is sealed.
#[derive(Default)]
pub struct EvalPlan {
    nodes: OnceLock<Box<[Evaluator]>>,
}

impl EvalPlan {
    pub fn len(&self) -> usize {
        self.nodes.get().map_or(0, |nodes| nodes.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn seal(&self, nodes: Vec<Evaluator>) {
        let _ = self.nodes.set(nodes.into_boxed_slice());
    }

    /// Walks the plan against a live message, reporting deprecated-field,
    /// deprecated-enum and scan-truncation events through the callbacks.
    ///
    /// Events for singular fields fire in field-declaration order, list items
    /// in index order, map entries in unspecified order. The walk never fails
    /// and performs no allocation beyond path rendering.
    pub fn eval_message(
        &self,
        msg: &DynamicMessage,
        on_field: &mut dyn FnMut(&FieldDescriptor, &str, Presence),
        on_enum: &mut dyn FnMut(&FieldDescriptor, &str, &str, i32),
        on_cap: &mut dyn FnMut(&str, CollectionKind),
    ) {
        let mut cx = EvalContext {
            on_field,
            on_enum,
            on_cap,
            path: FieldPath::acquire(),
        };
        self.eval(&mut cx, msg);
    }

    fn eval(&self, cx: &mut EvalContext<'_>, msg: &DynamicMessage) {
        if let Some(nodes) = self.nodes.get() {
            for node in nodes.iter() {
                node.eval(cx, msg);
            }
        }
    }
}

/// Closed set of evaluator node kinds composing a plan.
pub(crate) enum Evaluator {
    Field(FieldNode),
    Enum(EnumNode),
    Message(MessageNode),
    List(ListNode),
    Map(MapNode),
}

impl Evaluator {
    fn eval(&self, cx: &mut EvalContext<'_>, msg: &DynamicMessage) {
        match self {
            Evaluator::Field(node) => node.eval(cx, msg),
            Evaluator::Enum(node) => node.eval_field(cx, msg),
            Evaluator::Message(node) => node.eval(cx, msg),
            Evaluator::List(node) => node.eval(cx, msg),
            Evaluator::Map(node) => node.eval(cx, msg),
        }
    }
}

/// Terminal node for a field that is itself marked deprecated.
pub(crate) struct FieldNode {
    fd: FieldDescriptor,
    path_part: Arc<str>,
    presence: Presence,
}

impl FieldNode {
    pub(crate) fn new(fd: FieldDescriptor) -> Self {
        Self {
            path_part: render_path_part(&fd),
            presence: Presence::of(&fd),
            fd,
        }
    }

    fn eval(&self, cx: &mut EvalContext<'_>, msg: &DynamicMessage) {
        if !msg.has_field(&self.fd) {
            return;
        }
        cx.path.push(&self.path_part);
        let path = cx.path.render();
        (cx.on_field)(&self.fd, &path, self.presence);
        cx.path.pop();
    }
}

/// Terminal node for an enum-typed field or collection item whose enum type
/// carries deprecated values.
pub(crate) struct EnumNode {
    fd: FieldDescriptor,
    deprecated: HashMap<i32, Arc<str>>,
    path_part: Arc<str>,
}

impl EnumNode {
    pub(crate) fn new(fd: FieldDescriptor, deprecated: HashMap<i32, Arc<str>>) -> Self {
        Self {
            path_part: render_path_part(&fd),
            deprecated,
            fd,
        }
    }

    // Item mode: the enclosing list/map node already pushed its segment.
    fn eval_item(&self, cx: &mut EvalContext<'_>, value: &Value) {
        let Some(number) = value.as_enum_number() else {
            return;
        };
        if let Some(name) = self.deprecated.get(&number) {
            let path = cx.path.render();
            (cx.on_enum)(&self.fd, &path, name, number);
        }
    }

    // Field mode: the node sits directly in a plan.
    fn eval_field(&self, cx: &mut EvalContext<'_>, msg: &DynamicMessage) {
        if !msg.has_field(&self.fd) {
            return;
        }
        let Some(number) = msg.get_field(&self.fd).as_enum_number() else {
            return;
        };
        if let Some(name) = self.deprecated.get(&number) {
            cx.path.push(&self.path_part);
            let path = cx.path.render();
            (cx.on_enum)(&self.fd, &path, name, number);
            cx.path.pop();
        }
    }
}

/// Descends into a populated singular message field.
pub(crate) struct MessageNode {
    fd: FieldDescriptor,
    nested: Arc<EvalPlan>,
    path_part: Arc<str>,
}

impl MessageNode {
    pub(crate) fn new(fd: FieldDescriptor, nested: Arc<EvalPlan>) -> Self {
        Self {
            path_part: render_path_part(&fd),
            nested,
            fd,
        }
    }

    fn eval(&self, cx: &mut EvalContext<'_>, msg: &DynamicMessage) {
        if !msg.has_field(&self.fd) {
            return;
        }
        let value = msg.get_field(&self.fd);
        let Some(sub) = value.as_message() else {
            return;
        };
        cx.path.push(&self.path_part);
        self.nested.eval(cx, sub);
        cx.path.pop();
    }
}

/// Per-item evaluator nested under a list or map holder.
pub(crate) enum ItemEval {
    Message(Arc<EvalPlan>),
    Enum(EnumNode),
}

impl ItemEval {
    fn eval(&self, cx: &mut EvalContext<'_>, value: &Value) {
        match self {
            ItemEval::Message(plan) => {
                if let Some(sub) = value.as_message() {
                    plan.eval(cx, sub);
                }
            }
            ItemEval::Enum(node) => node.eval_item(cx, value),
        }
    }
}

/// Iterates a `repeated Message|Enum` field in index order, bounded by
/// [`MAX_ITEMS_PER_COLLECTION`].
pub(crate) struct ListNode {
    fd: FieldDescriptor,
    items: ItemEval,
    path_part: Arc<str>,
}

impl ListNode {
    pub(crate) fn new(fd: FieldDescriptor, items: ItemEval) -> Self {
        Self {
            path_part: render_path_part(&fd),
            items,
            fd,
        }
    }

    fn eval(&self, cx: &mut EvalContext<'_>, msg: &DynamicMessage) {
        if !msg.has_field(&self.fd) {
            return;
        }
        cx.path.push(&self.path_part);
        let value = msg.get_field(&self.fd);
        if let Some(list) = value.as_list() {
            for (i, item) in list.iter().enumerate() {
                if i >= MAX_ITEMS_PER_COLLECTION {
                    let path = cx.path.render();
                    (cx.on_cap)(&path, CollectionKind::Repeated);
                    break;
                }
                self.items.eval(cx, item);
            }
        }
        cx.path.pop();
    }
}

/// Iterates a `map<*, Message|Enum>` field, bounded by
/// [`MAX_ITEMS_PER_COLLECTION`]. Keys are never inspected.
pub(crate) struct MapNode {
    fd: FieldDescriptor,
    items: ItemEval,
    path_part: Arc<str>,
}

impl MapNode {
    pub(crate) fn new(fd: FieldDescriptor, items: ItemEval) -> Self {
        Self {
            path_part: render_path_part(&fd),
            items,
            fd,
        }
    }

    fn eval(&self, cx: &mut EvalContext<'_>, msg: &DynamicMessage) {
        if !msg.has_field(&self.fd) {
            return;
        }
        cx.path.push(&self.path_part);
        let value = msg.get_field(&self.fd);
        if let Some(map) = value.as_map() {
            for (i, item) in map.values().enumerate() {
                if i >= MAX_ITEMS_PER_COLLECTION {
                    let path = cx.path.render();
                    (cx.on_cap)(&path, CollectionKind::Map);
                    break;
                }
                self.items.eval(cx, item);
            }
        }
        cx.path.pop();
    }
}
