use prost_reflect::{DynamicMessage, FieldDescriptor, MessageDescriptor, ReflectMessage};

use crate::builder::PlanBuilder;
use crate::plan::{CollectionKind, Presence};

/// Field-level reporting entry point: resolves the plan for a message's type
/// and walks it.
pub struct FieldReporter {
    builder: PlanBuilder,
}

impl FieldReporter {
    pub fn new() -> Self {
        Self {
            builder: PlanBuilder::new(),
        }
    }

    pub fn with_seed(seed: &[MessageDescriptor]) -> Self {
        Self {
            builder: PlanBuilder::with_seed(seed),
        }
    }

    pub fn report(
        &self,
        msg: &DynamicMessage,
        on_field: &mut dyn FnMut(&FieldDescriptor, &str, Presence),
        on_enum: &mut dyn FnMut(&FieldDescriptor, &str, &str, i32),
        on_cap: &mut dyn FnMut(&str, CollectionKind),
    ) {
        let plan = self.builder.load_or_build(&msg.descriptor());
        plan.eval_message(msg, on_field, on_enum, on_cap);
    }
}

impl Default for FieldReporter {
    fn default() -> Self {
        Self::new()
    }
}
