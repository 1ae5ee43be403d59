//! Proto fixtures for `depwatch` tests and benches.
//!
//! The fixture protos carry `deprecated = true` options on methods, a
//! service, fields and an enum value, covering every shape the evaluator
//! distinguishes: scalars, optionals, wrappers, oneofs, lists, maps and
//! recursive messages.

use once_cell::sync::Lazy;
use prost_reflect::{DescriptorPool, DynamicMessage, MessageDescriptor, ServiceDescriptor};

/// Generated prost types for the fixture protos.
pub mod pb {
    tonic::include_proto!("depwatch.testdata.v1");
}

pub const PACKAGE: &str = "depwatch.testdata.v1";

const DESCRIPTOR_SET_BYTES: &[u8] =
    include_bytes!(concat!(env!("OUT_DIR"), "/depwatch_testdata.bin"));

static DESCRIPTOR_POOL: Lazy<DescriptorPool> = Lazy::new(|| {
    DescriptorPool::decode(DESCRIPTOR_SET_BYTES).expect("embedded descriptor set is valid")
});

/// A handle to the fixture descriptor pool.
pub fn pool() -> DescriptorPool {
    DESCRIPTOR_POOL.clone()
}

/// Looks up a message descriptor by fully-qualified name.
pub fn message_descriptor(full_name: &str) -> MessageDescriptor {
    DESCRIPTOR_POOL
        .get_message_by_name(full_name)
        .unwrap_or_else(|| panic!("message `{full_name}` missing from fixture pool"))
}

/// Looks up a service descriptor by fully-qualified name.
pub fn service_descriptor(full_name: &str) -> ServiceDescriptor {
    DESCRIPTOR_POOL
        .get_service_by_name(full_name)
        .unwrap_or_else(|| panic!("service `{full_name}` missing from fixture pool"))
}

/// An empty dynamic message of the given fully-qualified type.
pub fn new_message(full_name: &str) -> DynamicMessage {
    DynamicMessage::new(message_descriptor(full_name))
}
