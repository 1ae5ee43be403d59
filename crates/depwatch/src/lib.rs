#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! Counter metrics for deprecated protobuf API surface.
//!
//! On every inbound RPC the middleware checks whether the call targets a
//! deprecated method and whether the request message populates deprecated
//! fields or deprecated enum values, and increments labelled counters so
//! operators can measure migration away from deprecated surface.
//!
//! Detection runs off compiled, cached evaluation plans over the message's
//! descriptor, so steady-state cost is proportional to the deprecated
//! portion of a message, not its full size.

pub mod builder;
pub mod call_meta;
mod field_path;
pub mod field_reporter;
pub mod interceptor;
pub mod method_reporter;
pub mod metrics;
pub mod options;
pub mod plan;
pub mod registry;

pub use call_meta::{CallMeta, RpcType};
pub use interceptor::ReportedStream;
pub use metrics::DeprecationMetrics;
pub use options::{CallContext, CounterOpts, Label, LabelSet, MetricsOptions};
pub use plan::{CollectionKind, EvalPlan, Presence, MAX_ITEMS_PER_COLLECTION};
pub use registry::{CounterHandle, CounterSink, CounterSpec, ScrapeError, TextRegistry};
