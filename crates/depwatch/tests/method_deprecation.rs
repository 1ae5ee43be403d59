mod common;

use common::{msg, set_i32};
use depwatch::method_reporter::MethodReporter;
use depwatch::{DeprecationMetrics, MetricsOptions};
use depwatch_testdata::{pool, service_descriptor};

const TEST_SERVICE: &str = "depwatch.testdata.v1.TestService";
const LEGACY_SERVICE: &str = "depwatch.testdata.v1.LegacyService";

#[test]
fn resolves_method_deprecation_option() {
    let reporter = MethodReporter::new(pool());
    assert!(reporter.is_deprecated("/depwatch.testdata.v1.TestService/OldCall"));
    assert!(!reporter.is_deprecated("/depwatch.testdata.v1.TestService/Call"));
}

#[test]
fn service_deprecation_covers_all_methods() {
    let reporter = MethodReporter::new(pool());
    assert!(reporter.is_deprecated("/depwatch.testdata.v1.LegacyService/Ping"));
}

#[test]
fn lookup_failures_resolve_to_not_deprecated() {
    let reporter = MethodReporter::new(pool());
    assert!(!reporter.is_deprecated("/unknown.Service/Call"));
    assert!(!reporter.is_deprecated("/depwatch.testdata.v1.TestService/Missing"));
    assert!(!reporter.is_deprecated("no-slashes"));
    assert!(!reporter.is_deprecated(""));
    // Cached negatives keep answering the same way.
    assert!(!reporter.is_deprecated("/unknown.Service/Call"));
}

#[test]
fn report_passes_the_method_descriptor() {
    let reporter = MethodReporter::new(pool());

    let mut seen = None;
    let hit = reporter.report("/depwatch.testdata.v1.TestService/OldCall", |md| {
        seen = md.map(|md| md.name().to_string());
    });
    assert!(hit);
    assert_eq!(seen.as_deref(), Some("OldCall"));

    let hit = reporter.report("/depwatch.testdata.v1.TestService/Call", |_| {
        panic!("callback must not run for non-deprecated methods");
    });
    assert!(!hit);
}

#[test]
fn seeded_services_are_pre_resolved() {
    let seed = [
        service_descriptor(TEST_SERVICE),
        service_descriptor(LEGACY_SERVICE),
    ];
    let reporter = MethodReporter::with_seed(pool(), &seed);
    assert!(reporter.is_deprecated("/depwatch.testdata.v1.TestService/OldCall"));
    assert!(reporter.is_deprecated("/depwatch.testdata.v1.LegacyService/Ping"));
    assert!(!reporter.is_deprecated("/depwatch.testdata.v1.TestService/Call"));
}

#[test]
fn deprecated_method_short_circuits_field_reporting() {
    let metrics = DeprecationMetrics::new(MetricsOptions::new().with_descriptor_pool(pool()));

    let mut req = msg("AllInclusive");
    set_i32(&mut req, "scalar_deprecated", 1);
    metrics.observe_unary("/depwatch.testdata.v1.TestService/OldCall", None, &req);

    let registry = metrics.registry().expect("default registry");
    assert_eq!(
        registry.value(
            "grpc_deprecated_method_used_total",
            &["unary", TEST_SERVICE, "OldCall"],
        ),
        Some(1)
    );
    assert_eq!(registry.series_count("grpc_deprecated_field_used_total"), 0);
    assert_eq!(registry.series_count("grpc_deprecated_enum_used_total"), 0);
}

#[test]
fn non_deprecated_method_walks_the_payload() {
    let metrics = DeprecationMetrics::new(MetricsOptions::new().with_descriptor_pool(pool()));

    let mut req = msg("AllInclusive");
    set_i32(&mut req, "scalar_deprecated", 1);
    metrics.observe_unary("/depwatch.testdata.v1.TestService/Call", None, &req);

    let registry = metrics.registry().expect("default registry");
    assert_eq!(registry.series_count("grpc_deprecated_method_used_total"), 0);
    assert_eq!(
        registry.value(
            "grpc_deprecated_field_used_total",
            &["unary", TEST_SERVICE, "Call", "scalar_deprecated", "implicit"],
        ),
        Some(1)
    );
}
