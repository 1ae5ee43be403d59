use dashmap::DashMap;
use prost_reflect::{DescriptorPool, MethodDescriptor, ServiceDescriptor};

/// Cached decision for one wire full-method string.
#[derive(Clone)]
struct MethodEntry {
    deprecated: bool,
    descriptor: Option<MethodDescriptor>,
}

impl MethodEntry {
    fn not_deprecated() -> Self {
        Self {
            deprecated: false,
            descriptor: None,
        }
    }
}

/// Resolves whether a full method name refers to a deprecated method, or to
/// a method of a deprecated service.
///
/// Decisions are cached under the exact wire string (`/pkg.Service/Method`).
/// Negative outcomes, including lookup failures, are cached too; duplicated
/// resolution on a first-touch race is harmless because the result is
/// deterministic.
pub struct MethodReporter {
    pool: DescriptorPool,
    cache: DashMap<String, MethodEntry>,
}

impl MethodReporter {
    pub fn new(pool: DescriptorPool) -> Self {
        Self {
            pool,
            cache: DashMap::new(),
        }
    }

    /// Pre-resolves every method of the given services into the cache.
    pub fn with_seed(pool: DescriptorPool, seed: &[ServiceDescriptor]) -> Self {
        let reporter = Self::new(pool);
        for sd in seed {
            for method in sd.methods() {
                let full_method = format!("/{}/{}", sd.full_name(), method.name());
                let _ = reporter.get_or_resolve(&full_method);
            }
        }
        reporter
    }

    /// Invokes `on_deprecated` and returns `true` when the method is
    /// deprecated surface.
    pub fn report(
        &self,
        full_method: &str,
        on_deprecated: impl FnOnce(Option<&MethodDescriptor>),
    ) -> bool {
        let entry = self.get_or_resolve(full_method);
        if entry.deprecated {
            on_deprecated(entry.descriptor.as_ref());
            return true;
        }
        false
    }

    pub fn is_deprecated(&self, full_method: &str) -> bool {
        self.get_or_resolve(full_method).deprecated
    }

    fn get_or_resolve(&self, full_method: &str) -> MethodEntry {
        if let Some(entry) = self.cache.get(full_method) {
            return entry.clone();
        }
        let entry = self.resolve(full_method);
        self.cache.insert(full_method.to_string(), entry.clone());
        entry
    }

    fn resolve(&self, full_method: &str) -> MethodEntry {
        let trimmed = full_method.strip_prefix('/').unwrap_or(full_method);
        let Some((service, method)) = trimmed.rsplit_once('/') else {
            return MethodEntry::not_deprecated();
        };
        let Some(sd) = self.pool.get_service_by_name(service) else {
            tracing::debug!(full_method, "service not found in descriptor pool");
            return MethodEntry::not_deprecated();
        };
        let Some(md) = sd.methods().find(|m| m.name() == method) else {
            tracing::debug!(full_method, "method not found in service descriptor");
            return MethodEntry::not_deprecated();
        };
        if method_deprecated(&md) || service_deprecated(&sd) {
            MethodEntry {
                deprecated: true,
                descriptor: Some(md),
            }
        } else {
            MethodEntry::not_deprecated()
        }
    }
}

fn method_deprecated(md: &MethodDescriptor) -> bool {
    md.method_descriptor_proto()
        .options
        .as_ref()
        .is_some_and(|opts| opts.deprecated())
}

fn service_deprecated(sd: &ServiceDescriptor) -> bool {
    sd.service_descriptor_proto()
        .options
        .as_ref()
        .is_some_and(|opts| opts.deprecated())
}
