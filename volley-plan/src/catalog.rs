//! Element types a plan file can name

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use volley_control::{Component, ControllerKind, GroupKind};
use volley_core::ElementSpec;
use volley_engine::builtin::{
    ConstantThroughputTimer, ConstantTimer, DebugSampler, DummySampler, RegexExtractor,
    ResponseAssertion, SummaryListener, UniformRandomTimer, UserDefinedVariables,
    CONSTANT_THROUGHPUT_TIMER_SPEC, CONSTANT_TIMER_SPEC, DEBUG_SAMPLER_SPEC, DUMMY_SAMPLER_SPEC,
    REGEX_EXTRACTOR_SPEC, RESPONSE_ASSERTION_SPEC, SUMMARY_LISTENER_SPEC,
    UNIFORM_RANDOM_TIMER_SPEC, USER_VARIABLES_SPEC,
};
use volley_engine::group_spec;

type Factory = Arc<dyn Fn() -> Component + Send + Sync>;

/// Schema and constructor of one element type
#[derive(Clone)]
pub struct CatalogEntry {
    pub spec: &'static ElementSpec,
    factory: Factory,
}

impl CatalogEntry {
    /// A fresh component for one plan node
    pub fn create(&self) -> Component {
        (self.factory)()
    }
}

impl fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("kind", &self.spec.kind)
            .finish()
    }
}

/// Registry of element types by plan-file name
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: BTreeMap<&'static str, CatalogEntry>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Thread groups, every controller and the built-in components
    pub fn standard() -> Self {
        let mut catalog = Self::empty();
        for kind in [GroupKind::Setup, GroupKind::Regular, GroupKind::Teardown] {
            catalog.register(group_spec(kind), move || Component::ThreadGroup(kind));
        }
        for kind in ControllerKind::ALL {
            catalog.register(kind.spec(), move || Component::Controller(kind));
        }

        catalog.register(&DUMMY_SAMPLER_SPEC, || Component::Sampler(Arc::new(DummySampler)));
        catalog.register(&DEBUG_SAMPLER_SPEC, || Component::Sampler(Arc::new(DebugSampler)));
        catalog.register(&REGEX_EXTRACTOR_SPEC, || {
            Component::PostProcessor(Arc::new(RegexExtractor::new()))
        });
        catalog.register(&RESPONSE_ASSERTION_SPEC, || {
            Component::Assertion(Arc::new(ResponseAssertion))
        });
        catalog.register(&CONSTANT_TIMER_SPEC, || Component::Timer(Arc::new(ConstantTimer)));
        catalog.register(&UNIFORM_RANDOM_TIMER_SPEC, || {
            Component::Timer(Arc::new(UniformRandomTimer))
        });
        catalog.register(&CONSTANT_THROUGHPUT_TIMER_SPEC, || {
            Component::Timer(Arc::new(ConstantThroughputTimer::new()))
        });
        catalog.register(&USER_VARIABLES_SPEC, || {
            Component::Config(Arc::new(UserDefinedVariables))
        });
        catalog.register(&SUMMARY_LISTENER_SPEC, || {
            Component::Listener(Arc::new(SummaryListener::new()))
        });
        catalog
    }

    /// Adds or replaces the type named by `spec.kind`
    pub fn register(
        &mut self,
        spec: &'static ElementSpec,
        factory: impl Fn() -> Component + Send + Sync + 'static,
    ) {
        self.entries.insert(
            spec.kind,
            CatalogEntry {
                spec,
                factory: Arc::new(factory),
            },
        );
    }

    pub fn get(&self, kind: &str) -> Option<&CatalogEntry> {
        self.entries.get(kind)
    }

    /// Registered type names in order
    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog() {
        let catalog = Catalog::standard();
        assert!(matches!(
            catalog.get("setup_thread_group").map(CatalogEntry::create),
            Some(Component::ThreadGroup(GroupKind::Setup))
        ));
        assert!(matches!(
            catalog.get("while_controller").map(CatalogEntry::create),
            Some(Component::Controller(ControllerKind::While))
        ));
        assert!(matches!(
            catalog.get("dummy_sampler").map(CatalogEntry::create),
            Some(Component::Sampler(_))
        ));
        assert!(matches!(
            catalog.get("weighted_controller").map(CatalogEntry::create),
            Some(Component::Controller(ControllerKind::Weighted))
        ));
        assert!(matches!(
            catalog.get("constant_throughput_timer").map(CatalogEntry::create),
            Some(Component::Timer(_))
        ));
        assert!(catalog.get("http_sampler").is_none());
        assert_eq!(catalog.kinds().count(), 3 + ControllerKind::ALL.len() + 9);
    }
}
