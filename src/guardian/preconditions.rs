use std::collections::BTreeSet;

use crate::core::types::{EventSource, GarbageCollector, ProfileHeader};

/// What is known about the profile the guards run against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preconditions {
    pub event_source: EventSource,
    pub debug_symbols: bool,
    pub kernel_symbols: bool,
    pub garbage_collector: Option<GarbageCollector>,
    pub event_types: BTreeSet<String>,
}

impl Preconditions {
    pub fn new(event_source: EventSource) -> Preconditions {
        Preconditions {
            event_source,
            debug_symbols: false,
            kernel_symbols: false,
            garbage_collector: None,
            event_types: BTreeSet::new(),
        }
    }

    pub fn from_header(header: &ProfileHeader) -> Preconditions {
        let mut event_types = BTreeSet::new();
        event_types.insert(header.event_type.clone());
        Preconditions {
            event_source: header.event_source,
            debug_symbols: header.debug_symbols,
            kernel_symbols: header.kernel_symbols,
            garbage_collector: header.garbage_collector,
            event_types,
        }
    }
}

/// What a guard requires from the profile. Unset fields accept anything.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct GuardPreconditions {
    pub event_source: Option<EventSource>,
    pub debug_symbols: Option<bool>,
    pub kernel_symbols: Option<bool>,
    pub garbage_collector: Option<GarbageCollector>,
    pub event_type: Option<String>,
}

impl GuardPreconditions {
    pub fn event_source(mut self, source: EventSource) -> GuardPreconditions {
        self.event_source = Some(source);
        self
    }

    pub fn debug_symbols(mut self, available: bool) -> GuardPreconditions {
        self.debug_symbols = Some(available);
        self
    }

    pub fn kernel_symbols(mut self, available: bool) -> GuardPreconditions {
        self.kernel_symbols = Some(available);
        self
    }

    pub fn garbage_collector(mut self, gc: GarbageCollector) -> GuardPreconditions {
        self.garbage_collector = Some(gc);
        self
    }

    pub fn event_type(mut self, event_type: &str) -> GuardPreconditions {
        self.event_type = Some(event_type.to_string());
        self
    }

    pub fn matches(&self, current: &Preconditions) -> bool {
        self.event_source.map_or(true, |s| s == current.event_source)
            && self.debug_symbols.map_or(true, |d| d == current.debug_symbols)
            && self.kernel_symbols.map_or(true, |k| k == current.kernel_symbols)
            && self
                .garbage_collector
                .map_or(true, |gc| current.garbage_collector == Some(gc))
            && self
                .event_type
                .as_ref()
                .map_or(true, |t| current.event_types.contains(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn async_profiler() -> Preconditions {
        let mut p = Preconditions::new(EventSource::AsyncProfiler);
        p.debug_symbols = true;
        p.garbage_collector = Some(GarbageCollector::G1);
        p.event_types.insert("jdk.ExecutionSample".to_string());
        p
    }

    #[test]
    fn empty_requirements_match_anything() {
        assert!(GuardPreconditions::default().matches(&async_profiler()));
        assert!(GuardPreconditions::default().matches(&Preconditions::new(EventSource::Jdk)));
    }

    #[test]
    fn every_set_requirement_must_hold() {
        let current = async_profiler();
        let required = GuardPreconditions::default()
            .event_source(EventSource::AsyncProfiler)
            .debug_symbols(true)
            .garbage_collector(GarbageCollector::G1)
            .event_type("jdk.ExecutionSample");
        assert!(required.matches(&current));

        assert!(!required.clone().kernel_symbols(true).matches(&current));
        assert!(!required
            .clone()
            .garbage_collector(GarbageCollector::Z)
            .matches(&current));
        assert!(!required
            .clone()
            .event_type("jdk.ObjectAllocationSample")
            .matches(&current));
        assert!(!required.matches(&Preconditions::new(EventSource::Jdk)));
    }

    #[test]
    fn unknown_collector_fails_a_collector_requirement() {
        let required = GuardPreconditions::default().garbage_collector(GarbageCollector::Serial);
        assert!(!required.matches(&Preconditions::new(EventSource::Jdk)));
    }

    #[test]
    fn from_header() {
        let header = ProfileHeader {
            event_source: EventSource::Jdk,
            event_type: "jdk.ExecutionSample".to_string(),
            debug_symbols: false,
            kernel_symbols: true,
            garbage_collector: Some(GarbageCollector::Parallel),
            created_at: None,
        };
        let p = Preconditions::from_header(&header);
        assert_eq!(p.event_source, EventSource::Jdk);
        assert!(p.kernel_symbols);
        assert_eq!(p.garbage_collector, Some(GarbageCollector::Parallel));
        assert!(p.event_types.contains("jdk.ExecutionSample"));
    }
}
