//! The lifecycle tracer: construct/destruct bookkeeping over the registry and counts.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::counts::{CountTable, CtorKey, ALL_TYPES};
use crate::error::{ParseOptionError, TraceError};
use crate::registry::{LiveObjects, ObjectAddr};
use crate::report::Snapshot;

/// First character of type tags that belong to the tracing machinery itself
/// rather than to the host program.
pub const INTERNAL_MARKER: char = '_';

/// Which type tags are excluded from tracing.
///
/// * `class` - skip tags starting with [`INTERNAL_MARKER`]
/// * `alloc` - skip every tag *not* starting with [`INTERNAL_MARKER`]
///
/// Only one of the two is expected at a time. With neither set everything is traced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceMode {
    pub class: bool,
    pub alloc: bool,
}

impl TraceMode {
    pub const NONE: Self = Self {
        class: false,
        alloc: false,
    };
    pub const CLASS: Self = Self {
        class: true,
        alloc: false,
    };
    pub const ALLOC: Self = Self {
        class: false,
        alloc: true,
    };

    #[inline]
    pub fn suppresses(self, tag: &str) -> bool {
        let internal = tag.starts_with(INTERNAL_MARKER);
        (self.class && internal) || (self.alloc && !internal)
    }
}

impl FromStr for TraceMode {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::NONE),
            "class" => Ok(Self::CLASS),
            "alloc" => Ok(Self::ALLOC),
            _ => Err(ParseOptionError {
                kind: "trace mode",
                value: s.to_string(),
                expected: "\"class\", \"alloc\", \"none\"",
            }),
        }
    }
}

/// Registry and count tables of a traced program.
///
/// `trace_construct` and `trace_destruct` are the only mutators. On error the
/// tables are left exactly as they were before the call.
#[derive(Debug, Clone)]
pub struct Tracer {
    mode: TraceMode,
    live_objects: LiveObjects,
    ctor_count: CountTable<CtorKey>,
    object_count: CountTable<&'static str>,
    live_count: CountTable<&'static str>,
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new(TraceMode::NONE)
    }
}

impl Tracer {
    pub fn new(mode: TraceMode) -> Self {
        Self {
            mode,
            live_objects: LiveObjects::new(),
            ctor_count: CountTable::new("constructor"),
            object_count: CountTable::new("object"),
            live_count: CountTable::new("live"),
        }
    }

    pub fn mode(&self) -> TraceMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: TraceMode) {
        self.mode = mode;
    }

    /// Records the construction of a `tag` object of `size` bytes at `addr`,
    /// built by the constructor described by `signature`.
    ///
    /// A tag filtered out by the trace mode is not recorded, and the call still
    /// succeeds.
    pub fn trace_construct(
        &mut self,
        addr: ObjectAddr,
        tag: &'static str,
        signature: &'static str,
        size: usize,
    ) -> Result<bool, TraceError> {
        if self.mode.suppresses(tag) {
            return Ok(true);
        }

        let key = CtorKey::new(tag, signature);
        tracing::trace!(%addr, ctor = %key, "trace_ctor");

        let size = size as u64;
        self.live_objects.insert(addr, tag);
        self.ctor_count.add(key, size);
        self.object_count.add(tag, size);
        self.object_count.add(ALL_TYPES, size);
        self.live_count.add(tag, size);

        Ok(true)
    }

    /// Records the destruction of the `tag` object at `addr`.
    ///
    /// When several entries share `addr`, the oldest one carrying `tag` is removed.
    /// A tag filtered out by the trace mode is ignored, and the call still succeeds.
    pub fn trace_destruct(
        &mut self,
        addr: ObjectAddr,
        tag: &'static str,
        size: usize,
    ) -> Result<bool, TraceError> {
        if self.mode.suppresses(tag) {
            return Ok(true);
        }

        tracing::trace!(%addr, tag, "trace_dtor");

        if !self.live_objects.contains(addr, tag) {
            return Err(TraceError::DoubleFreeOrUnregisteredDestruction { addr, tag });
        }
        // Only reachable if the live table drifted from the registry
        if self.live_count.get(tag).is_none() {
            return Err(TraceError::UnregisteredClassDestruction { tag });
        }

        self.live_count.remove_one(tag, size as u64)?;
        self.live_objects.remove(addr, tag);

        Ok(true)
    }

    pub fn live_objects(&self) -> &LiveObjects {
        &self.live_objects
    }

    pub fn ctor_count(&self) -> &CountTable<CtorKey> {
        &self.ctor_count
    }

    pub fn object_count(&self) -> &CountTable<&'static str> {
        &self.object_count
    }

    pub fn live_count(&self) -> &CountTable<&'static str> {
        &self.live_count
    }

    /// Owned copy of every table, for reporting.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_tracer(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counts::CountEntry;

    const A: ObjectAddr = ObjectAddr::new(0x1000);
    const B: ObjectAddr = ObjectAddr::new(0x2000);

    fn live_state(tracer: &Tracer) -> (Vec<(ObjectAddr, &'static str)>, Vec<(String, CountEntry)>) {
        let objects = tracer.live_objects().iter().collect();
        let counts = tracer
            .live_count()
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        (objects, counts)
    }

    #[test]
    fn test_construct_updates_every_table() {
        let mut tracer = Tracer::default();
        assert!(tracer.trace_construct(A, "Foo", "int", 8).unwrap());

        assert!(tracer.live_objects().contains(A, "Foo"));
        assert_eq!(tracer.live_count().get("Foo"), Some(CountEntry::new(1, 8)));
        assert_eq!(tracer.object_count().get("Foo"), Some(CountEntry::new(1, 8)));
        assert_eq!(
            tracer.object_count().get(ALL_TYPES),
            Some(CountEntry::new(1, 8))
        );
        assert_eq!(
            tracer.ctor_count().get(&CtorKey::new("Foo", "int")),
            Some(CountEntry::new(1, 8))
        );
    }

    #[test]
    fn test_round_trip_restores_live_state() {
        let mut tracer = Tracer::default();
        tracer.trace_construct(B, "Bar", "", 4).unwrap();
        let before = live_state(&tracer);

        tracer.trace_construct(A, "Foo", "int", 8).unwrap();
        tracer.trace_destruct(A, "Foo", 8).unwrap();

        assert_eq!(live_state(&tracer), before);
        assert_eq!(tracer.live_count().get("Foo"), None);
    }

    #[test]
    fn test_live_count_matches_constructs_minus_destructs() {
        let mut tracer = Tracer::default();
        let addrs: Vec<ObjectAddr> = (1..=5).map(|i| ObjectAddr::new(i * 0x100)).collect();

        for addr in &addrs {
            tracer.trace_construct(*addr, "Node", "", 16).unwrap();
        }
        tracer.trace_construct(ObjectAddr::new(0x9000), "Leaf", "", 4).unwrap();
        for addr in &addrs[..3] {
            tracer.trace_destruct(*addr, "Node", 16).unwrap();
        }
        tracer.trace_destruct(ObjectAddr::new(0x9000), "Leaf", 4).unwrap();

        assert_eq!(tracer.live_count().get("Node"), Some(CountEntry::new(2, 32)));
        assert_eq!(tracer.live_objects().count_tag("Node"), 2);
        assert_eq!(tracer.live_count().get("Leaf"), None);
        assert_eq!(tracer.live_objects().len(), 2);
    }

    #[test]
    fn test_address_reuse_removes_only_matching_tag() {
        let mut tracer = Tracer::default();
        tracer.trace_construct(A, "Foo", "", 8).unwrap();
        tracer.trace_construct(A, "Bar", "", 4).unwrap();

        tracer.trace_destruct(A, "Bar", 4).unwrap();

        assert!(tracer.live_objects().contains(A, "Foo"));
        assert!(!tracer.live_objects().contains(A, "Bar"));
        assert_eq!(tracer.live_count().get("Foo"), Some(CountEntry::new(1, 8)));
        assert_eq!(tracer.live_count().get("Bar"), None);
    }

    #[test]
    fn test_destruct_unknown_address_fails() {
        let mut tracer = Tracer::default();
        let err = tracer.trace_destruct(A, "Foo", 8).unwrap_err();
        assert_eq!(
            err,
            TraceError::DoubleFreeOrUnregisteredDestruction { addr: A, tag: "Foo" }
        );
    }

    #[test]
    fn test_double_destruct_fails_second_time() {
        let mut tracer = Tracer::default();
        tracer.trace_construct(A, "Foo", "", 8).unwrap();
        tracer.trace_destruct(A, "Foo", 8).unwrap();

        let err = tracer.trace_destruct(A, "Foo", 8).unwrap_err();
        assert!(matches!(
            err,
            TraceError::DoubleFreeOrUnregisteredDestruction { .. }
        ));
    }

    #[test]
    fn test_destruct_with_wrong_tag_fails_and_keeps_entry() {
        let mut tracer = Tracer::default();
        tracer.trace_construct(A, "Foo", "", 8).unwrap();

        let err = tracer.trace_destruct(A, "Bar", 8).unwrap_err();
        assert_eq!(
            err,
            TraceError::DoubleFreeOrUnregisteredDestruction { addr: A, tag: "Bar" }
        );
        assert!(tracer.live_objects().contains(A, "Foo"));
        assert_eq!(tracer.live_count().get("Foo"), Some(CountEntry::new(1, 8)));
    }

    #[test]
    fn test_mismatched_size_still_destructs() {
        let mut tracer = Tracer::default();
        tracer.trace_construct(A, "Foo", "", 8).unwrap();

        assert!(tracer.trace_destruct(A, "Foo", 16).unwrap());
        assert!(!tracer.live_objects().contains(A, "Foo"));
        assert_eq!(tracer.live_count().get("Foo"), None);
    }

    #[test]
    fn test_missing_live_count_is_unregistered_class() {
        let mut tracer = Tracer::default();
        tracer.trace_construct(A, "Foo", "", 8).unwrap();
        tracer.live_count.remove_one("Foo", 8).unwrap();

        let err = tracer.trace_destruct(A, "Foo", 8).unwrap_err();
        assert_eq!(err, TraceError::UnregisteredClassDestruction { tag: "Foo" });
        assert!(tracer.live_objects().contains(A, "Foo"));
    }

    #[test]
    fn test_class_mode_skips_internal_tags() {
        let mut tracer = Tracer::new(TraceMode::CLASS);

        assert!(tracer.trace_construct(A, "_Internal", "", 8).unwrap());
        assert!(tracer.trace_destruct(A, "_Internal", 8).unwrap());
        assert!(tracer.live_objects().is_empty());
        assert!(tracer.object_count().is_empty());
        assert!(tracer.ctor_count().is_empty());

        assert!(tracer.trace_construct(B, "Foo", "", 8).unwrap());
        assert_eq!(tracer.live_objects().len(), 1);
    }

    #[test]
    fn test_alloc_mode_skips_host_tags() {
        let mut tracer = Tracer::new(TraceMode::ALLOC);

        assert!(tracer.trace_construct(A, "Foo", "", 8).unwrap());
        assert!(tracer.trace_destruct(A, "Foo", 8).unwrap());
        assert!(tracer.trace_construct(B, "_Buffer", "", 8).unwrap());
        assert_eq!(tracer.live_objects().tags_at(B), &["_Buffer"]);
        assert!(!tracer.live_objects().contains_addr(A));
    }

    #[test]
    fn test_aggregate_counts_for_three_nodes() {
        let mut tracer = Tracer::default();
        tracer.trace_construct(ObjectAddr::new(0x10), "Other", "", 100).unwrap();
        let before = tracer.object_count().get(ALL_TYPES).unwrap();

        for i in 1..=3 {
            tracer
                .trace_construct(ObjectAddr::new(0x100 * i), "Node", "", 16)
                .unwrap();
        }

        assert_eq!(tracer.object_count().get("Node"), Some(CountEntry::new(3, 48)));
        let after = tracer.object_count().get(ALL_TYPES).unwrap();
        assert_eq!(after.count - before.count, 3);
        assert_eq!(after.bytes - before.bytes, 48);
    }

    #[test]
    fn test_trace_mode_from_str() {
        assert_eq!("class".parse::<TraceMode>().unwrap(), TraceMode::CLASS);
        assert_eq!(" ALLOC ".parse::<TraceMode>().unwrap(), TraceMode::ALLOC);
        assert_eq!("".parse::<TraceMode>().unwrap(), TraceMode::NONE);
        assert!("everything".parse::<TraceMode>().is_err());
    }
}
