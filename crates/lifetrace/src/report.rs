//! Point-in-time snapshots of the tracer tables and the plain-text report layout.

use serde::Serialize;
use std::io::{self, Write};

use crate::alloc::AllocationTally;
use crate::counts::{CountEntry, CountTable};
use crate::registry::ObjectAddr;
use crate::tracer::Tracer;

/// One row of a count table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountRow {
    pub name: String,
    pub count: u64,
    pub bytes: u64,
}

/// One registered live object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveObjectRow {
    pub addr: ObjectAddr,
    pub tag: &'static str,
}

/// Owned copy of all tracer tables, in report order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub live_count: Vec<CountRow>,
    pub live_objects: Vec<LiveObjectRow>,
    pub object_count: Vec<CountRow>,
    pub ctor_count: Vec<CountRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocations: Option<AllocationTally>,
}

fn rows<K: Ord + std::fmt::Display>(table: &CountTable<K>) -> Vec<CountRow> {
    table
        .iter()
        .map(|(key, CountEntry { count, bytes })| CountRow {
            name: key.to_string(),
            count: *count,
            bytes: *bytes,
        })
        .collect()
}

impl Snapshot {
    pub fn from_tracer(tracer: &Tracer) -> Self {
        Self {
            live_count: rows(tracer.live_count()),
            live_objects: tracer
                .live_objects()
                .iter()
                .map(|(addr, tag)| LiveObjectRow { addr, tag })
                .collect(),
            object_count: rows(tracer.object_count()),
            ctor_count: rows(tracer.ctor_count()),
            allocations: None,
        }
    }

    pub fn with_allocations(mut self, allocations: Option<AllocationTally>) -> Self {
        self.allocations = allocations;
        self
    }

    /// True when no table has any row.
    pub fn is_empty(&self) -> bool {
        self.live_count.is_empty()
            && self.live_objects.is_empty()
            && self.object_count.is_empty()
            && self.ctor_count.is_empty()
    }

    /// Objects still registered, i.e. leaks when taken at exit.
    pub fn leaked(&self) -> usize {
        self.live_objects.len()
    }
}

fn write_count_rows(out: &mut dyn Write, rows: &[CountRow]) -> io::Result<()> {
    for row in rows {
        writeln!(out, "  {:>12}  {:>12}  {}", row.count, row.bytes, row.name)?;
    }
    Ok(())
}

/// Writes the non-empty sections of `snapshot` in the fixed order: live counts,
/// live objects, object counts, constructor counts.
pub fn write_text(snapshot: &Snapshot, out: &mut dyn Write) -> io::Result<()> {
    if !snapshot.live_count.is_empty() {
        writeln!(out, "Live object counts:")?;
        write_count_rows(out, &snapshot.live_count)?;
    }

    if !snapshot.live_objects.is_empty() {
        writeln!(out, "Live objects:")?;
        for row in &snapshot.live_objects {
            writeln!(out, "  {:>7}  {}", row.addr, row.tag)?;
        }
    }

    if !snapshot.object_count.is_empty() {
        writeln!(out, "Object counts:")?;
        write_count_rows(out, &snapshot.object_count)?;
    }

    if !snapshot.ctor_count.is_empty() {
        writeln!(out, "Constructor counts:")?;
        write_count_rows(out, &snapshot.ctor_count)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::TraceMode;

    fn render(snapshot: &Snapshot) -> String {
        let mut buf = Vec::new();
        write_text(snapshot, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_empty_snapshot_writes_nothing() {
        let tracer = Tracer::new(TraceMode::NONE);
        assert!(tracer.snapshot().is_empty());
        assert_eq!(render(&tracer.snapshot()), "");
    }

    #[test]
    fn test_sections_in_order() {
        let mut tracer = Tracer::default();
        tracer
            .trace_construct(ObjectAddr::new(0x20), "Node", "u32", 16)
            .unwrap();
        tracer
            .trace_construct(ObjectAddr::new(0x10), "Leaf", "", 4)
            .unwrap();

        let expected = "\
Live object counts:
             1             4  Leaf
             1            16  Node
Live objects:
     0x10  Leaf
     0x20  Node
Object counts:
             1             4  Leaf
             1            16  Node
             2            20  __ALL__
Constructor counts:
             1             4  Leaf()
             1            16  Node(u32)
";
        assert_eq!(render(&tracer.snapshot()), expected);
    }

    #[test]
    fn test_only_cumulative_sections_after_everything_died() {
        let mut tracer = Tracer::default();
        let addr = ObjectAddr::new(0x40);
        tracer.trace_construct(addr, "Node", "", 16).unwrap();
        tracer.trace_destruct(addr, "Node", 16).unwrap();

        let text = render(&tracer.snapshot());
        assert!(!text.contains("Live object counts:"));
        assert!(!text.contains("Live objects:"));
        assert!(text.starts_with("Object counts:"));
        assert!(text.contains("Constructor counts:"));
        assert_eq!(tracer.snapshot().leaked(), 0);
    }

    #[test]
    fn test_snapshot_does_not_disturb_tracing() {
        let mut tracer = Tracer::default();
        let addr = ObjectAddr::new(0x40);
        tracer.trace_construct(addr, "Node", "", 16).unwrap();

        let snapshot = tracer.snapshot();
        assert_eq!(snapshot.leaked(), 1);

        tracer.trace_destruct(addr, "Node", 16).unwrap();
        assert_eq!(snapshot.leaked(), 1);
        assert_eq!(tracer.snapshot().leaked(), 0);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut tracer = Tracer::default();
        tracer
            .trace_construct(ObjectAddr::new(0xff), "Node", "", 16)
            .unwrap();
        let value = serde_json::to_value(tracer.snapshot()).unwrap();

        assert_eq!(value["live_objects"][0]["addr"], "0xff");
        assert_eq!(value["live_count"][0]["name"], "Node");
        assert_eq!(value["object_count"][1]["name"], "__ALL__");
        assert!(value.get("allocations").is_none());
    }
}
