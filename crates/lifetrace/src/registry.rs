//! Live-object registry: which traced objects are currently alive, keyed by address.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// The address of a traced object, used only as an identity token.
///
/// It is never dereferenced. Displays as lower-case hex (`0x7f3a...`) and honours
/// width and alignment flags, so reports can right-align it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectAddr(usize);

impl ObjectAddr {
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Address of the value behind `ptr`. Metadata of fat pointers is discarded.
    #[inline]
    pub fn of<T: ?Sized>(ptr: *const T) -> Self {
        Self(ptr.cast::<()>() as usize)
    }

    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjectAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("{:#x}", self.0))
    }
}

impl Serialize for ObjectAddr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Multi-map from address to the type tags registered there.
///
/// An address can hold several entries at once: an untraced free followed by a
/// reuse of the same memory produces a second registration before the first one
/// is removed. Entries at one address keep their insertion order, and removal
/// picks the oldest entry whose tag matches.
#[derive(Debug, Clone, Default)]
pub struct LiveObjects {
    entries: BTreeMap<ObjectAddr, Vec<&'static str>>,
    len: usize,
}

impl LiveObjects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `tag` at `addr`. Never replaces an existing entry.
    pub fn insert(&mut self, addr: ObjectAddr, tag: &'static str) {
        self.entries.entry(addr).or_default().push(tag);
        self.len += 1;
    }

    /// Position of the first entry at `addr` carrying `tag`.
    pub fn position(&self, addr: ObjectAddr, tag: &str) -> Option<usize> {
        self.entries.get(&addr)?.iter().position(|t| *t == tag)
    }

    pub fn contains(&self, addr: ObjectAddr, tag: &str) -> bool {
        self.position(addr, tag).is_some()
    }

    pub fn contains_addr(&self, addr: ObjectAddr) -> bool {
        self.entries.contains_key(&addr)
    }

    /// Removes the first entry at `addr` carrying `tag`. Returns whether one was found.
    pub fn remove(&mut self, addr: ObjectAddr, tag: &str) -> bool {
        let Some(tags) = self.entries.get_mut(&addr) else {
            return false;
        };
        let Some(index) = tags.iter().position(|t| *t == tag) else {
            return false;
        };

        tags.remove(index);
        if tags.is_empty() {
            self.entries.remove(&addr);
        }
        self.len -= 1;
        true
    }

    /// Tags registered at `addr`, oldest first.
    pub fn tags_at(&self, addr: ObjectAddr) -> &[&'static str] {
        self.entries.get(&addr).map(Vec::as_slice).unwrap_or_default()
    }

    /// Number of live entries with `tag`.
    pub fn count_tag(&self, tag: &str) -> usize {
        self.iter().filter(|(_, t)| *t == tag).count()
    }

    /// Total number of entries, counting every entry at a shared address.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Entries in ascending address order, insertion order within an address.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectAddr, &'static str)> + '_ {
        self.entries
            .iter()
            .flat_map(|(addr, tags)| tags.iter().map(move |tag| (*addr, *tag)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addr_display_pads() {
        let addr = ObjectAddr::new(0xbeef);
        assert_eq!(addr.to_string(), "0xbeef");
        assert_eq!(format!("{:>8}", addr), "  0xbeef");
    }

    #[test]
    fn test_addr_of_reference() {
        let value = 7u32;
        let addr = ObjectAddr::of(&value);
        assert_eq!(addr.get(), &value as *const u32 as usize);
    }

    #[test]
    fn test_duplicate_addresses_are_separate_entries() {
        let mut live = LiveObjects::new();
        let a = ObjectAddr::new(0x10);
        live.insert(a, "Foo");
        live.insert(a, "Bar");
        live.insert(a, "Foo");

        assert_eq!(live.len(), 3);
        assert_eq!(live.tags_at(a), &["Foo", "Bar", "Foo"]);
        assert_eq!(live.count_tag("Foo"), 2);
    }

    #[test]
    fn test_remove_takes_first_matching_tag() {
        let mut live = LiveObjects::new();
        let a = ObjectAddr::new(0x10);
        live.insert(a, "Foo");
        live.insert(a, "Bar");

        assert!(live.remove(a, "Bar"));
        assert_eq!(live.tags_at(a), &["Foo"]);
        assert!(!live.remove(a, "Bar"));
        assert!(live.remove(a, "Foo"));
        assert!(!live.contains_addr(a));
        assert!(live.is_empty());
    }

    #[test]
    fn test_remove_unknown_address() {
        let mut live = LiveObjects::new();
        live.insert(ObjectAddr::new(0x10), "Foo");
        assert!(!live.remove(ObjectAddr::new(0x20), "Foo"));
        assert_eq!(live.len(), 1);
    }

    #[test]
    fn test_iter_orders_by_address_then_insertion() {
        let mut live = LiveObjects::new();
        live.insert(ObjectAddr::new(0x30), "C");
        live.insert(ObjectAddr::new(0x10), "A");
        live.insert(ObjectAddr::new(0x30), "D");
        live.insert(ObjectAddr::new(0x20), "B");

        let tags: Vec<_> = live.iter().map(|(_, tag)| tag).collect();
        assert_eq!(tags, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_addr_serializes_as_hex_string() {
        let json = serde_json::to_string(&ObjectAddr::new(255)).unwrap();
        assert_eq!(json, "\"0xff\"");
    }
}
