//! Count tables: per key, how many objects and how many bytes.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::TraceError;

/// Reserved key in the ever-constructed table that aggregates every type.
pub const ALL_TYPES: &str = "__ALL__";

/// Object count and cumulative byte size for one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountEntry {
    pub count: u64,
    pub bytes: u64,
}

impl CountEntry {
    pub const fn new(count: u64, bytes: u64) -> Self {
        Self { count, bytes }
    }
}

/// Key of the constructor-signature table: a type tag plus the signature of the
/// constructor that produced the object. Displays as `tag(signature)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CtorKey {
    pub tag: &'static str,
    pub signature: &'static str,
}

impl CtorKey {
    pub const fn new(tag: &'static str, signature: &'static str) -> Self {
        Self { tag, signature }
    }
}

impl fmt::Display for CtorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.tag, self.signature)
    }
}

/// Name -> (count, bytes) tally, iterated in key order.
#[derive(Debug, Clone)]
pub struct CountTable<K> {
    name: &'static str,
    entries: BTreeMap<K, CountEntry>,
}

impl<K> CountTable<K>
where
    K: Ord + fmt::Display,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Adds one object of `bytes` size under `key`, creating the entry if needed.
    pub fn add(&mut self, key: K, bytes: u64) {
        let entry = self.entries.entry(key).or_default();
        entry.count += 1;
        entry.bytes += bytes;
    }

    /// Takes one object of `bytes` size away from `key`. The entry disappears when
    /// its count reaches zero; the byte total saturates at zero.
    ///
    /// Only a missing key is an error, and then nothing is modified.
    pub fn remove_one<Q>(&mut self, key: &Q, bytes: u64) -> Result<(), TraceError>
    where
        K: std::borrow::Borrow<Q>,
        Q: Ord + fmt::Display + ?Sized,
    {
        let Some(entry) = self.entries.get_mut(key) else {
            return Err(TraceError::InvariantViolation {
                table: self.name,
                key: key.to_string(),
                problem: "no entry to remove from",
            });
        };

        entry.count = entry.count.saturating_sub(1);
        entry.bytes = entry.bytes.saturating_sub(bytes);
        if entry.count == 0 {
            self.entries.remove(key);
        }
        Ok(())
    }

    pub fn get<Q>(&self, key: &Q) -> Option<CountEntry>
    where
        K: std::borrow::Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &CountEntry)> + '_ {
        self.entries.iter()
    }
}
