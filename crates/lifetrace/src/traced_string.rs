use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Deref, DerefMut};

use crate::Tracked;

/// A `String` whose every construction and destruction is traced under the tag
/// `string`, with one constructor signature per way of building it.
///
/// | constructor                   | signature                       |
/// |-------------------------------|---------------------------------|
/// | [`TracedString::new`]         | `""`                            |
/// | `From<&str>`                  | `"&str"`                        |
/// | `From<String>`                | `"String"`                      |
/// | [`TracedString::repeat`]      | `"usize, char"`                 |
/// | `Clone`                       | `"&TracedString"`               |
/// | [`TracedString::tail`]        | `"&TracedString, usize"`        |
/// | [`TracedString::substring`]   | `"&TracedString, usize, usize"` |
pub struct TracedString(Tracked<String>);

impl TracedString {
    pub fn new() -> Self {
        Self(Tracked::with_signature(String::new(), ""))
    }

    /// `count` copies of `ch`.
    pub fn repeat(count: usize, ch: char) -> Self {
        let value = std::iter::repeat(ch).take(count).collect();
        Self(Tracked::with_signature(value, "usize, char"))
    }

    /// The characters of `source` from the `start`-th on. Empty when `start` is past the end.
    pub fn tail(source: &TracedString, start: usize) -> Self {
        let value = source.chars().skip(start).collect();
        Self(Tracked::with_signature(value, "&TracedString, usize"))
    }

    /// At most `len` characters of `source`, from the `start`-th on.
    pub fn substring(source: &TracedString, start: usize, len: usize) -> Self {
        let value = source.chars().skip(start).take(len).collect();
        Self(Tracked::with_signature(value, "&TracedString, usize, usize"))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn into_string(self) -> String {
        Tracked::into_inner(self.0)
    }
}

impl Default for TracedString {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for TracedString {
    fn clone(&self) -> Self {
        Self(Tracked::with_signature(
            self.0.as_str().to_owned(),
            "&TracedString",
        ))
    }
}

impl From<&str> for TracedString {
    fn from(value: &str) -> Self {
        Self(Tracked::with_signature(value.to_owned(), "&str"))
    }
}

impl From<String> for TracedString {
    fn from(value: String) -> Self {
        Self(Tracked::with_signature(value, "String"))
    }
}

impl Deref for TracedString {
    type Target = String;

    fn deref(&self) -> &String {
        &self.0
    }
}

impl DerefMut for TracedString {
    fn deref_mut(&mut self) -> &mut String {
        &mut self.0
    }
}

impl fmt::Display for TracedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for TracedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl PartialEq for TracedString {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for TracedString {}

impl PartialEq<str> for TracedString {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for TracedString {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl PartialOrd for TracedString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TracedString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl Hash for TracedString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}
