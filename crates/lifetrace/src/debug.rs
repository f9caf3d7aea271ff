//! Class-name filter for debug prints, and the sink those prints go to.

use regex::Regex;
use std::fmt;
use std::fs::File;
use std::io::{self, LineWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::DebugError;

/// Environment variable holding the class-name pattern.
pub const DEBUG_CLASS_VAR: &str = "DEBUG_CLASS";

/// Environment variable holding the debug output file path.
pub const DEBUG_FILE_VAR: &str = "DEBUG_FILE";

/// Decides which debug classes print. Disabled unless a pattern was configured.
#[derive(Debug, Clone, Default)]
pub struct DebugFilter {
    pattern: Option<(String, Regex)>,
}

impl DebugFilter {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Filter matching class names against the whole of `pattern`.
    /// An empty pattern gives a disabled filter.
    pub fn new(pattern: &str) -> Result<Self, DebugError> {
        if pattern.is_empty() {
            return Ok(Self::disabled());
        }

        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
            DebugError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;

        Ok(Self {
            pattern: Some((pattern.to_string(), regex)),
        })
    }

    /// Reads [`DEBUG_CLASS_VAR`] through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DebugError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(DEBUG_CLASS_VAR) {
            Some(pattern) => Self::new(&pattern),
            None => Ok(Self::disabled()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.pattern.is_some()
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(|(source, _)| source.as_str())
    }

    #[inline]
    pub fn is_active(&self, class: &str) -> bool {
        match &self.pattern {
            Some((_, regex)) => regex.is_match(class),
            None => false,
        }
    }
}

/// Where debug lines are written: stderr, or a file owned for the process lifetime.
pub enum DebugSink {
    Stderr,
    File {
        path: PathBuf,
        writer: LineWriter<File>,
    },
}

impl fmt::Debug for DebugSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebugSink::Stderr => write!(f, "DebugSink::Stderr"),
            DebugSink::File { path, .. } => write!(f, "DebugSink::File({})", path.display()),
        }
    }
}

impl DebugSink {
    /// Creates (truncating) the file at `path`.
    pub fn file(path: impl AsRef<Path>) -> Result<Self, DebugError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| DebugError::OpenFile {
            path: path.clone(),
            source,
        })?;

        Ok(DebugSink::File {
            path,
            writer: LineWriter::new(file),
        })
    }

    /// Reads [`DEBUG_FILE_VAR`] through `lookup`; stderr when unset or empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DebugError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(DEBUG_FILE_VAR) {
            Some(path) if !path.is_empty() => Self::file(path),
            _ => Ok(DebugSink::Stderr),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            DebugSink::Stderr => None,
            DebugSink::File { path, .. } => Some(path),
        }
    }

    pub fn write_line(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        match self {
            DebugSink::Stderr => writeln!(io::stderr().lock(), "{args}"),
            DebugSink::File { writer, .. } => writeln!(writer, "{args}"),
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        match self {
            DebugSink::Stderr => io::stderr().flush(),
            DebugSink::File { writer, .. } => writer.flush(),
        }
    }
}
