#[cfg(feature = "lifetrace")]
use std::path::PathBuf;

use thiserror::Error;

use crate::registry::ObjectAddr;

/// Bookkeeping failures reported by the lifecycle tracer.
///
/// Every variant means the tracer's tables no longer agree with what the host
/// program actually did, so none of them are recoverable in place. The
/// [`Tracer`](crate::Tracer) returns them untouched; the process-wide entry points
/// log them and fail fast.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    /// A destructor ran for an address that has no live entry with the given type tag.
    #[error("destruction of unknown object of type {tag} at {addr}")]
    DoubleFreeOrUnregisteredDestruction { addr: ObjectAddr, tag: &'static str },

    /// A destructor ran for a type tag that has no live count, although its
    /// address was registered.
    #[error("destruction of unregistered class {tag}")]
    UnregisteredClassDestruction { tag: &'static str },

    /// A count table is in a state its own updates should never produce.
    #[error("invariant violated in {table} table for {key}: {problem}")]
    InvariantViolation {
        table: &'static str,
        key: String,
        problem: &'static str,
    },
}

/// Failures while reading the debug output configuration.
#[cfg(feature = "lifetrace")]
#[derive(Debug, Error)]
pub enum DebugError {
    #[error("invalid DEBUG_CLASS pattern '{pattern}'")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("cannot open DEBUG_FILE {}", path.display())]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A string value that does not name a known option.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}', expected one of: {expected}")]
pub struct ParseOptionError {
    pub kind: &'static str,
    pub value: String,
    pub expected: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_errors_are_send_sync() {
        is_send_sync::<TraceError>();
        #[cfg(feature = "lifetrace")]
        is_send_sync::<DebugError>();
        is_send_sync::<ParseOptionError>();
    }

    #[test]
    fn test_trace_error_messages() {
        let err = TraceError::DoubleFreeOrUnregisteredDestruction {
            addr: ObjectAddr::new(0x1000),
            tag: "Foo",
        };
        assert_eq!(
            err.to_string(),
            "destruction of unknown object of type Foo at 0x1000"
        );

        let err = TraceError::UnregisteredClassDestruction { tag: "Bar" };
        assert_eq!(err.to_string(), "destruction of unregistered class Bar");
    }

    #[cfg(feature = "lifetrace")]
    #[test]
    fn test_invalid_pattern_keeps_source() {
        let source = regex::Regex::new("(").unwrap_err();
        let err = DebugError::InvalidPattern {
            pattern: "(".to_string(),
            source,
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("'('"));
    }
}
