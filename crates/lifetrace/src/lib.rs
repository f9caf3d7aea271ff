//! Compile-time optional object lifetime tracing for Rust programs.
//! Records every traced construction and destruction, keeps per-type live counts and
//! reports leaks, double frees and unexpected lifetimes when the session ends.
//! ## Setup & Usage
//! Enable the `lifetrace` feature, annotate `main` with `#[lifetrace::main]` and wrap
//! the values you care about in [`Tracked`] (or call [`trace_ctor!`] / [`trace_dtor!`]
//! from hand-written constructors and `Drop` impls). Without the feature every entry
//! point compiles to a no-op.

pub mod alloc;
pub mod counts;
#[cfg(feature = "lifetrace")]
pub mod debug;
pub mod error;
#[allow(dead_code)]
pub(crate) mod output;
pub mod registry;
pub mod report;
#[cfg(feature = "lifetrace")]
pub mod timer;
pub mod tracer;
mod traced_string;

pub use alloc::{AllocationTally, CountingAllocator};
pub use counts::{CountEntry, CountTable, CtorKey, ALL_TYPES};
#[cfg(feature = "lifetrace")]
pub use debug::{DebugFilter, DebugSink};
#[cfg(feature = "lifetrace")]
pub use error::DebugError;
pub use error::{ParseOptionError, TraceError};
pub use output::{format_bytes, Format, Reporter};
pub use registry::{LiveObjects, ObjectAddr};
pub use report::{write_text, CountRow, LiveObjectRow, Snapshot};
#[cfg(feature = "lifetrace")]
pub use timer::TimerSet;
pub use traced_string::TracedString;
pub use tracer::{TraceMode, Tracer};

pub use lifetrace_macros::{main, Traced};

/// A type whose instances can be traced.
///
/// `TYPE_TAG` names the type in every report table. Tags starting with `_` are
/// internal and are skipped in class mode; all others are skipped in alloc mode.
///
/// Usually derived:
///
/// ```rust
/// #[derive(lifetrace::Traced)]
/// struct Node {
///     value: u32,
/// }
///
/// #[derive(lifetrace::Traced)]
/// #[traced(tag = "_Scratch")]
/// struct Scratch;
///
/// use lifetrace::Traced;
/// assert_eq!(Node::TYPE_TAG, "Node");
/// assert_eq!(Scratch::TYPE_TAG, "_Scratch");
/// ```
pub trait Traced {
    const TYPE_TAG: &'static str;
}

impl Traced for String {
    const TYPE_TAG: &'static str = "string";
}

#[cfg(all(feature = "lifetrace", not(feature = "lifetrace-off")))]
#[doc(inline)]
pub use lib_on::*;
#[cfg(all(feature = "lifetrace", not(feature = "lifetrace-off")))]
mod lib_on;

// When tracing is compiled out every entry point comes from lib_off and is a no-op
#[cfg(not(all(feature = "lifetrace", not(feature = "lifetrace-off"))))]
#[doc(inline)]
pub use lib_off::*;
#[cfg(not(all(feature = "lifetrace", not(feature = "lifetrace-off"))))]
mod lib_off;
