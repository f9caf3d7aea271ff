use std::fmt;
use std::io::{self, Write};
use std::ops::{Deref, DerefMut};
use std::time::Duration;

use crate::output::{Format, Reporter};
use crate::registry::ObjectAddr;
use crate::report::Snapshot;
use crate::tracer::TraceMode;
use crate::{AllocationTally, Traced};

pub const TRACE_DEBUG_CLASS: &str = "lifetrace.trace.debug";

pub fn allocation_tally() -> Option<AllocationTally> {
    None
}

pub fn fatal(reason: &str, context: &str) -> ! {
    panic!("{reason}: {context}");
}

pub fn trace_construct(
    _addr: ObjectAddr,
    _tag: &'static str,
    _signature: &'static str,
    _size: usize,
) -> bool {
    true
}

pub fn trace_destruct(_addr: ObjectAddr, _tag: &'static str, _size: usize) -> bool {
    true
}

pub fn snapshot() -> Option<Snapshot> {
    None
}

pub fn report_memory(_out: &mut dyn Write) -> io::Result<()> {
    Ok(())
}

pub fn is_debug_active(_class: &str) -> bool {
    false
}

#[doc(hidden)]
pub fn debug_write(_args: fmt::Arguments<'_>) {}

pub fn flush_debug_output() {}

#[macro_export]
macro_rules! debug_print {
    ($class:expr, $($arg:tt)+) => {
        if false {
            let _ = $class;
            let _ = format_args!($($arg)+);
        }
    };
}

#[macro_export]
macro_rules! trace_ctor {
    ($this:expr, $ty:ty, $sig:expr) => {{
        let _ = (&$this, $sig);
        true
    }};
}

#[macro_export]
macro_rules! trace_dtor {
    ($this:expr, $ty:ty) => {{
        let _ = &$this;
        true
    }};
}

#[macro_export]
macro_rules! finish_timer {
    ($name:expr) => {
        $crate::finish_timer($name)
    };
}

pub fn start_timer(_name: &str) {}

pub fn stop_timer(_name: &str) -> Option<Duration> {
    None
}

pub fn finish_timer(_name: &str) -> Option<Duration> {
    None
}

#[doc(hidden)]
pub fn finish_timer_at(_name: &str, _file: &str, _line: u32) -> Option<Duration> {
    None
}

pub struct GuardBuilder {}

impl GuardBuilder {
    pub fn new(_caller_name: &'static str) -> Self {
        Self {}
    }

    pub fn mode(self, _mode: TraceMode) -> Self {
        self
    }

    pub fn format(self, _format: Format) -> Self {
        self
    }

    pub fn reporter(self, _reporter: Box<dyn Reporter>) -> Self {
        self
    }

    pub fn output(self, _output: Box<dyn Write + Send>) -> Self {
        self
    }

    pub fn fail_fast(self, _fail_fast: bool) -> Self {
        self
    }

    pub fn build(self) -> LifetraceGuard {
        LifetraceGuard {}
    }
}

pub struct LifetraceGuard {}

/// Plain box with the same surface as the tracing `Tracked`.
pub struct Tracked<T: Traced>(Box<T>);

impl<T: Traced> Tracked<T> {
    pub fn new(value: T) -> Self {
        Self(Box::new(value))
    }

    pub fn with_signature(value: T, _signature: &'static str) -> Self {
        Self::new(value)
    }

    pub fn addr(this: &Self) -> ObjectAddr {
        ObjectAddr::of(&*this.0)
    }

    pub fn into_inner(this: Self) -> T {
        *this.0
    }
}

impl<T: Traced + Clone> Clone for Tracked<T> {
    fn clone(&self) -> Self {
        Self::new((*self.0).clone())
    }
}

impl<T: Traced + Default> Default for Tracked<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Traced> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Traced> DerefMut for Tracked<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: Traced + fmt::Debug> fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl<T: Traced + fmt::Display> fmt::Display for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl<T: Traced + PartialEq> PartialEq for Tracked<T> {
    fn eq(&self, other: &Self) -> bool {
        *self.0 == *other.0
    }
}

impl<T: Traced + Eq> Eq for Tracked<T> {}
