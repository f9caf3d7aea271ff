use arc_swap::ArcSwapOption;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use crate::debug::{DebugFilter, DebugSink};
use crate::output::{Format, Reporter};
use crate::registry::ObjectAddr;
use crate::report::{write_text, Snapshot};
use crate::timer::TimerSet;
use crate::tracer::{TraceMode, Tracer};
use crate::{AllocationTally, TraceError};

mod tracked;
pub use tracked::Tracked;

/// Debug class of the per-object trace lines.
pub const TRACE_DEBUG_CLASS: &str = "lifetrace.trace.debug";

cfg_if::cfg_if! {
    if #[cfg(feature = "lifetrace-alloc")] {
        // Process-wide allocation tally using a counting global allocator
        #[global_allocator]
        static GLOBAL: crate::CountingAllocator = crate::CountingAllocator::system();

        /// Allocation calls and bytes requested since the process started.
        pub fn allocation_tally() -> Option<AllocationTally> {
            Some(GLOBAL.tally())
        }
    } else {
        /// Allocation calls and bytes requested since the process started.
        ///
        /// Always `None` unless the `lifetrace-alloc` feature installs the counting allocator.
        pub fn allocation_tally() -> Option<AllocationTally> {
            None
        }
    }
}

/// Settings of the live guard.
struct Session {
    fail_fast: bool,
}

// Tables live for the whole process; guards come and go
static TRACER: OnceLock<Mutex<Tracer>> = OnceLock::new();
static ACTIVE_SESSION: OnceLock<ArcSwapOption<Session>> = OnceLock::new();

fn process_tracer() -> &'static Mutex<Tracer> {
    TRACER.get_or_init(|| {
        let mode = env_override::<TraceMode>("LIFETRACE_MODE").unwrap_or_default();
        Mutex::new(Tracer::new(mode))
    })
}

fn active_session() -> &'static ArcSwapOption<Session> {
    ACTIVE_SESSION.get_or_init(|| ArcSwapOption::from(None))
}

/// Reports a bookkeeping failure and stops the program.
///
/// Flushes the debug output first so nothing written before the failure is lost.
pub fn fatal(reason: &str, context: &str) -> ! {
    flush_debug_output();
    panic!("{reason}: {context}");
}

fn handle_trace_error(err: &TraceError) {
    tracing::error!(%err, "object lifecycle bookkeeping out of sync");
    debug_write(format_args!("lifetrace: {err}"));

    let fail_fast = active_session()
        .load_full()
        .map_or(true, |session| session.fail_fast);

    // A second panic while unwinding would abort before the first one is reported
    if fail_fast && !std::thread::panicking() {
        fatal("lifetrace", &err.to_string());
    }
}

/// Traces a construction and reports whether it was recorded, that is, whether
/// the trace mode let `tag` through.
pub(crate) fn construct_traced(
    addr: ObjectAddr,
    tag: &'static str,
    signature: &'static str,
    size: usize,
) -> bool {
    crate::debug_print!(TRACE_DEBUG_CLASS, "trace_ctor {addr} {tag}({signature})");

    let (result, recorded) = {
        let Ok(mut tracer) = process_tracer().lock() else {
            return false;
        };
        let recorded = !tracer.mode().suppresses(tag);
        (
            tracer.trace_construct(addr, tag, signature, size),
            recorded,
        )
    };

    match result {
        Ok(_) => recorded,
        Err(err) => {
            handle_trace_error(&err);
            false
        }
    }
}

/// Records the construction of a `tag` object of `size` bytes at `addr`.
///
/// Returns `true` on success, which includes the case where the trace mode
/// filters `tag` out.
pub fn trace_construct(
    addr: ObjectAddr,
    tag: &'static str,
    signature: &'static str,
    size: usize,
) -> bool {
    construct_traced(addr, tag, signature, size);
    true
}

/// Records the destruction of the `tag` object at `addr`.
///
/// An address that is not registered with `tag`, or a tag without live objects,
/// is a bookkeeping failure: it is logged and the program panics, unless the live
/// guard was built with `fail_fast(false)`. Returns `false` only for a failure
/// that did not panic.
pub fn trace_destruct(addr: ObjectAddr, tag: &'static str, size: usize) -> bool {
    crate::debug_print!(TRACE_DEBUG_CLASS, "trace_dtor {addr} {tag}");

    let result = {
        let Ok(mut tracer) = process_tracer().lock() else {
            return false;
        };
        tracer.trace_destruct(addr, tag, size)
    };

    match result {
        Ok(_) => true,
        Err(err) => {
            handle_trace_error(&err);
            false
        }
    }
}

/// Copy of the process tables, with the allocation tally when available.
pub fn snapshot() -> Option<Snapshot> {
    let tracer = process_tracer().lock().ok()?;
    Some(tracer.snapshot().with_allocations(allocation_tally()))
}

/// Writes the text memory report of the process tables to `out`.
pub fn report_memory(out: &mut dyn Write) -> io::Result<()> {
    match snapshot() {
        Some(snapshot) => write_text(&snapshot, out),
        None => Ok(()),
    }
}

static DEBUG_FILTER: OnceLock<DebugFilter> = OnceLock::new();
static DEBUG_SINK: OnceLock<Mutex<DebugSink>> = OnceLock::new();

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn debug_filter() -> &'static DebugFilter {
    DEBUG_FILTER.get_or_init(|| {
        DebugFilter::from_lookup(env_lookup).unwrap_or_else(|err| {
            tracing::warn!(%err, "debug output disabled");
            DebugFilter::disabled()
        })
    })
}

fn debug_sink() -> &'static Mutex<DebugSink> {
    DEBUG_SINK.get_or_init(|| {
        let sink = DebugSink::from_lookup(env_lookup).unwrap_or_else(|err| {
            tracing::warn!(%err, "writing debug output to stderr");
            DebugSink::Stderr
        });
        Mutex::new(sink)
    })
}

/// Whether debug output of `class` is enabled.
///
/// The `DEBUG_CLASS` pattern is read once per process, on the first call. Unset or
/// empty disables every class; otherwise `class` must match the whole pattern.
pub fn is_debug_active(class: &str) -> bool {
    debug_filter().is_active(class)
}

#[doc(hidden)]
pub fn debug_write(args: fmt::Arguments<'_>) {
    let Ok(mut sink) = debug_sink().lock() else {
        return;
    };
    if let Err(err) = sink.write_line(args) {
        tracing::warn!(%err, "failed to write debug output");
    }
}

/// Flushes the debug output. The `DEBUG_FILE` stays open for the rest of the process.
///
/// Called by [`LifetraceGuard`] when it is dropped.
pub fn flush_debug_output() {
    let Some(sink) = DEBUG_SINK.get() else {
        return;
    };
    let Ok(mut sink) = sink.lock() else {
        return;
    };
    if let Err(err) = sink.flush() {
        tracing::warn!(%err, "failed to flush debug output");
    }
}

/// Prints a debug line when `class` is enabled by `DEBUG_CLASS`.
///
/// # Examples
///
/// ```rust
/// lifetrace::debug_print!("parser.journal", "parsed {} entries", 42);
/// ```
#[macro_export]
macro_rules! debug_print {
    ($class:expr, $($arg:tt)+) => {
        if $crate::is_debug_active($class) {
            $crate::debug_write(format_args!($($arg)+));
        }
    };
}

/// Traces the construction of `$this`, a `$ty` built by the constructor `$sig`.
///
/// `$this` must point at the object's final location. Pair it with
/// [`trace_dtor!`] in the type's `Drop` impl.
#[macro_export]
macro_rules! trace_ctor {
    ($this:expr, $ty:ty, $sig:expr) => {
        $crate::trace_construct(
            $crate::ObjectAddr::of($this),
            <$ty as $crate::Traced>::TYPE_TAG,
            $sig,
            ::std::mem::size_of::<$ty>(),
        )
    };
}

/// Traces the destruction of `$this`, a `$ty`.
#[macro_export]
macro_rules! trace_dtor {
    ($this:expr, $ty:ty) => {
        $crate::trace_destruct(
            $crate::ObjectAddr::of($this),
            <$ty as $crate::Traced>::TYPE_TAG,
            ::std::mem::size_of::<$ty>(),
        )
    };
}

/// Finishes the timer `$name` and prints its cumulative time prefixed with the
/// caller's `file:line:`.
#[macro_export]
macro_rules! finish_timer {
    ($name:expr) => {
        $crate::finish_timer_at($name, file!(), line!())
    };
}

static TIMERS: OnceLock<Mutex<TimerSet>> = OnceLock::new();

fn with_timers<R>(f: impl FnOnce(&mut TimerSet) -> Option<R>) -> Option<R> {
    let timers = TIMERS.get_or_init(|| Mutex::new(TimerSet::new()));
    let mut timers = timers.lock().ok()?;
    f(&mut timers)
}

pub fn start_timer(name: &str) {
    with_timers(|timers| {
        timers.start(name);
        Some(())
    });
}

/// Adds the time since the last [`start_timer`] of `name` to its total.
pub fn stop_timer(name: &str) -> Option<Duration> {
    with_timers(|timers| timers.stop(name))
}

/// Prints the cumulative time of `name` as a debug line of class `name`, then
/// forgets the timer.
pub fn finish_timer(name: &str) -> Option<Duration> {
    let total = with_timers(|timers| timers.finish(name))?;
    crate::debug_print!(name, "{name} = {}s", total.as_secs_f64());
    Some(total)
}

#[doc(hidden)]
pub fn finish_timer_at(name: &str, file: &str, line: u32) -> Option<Duration> {
    let total = with_timers(|timers| timers.finish(name))?;
    crate::debug_print!(name, "{file}:{line}: {name} = {}s", total.as_secs_f64());
    Some(total)
}

/// Builder for a tracing session guard.
///
/// Tracing runs from the first traced object to the end of the process. A guard
/// sets the trace mode and the failure policy when it is built, and writes the
/// memory report of everything traced so far when it is dropped. The mode stays in
/// effect after the guard is gone.
///
/// # Examples
///
/// ```rust
/// use lifetrace::{Format, GuardBuilder, TraceMode};
///
/// let _guard = GuardBuilder::new("main")
///     .mode(TraceMode::CLASS)
///     .format(Format::Table)
///     .build();
/// ```
///
/// # Limitations
///
/// Only one guard can be alive at a time. Building a second one (either via
/// `GuardBuilder` or via the [`main`](crate::main) macro) panics.
///
/// # Environment
///
/// * `LIFETRACE_MODE` - `none`, `class` or `alloc`, overrides [`GuardBuilder::mode`]
/// * `LIFETRACE_FORMAT` - `text`, `table`, `json` or `json-pretty`, overrides the reporter
pub struct GuardBuilder {
    caller_name: &'static str,
    mode: TraceMode,
    reporter: ReporterConfig,
    output: Option<Box<dyn Write + Send>>,
    fail_fast: bool,
}

enum ReporterConfig {
    Format(Format),
    Custom(Box<dyn Reporter>),
    None, // Will default to Format::Text
}

fn env_override<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    let value = std::env::var(key).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            tracing::warn!(%err, "ignoring {key}");
            None
        }
    }
}

impl GuardBuilder {
    pub fn new(caller_name: &'static str) -> Self {
        Self {
            caller_name,
            mode: TraceMode::NONE,
            reporter: ReporterConfig::None,
            output: None,
            fail_fast: true,
        }
    }

    /// Sets which type tags are skipped. Default: [`TraceMode::NONE`], trace everything.
    pub fn mode(mut self, mode: TraceMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the output format of the exit report. Default: [`Format::Text`].
    pub fn format(mut self, format: Format) -> Self {
        self.reporter = ReporterConfig::Format(format);
        self
    }

    /// Sets a custom reporter. Overrides any format setting.
    pub fn reporter(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporter = ReporterConfig::Custom(reporter);
        self
    }

    /// Sets where the exit report is written. Default: stdout.
    pub fn output(mut self, output: Box<dyn Write + Send>) -> Self {
        self.output = Some(output);
        self
    }

    /// Whether a bookkeeping failure panics. Default: `true`.
    ///
    /// With `false` failures are only logged and the entry points return `false`.
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Starts the tracing session.
    ///
    /// # Panics
    ///
    /// Panics if another guard is already alive.
    pub fn build(self) -> LifetraceGuard {
        let mut reporter: Box<dyn Reporter> = match self.reporter {
            ReporterConfig::Format(format) => format.reporter(),
            ReporterConfig::Custom(reporter) => reporter,
            ReporterConfig::None => Format::Text.reporter(),
        };
        if let Some(format) = env_override::<Format>("LIFETRACE_FORMAT") {
            reporter = format.reporter();
        }
        let mode = env_override::<TraceMode>("LIFETRACE_MODE").unwrap_or(self.mode);
        let output = self.output.unwrap_or_else(|| Box::new(io::stdout()));

        LifetraceGuard::new(self.caller_name, mode, reporter, output, self.fail_fast)
    }
}

/// An active tracing session. Writes the memory report when dropped.
pub struct LifetraceGuard {
    caller_name: &'static str,
    reporter: Box<dyn Reporter>,
    output: Mutex<Box<dyn Write + Send>>,
}

impl LifetraceGuard {
    fn new(
        caller_name: &'static str,
        mode: TraceMode,
        reporter: Box<dyn Reporter>,
        output: Box<dyn Write + Send>,
        fail_fast: bool,
    ) -> Self {
        let arc_swap = active_session();

        if arc_swap.load().is_some() {
            panic!("More than one lifetrace guard cannot be alive at the same time.");
        }

        // Read DEBUG_CLASS before anything else is traced
        debug_filter();

        if let Ok(mut tracer) = process_tracer().lock() {
            tracer.set_mode(mode);
        }
        arc_swap.store(Some(Arc::new(Session { fail_fast })));

        tracing::debug!(caller = caller_name, ?mode, "lifetrace session started");

        Self {
            caller_name,
            reporter,
            output: Mutex::new(output),
        }
    }
}

impl Drop for LifetraceGuard {
    fn drop(&mut self) {
        let snapshot = snapshot();

        if let Some(arc_swap) = ACTIVE_SESSION.get() {
            arc_swap.store(None);
        }

        if let Some(snapshot) = snapshot {
            tracing::debug!(
                caller = self.caller_name,
                leaked = snapshot.leaked(),
                "lifetrace session ended"
            );

            if let Ok(mut output) = self.output.lock() {
                let reported = self
                    .reporter
                    .report(&snapshot, &mut **output)
                    .and_then(|()| output.flush().map_err(Into::into));
                if let Err(e) = reported {
                    eprintln!("Failed to report lifetrace memory: {}", e);
                }
            }
        }

        flush_debug_output();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Traced;
    use std::sync::MutexGuard;

    // Guards are process-wide, so the tests that build one take turns
    static GUARD_LOCK: Mutex<()> = Mutex::new(());

    fn guard_lock() -> MutexGuard<'static, ()> {
        GUARD_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_guard_is_send_sync() {
        is_send_sync::<LifetraceGuard>();
    }

    #[derive(Clone)]
    struct Probe(u64);

    impl Traced for Probe {
        const TYPE_TAG: &'static str = "Probe";
    }

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Shared {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn live_probes(snapshot: &Snapshot) -> usize {
        snapshot
            .live_objects
            .iter()
            .filter(|row| row.tag == "Probe")
            .count()
    }

    #[test]
    fn test_guard_reports_process_tables() {
        let _lock = guard_lock();
        let before = Tracked::new(Probe(0));
        let report = Shared::default();

        let guard = GuardBuilder::new("test_guard_reports_process_tables")
            .format(Format::Text)
            .output(Box::new(report.clone()))
            .build();

        let kept = Tracked::new(Probe(1));
        let copy = kept.clone();
        let dropped = Tracked::with_signature(Probe(2), "u64");
        drop(dropped);

        let mid = snapshot().unwrap();
        assert_eq!(live_probes(&mid), 3);
        let live = mid.live_count.iter().find(|row| row.name == "Probe").unwrap();
        assert_eq!((live.count, live.bytes), (3, 24));

        let mut text = Vec::new();
        report_memory(&mut text).unwrap();
        let text = String::from_utf8(text).unwrap();
        assert!(text.contains("Probe(&Self)"));
        assert!(text.contains("Probe(u64)"));
        assert!(text.contains("Probe()"));

        // Built before the guard and still known to it
        drop(before);
        drop(copy);
        let value = Tracked::into_inner(kept);
        assert_eq!(value.0, 1);
        assert_eq!(live_probes(&snapshot().unwrap()), 0);

        drop(guard);

        let written = report.text();
        assert!(written.contains("Object counts:"));
        assert!(written.contains("             4            32  Probe\n"));

        // The tables outlive the guard
        assert!(snapshot().unwrap().ctor_count.iter().any(|row| row.name == "Probe(u64)"));
    }

    #[test]
    fn test_hand_traced_object_outlives_guards() {
        let _lock = guard_lock();
        let addr = ObjectAddr::new(0x4000);

        assert!(trace_construct(addr, "Ledger", "", 24));
        let guard = GuardBuilder::new("test_hand_traced_object_outlives_guards")
            .output(Box::new(io::sink()))
            .build();
        assert!(trace_destruct(addr, "Ledger", 24));
        drop(guard);

        let first = GuardBuilder::new("test_hand_traced_object_outlives_guards::first")
            .output(Box::new(io::sink()))
            .build();
        assert!(trace_construct(addr, "Ledger", "usize", 24));
        drop(first);

        let second = GuardBuilder::new("test_hand_traced_object_outlives_guards::second")
            .output(Box::new(io::sink()))
            .build();
        assert!(trace_destruct(addr, "Ledger", 24));
        drop(second);

        let snapshot = snapshot().unwrap();
        assert!(!snapshot.live_count.iter().any(|row| row.name == "Ledger"));
        let built = snapshot.object_count.iter().find(|row| row.name == "Ledger").unwrap();
        assert_eq!((built.count, built.bytes), (2, 48));
    }

    #[test]
    fn test_non_fatal_guard_returns_false() {
        let _lock = guard_lock();
        let guard = GuardBuilder::new("test_non_fatal_guard_returns_false")
            .fail_fast(false)
            .output(Box::new(io::sink()))
            .build();

        assert!(!trace_destruct(ObjectAddr::new(0x3000), "Stray", 8));
        drop(guard);
    }

    #[test]
    #[should_panic(expected = "destruction of unknown object of type Orphan")]
    fn test_unknown_destruction_without_guard_is_fatal() {
        let _lock = guard_lock();
        trace_destruct(ObjectAddr::new(0x5000), "Orphan", 8);
    }

    #[test]
    #[should_panic(expected = "More than one lifetrace guard")]
    fn test_second_guard_panics() {
        let _lock = guard_lock();
        let _first = GuardBuilder::new("test_second_guard_panics")
            .output(Box::new(io::sink()))
            .build();
        let _second = GuardBuilder::new("test_second_guard_panics::second")
            .output(Box::new(io::sink()))
            .build();
    }

    #[test]
    fn test_timers_accumulate() {
        start_timer("test_timers_accumulate");
        assert!(stop_timer("test_timers_accumulate").is_some());
        assert!(stop_timer("test_timers_accumulate").is_none());
        assert!(finish_timer("test_timers_accumulate").is_some());
        assert!(finish_timer("test_timers_accumulate").is_none());
    }
}
