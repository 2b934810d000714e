//! Diagnostic hints
//!
//! The broker and the streaming loop report every lifecycle step (subscribe,
//! unsubscribe, publish, each delivery attempt, timeout, stream end) through
//! a [`Tracer`]. The tracer is injected at construction, so there is no
//! process-wide debug flag: a disabled tracer is simply [`NoopTracer`].
//!
//! Callers check [`Tracer::enabled`] before formatting a hint, which keeps the
//! disabled path free of allocations.

use std::sync::{Arc, Mutex, PoisonError};

/// Sink for human-readable trace lines.
pub trait Tracer: Send + Sync {
    /// Records one trace line.
    fn hint(&self, line: &str);

    /// Whether hints are recorded at all.
    fn enabled(&self) -> bool {
        true
    }
}

/// Shared, type-erased tracer as stored by the broker.
pub type SharedTracer = Arc<dyn Tracer>;

/// Emits a hint through `$tracer`, formatting only when it is enabled.
#[macro_export]
macro_rules! hint {
    ($tracer:expr, $($arg:tt)+) => {{
        use $crate::utils::trace::Tracer as _;
        let tracer = &$tracer;
        if tracer.enabled() {
            tracer.hint(&format!($($arg)+));
        }
    }};
}

/// Drops every hint.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn hint(&self, _line: &str) {}

    fn enabled(&self) -> bool {
        false
    }
}

/// Forwards hints to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn hint(&self, line: &str) {
        tracing::debug!(target: "infocenter::hint", "{line}");
    }
}

/// Keeps hints in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemoryTracer {
    lines: Mutex<Vec<String>>,
}

impl MemoryTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every line recorded so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether any recorded line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|line| line.contains(needle))
    }
}

impl Tracer for MemoryTracer {
    fn hint(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}

/// Picks the tracer matching the debug flag.
pub fn from_debug_flag(debug: bool) -> SharedTracer {
    if debug {
        Arc::new(LogTracer)
    } else {
        Arc::new(NoopTracer)
    }
}

/// Wall-clock time as `HH:MM:SS`, used in end-of-stream hints.
pub fn clock() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
