//! Metrics sink boundary.
//!
//! All instrumentation flows through [`MetricsEvent`] and [`MetricsSink`].
//! The default sink drops everything; tests and hosts install their own
//! through [`with_sink`].

use std::cell::RefCell;

///
/// ReleaseStage
///
/// Which resource a release-path failure concerned.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReleaseStage {
    RowStream,
    Statement,
    Cancel,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent {
    /// Identity pre-query drained to completion.
    ResolutionCompleted { identities: usize },
    /// Main query opened with a streaming cursor.
    QueryOpened,
    /// One caller-visible batch handed out.
    BatchEmitted { records: usize },
    /// The row stream reported end-of-data and resources were released.
    StreamExhausted,
    /// Cooperative cancellation requested.
    QueryAborted,
    /// A close/cancel failed; logged, never propagated over a primary
    /// error.
    ReleaseFailed { stage: ReleaseStage },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

struct NullSink;

impl MetricsSink for NullSink {
    fn record(&self, _event: MetricsEvent) {}
}

thread_local! {
    static SINK: RefCell<Box<dyn MetricsSink>> = RefCell::new(Box::new(NullSink));
}

/// Emit one event to the current thread's sink.
pub fn record(event: MetricsEvent) {
    SINK.with(|sink| sink.borrow().record(event));
}

/// Run `f` with `sink` installed, restoring the previous sink afterwards.
pub fn with_sink<T>(sink: Box<dyn MetricsSink>, f: impl FnOnce() -> T) -> T {
    let previous = SINK.with(|slot| slot.replace(sink));
    let out = f();
    SINK.with(|slot| slot.replace(previous));
    out
}
