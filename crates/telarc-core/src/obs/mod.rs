//! Observability: engine telemetry events and the sink abstraction.
//!
//! Engine logic MUST NOT aggregate metrics directly; it emits
//! [`sink::MetricsEvent`]s through [`sink::MetricsSink`] and hosts decide
//! what to do with them.

pub mod sink;

pub use sink::{MetricsEvent, MetricsSink, ReleaseStage, record, with_sink};
