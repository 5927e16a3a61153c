//! Metrics collection and exposition for Prometheus.
//!
//! Token refreshes, upstream attempts (primary/secondary) and relayed statuses.

mod recorder;

pub use recorder::{Metrics, MetricsRecorder};
