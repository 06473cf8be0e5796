//! Engine instrumentation.
//!
//! The engine reports what it did through an [`Instrumentation`] handed to
//! it at construction. [`LogInstrumentation`] writes events to the `log`
//! facade and warns on slow stages; [`NoopInstrumentation`] discards them.

use std::time::Duration;

use log::{debug, warn};

use crate::record::PositionGroup;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Filtered {
        position: PositionGroup,
        input: usize,
        output: usize,
        elapsed: Duration,
    },
    Sorted {
        column: String,
        rows: usize,
        elapsed: Duration,
    },
    RangesComputed {
        columns: usize,
        scanned_rows: usize,
        total_rows: usize,
        elapsed: Duration,
    },
    CacheBuildStarted {
        cells: usize,
        generation: u64,
    },
    CacheBuildSkipped {
        cells: usize,
        ceiling: usize,
    },
    CacheCommitted {
        cells: usize,
        generation: u64,
        elapsed: Duration,
    },
    CacheBuildDiscarded {
        completed: usize,
        total: usize,
    },
    Exported {
        rows: usize,
        columns: usize,
        bytes: usize,
        elapsed: Duration,
    },
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::Filtered { .. } => "filter",
            EngineEvent::Sorted { .. } => "sort",
            EngineEvent::RangesComputed { .. } => "ranges",
            EngineEvent::CacheBuildStarted { .. } => "cache_build_started",
            EngineEvent::CacheBuildSkipped { .. } => "cache_build_skipped",
            EngineEvent::CacheCommitted { .. } => "cache_committed",
            EngineEvent::CacheBuildDiscarded { .. } => "cache_build_discarded",
            EngineEvent::Exported { .. } => "export",
        }
    }

    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            EngineEvent::Filtered { elapsed, .. }
            | EngineEvent::Sorted { elapsed, .. }
            | EngineEvent::RangesComputed { elapsed, .. }
            | EngineEvent::CacheCommitted { elapsed, .. }
            | EngineEvent::Exported { elapsed, .. } => Some(*elapsed),
            EngineEvent::CacheBuildStarted { .. }
            | EngineEvent::CacheBuildSkipped { .. }
            | EngineEvent::CacheBuildDiscarded { .. } => None,
        }
    }
}

pub trait Instrumentation {
    fn record(&self, event: &EngineEvent);
}

#[derive(Debug, Clone, Copy)]
pub struct LogInstrumentation {
    slow_threshold: Duration,
}

impl LogInstrumentation {
    pub fn new(slow_threshold: Duration) -> Self {
        Self { slow_threshold }
    }

    pub fn is_slow(&self, event: &EngineEvent) -> bool {
        event
            .elapsed()
            .is_some_and(|elapsed| elapsed > self.slow_threshold)
    }
}

impl Default for LogInstrumentation {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl Instrumentation for LogInstrumentation {
    fn record(&self, event: &EngineEvent) {
        if self.is_slow(event) {
            let elapsed = event.elapsed().unwrap_or_default();
            warn!(
                "Slow {}: {:.1} ms (threshold {} ms)",
                event.name(),
                elapsed.as_secs_f64() * 1000.0,
                self.slow_threshold.as_millis()
            );
        } else {
            debug!("{}: {event:?}", event.name());
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInstrumentation;

impl Instrumentation for NoopInstrumentation {
    fn record(&self, _event: &EngineEvent) {}
}
