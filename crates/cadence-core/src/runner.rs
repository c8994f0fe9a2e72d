//! The step loop driving a clock and its controlled objects.
//!
//! [`run`] advances a [`SimClock`] until it reaches `end_time`. After each
//! advance it steps every [`ControlledObject`] in order, then hands the
//! clock and per-step outcomes to a [`StepCallback`]. Step requests made by
//! `adjustableTime` controls during one step shape the next advance.

use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::clock::{ClockError, SimClock};
use crate::function_object::{ControlledObject, FunctionObjectError, ObjectStats, StepOutcome};
use crate::time::TimeSource;

/// Errors that can occur during a run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The clock could not advance.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// A function object failed.
    #[error("function object error at step {time_index}: {source}")]
    FunctionObject {
        /// Step on which the failure happened.
        time_index: u64,
        /// The underlying function object error.
        source: FunctionObjectError,
    },
}

/// Result of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Total number of steps taken.
    pub steps: u64,
    /// Simulation time when the run stopped.
    pub final_time: f64,
    /// Per-object execute/write counts, in run order.
    pub objects: Vec<ObjectStats>,
}

/// Callback invoked after every step.
///
/// Implementations can log progress, collect snapshots, etc. `outcomes` is
/// parallel to the object list passed to [`run`].
pub trait StepCallback {
    /// Called after all objects have been stepped.
    fn on_step(&mut self, clock: &SimClock, objects: &[ControlledObject], outcomes: &[StepOutcome]);
}

/// A no-op step callback for testing.
pub struct NoOpCallback;

impl StepCallback for NoOpCallback {
    fn on_step(
        &mut self,
        _clock: &SimClock,
        _objects: &[ControlledObject],
        _outcomes: &[StepOutcome],
    ) {
    }
}

/// Drive `clock` to its end time, stepping every object once per step.
///
/// Objects are stepped in slice order, so when several `adjustableTime`
/// controls share the clock their requests are issued in that order and
/// the clock keeps the smallest.
///
/// # Errors
///
/// Returns [`RunnerError`] if the clock overflows or an object fails. The
/// run stops at the first failure.
pub fn run(
    clock: &Rc<SimClock>,
    objects: &mut [ControlledObject],
    callback: &mut dyn StepCallback,
) -> Result<RunSummary, RunnerError> {
    let started_at = Utc::now();
    let mut steps: u64 = 0;
    let mut outcomes = vec![StepOutcome::default(); objects.len()];

    info!(
        start_time = clock.value(),
        end_time = clock.end_time(),
        delta_t = clock.delta_t(),
        adjustable = clock.adjustable(),
        objects = objects.len(),
        "Run starting"
    );

    while !clock.finished() {
        let time_index = clock.advance()?;
        steps = steps.saturating_add(1);

        for (object, outcome) in objects.iter_mut().zip(outcomes.iter_mut()) {
            *outcome = object
                .step()
                .map_err(|source| RunnerError::FunctionObject { time_index, source })?;
        }

        callback.on_step(clock, objects, &outcomes);
    }

    Ok(RunSummary {
        started_at,
        steps,
        final_time: clock.value(),
        objects: objects.iter().map(ControlledObject::stats).collect(),
    })
}

/// Log the run summary at the end of a run.
pub fn log_run_end(summary: &RunSummary) {
    let elapsed = Utc::now().signed_duration_since(summary.started_at);
    info!(
        steps = summary.steps,
        final_time = summary.final_time,
        elapsed_ms = elapsed.num_milliseconds(),
        "Run ended"
    );

    if summary.steps == 0 {
        warn!("Run ended with no steps executed");
    }

    for stats in &summary.objects {
        info!(
            name = %stats.name,
            executions = stats.executions,
            writes = stats.writes,
            "Function object totals"
        );
    }
}
