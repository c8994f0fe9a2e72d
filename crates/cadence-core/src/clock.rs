//! Step-driven simulation clock.
//!
//! [`SimClock`] is the time provider the run loop drives. It advances
//! simulation time by a nominal step, reports wall-clock and CPU time since
//! construction, and optionally lets output controls shorten the next step.
//!
//! # Step adjustment
//!
//! When the clock is `adjustable`, every request made between two calls to
//! [`SimClock::advance`] is clamped to `(0, max_delta_t]` and the smallest one
//! wins. The granted step applies to the next advance only; afterwards the
//! clock returns to its nominal `delta_t`. A fixed-step clock ignores
//! requests.

use std::cell::Cell;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::ClockConfig;
use crate::cpu::process_cpu_time;
use crate::time::{StepAdjuster, TimeSource};

/// Fraction of a step by which time may fall short of `end_time` and still
/// count as finished.
const END_TOLERANCE: f64 = 1e-6;

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Step counter would overflow.
    #[error("time index overflow: cannot advance beyond u64::MAX")]
    IndexOverflow,

    /// Invalid clock configuration (e.g. non-positive `delta_t`).
    #[error("invalid clock configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// Simulation clock with cooperative step shrinking.
///
/// All state is held in [`Cell`]s so the clock can be shared through an
/// `Rc` by the run loop and every output control bound to it.
#[derive(Debug)]
pub struct SimClock {
    /// Current time step index (0 before the first advance).
    time_index: Cell<u64>,

    /// Current simulation time.
    value: Cell<f64>,

    /// Time at which the run ends.
    end_time: f64,

    /// Nominal step size.
    delta_t: f64,

    /// Upper bound on granted step requests.
    max_delta_t: f64,

    /// Whether step requests are honoured.
    adjustable: bool,

    /// Provider output cadence in steps, if any.
    write_interval: Option<u64>,

    /// Smallest request made since the last advance.
    pending: Cell<Option<f64>>,

    /// Size of the most recent step.
    last_delta_t: Cell<f64>,

    /// Wall-clock origin.
    started: Instant,

    /// CPU-time origin.
    cpu_origin: Duration,
}

impl SimClock {
    /// Create a clock at `start_time`, step 0.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if a time is not finite,
    /// `delta_t` is not positive, `end_time` precedes `start_time`,
    /// `max_delta_t` is below `delta_t`, or `write_interval` is zero.
    pub fn new(config: &ClockConfig) -> Result<Self, ClockError> {
        if !config.start_time.is_finite() || !config.end_time.is_finite() {
            return Err(invalid("start_time and end_time must be finite"));
        }
        if config.end_time < config.start_time {
            return Err(invalid("end_time must not precede start_time"));
        }
        if !config.delta_t.is_finite() || config.delta_t <= 0.0 {
            return Err(invalid("delta_t must be a positive number"));
        }
        let max_delta_t = config.max_delta_t.unwrap_or(config.delta_t);
        if !max_delta_t.is_finite() || max_delta_t < config.delta_t {
            return Err(invalid("max_delta_t must be at least delta_t"));
        }
        if config.write_interval == Some(0) {
            return Err(invalid("write_interval must be at least 1"));
        }

        Ok(Self {
            time_index: Cell::new(0),
            value: Cell::new(config.start_time),
            end_time: config.end_time,
            delta_t: config.delta_t,
            max_delta_t,
            adjustable: config.adjustable,
            write_interval: config.write_interval,
            pending: Cell::new(None),
            last_delta_t: Cell::new(0.0),
            started: Instant::now(),
            cpu_origin: process_cpu_time(),
        })
    }

    /// Advance by one step. Returns the new time index.
    ///
    /// The step is the smallest request granted since the previous advance,
    /// or the nominal `delta_t` if there was none.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::IndexOverflow`] if the index would exceed
    /// `u64::MAX`.
    pub fn advance(&self) -> Result<u64, ClockError> {
        let index = self
            .time_index
            .get()
            .checked_add(1)
            .ok_or(ClockError::IndexOverflow)?;
        let step = self.pending.take().unwrap_or(self.delta_t);
        if step < self.delta_t {
            debug!(time_index = index, delta_t = step, "Shortened time step");
        }
        self.time_index.set(index);
        self.value.set(self.value.get() + step);
        self.last_delta_t.set(step);
        Ok(index)
    }

    /// Whether simulation time has reached `end_time`.
    pub fn finished(&self) -> bool {
        self.value.get() >= END_TOLERANCE.mul_add(-self.delta_t, self.end_time)
    }

    /// Size of the most recent step (0 before the first advance).
    pub fn last_delta_t(&self) -> f64 {
        self.last_delta_t.get()
    }

    /// Time at which the run ends.
    pub const fn end_time(&self) -> f64 {
        self.end_time
    }

    /// Whether step requests are honoured.
    pub const fn adjustable(&self) -> bool {
        self.adjustable
    }

    /// Step size the next advance will use.
    fn next_delta_t(&self) -> f64 {
        self.pending.get().unwrap_or(self.delta_t)
    }
}

impl TimeSource for SimClock {
    fn time_index(&self) -> u64 {
        self.time_index.get()
    }

    fn value(&self) -> f64 {
        self.value.get()
    }

    fn delta_t(&self) -> f64 {
        self.delta_t
    }

    fn elapsed_clock_time(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    fn elapsed_cpu_time(&self) -> f64 {
        process_cpu_time()
            .saturating_sub(self.cpu_origin)
            .as_secs_f64()
    }

    fn write_time(&self) -> Option<bool> {
        self.write_interval
            .map(|interval| self.time_index.get().checked_rem(interval) == Some(0))
    }
}

impl StepAdjuster for SimClock {
    fn request_delta_t(&self, delta_t: f64) -> f64 {
        if !self.adjustable {
            return self.delta_t;
        }
        if !delta_t.is_finite() || delta_t <= 0.0 {
            warn!(requested = delta_t, "Ignoring invalid time step request");
            return self.next_delta_t();
        }
        let granted = delta_t.min(self.max_delta_t);
        if granted < delta_t {
            warn!(
                requested = delta_t,
                granted,
                "Time step request clamped to max_delta_t"
            );
        }
        let combined = self
            .pending
            .get()
            .map_or(granted, |pending| pending.min(granted));
        self.pending.set(Some(combined));
        combined
    }

    fn max_delta_t(&self) -> f64 {
        self.max_delta_t
    }
}

fn invalid(reason: &str) -> ClockError {
    ClockError::InvalidConfig {
        reason: reason.to_owned(),
    }
}
