//! Time provider interfaces consumed by output controls.
//!
//! An [`OutputControl`] never owns the simulation clock. It reads the
//! current step, simulation time, wall-clock and CPU readings through a
//! shared [`TimeSource`] handle, and in adjustable mode asks a
//! [`StepAdjuster`] handle to shorten the next step.
//!
//! Handles are shared with [`Rc`](std::rc::Rc): the evaluation model is
//! single-threaded, and providers use interior mutability so the driving
//! loop and every control can hold the same clock.
//!
//! [`OutputControl`]: crate::control::OutputControl

use std::cell::{Cell, RefCell};

/// Read access to the simulation's notion of time.
pub trait TimeSource {
    /// Index of the current time step (0 before the first step).
    fn time_index(&self) -> u64;

    /// Current simulation time.
    fn value(&self) -> f64;

    /// Nominal size of the next time step, before any adjustment requests.
    fn delta_t(&self) -> f64;

    /// Wall-clock seconds elapsed since the provider started.
    fn elapsed_clock_time(&self) -> f64;

    /// Process CPU seconds consumed since the provider started.
    fn elapsed_cpu_time(&self) -> f64;

    /// Whether the current step is one of the provider's own output times.
    ///
    /// Providers without an output cadence return `None`; output controls in
    /// `outputTime` mode then count time steps instead.
    fn write_time(&self) -> Option<bool> {
        None
    }
}

/// Cooperative control over the size of the next time step.
pub trait StepAdjuster {
    /// Ask for the next step to be at most `delta_t`.
    ///
    /// The request is advisory. Returns the step size the provider will use
    /// for its next advance after taking the request into account.
    fn request_delta_t(&self, delta_t: f64) -> f64;

    /// Largest step the provider will take.
    fn max_delta_t(&self) -> f64;
}

/// A time provider whose readings are set by hand.
///
/// Useful for drivers that keep their own clock and for exercising output
/// controls deterministically. Step requests are recorded, and
/// [`request_delta_t`](StepAdjuster::request_delta_t) grants the smallest
/// request made since the last [`clear_requests`](Self::clear_requests).
#[derive(Debug, Default)]
pub struct ManualTime {
    time_index: Cell<u64>,
    value: Cell<f64>,
    delta_t: Cell<f64>,
    clock_time: Cell<f64>,
    cpu_time: Cell<f64>,
    write_time: Cell<Option<bool>>,
    requests: RefCell<Vec<f64>>,
}

impl ManualTime {
    /// Create a provider at step 0, time 0 with the given nominal step.
    pub fn new(delta_t: f64) -> Self {
        Self {
            delta_t: Cell::new(delta_t),
            ..Self::default()
        }
    }

    /// Set the step index and simulation time together.
    pub fn set_step(&self, time_index: u64, value: f64) {
        self.time_index.set(time_index);
        self.value.set(value);
    }

    /// Set the wall-clock reading in seconds.
    pub fn set_clock_time(&self, seconds: f64) {
        self.clock_time.set(seconds);
    }

    /// Set the CPU-time reading in seconds.
    pub fn set_cpu_time(&self, seconds: f64) {
        self.cpu_time.set(seconds);
    }

    /// Set the provider's output-time flag (`None` = no output cadence).
    pub fn set_write_time(&self, write_time: Option<bool>) {
        self.write_time.set(write_time);
    }

    /// Step sizes requested through [`StepAdjuster`] so far.
    pub fn requests(&self) -> Vec<f64> {
        self.requests.borrow().clone()
    }

    /// Most recent step size request, if any.
    pub fn last_request(&self) -> Option<f64> {
        self.requests.borrow().last().copied()
    }

    /// Forget recorded requests.
    pub fn clear_requests(&self) {
        self.requests.borrow_mut().clear();
    }
}

impl TimeSource for ManualTime {
    fn time_index(&self) -> u64 {
        self.time_index.get()
    }

    fn value(&self) -> f64 {
        self.value.get()
    }

    fn delta_t(&self) -> f64 {
        self.delta_t.get()
    }

    fn elapsed_clock_time(&self) -> f64 {
        self.clock_time.get()
    }

    fn elapsed_cpu_time(&self) -> f64 {
        self.cpu_time.get()
    }

    fn write_time(&self) -> Option<bool> {
        self.write_time.get()
    }
}

impl StepAdjuster for ManualTime {
    fn request_delta_t(&self, delta_t: f64) -> f64 {
        let mut requests = self.requests.borrow_mut();
        requests.push(delta_t);
        requests
            .iter()
            .copied()
            .fold(self.delta_t.get(), f64::min)
    }

    fn max_delta_t(&self) -> f64 {
        self.delta_t.get()
    }
}
