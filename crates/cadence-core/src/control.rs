//! Output control: decides, once per time step, whether output fires.
//!
//! An [`OutputControl`] is configured from a [`Dictionary`] using two keys
//! derived from its label: `<label>Control` selects the [`TriggerMode`] and
//! `<label>Interval` sets the interval. With label `output` those are
//! `outputControl` and `outputInterval`.
//!
//! | Mode | Interval | Fires when |
//! |---|---|---|
//! | `timeStep` | steps, default 1 | `step % interval == 0` |
//! | `outputTime` | provider output times, default 1 | every interval-th output time |
//! | `adjustableTime` | seconds, default `delta_t` | time reaches the next interval multiple |
//! | `runTime` | seconds, default `delta_t` | simulation time advanced by at least the interval |
//! | `clockTime` | seconds, required | wall-clock time advanced by the interval |
//! | `cpuTime` | seconds, required | CPU time advanced by the interval |
//! | `none` | -- | never |
//!
//! Interval normalisation:
//!
//! - Step intervals of zero or below fire on every step.
//! - Negative `runTime` intervals are treated as zero: fire on every call.
//! - `adjustableTime`, `clockTime` and `cpuTime` reject intervals of zero or
//!   below with [`ConfigurationError::NonPositiveInterval`].
//!
//! For the time-based modes the key `writeInterval` is read when
//! `<label>Interval` is absent.

use std::fmt;
use std::rc::Rc;

use cadence_types::{ControlSnapshot, Marker, TriggerMode};
use tracing::debug;

use crate::dictionary::Dictionary;
use crate::time::{StepAdjuster, TimeSource};

/// Relative tolerance, in units of the interval, absorbing floating-point
/// drift in accumulated simulation time.
pub const RELATIVE_TOLERANCE: f64 = 1e-6;

/// Fallback interval key for the time-based modes.
const WRITE_INTERVAL_KEY: &str = "writeInterval";

/// Errors raised while (re)configuring an output control.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    /// The mode key names no known trigger mode.
    #[error("unknown output control '{name}' for key {key} (valid: {valid})")]
    UnknownMode {
        /// The configuration key that was read.
        key: String,
        /// The unrecognised name.
        name: String,
        /// Comma-separated list of valid names.
        valid: String,
    },

    /// A value is present but has the wrong type or is not finite.
    #[error("invalid value for {key}: expected {expected}, found {found}")]
    InvalidValue {
        /// The configuration key that was read.
        key: String,
        /// The expected value type.
        expected: &'static str,
        /// Rendering of the value that was found.
        found: String,
    },

    /// The mode requires an interval and none was given.
    #[error("{mode} output control requires {key}")]
    MissingInterval {
        /// The interval key that was looked up.
        key: String,
        /// The mode that needs it.
        mode: TriggerMode,
    },

    /// The mode requires a positive interval.
    #[error("{mode} output control requires {key} > 0, got {value}")]
    NonPositiveInterval {
        /// The interval key that was read.
        key: String,
        /// The mode that needs a positive interval.
        mode: TriggerMode,
        /// The rejected value.
        value: f64,
    },
}

/// Per-mode evaluation state.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Trigger {
    TimeStep {
        interval: u64,
        last_step: u64,
    },
    OutputTime {
        interval: u64,
        last_step: u64,
        /// Provider output times counted since reconfiguration; `None` while
        /// the provider reports no output cadence.
        write_count: Option<u64>,
    },
    AdjustableTime {
        interval: f64,
        /// Last multiple of `interval` reached.
        last_boundary: f64,
    },
    RunTime {
        interval: f64,
        last_time: f64,
    },
    ClockTime {
        interval: f64,
        last_reading: f64,
    },
    CpuTime {
        interval: f64,
        last_reading: f64,
    },
    None,
}

impl Trigger {
    const fn mode(&self) -> TriggerMode {
        match self {
            Self::TimeStep { .. } => TriggerMode::TimeStep,
            Self::OutputTime { .. } => TriggerMode::OutputTime,
            Self::AdjustableTime { .. } => TriggerMode::AdjustableTime,
            Self::RunTime { .. } => TriggerMode::RunTime,
            Self::ClockTime { .. } => TriggerMode::ClockTime,
            Self::CpuTime { .. } => TriggerMode::CpuTime,
            Self::None => TriggerMode::None,
        }
    }
}

/// Decides whether output should happen on the current time step.
///
/// Bound for its whole life to one time provider. Not `Clone`: each
/// controlled entity owns exactly one control per label.
pub struct OutputControl {
    time: Rc<dyn TimeSource>,
    adjuster: Option<Rc<dyn StepAdjuster>>,
    label: String,
    trigger: Trigger,
}

impl fmt::Debug for OutputControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputControl")
            .field("label", &self.label)
            .field("trigger", &self.trigger)
            .field("adjustable", &self.adjuster.is_some())
            .finish_non_exhaustive()
    }
}

impl OutputControl {
    /// Create a control reading `<label>Control` / `<label>Interval` from
    /// `dict`.
    ///
    /// Without a step adjuster, `adjustableTime` still fires on interval
    /// multiples but cannot shorten steps to hit them exactly.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if the configuration is invalid.
    pub fn new(
        time: Rc<dyn TimeSource>,
        dict: &Dictionary,
        label: &str,
    ) -> Result<Self, ConfigurationError> {
        Self::build(time, None, dict, label)
    }

    /// Create a control that may shorten the provider's steps in
    /// `adjustableTime` mode.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if the configuration is invalid.
    pub fn with_adjuster(
        time: Rc<dyn TimeSource>,
        adjuster: Rc<dyn StepAdjuster>,
        dict: &Dictionary,
        label: &str,
    ) -> Result<Self, ConfigurationError> {
        Self::build(time, Some(adjuster), dict, label)
    }

    /// Create a control bound to a provider that is also its step adjuster.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if the configuration is invalid.
    pub fn from_clock<C>(
        clock: &Rc<C>,
        dict: &Dictionary,
        label: &str,
    ) -> Result<Self, ConfigurationError>
    where
        C: TimeSource + StepAdjuster + 'static,
    {
        let time: Rc<dyn TimeSource> = Rc::clone(clock) as Rc<dyn TimeSource>;
        let adjuster: Rc<dyn StepAdjuster> = Rc::clone(clock) as Rc<dyn StepAdjuster>;
        Self::build(time, Some(adjuster), dict, label)
    }

    fn build(
        time: Rc<dyn TimeSource>,
        adjuster: Option<Rc<dyn StepAdjuster>>,
        dict: &Dictionary,
        label: &str,
    ) -> Result<Self, ConfigurationError> {
        let mut control = Self {
            time,
            adjuster,
            label: label.to_owned(),
            trigger: Trigger::None,
        };
        control.read(dict)?;
        Ok(control)
    }

    /// Reconfigure mode and interval from `dict`.
    ///
    /// The marker is reset to the current baseline so the next evaluation
    /// does not fire merely because of the reconfiguration. On error the
    /// control is left exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if the configuration is invalid.
    pub fn read(&mut self, dict: &Dictionary) -> Result<(), ConfigurationError> {
        let trigger = self.resolve(dict)?;
        self.apply(trigger);
        Ok(())
    }

    /// Validate `dict` without applying it.
    pub(crate) fn resolve(&self, dict: &Dictionary) -> Result<Trigger, ConfigurationError> {
        let control_key = format!("{}Control", self.label);
        let interval_key = format!("{}Interval", self.label);

        let mode = match dict.lookup_word(&control_key)? {
            None => TriggerMode::TimeStep,
            Some(name) => {
                TriggerMode::from_name(name).ok_or_else(|| ConfigurationError::UnknownMode {
                    key: control_key.clone(),
                    name: name.to_owned(),
                    valid: TriggerMode::NAMES.join(", "),
                })?
            }
        };

        let time = &*self.time;
        let trigger = match mode {
            TriggerMode::TimeStep => Trigger::TimeStep {
                interval: step_interval(dict, &interval_key)?,
                last_step: time.time_index(),
            },
            TriggerMode::OutputTime => Trigger::OutputTime {
                interval: step_interval(dict, &interval_key)?,
                last_step: time.time_index(),
                write_count: time.write_time().map(|_| 0),
            },
            TriggerMode::AdjustableTime => {
                let interval =
                    time_interval(dict, &interval_key)?.unwrap_or_else(|| time.delta_t());
                let interval = require_positive(interval, &interval_key, mode)?;
                Trigger::AdjustableTime {
                    interval,
                    last_boundary: boundary_at_or_before(time.value(), interval),
                }
            }
            TriggerMode::RunTime => {
                let interval =
                    time_interval(dict, &interval_key)?.unwrap_or_else(|| time.delta_t());
                Trigger::RunTime {
                    interval: interval.max(0.0),
                    last_time: time.value(),
                }
            }
            TriggerMode::ClockTime => Trigger::ClockTime {
                interval: required_interval(dict, &interval_key, mode)?,
                last_reading: time.elapsed_clock_time(),
            },
            TriggerMode::CpuTime => Trigger::CpuTime {
                interval: required_interval(dict, &interval_key, mode)?,
                last_reading: time.elapsed_cpu_time(),
            },
            TriggerMode::None => Trigger::None,
        };
        Ok(trigger)
    }

    /// Replace the evaluation state with an already validated one.
    pub(crate) fn apply(&mut self, trigger: Trigger) {
        self.trigger = trigger;
        debug!(
            label = %self.label,
            mode = %self.trigger.mode(),
            step_interval = self.step_interval(),
            write_interval = self.write_interval(),
            "Output control configured"
        );
    }

    /// Whether output should fire on the current step.
    ///
    /// Call at most once per time step: time-based modes advance their
    /// marker when they fire. In `adjustableTime` mode every call also asks
    /// the step adjuster, if any, to shorten the next step so the next
    /// interval multiple is hit exactly.
    pub fn output(&mut self) -> bool {
        let time = &*self.time;
        let fire = match &mut self.trigger {
            Trigger::None => false,
            Trigger::TimeStep {
                interval,
                last_step,
            } => step_due(time.time_index(), *interval, last_step),
            Trigger::OutputTime {
                interval,
                last_step,
                write_count,
            } => match time.write_time() {
                Some(is_write_time) => {
                    let count = write_count.get_or_insert(0);
                    if is_write_time {
                        *count = count.saturating_add(1);
                        let due = count.checked_rem(*interval).is_some_and(|rem| rem == 0);
                        if due {
                            *last_step = time.time_index();
                        }
                        due
                    } else {
                        false
                    }
                }
                None => step_due(time.time_index(), *interval, last_step),
            },
            Trigger::AdjustableTime {
                interval,
                last_boundary,
            } => {
                let now = time.value();
                let tolerance = RELATIVE_TOLERANCE * *interval;
                let next = *last_boundary + *interval;
                let due = now >= next - tolerance;
                if due {
                    *last_boundary = boundary_at_or_before(now, *interval).max(next);
                }
                if let Some(adjuster) = &self.adjuster {
                    let remaining = *last_boundary + *interval - now;
                    let max_step = time.delta_t().min(adjuster.max_delta_t());
                    if let Some(step) = landing_step(remaining, max_step, tolerance) {
                        adjuster.request_delta_t(step);
                    }
                }
                due
            }
            Trigger::RunTime {
                interval,
                last_time,
            } => reading_due(time.value(), *interval, last_time),
            Trigger::ClockTime {
                interval,
                last_reading,
            } => reading_due(time.elapsed_clock_time(), *interval, last_reading),
            Trigger::CpuTime {
                interval,
                last_reading,
            } => reading_due(time.elapsed_cpu_time(), *interval, last_reading),
        };

        if fire {
            debug!(
                label = %self.label,
                mode = %self.trigger.mode(),
                time_index = time.time_index(),
                time = time.value(),
                "Output control fired"
            );
        }
        fire
    }

    /// Active trigger mode.
    pub const fn mode(&self) -> TriggerMode {
        self.trigger.mode()
    }

    /// Time interval in seconds; `0.0` for step-based modes and `none`.
    pub const fn write_interval(&self) -> f64 {
        match self.trigger {
            Trigger::AdjustableTime { interval, .. }
            | Trigger::RunTime { interval, .. }
            | Trigger::ClockTime { interval, .. }
            | Trigger::CpuTime { interval, .. } => interval,
            Trigger::TimeStep { .. } | Trigger::OutputTime { .. } | Trigger::None => 0.0,
        }
    }

    /// Step interval for step-based modes.
    pub const fn step_interval(&self) -> Option<u64> {
        match self.trigger {
            Trigger::TimeStep { interval, .. } | Trigger::OutputTime { interval, .. } => {
                Some(interval)
            }
            _ => None,
        }
    }

    /// Marker the next firing is measured from.
    pub const fn output_time_last_dump(&self) -> Marker {
        match self.trigger {
            Trigger::TimeStep { last_step, .. } => Marker::Step(last_step),
            Trigger::OutputTime {
                last_step,
                write_count,
                ..
            } => match write_count {
                Some(count) => Marker::WriteCount(count),
                None => Marker::Step(last_step),
            },
            Trigger::AdjustableTime { last_boundary, .. } => Marker::Time(last_boundary),
            Trigger::RunTime { last_time, .. } => Marker::Time(last_time),
            Trigger::ClockTime { last_reading, .. } | Trigger::CpuTime { last_reading, .. } => {
                Marker::Time(last_reading)
            }
            Trigger::None => Marker::Unset,
        }
    }

    /// The time provider this control is bound to.
    pub const fn time(&self) -> &Rc<dyn TimeSource> {
        &self.time
    }

    /// Configuration prefix of this control.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Serialisable view of the control's current state.
    pub fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            label: self.label.clone(),
            mode: self.mode(),
            step_interval: self.step_interval(),
            write_interval: self.write_interval(),
            marker: self.output_time_last_dump(),
        }
    }
}

/// Read a step interval, normalising values below 1 to 1.
fn step_interval(dict: &Dictionary, key: &str) -> Result<u64, ConfigurationError> {
    let raw = dict.lookup_integer(key)?.unwrap_or(1);
    if raw < 1 {
        debug!(key, value = raw, "Step interval below 1, firing every step");
    }
    Ok(u64::try_from(raw).unwrap_or(1).max(1))
}

/// Read a time interval from `key`, falling back to `writeInterval`.
fn time_interval(dict: &Dictionary, key: &str) -> Result<Option<f64>, ConfigurationError> {
    match dict.lookup_real(key)? {
        Some(value) => Ok(Some(value)),
        None => dict.lookup_real(WRITE_INTERVAL_KEY),
    }
}

fn required_interval(
    dict: &Dictionary,
    key: &str,
    mode: TriggerMode,
) -> Result<f64, ConfigurationError> {
    let interval = time_interval(dict, key)?.ok_or_else(|| ConfigurationError::MissingInterval {
        key: key.to_owned(),
        mode,
    })?;
    require_positive(interval, key, mode)
}

fn require_positive(value: f64, key: &str, mode: TriggerMode) -> Result<f64, ConfigurationError> {
    if value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigurationError::NonPositiveInterval {
            key: key.to_owned(),
            mode,
            value,
        })
    }
}

fn step_due(step: u64, interval: u64, last_step: &mut u64) -> bool {
    let due = step.checked_rem(interval).is_none_or(|rem| rem == 0);
    if due {
        *last_step = step;
    }
    due
}

fn reading_due(reading: f64, interval: f64, last_reading: &mut f64) -> bool {
    let due = reading - *last_reading >= interval;
    if due {
        *last_reading = reading;
    }
    due
}

/// Greatest multiple of `interval` at or before `value`, within tolerance.
fn boundary_at_or_before(value: f64, interval: f64) -> f64 {
    (value / interval + RELATIVE_TOLERANCE).floor() * interval
}

/// Step size that reaches a boundary `remaining` ahead in a whole number of
/// equal steps no longer than `max_step`.
///
/// Returns `None` when the boundary is already reached or `max_step` is
/// unusable.
fn landing_step(remaining: f64, max_step: f64, tolerance: f64) -> Option<f64> {
    if remaining <= tolerance || !max_step.is_finite() || max_step <= 0.0 {
        return None;
    }
    let steps = (remaining / max_step - RELATIVE_TOLERANCE).ceil().max(1.0);
    Some((remaining / steps).min(max_step))
}
