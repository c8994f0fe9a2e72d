//! Built-in function objects and the per-step logging callback.
//!
//! Each entry of the `functions` config section names its kind with a
//! `type` key:
//!
//! - `probe` -- samples a synthetic signal `amplitude * sin(2 pi t / period)`
//!   on every execute and logs min/mean/max on every write.
//! - `timer` -- counts executed steps and logs wall-clock and CPU seconds
//!   spent since the previous write.

use std::f64::consts::TAU;
use std::rc::Rc;

use cadence_core::clock::SimClock;
use cadence_core::config::RunConfig;
use cadence_core::control::ConfigurationError;
use cadence_core::dictionary::Dictionary;
use cadence_core::function_object::{
    ControlledObject, FunctionObject, FunctionObjectError, StepOutcome,
};
use cadence_core::runner::StepCallback;
use cadence_core::time::TimeSource;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::error::EngineError;

/// Known values of the `type` key.
pub const OBJECT_TYPES: [&str; 2] = ["probe", "timer"];

/// Build every configured function object, in name order, bound to `clock`.
pub fn build_objects(
    clock: &Rc<SimClock>,
    config: &RunConfig,
) -> Result<Vec<ControlledObject>, EngineError> {
    config
        .functions
        .iter()
        .map(|(name, dict)| -> Result<ControlledObject, EngineError> {
            let object = ControlledObject::new(build(name, dict)?, clock, dict)?;
            info!(
                name = %name,
                evaluate = %object.evaluate_control().mode(),
                output = %object.output_control().mode(),
                write_interval = object.output_control().write_interval(),
                "Function object ready"
            );
            Ok(object)
        })
        .collect()
}

/// Build one function object from its dictionary.
pub fn build(name: &str, dict: &Dictionary) -> Result<Box<dyn FunctionObject>, EngineError> {
    let kind = dict
        .lookup_word("type")
        .map_err(|source| configuration(name, source))?;
    match kind {
        Some("probe") => Ok(Box::new(FieldProbe::new(name, dict)?)),
        Some("timer") => Ok(Box::new(StepTimer::new(name))),
        other => Err(EngineError::UnknownObjectType {
            name: name.to_owned(),
            kind: other.unwrap_or("").to_owned(),
            valid: OBJECT_TYPES.join(", "),
        }),
    }
}

fn configuration(name: &str, source: ConfigurationError) -> FunctionObjectError {
    FunctionObjectError::Configuration {
        object: name.to_owned(),
        source,
    }
}

fn positive_real(
    name: &str,
    dict: &Dictionary,
    key: &str,
    default: f64,
) -> Result<f64, FunctionObjectError> {
    let value = dict
        .lookup_real(key)
        .map_err(|source| configuration(name, source))?
        .unwrap_or(default);
    if value > 0.0 {
        Ok(value)
    } else {
        Err(configuration(
            name,
            ConfigurationError::InvalidValue {
                key: key.to_owned(),
                expected: "positive real",
                found: value.to_string(),
            },
        ))
    }
}

/// Statistics reported by a [`FieldProbe`] write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeReport {
    /// Step of the write.
    pub time_index: u64,
    /// Simulation time of the write.
    pub time: f64,
    /// Samples taken since the previous write.
    pub samples: u64,
    /// Smallest sample.
    pub min: f64,
    /// Mean of the samples.
    pub mean: f64,
    /// Largest sample.
    pub max: f64,
}

/// Samples a synthetic sinusoidal signal.
#[derive(Debug)]
pub struct FieldProbe {
    name: String,
    period: f64,
    amplitude: f64,
    samples: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl FieldProbe {
    /// Create a probe reading `period` (default 1) and `amplitude`
    /// (default 1) from `dict`.
    pub fn new(name: &str, dict: &Dictionary) -> Result<Self, FunctionObjectError> {
        Ok(Self {
            name: name.to_owned(),
            period: positive_real(name, dict, "period", 1.0)?,
            amplitude: positive_real(name, dict, "amplitude", 1.0)?,
            samples: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        })
    }

    /// Signal value at simulation time `t`.
    pub fn sample(&self, t: f64) -> f64 {
        self.amplitude * (TAU * t / self.period).sin()
    }

    /// Statistics since the previous write, if any samples were taken.
    #[allow(clippy::cast_precision_loss)]
    pub fn report(&self, time: &dyn TimeSource) -> Option<ProbeReport> {
        (self.samples > 0).then(|| ProbeReport {
            time_index: time.time_index(),
            time: time.value(),
            samples: self.samples,
            min: self.min,
            mean: self.sum / self.samples as f64,
            max: self.max,
        })
    }

    fn reset(&mut self) {
        self.samples = 0;
        self.sum = 0.0;
        self.min = f64::INFINITY;
        self.max = f64::NEG_INFINITY;
    }
}

impl FunctionObject for FieldProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, time: &dyn TimeSource) -> Result<(), FunctionObjectError> {
        let value = self.sample(time.value());
        self.samples = self.samples.saturating_add(1);
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        Ok(())
    }

    fn write(&mut self, time: &dyn TimeSource) -> Result<(), FunctionObjectError> {
        let Some(report) = self.report(time) else {
            debug!(name = %self.name, "Probe write with no samples");
            return Ok(());
        };
        let json = serde_json::to_string(&report).map_err(|e| FunctionObjectError::Failed {
            object: self.name.clone(),
            reason: format!("failed to encode report: {e}"),
        })?;
        info!(name = %self.name, report = %json, "Probe output");
        self.reset();
        Ok(())
    }
}

/// Reports wall-clock and CPU time spent between writes.
#[derive(Debug)]
pub struct StepTimer {
    name: String,
    steps: u64,
    last_clock: f64,
    last_cpu: f64,
}

impl StepTimer {
    /// Create a timer with its origin at provider time zero.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            steps: 0,
            last_clock: 0.0,
            last_cpu: 0.0,
        }
    }
}

impl FunctionObject for StepTimer {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, _time: &dyn TimeSource) -> Result<(), FunctionObjectError> {
        self.steps = self.steps.saturating_add(1);
        Ok(())
    }

    fn write(&mut self, time: &dyn TimeSource) -> Result<(), FunctionObjectError> {
        let clock = time.elapsed_clock_time();
        let cpu = time.elapsed_cpu_time();
        info!(
            name = %self.name,
            time_index = time.time_index(),
            steps = self.steps,
            wall_seconds = clock - self.last_clock,
            cpu_seconds = cpu - self.last_cpu,
            "Timer output"
        );
        self.steps = 0;
        self.last_clock = clock;
        self.last_cpu = cpu;
        Ok(())
    }
}

/// Step callback that traces each step and logs the output control state
/// of every object that wrote.
pub struct LoggingCallback;

impl StepCallback for LoggingCallback {
    fn on_step(
        &mut self,
        clock: &SimClock,
        objects: &[ControlledObject],
        outcomes: &[StepOutcome],
    ) {
        trace!(
            time_index = clock.time_index(),
            time = clock.value(),
            delta_t = clock.last_delta_t(),
            "Step complete"
        );

        for (object, outcome) in objects.iter().zip(outcomes) {
            if !outcome.written {
                continue;
            }
            match serde_json::to_string(&object.output_control().snapshot()) {
                Ok(json) => debug!(name = object.name(), control = %json, "Output control state"),
                Err(e) => warn!(
                    name = object.name(),
                    error = %e,
                    "Failed to encode control snapshot"
                ),
            }
        }
    }
}
