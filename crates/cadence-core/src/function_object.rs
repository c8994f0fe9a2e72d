//! Function objects: per-step hooks gated by output controls.
//!
//! A [`FunctionObject`] does some work during a run (sample a field, time a
//! section, ...). A [`ControlledObject`] wraps one with two
//! [`OutputControl`]s read from the same dictionary:
//!
//! - `evaluateControl` / `evaluateInterval` gate [`FunctionObject::execute`].
//! - `outputControl` / `outputInterval` gate [`FunctionObject::write`].

use std::rc::Rc;

use serde::Serialize;

use crate::control::{ConfigurationError, OutputControl};
use crate::dictionary::Dictionary;
use crate::time::{StepAdjuster, TimeSource};

/// Label of the control gating [`FunctionObject::execute`].
pub const EVALUATE_LABEL: &str = "evaluate";

/// Label of the control gating [`FunctionObject::write`].
pub const OUTPUT_LABEL: &str = "output";

/// Errors raised by function objects.
#[derive(Debug, thiserror::Error)]
pub enum FunctionObjectError {
    /// A control of the object could not be configured.
    #[error("function object '{object}': {source}")]
    Configuration {
        /// Name of the function object.
        object: String,
        /// The underlying configuration error.
        source: ConfigurationError,
    },

    /// The object's own work failed.
    #[error("function object '{object}' failed: {reason}")]
    Failed {
        /// Name of the function object.
        object: String,
        /// What went wrong.
        reason: String,
    },
}

/// A unit of per-step work driven by the run loop.
pub trait FunctionObject {
    /// Unique name of this object.
    fn name(&self) -> &str;

    /// Do the object's per-step work.
    ///
    /// # Errors
    ///
    /// Returns [`FunctionObjectError`] if the work fails.
    fn execute(&mut self, time: &dyn TimeSource) -> Result<(), FunctionObjectError>;

    /// Emit the object's output.
    ///
    /// # Errors
    ///
    /// Returns [`FunctionObjectError`] if the output cannot be produced.
    fn write(&mut self, time: &dyn TimeSource) -> Result<(), FunctionObjectError>;
}

/// What a [`ControlledObject`] did on one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// Whether `execute` ran.
    pub executed: bool,
    /// Whether `write` ran.
    pub written: bool,
}

/// Execute/write counts for one controlled object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectStats {
    /// Name of the function object.
    pub name: String,
    /// Number of steps on which `execute` ran.
    pub executions: u64,
    /// Number of steps on which `write` ran.
    pub writes: u64,
}

/// A function object gated by an evaluate control and an output control.
#[derive(Debug)]
pub struct ControlledObject {
    object: Box<dyn FunctionObject>,
    evaluate: OutputControl,
    output: OutputControl,
    executions: u64,
    writes: u64,
}

impl std::fmt::Debug for dyn FunctionObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionObject")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

impl ControlledObject {
    /// Wrap `object`, reading both controls from `dict`.
    ///
    /// The clock is shared with both controls and serves as their step
    /// adjuster.
    ///
    /// # Errors
    ///
    /// Returns [`FunctionObjectError::Configuration`] if either control is
    /// misconfigured.
    pub fn new<C>(
        object: Box<dyn FunctionObject>,
        clock: &Rc<C>,
        dict: &Dictionary,
    ) -> Result<Self, FunctionObjectError>
    where
        C: TimeSource + StepAdjuster + 'static,
    {
        let wrap = |source| FunctionObjectError::Configuration {
            object: object.name().to_owned(),
            source,
        };
        let evaluate = OutputControl::from_clock(clock, dict, EVALUATE_LABEL).map_err(wrap)?;
        let output = OutputControl::from_clock(clock, dict, OUTPUT_LABEL).map_err(wrap)?;
        Ok(Self {
            object,
            evaluate,
            output,
            executions: 0,
            writes: 0,
        })
    }

    /// Evaluate both controls for the current step and run what fired.
    ///
    /// # Errors
    ///
    /// Propagates [`FunctionObjectError`] from `execute` or `write`.
    pub fn step(&mut self) -> Result<StepOutcome, FunctionObjectError> {
        let mut outcome = StepOutcome::default();

        if self.evaluate.output() {
            self.object.execute(&**self.evaluate.time())?;
            self.executions = self.executions.saturating_add(1);
            outcome.executed = true;
        }
        if self.output.output() {
            self.object.write(&**self.output.time())?;
            self.writes = self.writes.saturating_add(1);
            outcome.written = true;
        }
        Ok(outcome)
    }

    /// Reconfigure both controls from `dict`.
    ///
    /// Both controls are validated before either changes, so on error the
    /// object keeps its previous configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FunctionObjectError::Configuration`] if either control is
    /// misconfigured.
    pub fn read(&mut self, dict: &Dictionary) -> Result<(), FunctionObjectError> {
        let wrap = |source| FunctionObjectError::Configuration {
            object: self.object.name().to_owned(),
            source,
        };
        let evaluate = self.evaluate.resolve(dict).map_err(wrap)?;
        let output = self.output.resolve(dict).map_err(wrap)?;
        self.evaluate.apply(evaluate);
        self.output.apply(output);
        Ok(())
    }

    /// Name of the wrapped object.
    pub fn name(&self) -> &str {
        self.object.name()
    }

    /// Control gating `execute`.
    pub const fn evaluate_control(&self) -> &OutputControl {
        &self.evaluate
    }

    /// Control gating `write`.
    pub const fn output_control(&self) -> &OutputControl {
        &self.output
    }

    /// Number of steps on which `execute` ran.
    pub const fn executions(&self) -> u64 {
        self.executions
    }

    /// Number of steps on which `write` ran.
    pub const fn writes(&self) -> u64 {
        self.writes
    }

    /// Execute/write counts so far.
    pub fn stats(&self) -> ObjectStats {
        ObjectStats {
            name: self.name().to_owned(),
            executions: self.executions,
            writes: self.writes,
        }
    }
}
