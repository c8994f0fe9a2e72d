//! Enumeration types shared across the Cadence workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Trigger modes
// ---------------------------------------------------------------------------

/// Strategy deciding when an output control fires.
///
/// The serialised names match the configuration vocabulary
/// (`timeStep`, `outputTime`, `adjustableTime`, `runTime`, `clockTime`,
/// `cpuTime`, `none`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerMode {
    /// Fire every N time steps.
    #[default]
    TimeStep,
    /// Fire in lock-step with the time provider's own output times.
    OutputTime,
    /// Fire on multiples of a simulation-time interval, shrinking the step
    /// so each multiple is hit exactly.
    AdjustableTime,
    /// Fire once simulation time has advanced by the interval.
    RunTime,
    /// Fire once wall-clock time has advanced by the interval.
    ClockTime,
    /// Fire once process CPU time has advanced by the interval.
    CpuTime,
    /// Never fire.
    None,
}

impl TriggerMode {
    /// Every mode, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::TimeStep,
        Self::OutputTime,
        Self::AdjustableTime,
        Self::RunTime,
        Self::ClockTime,
        Self::CpuTime,
        Self::None,
    ];

    /// Configuration names of every mode, in declaration order.
    pub const NAMES: [&'static str; 7] = [
        "timeStep",
        "outputTime",
        "adjustableTime",
        "runTime",
        "clockTime",
        "cpuTime",
        "none",
    ];

    /// Return the configuration name of this mode.
    pub const fn name(self) -> &'static str {
        match self {
            Self::TimeStep => "timeStep",
            Self::OutputTime => "outputTime",
            Self::AdjustableTime => "adjustableTime",
            Self::RunTime => "runTime",
            Self::ClockTime => "clockTime",
            Self::CpuTime => "cpuTime",
            Self::None => "none",
        }
    }

    /// Look up a mode by its configuration name. Matching is exact.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.name() == name)
    }
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Markers
// ---------------------------------------------------------------------------

/// Reference point an output control measures its next firing from.
///
/// The unit depends on the active mode: a step index, a count of provider
/// output times, or a reading in seconds (simulation, wall-clock or CPU).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Marker {
    /// Step index of the last firing (or of the last reconfiguration).
    Step(u64),
    /// Number of provider output times seen since reconfiguration.
    WriteCount(u64),
    /// Time reading of the last firing, in seconds.
    Time(f64),
    /// The mode keeps no marker.
    Unset,
}
