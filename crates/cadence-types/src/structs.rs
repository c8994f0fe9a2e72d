//! Diagnostic structs shared across the Cadence workspace.

use serde::{Deserialize, Serialize};

use crate::enums::{Marker, TriggerMode};

/// Point-in-time view of an output control, for logs and reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlSnapshot {
    /// Configuration prefix of the control (e.g. `output`, `evaluate`).
    pub label: String,
    /// Active trigger mode.
    pub mode: TriggerMode,
    /// Step interval for step-based modes.
    pub step_interval: Option<u64>,
    /// Time interval in seconds; `0.0` for step-based modes.
    pub write_interval: f64,
    /// Marker the next firing is measured from.
    pub marker: Marker,
}
