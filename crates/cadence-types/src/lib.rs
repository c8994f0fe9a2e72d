//! Shared type definitions for Cadence output controls.
//!
//! Types in this crate cross crate boundaries: the trigger mode selected by
//! configuration, the marker an evaluator measures from, and the
//! serialisable snapshot used for diagnostics.
//!
//! # Modules
//!
//! - [`enums`] -- Trigger modes and last-fire markers
//! - [`structs`] -- Diagnostic snapshot of an output control

pub mod enums;
pub mod structs;

pub use enums::{Marker, TriggerMode};
pub use structs::ControlSnapshot;
