//! Output-trigger evaluation, simulation clock, and run loop for Cadence.
//!
//! This crate owns the decision "should output happen on this step?" for a
//! simulation that advances in discrete time steps, plus the pieces needed to
//! drive that decision end to end.
//!
//! # Modules
//!
//! - [`time`] -- [`TimeSource`] and [`StepAdjuster`] traits the evaluator
//!   consumes, and [`ManualTime`], a hand-driven provider.
//! - [`clock`] -- [`SimClock`], a step-driven simulation clock with
//!   cooperative step shrinking.
//! - [`cpu`] -- Process CPU time probe.
//! - [`dictionary`] -- String-keyed configuration map with typed lookups.
//! - [`control`] -- [`OutputControl`], the output-trigger evaluator.
//! - [`function_object`] -- [`FunctionObject`] trait and
//!   [`ControlledObject`], which gates execute/write behind two controls.
//! - [`config`] -- Run configuration loading from `cadence-config.yaml`.
//! - [`runner`] -- The step loop driving a clock and its controlled objects.
//!
//! [`TimeSource`]: time::TimeSource
//! [`StepAdjuster`]: time::StepAdjuster
//! [`ManualTime`]: time::ManualTime
//! [`SimClock`]: clock::SimClock
//! [`OutputControl`]: control::OutputControl
//! [`FunctionObject`]: function_object::FunctionObject
//! [`ControlledObject`]: function_object::ControlledObject

pub mod clock;
pub mod config;
pub mod control;
pub mod cpu;
pub mod dictionary;
pub mod function_object;
pub mod runner;
pub mod time;
