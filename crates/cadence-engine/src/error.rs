//! Error types for the run engine binary.
//!
//! [`EngineError`] wraps every failure mode during startup and the run so
//! `main` can propagate with `?`.

/// Top-level error for the run engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: cadence_core::config::ConfigError,
    },

    /// Simulation clock initialization failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: cadence_core::clock::ClockError,
    },

    /// A function object could not be built.
    #[error("function object error: {source}")]
    FunctionObject {
        /// The underlying function object error.
        #[from]
        source: cadence_core::function_object::FunctionObjectError,
    },

    /// The `type` key of a function object names no known kind.
    #[error("function object '{name}': unknown type '{kind}' (valid: {valid})")]
    UnknownObjectType {
        /// Name of the function object.
        name: String,
        /// The unrecognised type.
        kind: String,
        /// Comma-separated list of valid types.
        valid: String,
    },

    /// The run loop failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: cadence_core::runner::RunnerError,
    },
}
