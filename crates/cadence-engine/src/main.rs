//! Run engine binary for Cadence.
//!
//! Loads a run configuration, builds the configured function objects on a
//! shared simulation clock, and drives them to the end time. Each object's
//! work is gated by its `evaluate*` and `output*` controls; output takes the
//! form of structured log records.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from the path given as the first argument, or
//!    `cadence-config.yaml`
//! 2. Initialize structured logging (`RUST_LOG` overrides `logging.level`)
//! 3. Create the simulation clock from the `clock` section
//! 4. Build function objects from the `functions` section
//! 5. Run the step loop
//! 6. Log the summary

mod error;
mod objects;

use std::path::Path;
use std::rc::Rc;

use cadence_core::clock::SimClock;
use cadence_core::config::RunConfig;
use cadence_core::runner::{self, RunSummary};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::objects::LoggingCallback;

/// Configuration file read when no path is given.
const DEFAULT_CONFIG_PATH: &str = "cadence-config.yaml";

/// Application entry point for the run engine.
///
/// # Errors
///
/// Returns an error if configuration, object construction, or the run
/// fails.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_owned());
    let (config, loaded) = load_config(Path::new(&path))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("cadence-engine starting");
    if loaded {
        info!(path = %path, "Configuration loaded");
    } else {
        info!(path = %path, "Config file not found, using defaults");
    }

    let summary = run(&config)?;
    runner::log_run_end(&summary);

    info!(
        steps = summary.steps,
        final_time = summary.final_time,
        "cadence-engine shutdown complete"
    );
    Ok(())
}

/// Load the run configuration, falling back to defaults when the file is
/// absent. The flag reports whether the file was read.
fn load_config(path: &Path) -> Result<(RunConfig, bool), EngineError> {
    if path.exists() {
        Ok((RunConfig::from_file(path)?, true))
    } else {
        Ok((RunConfig::parse("")?, false))
    }
}

/// Build the clock and objects described by `config` and run them.
fn run(config: &RunConfig) -> Result<RunSummary, EngineError> {
    let clock = Rc::new(SimClock::new(&config.clock)?);
    info!(
        start_time = config.clock.start_time,
        end_time = clock.end_time(),
        delta_t = config.clock.delta_t,
        adjustable = clock.adjustable(),
        "Simulation clock initialized"
    );

    let mut objects = objects::build_objects(&clock, config)?;
    if objects.is_empty() {
        warn!("No function objects configured");
    }

    Ok(runner::run(&clock, &mut objects, &mut LoggingCallback)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_uses_defaults() {
        let (config, loaded) = load_config(Path::new("no-such-cadence-config.yaml")).unwrap();
        assert!(!loaded);
        assert_eq!(config.clock.delta_t, 0.1);
        assert!(config.functions.is_empty());
    }

    #[test]
    fn project_config_runs_to_completion() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join(DEFAULT_CONFIG_PATH);
        if path.exists() {
            let (config, loaded) = load_config(&path).unwrap();
            assert!(loaded);
            let summary = run(&config).unwrap();
            assert!(summary.steps > 0);
            assert_eq!(summary.objects.len(), config.functions.len());
        }
    }

    #[test]
    fn adjustable_run_writes_on_interval_multiples() {
        let config = RunConfig::parse(
            "
clock:
  end_time: 1.0
  delta_t: 0.1
  adjustable: true
functions:
  probe:
    type: probe
    outputControl: adjustableTime
    outputInterval: 0.25
",
        )
        .unwrap();
        let summary = run(&config).unwrap();
        assert_eq!(summary.objects[0].writes, 4);
    }
}
