//! Cadence properties of output controls, checked against hand-driven and
//! simulated clocks.

#![allow(
    clippy::unwrap_used,
    clippy::float_cmp,
    clippy::cast_precision_loss,
    missing_docs
)]

use std::cell::RefCell;
use std::rc::Rc;

use cadence_core::clock::SimClock;
use cadence_core::config::ClockConfig;
use cadence_core::control::{OutputControl, RELATIVE_TOLERANCE};
use cadence_core::dictionary::{ConfigValue, Dictionary};
use cadence_core::function_object::{ControlledObject, FunctionObject, FunctionObjectError};
use cadence_core::runner::{NoOpCallback, run};
use cadence_core::time::{ManualTime, TimeSource};
use cadence_types::{Marker, TriggerMode};
use proptest::prelude::*;

const PROPTEST_CASES: u32 = 64;

fn control(
    time: &Rc<ManualTime>,
    mode: &str,
    interval: impl Into<ConfigValue>,
) -> OutputControl {
    let dict = Dictionary::new()
        .with("outputControl", mode)
        .with("outputInterval", interval);
    OutputControl::from_clock(time, &dict, "output").unwrap()
}

/// Records the simulation time of every write.
struct WriteLog {
    times: Rc<RefCell<Vec<f64>>>,
}

impl FunctionObject for WriteLog {
    fn name(&self) -> &str {
        "writeLog"
    }

    fn execute(&mut self, _time: &dyn TimeSource) -> Result<(), FunctionObjectError> {
        Ok(())
    }

    fn write(&mut self, time: &dyn TimeSource) -> Result<(), FunctionObjectError> {
        self.times.borrow_mut().push(time.value());
        Ok(())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(PROPTEST_CASES))]

    #[test]
    fn time_step_fires_exactly_on_multiples(interval in -3_i64..20, steps in 1_u64..200) {
        let time = Rc::new(ManualTime::new(1.0));
        let mut ctl = control(&time, "timeStep", interval);
        let every = u64::try_from(interval).unwrap_or(1).max(1);
        for step in 1..=steps {
            time.set_step(step, step as f64);
            prop_assert_eq!(ctl.output(), step % every == 0);
        }
    }

    #[test]
    fn run_time_gaps_are_at_least_the_interval(
        interval in 0.1_f64..5.0,
        increments in prop::collection::vec(0.01_f64..1.0, 1..200),
    ) {
        let time = Rc::new(ManualTime::new(0.1));
        let mut ctl = control(&time, "runTime", interval);
        let mut now = 0.0;
        let mut last_fire = 0.0;
        for (step, increment) in (1_u64..).zip(increments) {
            now += increment;
            time.set_step(step, now);
            if ctl.output() {
                prop_assert!(now - last_fire >= interval);
                prop_assert_eq!(ctl.output_time_last_dump(), Marker::Time(now));
                last_fire = now;
            }
        }
    }

    #[test]
    fn run_time_fires_every_call_when_advancing_by_interval(
        halves in 1_u32..200,
        calls in 1_u32..100,
    ) {
        let interval = f64::from(halves) * 0.5;
        let time = Rc::new(ManualTime::new(interval));
        let mut ctl = control(&time, "runTime", interval);
        for step in 1..=calls {
            time.set_step(u64::from(step), f64::from(step) * interval);
            prop_assert!(ctl.output());
        }
    }

    #[test]
    fn run_time_never_fires_short_of_the_interval(
        interval in 0.1_f64..10.0,
        shortfall in 1e-9_f64..1e-3,
    ) {
        let time = Rc::new(ManualTime::new(0.1));
        let mut ctl = control(&time, "runTime", interval);
        time.set_step(1, interval - interval * shortfall);
        prop_assert!(!ctl.output());
        prop_assert_eq!(ctl.output_time_last_dump(), Marker::Time(0.0));
        time.set_step(2, interval);
        prop_assert!(ctl.output());
    }

    #[test]
    fn clock_time_fires_every_call_when_advancing_by_interval(
        halves in 1_u32..20,
        calls in 1_u32..50,
    ) {
        let interval = f64::from(halves) * 0.5;
        let time = Rc::new(ManualTime::new(0.1));
        let mut ctl = control(&time, "clockTime", interval);
        for call in 1..=calls {
            time.set_clock_time(f64::from(call) * interval);
            prop_assert!(ctl.output());
        }
    }

    #[test]
    fn cpu_time_gaps_are_at_least_the_interval(
        interval in 0.1_f64..3.0,
        increments in prop::collection::vec(0.0_f64..1.0, 1..100),
    ) {
        let time = Rc::new(ManualTime::new(0.1));
        let mut ctl = control(&time, "cpuTime", interval);
        let mut reading = 0.0;
        let mut last_fire = 0.0;
        for increment in increments {
            reading += increment;
            time.set_cpu_time(reading);
            if ctl.output() {
                prop_assert!(reading - last_fire >= interval);
                last_fire = reading;
            }
        }
    }

    #[test]
    fn none_never_fires(steps in 1_u64..100, dt in 0.01_f64..1.0) {
        let time = Rc::new(ManualTime::new(dt));
        let mut ctl = control(&time, "none", 1_i64);
        let before = ctl.snapshot();
        for step in 1..=steps {
            time.set_step(step, step as f64 * dt);
            time.set_clock_time(step as f64);
            prop_assert!(!ctl.output());
        }
        prop_assert_eq!(ctl.snapshot(), before);
        prop_assert!(time.requests().is_empty());
    }

    #[test]
    fn adjustable_requests_stay_within_provider_step(
        interval in 0.05_f64..2.0,
        dt in 0.01_f64..1.0,
        increments in prop::collection::vec(0.001_f64..1.0, 1..100),
    ) {
        let time = Rc::new(ManualTime::new(dt));
        let mut ctl = control(&time, "adjustableTime", interval);
        let mut now = 0.0;
        for (step, increment) in (1_u64..).zip(increments) {
            now += increment;
            time.set_step(step, now);
            ctl.output();
        }
        for request in time.requests() {
            prop_assert!(request > 0.0 && request <= dt, "request {} with dt {}", request, dt);
        }
    }

    #[test]
    fn accessors_are_idempotent(interval in 1_i64..10, mode_index in 0_usize..7) {
        let time = Rc::new(ManualTime::new(0.5));
        time.set_clock_time(3.0);
        let mode = TriggerMode::NAMES[mode_index];
        let ctl = control(&time, mode, interval);
        let first = ctl.snapshot();
        for _ in 0..3 {
            prop_assert_eq!(ctl.mode(), first.mode);
            prop_assert_eq!(ctl.write_interval(), first.write_interval);
            prop_assert_eq!(ctl.step_interval(), first.step_interval);
            prop_assert_eq!(ctl.output_time_last_dump(), first.marker);
        }
    }

    #[test]
    fn adjustable_clock_lands_on_interval_multiples(
        interval in 0.05_f64..1.0,
        step_fraction in 0.05_f64..0.95,
        intervals in 1_u32..6,
    ) {
        let delta_t = interval * step_fraction;
        let end_time = f64::from(intervals) * interval;
        let clock = Rc::new(
            SimClock::new(&ClockConfig {
                end_time,
                delta_t,
                adjustable: true,
                ..ClockConfig::default()
            })
            .unwrap(),
        );
        let times = Rc::new(RefCell::new(Vec::new()));
        let dict = Dictionary::new()
            .with("evaluateControl", "none")
            .with("outputControl", "adjustableTime")
            .with("outputInterval", interval);
        let object = WriteLog { times: Rc::clone(&times) };
        let mut objects = vec![ControlledObject::new(Box::new(object), &clock, &dict).unwrap()];

        run(&clock, &mut objects, &mut NoOpCallback).unwrap();

        let times = times.borrow();
        prop_assert_eq!(times.len(), intervals as usize);
        for (k, fired) in (1_u32..).zip(times.iter()) {
            let expected = f64::from(k) * interval;
            prop_assert!((fired - expected).abs() <= RELATIVE_TOLERANCE * interval,
                "fired at {} expected {}", fired, expected);
        }
    }
}

#[test]
fn time_step_example() {
    let time = Rc::new(ManualTime::new(1.0));
    let mut ctl = control(&time, "timeStep", 5_i64);
    let fired: Vec<u64> = (1..=12)
        .filter(|&step| {
            time.set_step(step, step as f64);
            ctl.output()
        })
        .collect();
    assert_eq!(fired, vec![5, 10]);
}

#[test]
fn run_time_example() {
    let time = Rc::new(ManualTime::new(1.0));
    let mut ctl = control(&time, "runTime", 2.0);
    let mut fired = Vec::new();
    for step in 0..=5_u64 {
        let now = step as f64;
        time.set_step(step, now);
        if ctl.output() {
            assert_eq!(ctl.output_time_last_dump(), Marker::Time(now));
            fired.push(now);
        }
    }
    assert_eq!(fired, vec![2.0, 4.0]);
}

#[test]
fn adjustable_controls_sharing_a_clock_each_land_on_their_multiples() {
    let clock = Rc::new(
        SimClock::new(&ClockConfig {
            end_time: 1.5,
            delta_t: 0.1,
            adjustable: true,
            ..ClockConfig::default()
        })
        .unwrap(),
    );
    let intervals = [0.25, 0.3];
    let logs: Vec<Rc<RefCell<Vec<f64>>>> = intervals.iter().map(|_| Rc::default()).collect();
    let mut objects: Vec<ControlledObject> = intervals
        .iter()
        .zip(&logs)
        .map(|(&interval, log)| {
            let dict = Dictionary::new()
                .with("evaluateControl", "none")
                .with("outputControl", "adjustableTime")
                .with("outputInterval", interval);
            let object = WriteLog {
                times: Rc::clone(log),
            };
            ControlledObject::new(Box::new(object), &clock, &dict).unwrap()
        })
        .collect();

    run(&clock, &mut objects, &mut NoOpCallback).unwrap();

    for ((interval, log), expected_writes) in intervals.iter().zip(&logs).zip([6, 5]) {
        let times = log.borrow();
        assert_eq!(times.len(), expected_writes, "interval {interval}: {times:?}");
        for (k, fired) in (1_u32..).zip(times.iter()) {
            let expected = f64::from(k) * interval;
            assert!(
                (fired - expected).abs() <= RELATIVE_TOLERANCE * interval,
                "interval {interval}: fired at {fired}, expected {expected}"
            );
        }
    }
}

#[test]
fn bogus_mode_keeps_previous_configuration() {
    let time = Rc::new(ManualTime::new(1.0));
    let mut ctl = control(&time, "timeStep", 3_i64);
    let before = ctl.snapshot();
    let result = ctl.read(&Dictionary::new().with("outputControl", "bogus"));
    assert!(result.is_err());
    assert_eq!(ctl.snapshot(), before);
}

#[test]
fn output_time_fires_on_every_nth_clock_write() {
    let clock = Rc::new(
        SimClock::new(&ClockConfig {
            end_time: 3.0,
            delta_t: 0.1,
            write_interval: Some(5),
            ..ClockConfig::default()
        })
        .unwrap(),
    );
    let times = Rc::new(RefCell::new(Vec::new()));
    let dict = Dictionary::new()
        .with("outputControl", "outputTime")
        .with("outputInterval", 2_i64);
    let object = WriteLog {
        times: Rc::clone(&times),
    };
    let mut objects = vec![ControlledObject::new(Box::new(object), &clock, &dict).unwrap()];

    let summary = run(&clock, &mut objects, &mut NoOpCallback).unwrap();

    // Clock writes every 5 steps; the control fires on every second write.
    assert_eq!(summary.steps, 30);
    assert_eq!(summary.objects[0].writes, 3);
    assert_eq!(
        objects[0].output_control().output_time_last_dump(),
        Marker::WriteCount(6)
    );
}
