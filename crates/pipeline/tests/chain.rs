//! A two-physics chain: an electromagnetic step whose losses feed a thermal
//! step, neither knowing about the other.

use std::sync::Arc;

use approx::assert_relative_eq;
use serde::Serialize;
use uom::si::{
    angular_velocity::revolution_per_minute,
    electric_current::ampere,
    f64::{AngularVelocity, ElectricCurrent},
    thermodynamic_temperature::degree_celsius,
};

use spindle_core::{
    AnalysisError, Analyzer, Check, Design, DesignSchema, MissingDataError, ProblemDefinition,
    Scope, Settings, State, Value,
};
use spindle_pipeline::{AnalysisStep, EvaluationError, Evaluator, Merge, Outcome, fatal_when};

#[derive(Debug)]
struct MachineProblem {
    poles: f64,
    current: f64,
    speed_rpm: f64,
}

struct MachineDefinition;

impl ProblemDefinition for MachineDefinition {
    type Problem = MachineProblem;

    fn problem(&self, state: &State) -> Result<MachineProblem, MissingDataError> {
        Ok(MachineProblem {
            poles: state.design_f64("poles")?,
            current: state.settings().current().get::<ampere>(),
            speed_rpm: state.settings().speed().get::<revolution_per_minute>(),
        })
    }
}

#[derive(Debug, Serialize)]
struct MachineResult {
    torque_avg: f64,
    torque_ripple: f64,
    copper_loss: f64,
    iron_loss: f64,
}

/// A lumped machine model standing in for a field solver.
struct LumpedMachine;

impl Analyzer for LumpedMachine {
    type Problem = MachineProblem;
    type Output = MachineResult;

    fn analyze(&self, problem: &MachineProblem) -> Result<MachineResult, AnalysisError> {
        if problem.current < 0.0 {
            return Err(AnalysisError::new(
                "negative_current",
                "phase current must not be negative",
            ));
        }

        Ok(MachineResult {
            torque_avg: 0.01 * problem.poles * problem.current,
            torque_ripple: 0.1 / problem.poles,
            copper_loss: 0.5 * problem.current.powi(2),
            iron_loss: 0.01 * problem.speed_rpm,
        })
    }
}

#[derive(Debug)]
struct ThermalProblem {
    heat: f64,
    ambient_celsius: f64,
}

struct ThermalDefinition;

impl ProblemDefinition for ThermalDefinition {
    type Problem = ThermalProblem;

    fn problem(&self, state: &State) -> Result<ThermalProblem, MissingDataError> {
        Ok(ThermalProblem {
            heat: state.condition_f64("copper_loss")? + state.condition_f64("iron_loss")?,
            ambient_celsius: state
                .settings()
                .ambient_temperature()
                .get::<degree_celsius>(),
        })
    }
}

#[derive(Debug, Serialize)]
struct ThermalResult {
    winding_temperature: f64,
}

/// A single thermal resistance from winding to ambient.
struct ThermalResistance(f64);

impl Analyzer for ThermalResistance {
    type Problem = ThermalProblem;
    type Output = ThermalResult;

    fn analyze(&self, problem: &ThermalProblem) -> Result<ThermalResult, AnalysisError> {
        Ok(ThermalResult {
            winding_temperature: problem.ambient_celsius + self.0 * problem.heat,
        })
    }
}

const WINDING_LIMIT: f64 = 180.0;

fn electromagnetic() -> impl spindle_pipeline::Step {
    AnalysisStep::new("electromagnetic", MachineDefinition, LumpedMachine, Merge::all())
}

fn thermal() -> impl spindle_pipeline::Step {
    AnalysisStep::new(
        "thermal",
        ThermalDefinition,
        ThermalResistance(0.25),
        fatal_when(
            Merge::<ThermalResult>::prefixed("thermal"),
            |result: &ThermalResult| result.winding_temperature > WINDING_LIMIT,
        ),
    )
}

fn design() -> Design {
    let schema = Arc::new(DesignSchema::new("spm").field("poles", Check::Integer));
    Design::new(schema, [("poles", 10.0)]).unwrap()
}

fn settings(current: f64) -> Settings {
    Settings::default()
        .with_speed(AngularVelocity::new::<revolution_per_minute>(3000.0))
        .with_current(ElectricCurrent::new::<ampere>(current))
}

#[test]
fn losses_flow_into_the_thermal_step() {
    let evaluator = Evaluator::new()
        .with_step(electromagnetic())
        .with_step(thermal());

    let evaluation = evaluator.evaluate(design(), settings(20.0)).unwrap();
    assert!(evaluation.is_complete());
    assert_eq!(evaluation.records().len(), 2);

    let state = evaluation.final_state().unwrap();
    assert_relative_eq!(state.condition_f64("torque_avg").unwrap(), 2.0, epsilon = 1e-12);
    assert_relative_eq!(state.condition_f64("copper_loss").unwrap(), 200.0, epsilon = 1e-9);
    assert_relative_eq!(state.condition_f64("iron_loss").unwrap(), 30.0, epsilon = 1e-9);
    assert_relative_eq!(
        state.condition_f64("thermal.winding_temperature").unwrap(),
        20.0 + 0.25 * 230.0,
        epsilon = 1e-9
    );

    let record = evaluation.record("electromagnetic").unwrap();
    let ripple = record.result.get("torque_ripple").and_then(Value::as_f64);
    assert_relative_eq!(ripple.unwrap(), 0.01, epsilon = 1e-12);
}

#[test]
fn thermal_step_needs_the_electromagnetic_step() {
    let evaluator = Evaluator::new().with_step(thermal());

    let error = evaluator.evaluate(design(), settings(20.0)).unwrap_err();
    assert_eq!(error.step(), "thermal");

    let missing = error.as_missing_data().unwrap();
    assert_eq!(missing.scope(), Scope::Conditions);
    assert_eq!(missing.key(), "copper_loss");
}

#[test]
fn overheating_is_fatal_not_an_error() {
    let evaluator = Evaluator::new()
        .with_step(electromagnetic())
        .with_step(thermal())
        .with_step(electromagnetic());

    let evaluation = evaluator.evaluate(design(), settings(40.0)).unwrap();

    assert_eq!(
        evaluation.outcome(),
        &Outcome::Fatal {
            step: "thermal".into()
        }
    );
    assert_eq!(evaluation.records().len(), 2);
    assert!(!evaluation.is_complete());
}

#[test]
fn analysis_errors_carry_step_and_problem() {
    let evaluator = Evaluator::new()
        .with_step(electromagnetic())
        .with_step(thermal());

    let error = evaluator.evaluate(design(), settings(-1.0)).unwrap_err();
    assert!(matches!(error, EvaluationError::Analysis { .. }));

    let analysis = error.as_analysis().unwrap();
    assert_eq!(analysis.code(), "negative_current");
    assert_eq!(analysis.step(), Some("electromagnetic"));
    assert!(analysis.problem().unwrap().contains("MachineProblem"));
}

#[test]
fn earlier_states_are_untouched_by_later_steps() {
    let evaluator = Evaluator::new()
        .with_step(electromagnetic())
        .with_step(thermal());

    let evaluation = evaluator.evaluate(design(), settings(20.0)).unwrap();
    let mut records = evaluation.into_records();
    let first = records[0].state.clone();
    assert!(!first.conditions().contains_key("thermal.winding_temperature"));

    let mut last = records.pop().unwrap().state;
    last.conditions_mut().insert("torque_avg", -1.0);

    assert_relative_eq!(first.condition_f64("torque_avg").unwrap(), 2.0, epsilon = 1e-12);
    assert_relative_eq!(
        records[0].state.condition_f64("torque_avg").unwrap(),
        2.0,
        epsilon = 1e-12
    );
}
