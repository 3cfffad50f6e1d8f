//! Sweeps a toy surface-magnet motor over a grid of designs.
//!
//! Two free variables (split ratio and magnet thickness) drive a lumped
//! electromagnetic model whose losses feed a thermal model. Feasibility and
//! objectives come from a TOML configuration. The grid stands in for an
//! evolutionary optimizer; any optimizer that calls `fitness` would do.
//!
//! # Usage
//!
//! ```text
//! RUST_LOG=spindle_optimize=debug,spindle_pipeline=debug cargo run --example motor_sweep
//! cargo run --example motor_sweep -- 12
//! ```

use std::{error::Error, f64::consts::PI, sync::Arc};

use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uom::si::{
    angular_velocity::revolution_per_minute,
    electric_current::ampere,
    f64::{AngularVelocity, ElectricCurrent},
    thermodynamic_temperature::degree_celsius,
};

use spindle_core::{AnalysisError, Check, Design, DesignSchema, Settings, State, Value};
use spindle_optimize::{
    DesignProblem, FitnessProblem, MemoryArchive, ProblemConfig, VariableDesigner,
};
use spindle_pipeline::{AnalysisStep, Evaluator, Merge, analyzer_fn, fatal_when, problem_fn};

const CONFIG: &str = r#"
    archive_failures = true

    [bounds]
    lower = [0.4, 2.0]
    upper = [0.8, 8.0]

    [[objectives]]
    key = "torque_avg"
    goal = "maximize"

    [[objectives]]
    key = "mass"

    [[constraints]]
    key = "torque_ripple"
    below = 0.08

    [[constraints]]
    key = "thermal.winding_temperature"
    at_most = 150.0
"#;

const OUTER_RADIUS: f64 = 0.05;
const STACK_LENGTH: f64 = 0.08;
const STEEL_DENSITY: f64 = 7650.0;
const MAGNET_DENSITY: f64 = 7500.0;

#[derive(Debug)]
struct Machine {
    rotor_radius: f64,
    magnet_thickness: f64,
    poles: f64,
    current: f64,
    speed: f64,
}

#[derive(Debug, Serialize)]
struct Electromagnetic {
    torque_avg: f64,
    torque_ripple: f64,
    copper_loss: f64,
    iron_loss: f64,
    mass: f64,
}

fn electromagnetic(machine: &Machine) -> Result<Electromagnetic, AnalysisError> {
    let air_gap = 0.001;
    if machine.magnet_thickness <= air_gap / 2.0 {
        return Err(AnalysisError::new(
            "weak_field",
            "magnet too thin to magnetize the air gap",
        ));
    }

    let flux = machine.magnet_thickness / (machine.magnet_thickness + air_gap);
    let bore_area = 2.0 * PI * machine.rotor_radius * STACK_LENGTH;
    let torque_avg = 2.0e4 * flux * bore_area * machine.rotor_radius * machine.current / 10.0;

    let slot_area = PI * (OUTER_RADIUS.powi(2) - machine.rotor_radius.powi(2)) * 0.4;
    let copper_loss = 2.0e-5 * machine.current.powi(2) * STACK_LENGTH / slot_area.max(1e-6);

    Ok(Electromagnetic {
        torque_avg,
        torque_ripple: 0.3 * machine.magnet_thickness / (machine.poles * air_gap * 2.0),
        copper_loss,
        iron_loss: 1e-3 * machine.speed * flux,
        mass: STACK_LENGTH
            * (STEEL_DENSITY * PI * (OUTER_RADIUS.powi(2) - 0.5 * machine.rotor_radius.powi(2))
                + MAGNET_DENSITY * bore_area / STACK_LENGTH * machine.magnet_thickness),
    })
}

#[derive(Debug, Serialize)]
struct Thermal {
    winding_temperature: f64,
}

fn evaluator() -> Evaluator {
    let machine = problem_fn(|state: &State| {
        let settings = state.settings();
        Ok(Machine {
            rotor_radius: OUTER_RADIUS * state.design_f64("split_ratio")?,
            magnet_thickness: state.design_f64("magnet_thickness")? / 1000.0,
            poles: state.design_f64("poles")?,
            current: settings.current().get::<ampere>(),
            speed: settings.speed().get::<revolution_per_minute>(),
        })
    });

    let heat = problem_fn(|state: &State| {
        Ok((
            state.condition_f64("copper_loss")? + state.condition_f64("iron_loss")?,
            state
                .settings()
                .ambient_temperature()
                .get::<degree_celsius>(),
        ))
    });
    let thermal = analyzer_fn(|&(heat, ambient): &(f64, f64)| {
        Ok::<_, AnalysisError>(Thermal {
            winding_temperature: ambient + 0.8 * heat,
        })
    });

    Evaluator::new()
        .with_step(AnalysisStep::new(
            "electromagnetic",
            machine,
            analyzer_fn(electromagnetic),
            Merge::all(),
        ))
        .with_step(AnalysisStep::new(
            "thermal",
            heat,
            thermal,
            fatal_when(Merge::<Thermal>::prefixed("thermal"), |thermal: &Thermal| {
                thermal.winding_temperature > 250.0
            }),
        ))
}

fn field(design: &Design, name: &str) -> f64 {
    design.get(name).and_then(Value::as_f64).unwrap_or(f64::NAN)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let steps: u32 = std::env::args()
        .nth(1)
        .as_deref()
        .map(str::parse)
        .transpose()?
        .unwrap_or(8)
        .max(2);

    let config = ProblemConfig::from_toml_str(CONFIG)?;
    let schema = Arc::new(
        DesignSchema::new("spm")
            .field("split_ratio", Check::Range { min: 0.3, max: 0.9 })
            .field("magnet_thickness", Check::Positive)
            .field("poles", Check::Integer),
    );
    let designer = VariableDesigner::new(schema, ["split_ratio", "magnet_thickness"])
        .with_fixed("poles", 10.0);

    let archive = Arc::new(MemoryArchive::new());
    let problem = DesignProblem::new(
        designer,
        evaluator(),
        config.constraints(),
        config.objectives::<2>()?,
        config.bounds::<2>()?,
    )
    .with_config(&config)?
    .with_settings(
        Settings::default()
            .with_speed(AngularVelocity::new::<revolution_per_minute>(3000.0))
            .with_current(ElectricCurrent::new::<ampere>(12.0)),
    )
    .with_archive(Arc::clone(&archive));

    let (lower, upper) = (problem.bounds().lower(), problem.bounds().upper());
    let divisions = f64::from(steps - 1);
    for i in 0..steps {
        for j in 0..steps {
            let x = [
                lower[0] + (upper[0] - lower[0]) * f64::from(i) / divisions,
                lower[1] + (upper[1] - lower[1]) * f64::from(j) / divisions,
            ];
            let fitness = problem.fitness(&x);
            info!(?x, ?fitness, "evaluated");
        }
    }

    let front = archive.pareto_front()?;
    println!("{} designs on the Pareto front:", front.len());
    for entry in front {
        println!(
            "  {:<8} split {:.3}  magnet {:.2} mm  torque {:.3} N·m  mass {:.3} kg",
            entry.design.label().unwrap_or("?"),
            field(&entry.design, "split_ratio"),
            field(&entry.design, "magnet_thickness"),
            -entry.objectives[0],
            entry.objectives[1],
        );
    }

    Ok(())
}
