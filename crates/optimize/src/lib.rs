//! Adapts Spindle evaluation pipelines to multi-objective optimizers.
//!
//! A [`DesignProblem`] glues the pieces an optimization needs around an
//! [`Evaluator`](spindle_pipeline::Evaluator):
//!
//! - A [`Designer`] turns a vector of free variables into a [`Design`](spindle_core::Design).
//! - A [`ConstraintChecker`] decides whether the evaluated design is feasible.
//! - An [`ObjectiveReducer`] turns the evaluation into objectives to minimize.
//! - A [`DataHandler`] archives every evaluated design.
//!
//! The result implements [`FitnessProblem`], the narrow "vector in, objectives
//! out, with bounds" contract an evolutionary optimizer drives. Infeasible
//! designs get the reducer's invalid sentinel ([`INVALID_FITNESS`] by default)
//! and failed evaluations get the failure sentinel ([`FAILURE_FITNESS`] by
//! default), so the optimizer never sees an error.

mod archive;
mod bounds;
mod config;
mod constraint;
mod designer;
mod error;
mod objective;
mod problem;

pub use archive::{
    ArchiveError, DataHandler, Entry, Failure, JsonLinesArchive, MemoryArchive, NullArchive,
    dominates,
};
pub use bounds::{Bounds, BoundsError};
pub use config::{BoundsConfig, ConfigError, ProblemConfig};
pub use constraint::{
    Completed, ConstraintChecker, Limit, Threshold, ThresholdChecker, ThresholdError,
};
pub use designer::{Designer, VariableDesigner};
pub use error::{Error, report};
pub use objective::{
    ConditionObjectives, FAILURE_FITNESS, Goal, INVALID_FITNESS, Objective, ObjectiveReducer,
    ObjectivesFn, SentinelError, objectives_fn,
};
pub use problem::{DesignProblem, FitnessProblem};
