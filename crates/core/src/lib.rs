//! Core types for the Spindle design-evaluation framework.
//!
//! This crate defines the values that flow through an evaluation pipeline and
//! the traits analysis steps are built from:
//!
//! - [`Design`]: an immutable candidate, validated against a [`DesignSchema`]
//! - [`Settings`]: the operating point shared by every step in a run
//! - [`Conditions`]: copy-on-write results accumulated so far
//! - [`State`]: the {design, settings, conditions} bundle passed between steps
//! - [`ProblemDefinition`], [`Analyzer`], [`PostAnalyzer`]: the collaborators
//!   of one analysis step
//! - [`Observer`]: receives evaluation events and optionally returns actions
//! - [`MissingDataError`], [`AnalysisError`]: the failures steps propagate

pub mod analysis;
mod conditions;
mod design;
mod error;
mod observer;
mod settings;
mod state;
mod value;

pub use analysis::{Analyzer, PostAnalyzer, ProblemDefinition};
pub use conditions::Conditions;
pub use design::{Check, Design, DesignError, DesignSchema, FieldSpec};
pub use error::{AnalysisError, MissingDataError, Scope};
pub use observer::Observer;
pub use settings::Settings;
pub use state::State;
pub use value::Value;
