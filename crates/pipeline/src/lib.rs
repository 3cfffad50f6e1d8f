//! Analysis steps and the evaluator that runs them.
//!
//! An [`AnalysisStep`] bundles the three collaborators from
//! [`spindle_core::analysis`] under a name. An [`Evaluator`] runs a list of
//! steps in order, threading the state from one to the next and collecting a
//! [`Record`] of each step's result and output state.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use spindle_core::{AnalysisError, Check, Design, DesignSchema, Settings, State};
//! use spindle_pipeline::{AnalysisStep, Evaluator, Merge, analyzer_fn, problem_fn};
//!
//! #[derive(serde::Serialize)]
//! struct Geometry {
//!     area: f64,
//!     perimeter: f64,
//! }
//!
//! let schema = Arc::new(
//!     DesignSchema::new("rectangle")
//!         .field("length", Check::Finite)
//!         .field("width", Check::Finite),
//! );
//! let design = Design::new(schema, [("length", 2.0), ("width", 3.0)]).unwrap();
//!
//! let evaluator = Evaluator::new().with_step(AnalysisStep::new(
//!     "geometry",
//!     problem_fn(|state: &State| Ok((state.design_f64("length")?, state.design_f64("width")?))),
//!     analyzer_fn(|&(l, w): &(f64, f64)| -> Result<Geometry, AnalysisError> {
//!         Ok(Geometry { area: l * w, perimeter: 2.0 * (l + w) })
//!     }),
//!     Merge::all(),
//! ));
//!
//! let evaluation = evaluator.evaluate(design, Settings::default()).unwrap();
//! let state = evaluation.final_state().unwrap();
//! assert_eq!(state.condition_f64("area").unwrap(), 6.0);
//! assert_eq!(state.condition_f64("perimeter").unwrap(), 10.0);
//! ```

mod closure;
mod error;
mod evaluator;
mod event;
mod merge;
mod record;
mod step;

pub use closure::{
    AnalyzerFn, FatalWhen, PostFn, ProblemFn, analyzer_fn, fatal_when, post_fn, problem_fn,
};
pub use error::EvaluationError;
pub use evaluator::{Evaluation, Evaluator, Outcome};
pub use event::{Action, Event};
pub use merge::Merge;
pub use record::{Record, to_value};
pub use step::{AnalysisStep, Step, StepOutput};
