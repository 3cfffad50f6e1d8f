//! The three collaborators that make up one analysis step.
//!
//! A step turns the current [`State`] into a problem, analyzes the problem,
//! and folds the result back into a new state:
//!
//! ```text
//! State --ProblemDefinition--> Problem --Analyzer--> Output --PostAnalyzer--> State
//! ```
//!
//! Keeping the analyzer behind a problem type means everything an expensive
//! analysis depends on is explicit, and analyzers written for one pipeline can
//! be reused in another as long as something can build their problem.

use crate::{AnalysisError, MissingDataError, State};

/// Extracts the problem an analyzer needs from the current state.
///
/// Implementations read the design, settings, and conditions they require and
/// fail with a [`MissingDataError`] when a required entry is absent.
pub trait ProblemDefinition {
    type Problem;

    /// Builds the problem for the given state.
    ///
    /// # Errors
    ///
    /// Returns a [`MissingDataError`] if the state lacks a required entry.
    fn problem(&self, state: &State) -> Result<Self::Problem, MissingDataError>;
}

/// Solves a problem, possibly at great computational expense.
///
/// Analyzers must be deterministic and have no access to the state; only the
/// problem. They must not hold shared mutable state, so a pipeline can be
/// duplicated across workers.
pub trait Analyzer {
    type Problem;
    type Output;

    /// Analyzes the problem.
    ///
    /// # Errors
    ///
    /// Returns an [`AnalysisError`] on non-convergence, backend failure, or
    /// physically invalid input. A failure is never replaced by a default.
    fn analyze(&self, problem: &Self::Problem) -> Result<Self::Output, AnalysisError>;
}

/// Folds an analysis output into the state passed to the next step.
pub trait PostAnalyzer {
    type Output;

    /// Returns the next state.
    ///
    /// Implementations clone `state`, merge what they need from `output` into
    /// the clone's conditions (or replace its design), and return the clone.
    ///
    /// # Errors
    ///
    /// Returns a [`MissingDataError`] if merging needs an entry the state
    /// lacks.
    fn next_state(&self, output: &Self::Output, state: &State) -> Result<State, MissingDataError>;

    /// Returns `true` if the output means the design cannot proceed.
    ///
    /// A fatal output stops the evaluation after this step, for example when a
    /// rotor cannot be built at all and later analyses would be meaningless.
    fn is_fatal(&self, _output: &Self::Output) -> bool {
        false
    }
}
