use std::fmt::Debug;

use serde::Serialize;
use tracing::debug;

use spindle_core::{Analyzer, PostAnalyzer, ProblemDefinition, State, Value};

use crate::{EvaluationError, record::to_value};

/// What one step produced.
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// The analyzer output, converted to a [`Value`].
    pub result: Value,

    /// The state for the next step.
    pub state: State,

    /// Whether the evaluation must stop after this step.
    pub fatal: bool,
}

/// One unit of an evaluation pipeline.
///
/// This is the object-safe face of a step, which lets an
/// [`Evaluator`](crate::Evaluator) hold steps with unrelated problem and
/// output types. Most steps are [`AnalysisStep`]s; implement `Step` directly
/// only for steps that do not fit the define/analyze/post-analyze shape.
///
/// Steps are `Send + Sync` so a configured pipeline can be shared by workers
/// running independent evaluations.
pub trait Step: Send + Sync {
    /// A short name used in records, errors, and logs.
    fn name(&self) -> &str;

    /// Runs the step against a state.
    ///
    /// # Errors
    ///
    /// Returns an [`EvaluationError`] naming this step if any part of it fails.
    fn run(&self, state: &State) -> Result<StepOutput, EvaluationError>;
}

/// A step composed of a problem definition, an analyzer, and a post-analyzer.
///
/// Running the step builds the problem from the incoming state, analyzes it,
/// asks the post-analyzer for the next state, and records the analyzer output.
/// The incoming state is only ever borrowed.
///
/// When the analyzer fails, the offending problem and this step's name are
/// attached to the [`AnalysisError`](spindle_core::AnalysisError) before it is
/// returned.
#[derive(Debug, Clone)]
pub struct AnalysisStep<D, A, P> {
    name: String,
    definition: D,
    analyzer: A,
    post: P,
}

impl<D, A, P> AnalysisStep<D, A, P>
where
    D: ProblemDefinition,
    A: Analyzer<Problem = D::Problem>,
    P: PostAnalyzer<Output = A::Output>,
{
    pub fn new(name: impl Into<String>, definition: D, analyzer: A, post: P) -> Self {
        Self {
            name: name.into(),
            definition,
            analyzer,
            post,
        }
    }

    #[must_use]
    pub fn definition(&self) -> &D {
        &self.definition
    }

    #[must_use]
    pub fn analyzer(&self) -> &A {
        &self.analyzer
    }

    #[must_use]
    pub fn post_analyzer(&self) -> &P {
        &self.post
    }
}

impl<D, A, P> Step for AnalysisStep<D, A, P>
where
    D: ProblemDefinition + Send + Sync,
    D::Problem: Debug,
    A: Analyzer<Problem = D::Problem> + Send + Sync,
    A::Output: Serialize,
    P: PostAnalyzer<Output = A::Output> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, state: &State) -> Result<StepOutput, EvaluationError> {
        let problem = self
            .definition
            .problem(state)
            .map_err(|source| EvaluationError::MissingData {
                step: self.name.clone(),
                source,
            })?;

        debug!(step = %self.name, ?problem, "analyzing");

        let output = self
            .analyzer
            .analyze(&problem)
            .map_err(|error| EvaluationError::Analysis {
                step: self.name.clone(),
                source: error.with_problem(&problem).in_step(&self.name),
            })?;

        let next = self
            .post
            .next_state(&output, state)
            .map_err(|source| EvaluationError::MissingData {
                step: self.name.clone(),
                source,
            })?;

        let result = to_value(&output).map_err(|source| EvaluationError::Record {
            step: self.name.clone(),
            source,
        })?;

        Ok(StepOutput {
            result,
            state: next,
            fatal: self.post.is_fatal(&output),
        })
    }
}
