use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use spindle_core::{MissingDataError, Scope, State};
use spindle_pipeline::Evaluation;

/// Objective value substituted for every objective of an infeasible design.
pub const INVALID_FITNESS: f64 = 9999.0;

/// Objective value substituted for every objective when evaluation fails.
pub const FAILURE_FITNESS: f64 = 1e10;

/// A sentinel fitness that is not a finite number.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("sentinel fitness must be finite, got {0}")]
pub struct SentinelError(pub f64);

/// Accepts `value` as a sentinel if it is finite.
pub(crate) fn sentinel(value: f64) -> Result<f64, SentinelError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SentinelError(value))
    }
}

/// Reduces an evaluation to `M` objective values.
///
/// All objectives are minimized. When `valid` is `false` a reducer returns
/// its sentinel, a tuple of large values that no feasible design can be worse
/// than, whatever the evaluation contains.
pub trait ObjectiveReducer<const M: usize> {
    /// Computes the objectives.
    ///
    /// # Errors
    ///
    /// Returns a [`MissingDataError`] if a valid evaluation lacks a condition
    /// an objective is computed from.
    fn objectives(
        &self,
        valid: bool,
        evaluation: &Evaluation,
    ) -> Result<[f64; M], MissingDataError>;
}

/// The optimization direction of one objective.
///
/// Optimizers minimize, so maximized objectives are negated before they are
/// reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    #[default]
    Minimize,
    Maximize,
}

impl Goal {
    /// Transforms a value for minimization.
    #[must_use]
    pub fn transform(self, value: f64) -> f64 {
        match self {
            Self::Minimize => value,
            Self::Maximize => -value,
        }
    }
}

/// An objective read from a numeric condition of the final state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    pub key: String,
    #[serde(default)]
    pub goal: Goal,
}

impl Objective {
    pub fn minimize(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            goal: Goal::Minimize,
        }
    }

    pub fn maximize(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            goal: Goal::Maximize,
        }
    }
}

/// A reducer that reads each objective from a named condition.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionObjectives<const M: usize> {
    objectives: [Objective; M],
    sentinel: f64,
}

impl<const M: usize> ConditionObjectives<M> {
    /// Creates a reducer with the default [`INVALID_FITNESS`] sentinel.
    #[must_use]
    pub fn new(objectives: [Objective; M]) -> Self {
        Self {
            objectives,
            sentinel: INVALID_FITNESS,
        }
    }

    /// Sets the value reported for every objective of an infeasible design.
    ///
    /// # Errors
    ///
    /// Returns a [`SentinelError`] if `value` is not finite.
    pub fn with_sentinel(mut self, value: f64) -> Result<Self, SentinelError> {
        self.sentinel = sentinel(value)?;
        Ok(self)
    }

    #[must_use]
    pub fn targets(&self) -> &[Objective; M] {
        &self.objectives
    }
}

impl<const M: usize> ObjectiveReducer<M> for ConditionObjectives<M> {
    fn objectives(
        &self,
        valid: bool,
        evaluation: &Evaluation,
    ) -> Result<[f64; M], MissingDataError> {
        if !valid {
            return Ok([self.sentinel; M]);
        }

        let state = final_state(evaluation)?;
        let mut values = [0.0; M];
        for (value, objective) in values.iter_mut().zip(&self.objectives) {
            *value = objective.goal.transform(state.condition_f64(&objective.key)?);
        }
        Ok(values)
    }
}

/// A reducer built from a function of the final state.
///
/// Created by [`objectives_fn`]. The function only runs for valid
/// evaluations; invalid ones get the sentinel.
pub struct ObjectivesFn<F, const M: usize> {
    function: F,
    sentinel: f64,
    _marker: PhantomData<fn() -> [f64; M]>,
}

/// Wraps a function that computes objectives from the final state.
///
/// Objectives to be maximized must be negated by the function.
pub fn objectives_fn<F, const M: usize>(function: F) -> ObjectivesFn<F, M>
where
    F: Fn(&State) -> Result<[f64; M], MissingDataError>,
{
    ObjectivesFn {
        function,
        sentinel: INVALID_FITNESS,
        _marker: PhantomData,
    }
}

impl<F, const M: usize> ObjectivesFn<F, M> {
    /// Sets the value reported for every objective of an infeasible design.
    ///
    /// # Errors
    ///
    /// Returns a [`SentinelError`] if `value` is not finite.
    pub fn with_sentinel(mut self, value: f64) -> Result<Self, SentinelError> {
        self.sentinel = sentinel(value)?;
        Ok(self)
    }
}

impl<F, const M: usize> ObjectiveReducer<M> for ObjectivesFn<F, M>
where
    F: Fn(&State) -> Result<[f64; M], MissingDataError>,
{
    fn objectives(
        &self,
        valid: bool,
        evaluation: &Evaluation,
    ) -> Result<[f64; M], MissingDataError> {
        if !valid {
            return Ok([self.sentinel; M]);
        }
        (self.function)(final_state(evaluation)?)
    }
}

/// Returns the last state of the evaluation.
///
/// An evaluation with no records has no conditions at all, so reading any
/// objective from it is a missing-data failure.
fn final_state(evaluation: &Evaluation) -> Result<&State, MissingDataError> {
    evaluation
        .final_state()
        .ok_or_else(|| MissingDataError::absent(Scope::Conditions, "<final state>"))
}
