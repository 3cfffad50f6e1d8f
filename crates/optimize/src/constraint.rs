use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use spindle_pipeline::Evaluation;

/// Decides whether an evaluated design is feasible.
///
/// Infeasibility is an ordinary outcome, not an error: a checker answers
/// `false` and the objective reducer substitutes its sentinel.
///
/// [`DesignProblem`](crate::DesignProblem) only consults a checker for
/// evaluations that ran to completion; one that stopped early is infeasible
/// whatever the checker answers.
pub trait ConstraintChecker {
    /// Returns `true` if the evaluation satisfies every constraint.
    fn check(&self, evaluation: &Evaluation) -> bool;
}

impl<F> ConstraintChecker for F
where
    F: Fn(&Evaluation) -> bool,
{
    fn check(&self, evaluation: &Evaluation) -> bool {
        self(evaluation)
    }
}

/// A checker that accepts every evaluation that ran to completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct Completed;

impl ConstraintChecker for Completed {
    fn check(&self, evaluation: &Evaluation) -> bool {
        evaluation.is_complete()
    }
}

/// The admissible side of a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Limit {
    /// The value must be strictly less than the limit.
    Below(f64),
    /// The value must not exceed the limit.
    AtMost(f64),
    /// The value must be strictly greater than the limit.
    Above(f64),
    /// The value must not fall below the limit.
    AtLeast(f64),
}

impl Limit {
    /// Returns `true` if `value` is admissible.
    ///
    /// `NaN` is never admissible.
    #[must_use]
    pub fn admits(self, value: f64) -> bool {
        match self {
            Self::Below(limit) => value < limit,
            Self::AtMost(limit) => value <= limit,
            Self::Above(limit) => value > limit,
            Self::AtLeast(limit) => value >= limit,
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Below(limit) => write!(f, "< {limit}"),
            Self::AtMost(limit) => write!(f, "<= {limit}"),
            Self::Above(limit) => write!(f, "> {limit}"),
            Self::AtLeast(limit) => write!(f, ">= {limit}"),
        }
    }
}

/// A named condition and the limit it must satisfy.
///
/// In a file the limit sits beside the key, as in
/// `{ key = "torque_ripple", below = 0.5 }`. Exactly one limit is allowed and
/// any other key is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawThreshold")]
pub struct Threshold {
    /// The condition key, which may be a dotted path into a nested map.
    pub key: String,
    #[serde(flatten)]
    pub limit: Limit,
}

impl Threshold {
    pub fn new(key: impl Into<String>, limit: Limit) -> Self {
        Self {
            key: key.into(),
            limit,
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawThreshold {
    key: String,
    below: Option<f64>,
    at_most: Option<f64>,
    above: Option<f64>,
    at_least: Option<f64>,
}

/// A threshold read from a file did not name exactly one limit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("constraint `{key}` needs exactly one of below, at_most, above or at_least, found {found}")]
pub struct ThresholdError {
    pub key: String,
    pub found: usize,
}

impl TryFrom<RawThreshold> for Threshold {
    type Error = ThresholdError;

    fn try_from(raw: RawThreshold) -> Result<Self, ThresholdError> {
        let limits: Vec<Limit> = [
            raw.below.map(Limit::Below),
            raw.at_most.map(Limit::AtMost),
            raw.above.map(Limit::Above),
            raw.at_least.map(Limit::AtLeast),
        ]
        .into_iter()
        .flatten()
        .collect();

        match limits.as_slice() {
            [limit] => Ok(Self::new(raw.key, *limit)),
            _ => Err(ThresholdError {
                key: raw.key,
                found: limits.len(),
            }),
        }
    }
}

/// Checks named conditions of the final state against limits.
///
/// An evaluation is feasible when it ran to completion and every threshold is
/// satisfied. A threshold whose condition is missing or not numeric counts as
/// violated. Every violation is logged, not just the first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdChecker {
    thresholds: Vec<Threshold>,
}

impl ThresholdChecker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a threshold.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, limit: Limit) -> Self {
        self.thresholds.push(Threshold::new(key, limit));
        self
    }

    #[must_use]
    pub fn thresholds(&self) -> &[Threshold] {
        &self.thresholds
    }

    /// Returns the thresholds the evaluation violates.
    ///
    /// Only the final state is inspected; completeness is not considered.
    #[must_use]
    pub fn violations(&self, evaluation: &Evaluation) -> Vec<&Threshold> {
        let Some(state) = evaluation.final_state() else {
            return self.thresholds.iter().collect();
        };

        self.thresholds
            .iter()
            .filter(|threshold| {
                let value = lookup(state.conditions(), &threshold.key);
                !value.is_some_and(|value| threshold.limit.admits(value))
            })
            .collect()
    }
}

impl From<Vec<Threshold>> for ThresholdChecker {
    fn from(thresholds: Vec<Threshold>) -> Self {
        Self { thresholds }
    }
}

impl ConstraintChecker for ThresholdChecker {
    fn check(&self, evaluation: &Evaluation) -> bool {
        if !evaluation.is_complete() {
            info!(
                outcome = ?evaluation.outcome(),
                ran = evaluation.records().len(),
                planned = evaluation.planned_steps(),
                "evaluation incomplete, design infeasible"
            );
            return false;
        }

        let violations = self.violations(evaluation);
        for threshold in &violations {
            let value = evaluation
                .final_state()
                .and_then(|state| lookup(state.conditions(), &threshold.key));
            info!(
                key = %threshold.key,
                ?value,
                limit = %threshold.limit,
                "constraint violated"
            );
        }

        violations.is_empty()
    }
}

/// Reads a numeric condition, following dots into nested maps.
fn lookup(conditions: &spindle_core::Conditions, key: &str) -> Option<f64> {
    if let Some(value) = conditions.get(key) {
        return value.as_f64();
    }

    let (head, rest) = key.split_once('.')?;
    conditions.get(head)?.get_path(rest)?.as_f64()
}
