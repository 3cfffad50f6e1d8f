use std::{error::Error as StdError, fmt};

use thiserror::Error;

/// The part of a [`State`](crate::State) a lookup was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Design,
    Settings,
    Conditions,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Design => "design",
            Self::Settings => "settings",
            Self::Conditions => "conditions",
        };
        f.write_str(name)
    }
}

/// A problem definition needed data the current state does not provide.
///
/// This is a pipeline ordering defect, not a property of the candidate
/// design, so it is never recovered from inside the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MissingDataError {
    #[error("{scope} has no entry `{key}`")]
    Absent { scope: Scope, key: String },

    #[error("{scope} entry `{key}` is {found}, expected {expected}")]
    WrongKind {
        scope: Scope,
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl MissingDataError {
    /// Creates an error for a key that is not present at all.
    pub fn absent(scope: Scope, key: impl Into<String>) -> Self {
        Self::Absent {
            scope,
            key: key.into(),
        }
    }

    /// Returns the key that could not be read.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Absent { key, .. } | Self::WrongKind { key, .. } => key,
        }
    }

    /// Returns where the lookup was made.
    #[must_use]
    pub fn scope(&self) -> Scope {
        match self {
            Self::Absent { scope, .. } | Self::WrongKind { scope, .. } => *scope,
        }
    }
}

/// An analyzer failed to produce a result for its problem.
///
/// Typical causes are numerical non-convergence, an external backend that
/// crashed or timed out, or physically invalid input such as a negative
/// dimension. The error carries a short diagnostic `code` that groups similar
/// failures, and a rendering of the offending problem for later inspection.
#[derive(Debug, Error)]
#[error("analysis failed [{code}]: {message}")]
pub struct AnalysisError {
    code: String,
    message: String,
    problem: Option<String>,
    step: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl AnalysisError {
    /// Creates an analysis error with a diagnostic code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            problem: None,
            step: None,
            source: None,
        }
    }

    /// Attaches the underlying backend error.
    #[must_use]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Records the problem that was being analyzed.
    ///
    /// Analysis steps call this automatically, so analyzers only need it when
    /// they want to record something other than their full problem.
    #[must_use]
    pub fn with_problem<P: fmt::Debug + ?Sized>(mut self, problem: &P) -> Self {
        if self.problem.is_none() {
            self.problem = Some(format!("{problem:?}"));
        }
        self
    }

    /// Records the name of the step that ran the analyzer.
    #[must_use]
    pub fn in_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the `Debug` rendering of the offending problem, if recorded.
    #[must_use]
    pub fn problem(&self) -> Option<&str> {
        self.problem.as_deref()
    }

    #[must_use]
    pub fn step(&self) -> Option<&str> {
        self.step.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("solver diverged after 40 iterations")]
    struct Diverged;

    #[derive(Debug)]
    struct Slot {
        width: f64,
    }

    #[test]
    fn missing_data_message() {
        let error = MissingDataError::absent(Scope::Conditions, "torque_avg");
        assert_eq!(error.to_string(), "conditions has no entry `torque_avg`");
        assert_eq!(error.key(), "torque_avg");
        assert_eq!(error.scope(), Scope::Conditions);
    }

    #[test]
    fn analysis_error_keeps_context() {
        let error = AnalysisError::new("non_convergence", "flux solver did not converge")
            .with_source(Diverged)
            .with_problem(&Slot { width: -1.0 })
            .in_step("electromagnetic");

        assert_eq!(
            error.to_string(),
            "analysis failed [non_convergence]: flux solver did not converge"
        );
        assert_eq!(error.code(), "non_convergence");
        assert_eq!(error.problem(), Some("Slot { width: -1.0 }"));
        assert_eq!(error.step(), Some("electromagnetic"));
        assert_eq!(
            error.source().map(ToString::to_string).as_deref(),
            Some("solver diverged after 40 iterations")
        );
    }

    #[test]
    fn first_recorded_problem_wins() {
        let error = AnalysisError::new("invalid_input", "negative width")
            .with_problem(&"slot only")
            .with_problem(&Slot { width: -1.0 });

        assert_eq!(error.problem(), Some("\"slot only\""));
    }
}
