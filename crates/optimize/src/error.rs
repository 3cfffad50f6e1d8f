use std::{any::Any, error::Error as StdError};

use thiserror::Error;

use spindle_core::{DesignError, MissingDataError};
use spindle_pipeline::EvaluationError;

/// Everything that can turn a fitness evaluation into failure fitness.
#[derive(Debug, Error)]
pub enum Error {
    /// The designer could not build a design from the free variables.
    #[error("failed to create design")]
    Design(#[from] DesignError),

    /// A pipeline step failed.
    #[error("evaluation failed")]
    Evaluation(#[from] EvaluationError),

    /// The reducer could not read an objective from the final state.
    #[error("failed to compute objectives")]
    Objectives(#[source] MissingDataError),

    /// The reducer produced a non-finite objective.
    #[error("objective {index} is not finite ({value})")]
    NonFiniteObjective { index: usize, value: f64 },

    /// Something panicked, typically inside a third-party backend.
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl Error {
    /// Creates an [`Error::Unexpected`] from a caught panic payload.
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic with a non-string payload".to_owned());
        Self::Unexpected(message)
    }
}

/// Formats an error and its chain of sources as `outer: inner: root`.
pub fn report(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    use spindle_core::{AnalysisError, Scope};

    #[test]
    fn report_walks_the_chain() {
        let error = Error::from(EvaluationError::Analysis {
            step: "thermal".into(),
            source: AnalysisError::new("timeout", "backend did not answer"),
        });

        assert_eq!(
            report(&error),
            "evaluation failed: step `thermal` analysis failed: \
             analysis failed [timeout]: backend did not answer"
        );
    }

    #[test]
    fn objectives_error_keeps_key() {
        let error = Error::Objectives(MissingDataError::absent(Scope::Conditions, "mass"));
        assert_eq!(report(&error), "failed to compute objectives: conditions has no entry `mass`");
    }

    #[test]
    fn panic_payloads_become_messages() {
        let payload: Box<dyn Any + Send> = Box::new("mesh generation failed");
        assert_eq!(
            Error::from_panic(payload.as_ref()).to_string(),
            "unexpected failure: mesh generation failed"
        );

        let payload: Box<dyn Any + Send> = Box::new(String::from("index out of range"));
        assert_eq!(
            Error::from_panic(payload.as_ref()).to_string(),
            "unexpected failure: index out of range"
        );
    }
}
