use thiserror::Error;

use spindle_core::{AnalysisError, MissingDataError};

/// Errors that abort an evaluation.
///
/// Every variant names the step that failed. The evaluator never recovers from
/// these; they propagate to whoever called it.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// The step's problem definition or post-analyzer needed data the state
    /// does not provide.
    #[error("step `{step}` is missing data")]
    MissingData {
        step: String,
        #[source]
        source: MissingDataError,
    },

    /// The step's analyzer failed.
    #[error("step `{step}` analysis failed")]
    Analysis {
        step: String,
        #[source]
        source: AnalysisError,
    },

    /// The analyzer output could not be converted into a result record.
    #[error("step `{step}` produced a result that cannot be recorded")]
    Record {
        step: String,
        #[source]
        source: serde_json::Error,
    },
}

impl EvaluationError {
    /// Returns the name of the step that failed.
    #[must_use]
    pub fn step(&self) -> &str {
        match self {
            Self::MissingData { step, .. }
            | Self::Analysis { step, .. }
            | Self::Record { step, .. } => step,
        }
    }

    /// Returns the missing-data error, if that is what stopped the step.
    #[must_use]
    pub fn as_missing_data(&self) -> Option<&MissingDataError> {
        match self {
            Self::MissingData { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns the analysis error, if that is what stopped the step.
    #[must_use]
    pub fn as_analysis(&self) -> Option<&AnalysisError> {
        match self {
            Self::Analysis { source, .. } => Some(source),
            _ => None,
        }
    }
}
