use crate::{EvaluationError, Record};

/// Events emitted by the [`Evaluator`](crate::Evaluator) while it runs.
#[derive(Debug)]
pub enum Event<'a> {
    /// A step finished and its record was appended.
    StepCompleted {
        /// Position of the step in the pipeline.
        index: usize,

        /// The record the step produced.
        record: &'a Record,

        /// Whether the step marked the design fatal.
        fatal: bool,
    },

    /// A step failed; the error is returned to the caller after this event.
    StepFailed {
        index: usize,
        error: &'a EvaluationError,
    },
}

impl Event<'_> {
    /// Returns the index of the step this event concerns.
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::StepCompleted { index, .. } | Self::StepFailed { index, .. } => *index,
        }
    }
}

/// Actions an observer can request from the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Skip the remaining steps and return the records so far.
    ///
    /// The evaluation is then incomplete, so constraint checkers treat it as
    /// invalid. Ignored after a failure, since the error is returned anyway.
    StopEarly,
}
