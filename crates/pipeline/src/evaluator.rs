use std::{fmt, sync::Arc};

use serde::Serialize;
use tracing::{debug, debug_span};

use spindle_core::{Design, Observer, Settings, State};

use crate::{Action, EvaluationError, Event, Record, Step};

/// How an evaluation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Every step ran.
    Completed,

    /// The named step marked the design fatal.
    Fatal { step: String },

    /// An observer stopped the evaluation after the named step.
    StoppedByObserver { step: String },
}

/// The records of one evaluation, in step order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    records: Vec<Record>,
    outcome: Outcome,
    planned: usize,
}

impl Evaluation {
    /// Creates an evaluation from records produced elsewhere.
    ///
    /// `planned` is the number of steps the pipeline was configured with.
    #[must_use]
    pub fn new(records: Vec<Record>, outcome: Outcome, planned: usize) -> Self {
        Self {
            records,
            outcome,
            planned,
        }
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    #[must_use]
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Returns the number of steps the pipeline was configured with.
    #[must_use]
    pub fn planned_steps(&self) -> usize {
        self.planned
    }

    /// Returns `true` if every configured step ran.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.outcome == Outcome::Completed && self.records.len() == self.planned
    }

    /// Returns the state produced by the last step that ran.
    ///
    /// This is the state constraint checkers and objective reducers read,
    /// whether or not the evaluation completed.
    #[must_use]
    pub fn final_state(&self) -> Option<&State> {
        self.records.last().map(|record| &record.state)
    }

    /// Returns the record of the named step, if it ran.
    #[must_use]
    pub fn record(&self, step: &str) -> Option<&Record> {
        self.records.iter().find(|record| record.step == step)
    }
}

/// Runs an ordered list of steps against a design.
///
/// Steps run strictly in the order they were added; each receives the state
/// produced by the one before it. There is no dependency inference: a step
/// that reads a condition must come after the step that writes it.
///
/// The evaluator stops early when a step marks its output fatal or an observer
/// returns [`Action::StopEarly`]. It never catches step errors.
#[derive(Default)]
pub struct Evaluator {
    steps: Vec<Box<dyn Step>>,
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("steps", &self.step_names().collect::<Vec<_>>())
            .finish()
    }
}

impl Evaluator {
    /// Creates an evaluator with no steps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step.
    #[must_use]
    pub fn with_step(mut self, step: impl Step + 'static) -> Self {
        self.push(step);
        self
    }

    /// Appends a step.
    pub fn push(&mut self, step: impl Step + 'static) {
        self.steps.push(Box::new(step));
    }

    /// Appends an already boxed step.
    pub fn push_boxed(&mut self, step: Box<dyn Step>) {
        self.steps.push(step);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the step names in execution order.
    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|step| step.name())
    }

    /// Evaluates a design under the given settings.
    ///
    /// # Errors
    ///
    /// Returns the first [`EvaluationError`] raised by a step.
    pub fn evaluate(
        &self,
        design: Design,
        settings: impl Into<Arc<Settings>>,
    ) -> Result<Evaluation, EvaluationError> {
        self.evaluate_observed(design, settings, ())
    }

    /// Evaluates a design, reporting each step to an observer.
    ///
    /// # Errors
    ///
    /// Returns the first [`EvaluationError`] raised by a step.
    pub fn evaluate_observed<Obs>(
        &self,
        design: Design,
        settings: impl Into<Arc<Settings>>,
        mut observer: Obs,
    ) -> Result<Evaluation, EvaluationError>
    where
        Obs: for<'a> Observer<Event<'a>, Action>,
    {
        let span = debug_span!("evaluate", design = design.label().unwrap_or("unlabeled"));
        let _guard = span.enter();

        let initial = State::new(design, settings);
        let mut records: Vec<Record> = Vec::with_capacity(self.steps.len());

        for (index, step) in self.steps.iter().enumerate() {
            let state = records.last().map_or(&initial, |record| &record.state);

            let output = match step.run(state) {
                Ok(output) => output,
                Err(error) => {
                    observer.observe(&Event::StepFailed {
                        index,
                        error: &error,
                    });
                    return Err(error);
                }
            };

            records.push(Record::new(step.name(), output.result, output.state));
            let record = &records[index];
            debug!(step = %record.step, index, fatal = output.fatal, "step completed");

            let action = observer.observe(&Event::StepCompleted {
                index,
                record,
                fatal: output.fatal,
            });

            if output.fatal {
                debug!(step = %record.step, "design marked fatal, skipping remaining steps");
                let step = record.step.clone();
                return Ok(Evaluation::new(records, Outcome::Fatal { step }, self.len()));
            }

            if action == Some(Action::StopEarly) {
                debug!(step = %record.step, "stopped by observer");
                let step = record.step.clone();
                return Ok(Evaluation::new(
                    records,
                    Outcome::StoppedByObserver { step },
                    self.len(),
                ));
            }
        }

        Ok(Evaluation::new(records, Outcome::Completed, self.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use spindle_core::{AnalysisError, Check, DesignSchema, MissingDataError, Value};

    use crate::{AnalysisStep, analyzer_fn, fatal_when, post_fn, problem_fn};

    fn design() -> Design {
        let schema = Arc::new(DesignSchema::new("bar").field("length", Check::Finite));
        Design::new(schema, [("length", 2.0)]).unwrap()
    }

    /// Adds `amount` to condition `total`, starting from the design length.
    fn adder(name: &'static str, amount: f64) -> impl Step {
        AnalysisStep::new(
            name,
            problem_fn(|state: &State| match state.condition_f64("total") {
                Ok(total) => Ok(total),
                Err(MissingDataError::Absent { .. }) => state.design_f64("length"),
                Err(other) => Err(other),
            }),
            analyzer_fn(move |total: &f64| Ok(total + amount)),
            fatal_when(
                post_fn(|total: &f64, state: &State| {
                    Ok(state.clone().with_condition("total", *total))
                }),
                |total: &f64| *total > 100.0,
            ),
        )
    }

    fn failing(name: &'static str) -> impl Step {
        AnalysisStep::new(
            name,
            problem_fn(|_: &State| Ok(())),
            analyzer_fn(|_: &()| -> Result<f64, AnalysisError> {
                Err(AnalysisError::new("backend_crash", "solver exited"))
            }),
            post_fn(|_: &f64, state: &State| Ok(state.clone())),
        )
    }

    #[test]
    fn runs_steps_in_order() {
        let evaluator = Evaluator::new()
            .with_step(adder("first", 1.0))
            .with_step(adder("second", 10.0));

        let evaluation = evaluator.evaluate(design(), Settings::default()).unwrap();

        assert!(evaluation.is_complete());
        assert_eq!(evaluation.records().len(), 2);
        assert_eq!(evaluation.records()[0].result, Value::Number(3.0));
        let last = evaluation.final_state().unwrap();
        assert_eq!(last.condition_f64("total").unwrap(), 13.0);
        assert_eq!(
            evaluator.step_names().collect::<Vec<_>>(),
            ["first", "second"]
        );
    }

    #[test]
    fn fatal_step_shortens_records() {
        let evaluator = Evaluator::new()
            .with_step(adder("small", 1.0))
            .with_step(adder("huge", 1000.0))
            .with_step(adder("never", 1.0));

        let evaluation = evaluator.evaluate(design(), Settings::default()).unwrap();

        assert!(!evaluation.is_complete());
        assert_eq!(evaluation.records().len(), 2);
        assert_eq!(
            evaluation.outcome(),
            &Outcome::Fatal {
                step: "huge".into()
            }
        );
        assert!(evaluation.record("never").is_none());
    }

    #[test]
    fn errors_propagate_unchanged() {
        let evaluator = Evaluator::new()
            .with_step(adder("first", 1.0))
            .with_step(failing("crashes"))
            .with_step(adder("never", 1.0));

        let error = evaluator
            .evaluate(design(), Settings::default())
            .unwrap_err();

        assert_eq!(error.step(), "crashes");
        assert_eq!(error.as_analysis().unwrap().code(), "backend_crash");
    }

    #[test]
    fn observer_sees_each_step_and_can_stop() {
        let evaluator = Evaluator::new()
            .with_step(adder("first", 1.0))
            .with_step(adder("second", 1.0))
            .with_step(adder("third", 1.0));

        let mut seen = Vec::new();
        let observer = |event: &Event<'_>| {
            seen.push(event.index());
            (event.index() == 1).then_some(Action::StopEarly)
        };

        let evaluation = evaluator
            .evaluate_observed(design(), Settings::default(), observer)
            .unwrap();

        assert_eq!(seen, [0, 1]);
        assert_eq!(
            evaluation.outcome(),
            &Outcome::StoppedByObserver {
                step: "second".into()
            }
        );
        assert!(!evaluation.is_complete());
    }

    #[test]
    fn empty_pipeline_completes_with_no_records() {
        let evaluation = Evaluator::new()
            .evaluate(design(), Settings::default())
            .unwrap();

        assert!(evaluation.is_complete());
        assert!(evaluation.final_state().is_none());
    }
}
