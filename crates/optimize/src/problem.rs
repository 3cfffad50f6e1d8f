use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use tracing::{debug, debug_span, warn};

use spindle_core::Settings;
use spindle_pipeline::Evaluator;

use crate::{
    ArchiveError, Bounds, ConfigError, ConstraintChecker, DataHandler, Designer, Error,
    FAILURE_FITNESS, NullArchive, ObjectiveReducer, ProblemConfig, SentinelError,
    error::report, objective::sentinel,
};

/// The contract an external multi-objective optimizer drives.
///
/// A vector of `N` free variables in, `M` objectives to minimize out, with
/// declared box bounds. `fitness` never fails: every failure is reported as a
/// fitness tuple no feasible design is worse than.
pub trait FitnessProblem<const N: usize, const M: usize> {
    /// Evaluates the objectives at `x`.
    fn fitness(&self, x: &[f64; N]) -> [f64; M];

    /// Returns the bounds of the free variables.
    fn bounds(&self) -> &Bounds<N>;

    /// Returns the number of objectives.
    fn n_obj(&self) -> usize {
        M
    }
}

/// Adapts a design pipeline to a [`FitnessProblem`].
///
/// Each call to [`fitness`](FitnessProblem::fitness) creates a design from
/// `x`, evaluates it, checks its constraints, reduces it to objectives and
/// archives the result. This is the only place failures are recovered: any
/// error or panic along the way is logged and turned into the failure
/// fitness, `[failure_fitness; M]`.
///
/// Every call owns its own design and state chain, so a problem whose
/// collaborators are `Sync` can be evaluated from several threads at once.
#[derive(Debug)]
pub struct DesignProblem<Dz, C, R, const N: usize, const M: usize, H = NullArchive> {
    designer: Dz,
    evaluator: Evaluator,
    checker: C,
    reducer: R,
    archive: H,
    bounds: Bounds<N>,
    settings: Arc<Settings>,
    failure_fitness: f64,
    archive_failures: bool,
}

impl<Dz, C, R, const N: usize, const M: usize> DesignProblem<Dz, C, R, N, M> {
    /// Creates a problem with default settings and no archive.
    pub fn new(
        designer: Dz,
        evaluator: Evaluator,
        checker: C,
        reducer: R,
        bounds: Bounds<N>,
    ) -> Self {
        Self {
            designer,
            evaluator,
            checker,
            reducer,
            archive: NullArchive,
            bounds,
            settings: Arc::new(Settings::default()),
            failure_fitness: FAILURE_FITNESS,
            archive_failures: false,
        }
    }
}

impl<Dz, C, R, const N: usize, const M: usize, H> DesignProblem<Dz, C, R, N, M, H> {
    /// Replaces the archive every evaluation is saved to.
    pub fn with_archive<H2>(self, archive: H2) -> DesignProblem<Dz, C, R, N, M, H2> {
        DesignProblem {
            designer: self.designer,
            evaluator: self.evaluator,
            checker: self.checker,
            reducer: self.reducer,
            archive,
            bounds: self.bounds,
            settings: self.settings,
            failure_fitness: self.failure_fitness,
            archive_failures: self.archive_failures,
        }
    }

    /// Sets the operating point every evaluation runs at.
    #[must_use]
    pub fn with_settings(mut self, settings: impl Into<Arc<Settings>>) -> Self {
        self.settings = settings.into();
        self
    }

    /// Sets the value of every objective when an evaluation fails.
    ///
    /// # Errors
    ///
    /// Returns a [`SentinelError`] if `failure_fitness` is not finite.
    pub fn with_failure_fitness(mut self, failure_fitness: f64) -> Result<Self, SentinelError> {
        self.failure_fitness = sentinel(failure_fitness)?;
        Ok(self)
    }

    /// Sets whether failed evaluations are passed to the archive.
    #[must_use]
    pub fn with_archive_failures(mut self, archive_failures: bool) -> Self {
        self.archive_failures = archive_failures;
        self
    }

    /// Applies the failure handling and settings of a configuration.
    ///
    /// The invalid sentinel belongs to the reducer; see
    /// [`ProblemConfig::objectives`].
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration does not validate.
    pub fn with_config(mut self, config: &ProblemConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        self.failure_fitness = config.failure_fitness;
        self.archive_failures = config.archive_failures;
        if let Some(settings) = &config.settings {
            self.settings = Arc::new(settings.clone());
        }
        Ok(self)
    }

    #[must_use]
    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn archive(&self) -> &H {
        &self.archive
    }

    #[must_use]
    pub fn failure_fitness(&self) -> f64 {
        self.failure_fitness
    }
}

impl<Dz, C, R, const N: usize, const M: usize, H> DesignProblem<Dz, C, R, N, M, H>
where
    Dz: Designer<N>,
    C: ConstraintChecker,
    R: ObjectiveReducer<M>,
    H: DataHandler,
{
    /// Evaluates the objectives at `x`, returning any failure instead of
    /// degrading it.
    ///
    /// An evaluation that stopped before its last step is infeasible whatever
    /// the checker answers. Panics in the pipeline are not caught here.
    /// Archive failures, panics included, are logged and do not fail the
    /// evaluation.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the design cannot be created, a step fails,
    /// the objectives cannot be computed or one of them is not finite.
    pub fn try_fitness(&self, x: &[f64; N]) -> Result<[f64; M], Error> {
        let design = self.designer.create_design(x)?;
        let evaluation = self
            .evaluator
            .evaluate(design.clone(), Arc::clone(&self.settings))?;

        let valid = evaluation.is_complete() && self.checker.check(&evaluation);
        let objectives = self
            .reducer
            .objectives(valid, &evaluation)
            .map_err(Error::Objectives)?;

        if let Some((index, &value)) = objectives
            .iter()
            .enumerate()
            .find(|(_, value)| !value.is_finite())
        {
            return Err(Error::NonFiniteObjective { index, value });
        }

        debug!(valid, ?objectives, "objectives computed");

        save_logged("evaluation", || {
            self.archive.save(&design, &evaluation, &objectives)
        });

        Ok(objectives)
    }

    fn degrade(&self, x: &[f64; N], error: &Error) -> [f64; M] {
        let problem = match error {
            Error::Evaluation(error) => error.as_analysis().and_then(|error| error.problem()),
            _ => None,
        };
        warn!(
            error = %report(error),
            problem,
            failure_fitness = self.failure_fitness,
            "evaluation failed"
        );

        if self.archive_failures {
            save_logged("failed evaluation", || self.archive.save_failure(x, error));
        }

        [self.failure_fitness; M]
    }
}

/// Runs one archive call, logging an error or panic instead of passing it on.
fn save_logged(record: &str, save: impl FnOnce() -> Result<(), ArchiveError>) {
    match panic::catch_unwind(AssertUnwindSafe(save)) {
        Ok(Ok(())) => {}
        Ok(Err(error)) => warn!(record, error = %report(&error), "failed to archive"),
        Err(payload) => warn!(
            record,
            error = %Error::from_panic(payload.as_ref()),
            "archive panicked"
        ),
    }
}

impl<Dz, C, R, const N: usize, const M: usize, H> FitnessProblem<N, M>
    for DesignProblem<Dz, C, R, N, M, H>
where
    Dz: Designer<N>,
    C: ConstraintChecker,
    R: ObjectiveReducer<M>,
    H: DataHandler,
{
    fn fitness(&self, x: &[f64; N]) -> [f64; M] {
        let span = debug_span!("fitness", ?x);
        let _guard = span.enter();

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.try_fitness(x)))
            .unwrap_or_else(|payload| Err(Error::from_panic(payload.as_ref())));

        match result {
            Ok(objectives) => objectives,
            Err(error) => self.degrade(x, &error),
        }
    }

    fn bounds(&self) -> &Bounds<N> {
        &self.bounds
    }
}
