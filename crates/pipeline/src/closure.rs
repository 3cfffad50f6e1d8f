//! Adapters that let plain functions act as step collaborators.

use std::marker::PhantomData;

use spindle_core::{
    AnalysisError, Analyzer, MissingDataError, PostAnalyzer, ProblemDefinition, State,
};

/// A function used as a [`ProblemDefinition`].
pub struct ProblemFn<F, P> {
    function: F,
    _marker: PhantomData<fn() -> P>,
}

/// A function used as an [`Analyzer`].
pub struct AnalyzerFn<F, P, O> {
    function: F,
    _marker: PhantomData<fn(&P) -> O>,
}

/// A function used as a [`PostAnalyzer`].
pub struct PostFn<F, O> {
    function: F,
    _marker: PhantomData<fn(&O)>,
}

/// Wraps a function that builds a problem from a state.
pub fn problem_fn<F, P>(function: F) -> ProblemFn<F, P>
where
    F: Fn(&State) -> Result<P, MissingDataError>,
{
    ProblemFn {
        function,
        _marker: PhantomData,
    }
}

/// Wraps a function that analyzes a problem.
pub fn analyzer_fn<F, P, O>(function: F) -> AnalyzerFn<F, P, O>
where
    F: Fn(&P) -> Result<O, AnalysisError>,
{
    AnalyzerFn {
        function,
        _marker: PhantomData,
    }
}

/// Wraps a function that folds an output into the next state.
pub fn post_fn<F, O>(function: F) -> PostFn<F, O>
where
    F: Fn(&O, &State) -> Result<State, MissingDataError>,
{
    PostFn {
        function,
        _marker: PhantomData,
    }
}

impl<F, P> ProblemDefinition for ProblemFn<F, P>
where
    F: Fn(&State) -> Result<P, MissingDataError>,
{
    type Problem = P;

    fn problem(&self, state: &State) -> Result<P, MissingDataError> {
        (self.function)(state)
    }
}

impl<F, P, O> Analyzer for AnalyzerFn<F, P, O>
where
    F: Fn(&P) -> Result<O, AnalysisError>,
{
    type Problem = P;
    type Output = O;

    fn analyze(&self, problem: &P) -> Result<O, AnalysisError> {
        (self.function)(problem)
    }
}

impl<F, O> PostAnalyzer for PostFn<F, O>
where
    F: Fn(&O, &State) -> Result<State, MissingDataError>,
{
    type Output = O;

    fn next_state(&self, output: &O, state: &State) -> Result<State, MissingDataError> {
        (self.function)(output, state)
    }
}

/// A post-analyzer that also marks some outputs as fatal.
///
/// Created by [`fatal_when`].
pub struct FatalWhen<P, G> {
    post: P,
    predicate: G,
}

/// Marks outputs for which `predicate` returns `true` as fatal.
///
/// State handling is delegated to `post` unchanged.
pub fn fatal_when<P, G>(post: P, predicate: G) -> FatalWhen<P, G>
where
    P: PostAnalyzer,
    G: Fn(&P::Output) -> bool,
{
    FatalWhen { post, predicate }
}

impl<P, G> PostAnalyzer for FatalWhen<P, G>
where
    P: PostAnalyzer,
    G: Fn(&P::Output) -> bool,
{
    type Output = P::Output;

    fn next_state(&self, output: &P::Output, state: &State) -> Result<State, MissingDataError> {
        self.post.next_state(output, state)
    }

    fn is_fatal(&self, output: &P::Output) -> bool {
        self.post.is_fatal(output) || (self.predicate)(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_when_wraps_post_analyzer() {
        let post = fatal_when(
            post_fn(|_: &f64, state: &State| Ok(state.clone())),
            |stress: &f64| *stress > 1.0,
        );

        assert!(post.is_fatal(&1.5));
        assert!(!post.is_fatal(&0.5));
    }
}
