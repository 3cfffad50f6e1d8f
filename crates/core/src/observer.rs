/// Watches an evaluation step by step and can ask it to stop.
///
/// The evaluator hands every event `E` to its observer. Returning `Some`
/// requests an action `A` from the evaluator; returning `None` leaves the
/// evaluation alone. A progress display, a trace writer and a budget that
/// aborts slow designs are all observers.
///
/// Any `FnMut(&E) -> Option<A>` closure is an observer, so an observer that
/// must outlive several evaluations is lent as `|event| budget.observe(event)`.
/// `()` ignores every event and so does `None`.
pub trait Observer<E, A> {
    /// Handles one event.
    fn observe(&mut self, event: &E) -> Option<A>;
}

impl<E, A, F> Observer<E, A> for F
where
    F: FnMut(&E) -> Option<A>,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        self(event)
    }
}

impl<E, A> Observer<E, A> for () {
    fn observe(&mut self, _: &E) -> Option<A> {
        None
    }
}

impl<E, A, O: Observer<E, A>> Observer<E, A> for Option<O> {
    fn observe(&mut self, event: &E) -> Option<A> {
        self.as_mut()?.observe(event)
    }
}
