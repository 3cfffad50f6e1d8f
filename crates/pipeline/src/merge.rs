use std::marker::PhantomData;

use serde::Serialize;

use spindle_core::{MissingDataError, PostAnalyzer, Scope, State, Value};

use crate::record::to_value;

/// A post-analyzer that copies an output's fields into the conditions.
///
/// Struct and map outputs contribute one condition per field. With a prefix,
/// keys become `"{prefix}.{field}"`, which keeps steps that report similarly
/// named quantities (two `losses` breakdowns, say) from overwriting each
/// other.
///
/// Any other output (a scalar, a list) has no field names, so it is stored
/// under the prefix itself. Without a prefix there is no key to store it
/// under and the step fails with [`MissingDataError::WrongKind`].
///
/// Outputs that cannot be serialized leave the conditions unchanged; the step
/// then fails with `EvaluationError::Record` when its result is recorded.
pub struct Merge<O> {
    prefix: Option<String>,
    only: Option<Vec<String>>,
    _marker: PhantomData<fn(&O)>,
}

impl<O> Merge<O> {
    /// Merges every field under its own name.
    #[must_use]
    pub fn all() -> Self {
        Self {
            prefix: None,
            only: None,
            _marker: PhantomData,
        }
    }

    /// Merges every field under `"{prefix}.{field}"`.
    pub fn prefixed(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Self::all()
        }
    }

    /// Restricts merging to the listed fields.
    #[must_use]
    pub fn only<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    fn key(&self, field: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}.{field}"),
            None => field.to_owned(),
        }
    }

    fn wanted(&self, field: &str) -> bool {
        self.only
            .as_ref()
            .is_none_or(|only| only.iter().any(|name| name == field))
    }
}

impl<O: Serialize> PostAnalyzer for Merge<O> {
    type Output = O;

    fn next_state(&self, output: &O, state: &State) -> Result<State, MissingDataError> {
        let mut next = state.clone();

        match to_value(output) {
            Ok(Value::Map(fields)) => {
                let selected = fields
                    .into_iter()
                    .filter(|(field, _)| self.wanted(field))
                    .map(|(field, value)| (self.key(&field), value));
                next.conditions_mut().extend(selected);
            }
            Ok(value) => {
                let Some(prefix) = &self.prefix else {
                    return Err(MissingDataError::WrongKind {
                        scope: Scope::Conditions,
                        key: "<output>".to_owned(),
                        expected: "a map",
                        found: value.kind(),
                    });
                };
                next.conditions_mut().insert(prefix.clone(), value);
            }
            Err(_) => {}
        }

        Ok(next)
    }
}
