use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Conditions, Design, MissingDataError, Scope, Settings, Value};

/// The bundle carried from one analysis step to the next.
///
/// A state pairs the design under evaluation and the run's settings with the
/// conditions accumulated so far. Steps never modify the state they receive;
/// they clone it (which is cheap) and return the modified clone. Conditions are
/// copy-on-write, so writes to a clone are never visible through the original.
///
/// The typed lookups (`condition_f64`, `design_f64`, ...) turn a missing or
/// mistyped entry into a [`MissingDataError`], which is what problem
/// definitions propagate when their inputs are not available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    design: Design,
    settings: Arc<Settings>,
    conditions: Conditions,
}

impl State {
    /// Creates a state with no conditions.
    pub fn new(design: Design, settings: impl Into<Arc<Settings>>) -> Self {
        Self {
            design,
            settings: settings.into(),
            conditions: Conditions::new(),
        }
    }

    #[must_use]
    pub fn design(&self) -> &Design {
        &self.design
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the shared handle to the settings.
    #[must_use]
    pub fn shared_settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    #[must_use]
    pub fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    pub fn conditions_mut(&mut self) -> &mut Conditions {
        &mut self.conditions
    }

    /// Returns this state with one condition added or overwritten.
    #[must_use]
    pub fn with_condition(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(key, value);
        self
    }

    /// Returns this state with several conditions added or overwritten.
    #[must_use]
    pub fn with_conditions<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.conditions.extend(entries);
        self
    }

    /// Returns this state with the design replaced.
    #[must_use]
    pub fn with_design(mut self, design: Design) -> Self {
        self.design = design;
        self
    }

    /// Looks up a condition.
    ///
    /// # Errors
    ///
    /// Returns a [`MissingDataError`] if no step has written `key`.
    pub fn condition(&self, key: &str) -> Result<&Value, MissingDataError> {
        self.conditions
            .get(key)
            .ok_or_else(|| MissingDataError::absent(Scope::Conditions, key))
    }

    /// Looks up a numeric condition.
    ///
    /// # Errors
    ///
    /// Returns a [`MissingDataError`] if `key` is absent or not a number.
    pub fn condition_f64(&self, key: &str) -> Result<f64, MissingDataError> {
        number(Scope::Conditions, key, self.condition(key)?)
    }

    /// Looks up a design field.
    ///
    /// # Errors
    ///
    /// Returns a [`MissingDataError`] if the design has no field `key`.
    pub fn design_value(&self, key: &str) -> Result<&Value, MissingDataError> {
        self.design
            .get(key)
            .ok_or_else(|| MissingDataError::absent(Scope::Design, key))
    }

    /// Looks up a numeric design field.
    ///
    /// # Errors
    ///
    /// Returns a [`MissingDataError`] if `key` is absent or not a number.
    pub fn design_f64(&self, key: &str) -> Result<f64, MissingDataError> {
        number(Scope::Design, key, self.design_value(key)?)
    }

    /// Looks up a named settings parameter.
    ///
    /// # Errors
    ///
    /// Returns a [`MissingDataError`] if the settings have no parameter `key`.
    pub fn parameter(&self, key: &str) -> Result<&Value, MissingDataError> {
        self.settings
            .parameter(key)
            .ok_or_else(|| MissingDataError::absent(Scope::Settings, key))
    }

    /// Looks up a numeric settings parameter.
    ///
    /// # Errors
    ///
    /// Returns a [`MissingDataError`] if `key` is absent or not a number.
    pub fn parameter_f64(&self, key: &str) -> Result<f64, MissingDataError> {
        number(Scope::Settings, key, self.parameter(key)?)
    }
}

fn number(scope: Scope, key: &str, value: &Value) -> Result<f64, MissingDataError> {
    value.as_f64().ok_or_else(|| MissingDataError::WrongKind {
        scope,
        key: key.to_owned(),
        expected: "a number",
        found: value.kind(),
    })
}
