use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use spindle_core::{Design, DesignError, DesignSchema, Value};

/// Maps a vector of free variables to a fully specified design.
///
/// Designers hold the problem-specific parameter algebra (split ratios to
/// radii, ampere-turns to conductor counts, and so on). They must be pure and
/// deterministic: the same `x` always yields a design with the same fields,
/// regardless of what was designed before.
pub trait Designer<const N: usize> {
    /// Creates the design for `x`.
    ///
    /// # Errors
    ///
    /// Returns a [`DesignError`] if the resulting design does not satisfy its
    /// schema. A conforming designer never fails for `x` within its bounds.
    fn create_design(&self, x: &[f64; N]) -> Result<Design, DesignError>;
}

impl<const N: usize, F> Designer<N> for F
where
    F: Fn(&[f64; N]) -> Result<Design, DesignError>,
{
    fn create_design(&self, x: &[f64; N]) -> Result<Design, DesignError> {
        self(x)
    }
}

/// A designer that assigns each free variable to a named field.
///
/// Fields that are not free variables are given fixed values. Each design is
/// labeled `"{prefix}-{n}"` with an increasing counter; the counter only
/// affects labels, never field values.
#[derive(Debug)]
pub struct VariableDesigner<const N: usize> {
    schema: Arc<DesignSchema>,
    variables: [String; N],
    fixed: BTreeMap<String, Value>,
    prefix: String,
    counter: AtomicU64,
}

impl<const N: usize> VariableDesigner<N> {
    /// Creates a designer that writes `x[i]` to field `variables[i]`.
    pub fn new<S: Into<String>>(schema: Arc<DesignSchema>, variables: [S; N]) -> Self {
        let prefix = schema.name().to_owned();
        Self {
            schema,
            variables: variables.map(Into::into),
            fixed: BTreeMap::new(),
            prefix,
            counter: AtomicU64::new(0),
        }
    }

    /// Sets a field that is the same for every design.
    #[must_use]
    pub fn with_fixed(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fixed.insert(field.into(), value.into());
        self
    }

    /// Sets the prefix used for design labels.
    #[must_use]
    pub fn with_label_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn variables(&self) -> &[String; N] {
        &self.variables
    }
}

impl<const N: usize> Designer<N> for VariableDesigner<N> {
    fn create_design(&self, x: &[f64; N]) -> Result<Design, DesignError> {
        let variables = self
            .variables
            .iter()
            .cloned()
            .zip(x.iter().copied().map(Value::Number));
        let fields = self
            .fixed
            .iter()
            .map(|(field, value)| (field.clone(), value.clone()))
            .chain(variables);

        let design = Design::new(Arc::clone(&self.schema), fields)?;
        let n = self.counter.fetch_add(1, Ordering::Relaxed);

        Ok(design.labeled(format!("{}-{n}", self.prefix)))
    }
}
