use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Value;

/// A validator applied to one design field at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum Check {
    /// Any value, of any kind.
    Any,
    /// A finite number.
    Finite,
    /// A finite number greater than zero.
    Positive,
    /// A finite number greater than or equal to zero.
    NonNegative,
    /// A finite number with no fractional part, such as a pole count.
    Integer,
    /// A finite number within `[min, max]`.
    Range { min: f64, max: f64 },
}

impl Check {
    /// Validates a value, returning a description of the failure.
    fn validate(self, value: &Value) -> Result<(), String> {
        if self == Self::Any {
            return Ok(());
        }

        let Some(x) = value.as_f64() else {
            return Err(format!("must be a number, got {}", value.kind()));
        };
        if !x.is_finite() {
            return Err(format!("must be finite, got {x}"));
        }

        match self {
            Self::Any | Self::Finite => Ok(()),
            Self::Positive if x > 0.0 => Ok(()),
            Self::Positive => Err(format!("must be positive, got {x}")),
            Self::NonNegative if x >= 0.0 => Ok(()),
            Self::NonNegative => Err(format!("must be non-negative, got {x}")),
            Self::Integer if x.fract() == 0.0 => Ok(()),
            Self::Integer => Err(format!("must be an integer, got {x}")),
            Self::Range { min, max } if (min..=max).contains(&x) => Ok(()),
            Self::Range { min, max } => Err(format!("must be within [{min}, {max}], got {x}")),
        }
    }
}

/// A named field and the check its value must pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(flatten)]
    pub check: Check,
}

/// The declared set of fields a family of designs must provide.
///
/// Each machine topology (surface-mount PM, interior PM, induction, ...)
/// declares its own schema. A [`Design`] is validated against its schema
/// once, when it is constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignSchema {
    name: String,
    fields: Vec<FieldSpec>,
}

impl DesignSchema {
    /// Creates an empty schema for a design family.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a required field, replacing any earlier field with the same name.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, check: Check) -> Self {
        let name = name.into();
        self.fields.retain(|spec| spec.name != name);
        self.fields.push(FieldSpec { name, check });
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    /// Checks a complete set of field values against this schema.
    ///
    /// # Errors
    ///
    /// Returns a [`DesignError`] for the first missing, unknown, or invalid
    /// field encountered.
    pub fn validate(&self, fields: &BTreeMap<String, Value>) -> Result<(), DesignError> {
        if let Some(unknown) = fields.keys().find(|name| self.spec(name).is_none()) {
            return Err(DesignError::UnknownField {
                schema: self.name.clone(),
                field: unknown.clone(),
            });
        }

        for spec in &self.fields {
            let value = fields.get(&spec.name).ok_or_else(|| DesignError::MissingField {
                schema: self.name.clone(),
                field: spec.name.clone(),
            })?;

            spec.check
                .validate(value)
                .map_err(|reason| DesignError::InvalidField {
                    schema: self.name.clone(),
                    field: spec.name.clone(),
                    reason,
                })?;
        }

        Ok(())
    }
}

/// Errors raised when a design does not satisfy its schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DesignError {
    #[error("`{schema}` design is missing field `{field}`")]
    MissingField { schema: String, field: String },

    #[error("`{schema}` design has no field named `{field}`")]
    UnknownField { schema: String, field: String },

    #[error("`{schema}` design field `{field}` {reason}")]
    InvalidField {
        schema: String,
        field: String,
        reason: String,
    },
}

/// One fully specified candidate, validated against its [`DesignSchema`].
///
/// A design is immutable. Steps that need a variation (for example a design
/// rescaled to a different stack length) derive a new design with
/// [`Design::with_overrides`], which validates again.
///
/// The optional label is for humans reading an archive. It never takes part in
/// equality, so two designs built from the same vector compare equal even if a
/// designer numbered them differently.
///
/// Deserialized designs are validated the same way as constructed ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawDesign")]
pub struct Design {
    schema: Arc<DesignSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    fields: Arc<BTreeMap<String, Value>>,
}

impl Design {
    /// Creates a design from field values.
    ///
    /// # Errors
    ///
    /// Returns a [`DesignError`] if the fields do not satisfy the schema.
    pub fn new<I, K, V>(schema: Arc<DesignSchema>, fields: I) -> Result<Self, DesignError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let fields: BTreeMap<String, Value> = fields
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();

        schema.validate(&fields)?;

        Ok(Self {
            schema,
            label: None,
            fields: Arc::new(fields),
        })
    }

    /// Attaches a human-readable label.
    #[must_use]
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Derives a new design with some fields replaced.
    ///
    /// The label is carried over. The original design is left untouched.
    ///
    /// # Errors
    ///
    /// Returns a [`DesignError`] if the resulting fields do not satisfy the
    /// schema.
    pub fn with_overrides<I, K, V>(&self, overrides: I) -> Result<Self, DesignError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut fields = self.fields.as_ref().clone();
        fields.extend(
            overrides
                .into_iter()
                .map(|(key, value)| (key.into(), value.into())),
        );

        self.schema.validate(&fields)?;

        Ok(Self {
            schema: Arc::clone(&self.schema),
            label: self.label.clone(),
            fields: Arc::new(fields),
        })
    }

    #[must_use]
    pub fn schema(&self) -> &DesignSchema {
        &self.schema
    }

    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDesign {
    schema: Arc<DesignSchema>,
    #[serde(default)]
    label: Option<String>,
    fields: BTreeMap<String, Value>,
}

impl TryFrom<RawDesign> for Design {
    type Error = DesignError;

    fn try_from(raw: RawDesign) -> Result<Self, DesignError> {
        let design = Self::new(raw.schema, raw.fields)?;
        Ok(match raw.label {
            Some(label) => design.labeled(label),
            None => design,
        })
    }
}

impl PartialEq for Design {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name == other.schema.name && self.fields == other.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot_schema() -> Arc<DesignSchema> {
        Arc::new(
            DesignSchema::new("slot")
                .field("depth", Check::Positive)
                .field("poles", Check::Integer)
                .field("fill", Check::Range { min: 0.0, max: 1.0 }),
        )
    }

    #[test]
    fn valid_design_is_built() {
        let design = Design::new(
            slot_schema(),
            [("depth", 0.02), ("poles", 8.0), ("fill", 0.45)],
        )
        .unwrap();

        assert_eq!(design.get("poles"), Some(&Value::Number(8.0)));
        assert_eq!(design.schema().name(), "slot");
    }

    #[test]
    fn missing_and_unknown_fields_are_rejected() {
        let missing = Design::new(slot_schema(), [("depth", 0.02), ("poles", 8.0)]);
        assert_eq!(
            missing.unwrap_err(),
            DesignError::MissingField {
                schema: "slot".into(),
                field: "fill".into(),
            }
        );

        let unknown = Design::new(
            slot_schema(),
            [("depth", 0.02), ("poles", 8.0), ("fill", 0.4), ("magnet", 1.0)],
        );
        assert!(matches!(
            unknown.unwrap_err(),
            DesignError::UnknownField { field, .. } if field == "magnet"
        ));
    }

    #[test]
    fn checks_report_reason() {
        let error = Design::new(
            slot_schema(),
            [("depth", 0.02), ("poles", 7.5), ("fill", 0.4)],
        )
        .unwrap_err();

        assert_eq!(
            error.to_string(),
            "`slot` design field `poles` must be an integer, got 7.5"
        );
    }

    #[test]
    fn overrides_leave_original_untouched() {
        let design = Design::new(
            slot_schema(),
            [("depth", 0.02), ("poles", 8.0), ("fill", 0.45)],
        )
        .unwrap()
        .labeled("design-7");

        let deeper = design.with_overrides([("depth", 0.03)]).unwrap();

        assert_eq!(design.get("depth"), Some(&Value::Number(0.02)));
        assert_eq!(deeper.get("depth"), Some(&Value::Number(0.03)));
        assert_eq!(deeper.label(), Some("design-7"));

        assert!(design.with_overrides([("fill", 1.5)]).is_err());
    }

    #[test]
    fn labels_do_not_affect_equality() {
        let fields = [("depth", 0.02), ("poles", 8.0), ("fill", 0.45)];
        let first = Design::new(slot_schema(), fields).unwrap().labeled("design-1");
        let second = Design::new(slot_schema(), fields).unwrap().labeled("design-2");

        assert_eq!(first, second);
    }

    #[test]
    fn deserialized_designs_are_validated() {
        let design = Design::new(
            slot_schema(),
            [("depth", 0.02), ("poles", 8.0), ("fill", 0.45)],
        )
        .unwrap()
        .labeled("design-3");

        let json = serde_json::to_value(&design).unwrap();
        let back: Design = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, design);
        assert_eq!(back.label(), Some("design-3"));

        let mut negative = json.clone();
        negative["fields"]["depth"] = serde_json::json!(-7.0);
        let error = serde_json::from_value::<Design>(negative).unwrap_err();
        assert!(error.to_string().contains("must be positive"));

        let mut unknown = json;
        unknown["fields"]["bogus"] = serde_json::json!("x");
        let error = serde_json::from_value::<Design>(unknown).unwrap_err();
        assert!(error.to_string().contains("no field named `bogus`"));
    }

    #[test]
    fn schema_from_toml() {
        let schema: DesignSchema = toml::from_str(
            r#"
            name = "spm"

            [[fields]]
            name = "stack_length"
            check = "positive"

            [[fields]]
            name = "split_ratio"
            check = "range"
            min = 0.3
            max = 0.7
            "#,
        )
        .unwrap();

        assert_eq!(schema.fields().len(), 2);
        assert_eq!(
            schema.fields()[1].check,
            Check::Range { min: 0.3, max: 0.7 }
        );
    }
}
