use serde::Serialize;

use spindle_core::{State, Value};

/// The result of one step and the state it produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Name of the step that produced this record.
    pub step: String,

    /// The analyzer output, converted to a [`Value`].
    pub result: Value,

    /// The state handed to the next step.
    pub state: State,
}

impl Record {
    pub fn new(step: impl Into<String>, result: Value, state: State) -> Self {
        Self {
            step: step.into(),
            result,
            state,
        }
    }
}

/// Converts any serializable analyzer output into a [`Value`].
///
/// Structs become maps, sequences become lists, and non-finite floats become
/// [`Value::Empty`].
///
/// # Errors
///
/// Returns an error if the output cannot be serialized, for example a map with
/// non-string keys.
pub fn to_value<T: Serialize + ?Sized>(output: &T) -> Result<Value, serde_json::Error> {
    serde_json::to_value(output).and_then(serde_json::from_value)
}
